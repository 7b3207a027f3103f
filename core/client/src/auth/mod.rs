//! Authentication: token lifecycle, OAuth2 grants, session persistence.

pub mod oauth;
pub mod session;
pub mod token;

pub use oauth::{AuthorizationGrant, OAuthConfig, OAuthFlow};
pub use session::SessionSink;
pub use token::{AccessToken, TokenRefresher, TokenStore};
