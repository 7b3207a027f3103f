//! Graph provider configuration.

use serde::{Deserialize, Serialize};

use crate::auth::OAuthConfig;

/// Default API root for the signed-in user.
pub const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0/me";

const AUTH_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/authorize";
const TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";
const SCOPE: &str = "Files.ReadWrite.All offline_access";
const REDIRECT_URL: &str = "http://localhost:33822/auth-redirect";

fn default_api_base() -> String {
    GRAPH_API_BASE.to_string()
}

fn default_redirect_url() -> String {
    REDIRECT_URL.to_string()
}

/// Configuration for a Graph-style drive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// OAuth2 application (client) id.
    pub client_id: String,
    /// Absent for public (native) clients.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Redirect URL the application's listener serves.
    #[serde(default = "default_redirect_url")]
    pub redirect_url: String,
    /// API root; overridable for sovereign clouds.
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl GraphConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_url: default_redirect_url(),
            api_base: default_api_base(),
        }
    }

    pub(crate) fn oauth_config(&self) -> OAuthConfig {
        OAuthConfig {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            auth_url: AUTH_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            scope: SCOPE.to_string(),
            redirect_url: self.redirect_url.clone(),
        }
    }
}
