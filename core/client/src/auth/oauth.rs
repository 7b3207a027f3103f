//! OAuth2 authorization-code flow and refresh-token grant.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, RefreshToken,
    Scope, TokenResponse, TokenUrl,
};

use harbordrive_common::{Error, Result};

use super::token::{AccessToken, TokenRefresher};

/// Fallback token lifetime when the provider omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// Endpoints and client identity for one OAuth2 provider.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    /// Absent for public (native) clients.
    #[serde(default)]
    pub client_secret: Option<String>,
    pub auth_url: String,
    pub token_url: String,
    /// Space-separated scope string requested at authorization.
    pub scope: String,
    pub redirect_url: String,
}

/// The caller-supplied side of the interactive step: present the
/// authorization URL to the user (browser, device prompt), run the redirect
/// listener, and hand back the authorization code.
#[async_trait]
pub trait AuthorizationGrant: Send + Sync {
    async fn authorize(&self, auth_url: &str) -> Result<String>;
}

/// OAuth2 grant machinery for one provider.
pub struct OAuthFlow {
    client: BasicClient,
    config: OAuthConfig,
}

impl OAuthFlow {
    pub fn new(config: OAuthConfig) -> Result<Self> {
        let client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            config.client_secret.clone().map(ClientSecret::new),
            AuthUrl::new(config.auth_url.clone())
                .map_err(|e| Error::InvalidArgument(format!("invalid auth URL: {}", e)))?,
            Some(
                TokenUrl::new(config.token_url.clone())
                    .map_err(|e| Error::InvalidArgument(format!("invalid token URL: {}", e)))?,
            ),
        )
        .set_redirect_uri(
            RedirectUrl::new(config.redirect_url.clone())
                .map_err(|e| Error::InvalidArgument(format!("invalid redirect URL: {}", e)))?,
        );

        Ok(Self { client, config })
    }

    /// Generate the authorization URL for the user to visit.
    ///
    /// Returns the URL and the CSRF state embedded in it; the redirect
    /// listener should verify the state echoed back by the provider.
    pub fn authorization_url(&self) -> (String, String) {
        let (auth_url, csrf_token) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(self.config.scope.clone()))
            .url();

        (auth_url.to_string(), csrf_token.secret().clone())
    }

    /// Exchange an authorization code for a token.
    pub async fn exchange_code(&self, code: &str) -> Result<AccessToken> {
        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| Error::Authentication(format!("code exchange failed: {}", e)))?;

        Ok(Self::into_access_token(token_result, None))
    }

    /// Renew an access token with the refresh-token grant.
    pub async fn exchange_refresh(&self, refresh_material: &str) -> Result<AccessToken> {
        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_material.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| Error::RefreshFailed(format!("refresh grant rejected: {}", e)))?;

        Ok(Self::into_access_token(token_result, Some(refresh_material)))
    }

    fn into_access_token(
        token_result: oauth2::basic::BasicTokenResponse,
        previous_material: Option<&str>,
    ) -> AccessToken {
        let value = token_result.access_token().secret().clone();

        // The provider may rotate the refresh token; fall back to the one
        // we already hold when the response omits it.
        let refresh_material = token_result
            .refresh_token()
            .map(|t| t.secret().clone())
            .or_else(|| previous_material.map(String::from));

        let lifetime = token_result
            .expires_in()
            .unwrap_or_else(|| std::time::Duration::from_secs(DEFAULT_TOKEN_LIFETIME_SECS));
        let expires_at =
            Utc::now() + Duration::from_std(lifetime).unwrap_or_else(|_| Duration::hours(1));

        AccessToken {
            value,
            refresh_material,
            expires_at: Some(expires_at),
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }
}

#[async_trait]
impl TokenRefresher for OAuthFlow {
    async fn refresh(&self, current: &AccessToken) -> Result<AccessToken> {
        let material = current
            .refresh_material
            .as_deref()
            .ok_or_else(|| Error::RefreshFailed("no refresh material held".to_string()))?;
        self.exchange_refresh(material).await
    }
}
