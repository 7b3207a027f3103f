//! Graph client: OAuth bootstrap and drive construction.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use harbordrive_common::{Error, Result};

use crate::auth::{AccessToken, AuthorizationGrant, OAuthFlow, SessionSink, TokenStore};
use crate::client::{Client, ClientInfo};
use crate::drive::Drive;
use crate::executor::{RemoteOperation, RequestExecutor, StatusPolicy};
use crate::transport::{HttpTransport, Method};

use super::config::GraphConfig;
use super::drive::GraphDrive;

const ME: StatusPolicy = StatusPolicy::bearer(&[200]);

/// Client for a Graph-style drive.
pub struct GraphClient {
    config: GraphConfig,
    flow: Arc<OAuthFlow>,
    tokens: Arc<TokenStore>,
    executor: Arc<RequestExecutor>,
}

impl GraphClient {
    pub fn new(config: GraphConfig, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        Self::with_session(config, transport, None, None)
    }

    /// Construct with an optional previously saved token record and an
    /// optional persistence sink. A restored session skips the interactive
    /// step while its refresh material stays valid.
    pub fn with_session(
        config: GraphConfig,
        transport: Arc<dyn HttpTransport>,
        session: Option<AccessToken>,
        sink: Option<Arc<dyn SessionSink>>,
    ) -> Result<Self> {
        let flow = Arc::new(OAuthFlow::new(config.oauth_config())?);
        let refresher = flow.clone() as Arc<dyn crate::auth::TokenRefresher>;
        let mut tokens = match session {
            Some(token) => TokenStore::with_token(refresher, token),
            None => TokenStore::new(refresher),
        };
        if let Some(sink) = sink {
            tokens = tokens.with_sink(sink);
        }
        let tokens = Arc::new(tokens);
        let executor = Arc::new(RequestExecutor::new(transport, tokens.clone()));

        Ok(Self {
            config,
            flow,
            tokens,
            executor,
        })
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }
}

#[async_trait]
impl Client for GraphClient {
    async fn login(&self, grant: &dyn AuthorizationGrant) -> Result<()> {
        if self.tokens.is_authenticated().await {
            // Validate the held session instead of repeating the
            // interactive step; refreshes proactively when stale.
            return self.tokens.check_expire().await;
        }

        let (auth_url, _state) = self.flow.authorization_url();
        let code = grant.authorize(&auth_url).await?;
        let token = self.flow.exchange_code(&code).await?;
        self.tokens.install(token).await;
        info!("logged in to graph drive");
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        self.tokens.clear().await;
        info!("logged out of graph drive");
        Ok(())
    }

    async fn info(&self) -> Result<ClientInfo> {
        let op = RemoteOperation::new(Method::Get, self.config.api_base.clone(), ME)
            .context("client info");
        let response = self.executor.execute(op).await?;
        let json: Value = response.json()?;

        let user_id = json
            .get("id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::MalformedResponse("client info: missing id".to_string()))?;
        let field = |name: &str| {
            json.get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Ok(ClientInfo {
            user_id: user_id.to_string(),
            display_name: field("displayName"),
            email: field("userPrincipalName"),
        })
    }

    async fn open_drive(&self) -> Result<Arc<dyn Drive>> {
        if !self.tokens.is_authenticated().await {
            return Err(Error::NotAuthenticated);
        }
        Ok(Arc::new(GraphDrive::new(
            self.config.api_base.clone(),
            self.executor.clone(),
        )))
    }
}
