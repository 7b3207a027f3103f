//! IPFS client: peer-identity handshake and drive construction.
//!
//! There is no interactive authorization here. Logging in resolves the
//! uid's peer identity and binds it to the node's session: `uid/info`
//! yields the peer id, `name/resolve` the currently published root, and
//! `uid/login` completes the handshake. No drive operation succeeds before
//! the handshake has run.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use harbordrive_common::{Error, Result};

use crate::auth::{AccessToken, AuthorizationGrant, TokenRefresher, TokenStore};
use crate::client::{Client, ClientInfo};
use crate::drive::Drive;
use crate::executor::RequestExecutor;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method};

use super::drive::IpfsDrive;
use super::rpc::{NodeAddr, NodePool};

/// Configuration for an IPFS-backed drive.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IpfsConfig {
    /// Drive owner identity on the node cluster.
    pub uid: String,
    /// Candidate RPC nodes, tried in order.
    pub nodes: Vec<NodeAddr>,
}

/// The uid is the session identity; it carries no expiry and no separate
/// refresh material.
fn identity_token(uid: &str) -> AccessToken {
    AccessToken {
        value: uid.to_string(),
        refresh_material: None,
        expires_at: None,
    }
}

async fn call(
    transport: &dyn HttpTransport,
    method: Method,
    url: String,
    context: &str,
) -> Result<HttpResponse> {
    let response = transport.execute(HttpRequest::new(method, url)).await?;
    if response.status != 200 {
        return Err(Error::from_status(response.status, context));
    }
    Ok(response)
}

fn required_string(response: &HttpResponse, field: &str, context: &str) -> Result<String> {
    let json: Value = response.json()?;
    json.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| Error::MalformedResponse(format!("{}: missing {}", context, field)))
}

/// Run the peer-identity handshake against the pool's current node.
pub(super) async fn synchronize(
    transport: &dyn HttpTransport,
    pool: &NodePool,
    uid: &str,
) -> Result<()> {
    let url = pool.api_url("uid/info", &[("uid", uid)])?;
    let response = call(transport, Method::Post, url, "uid info").await?;
    let peer_id = required_string(&response, "PeerID", "uid info")?;

    let url = pool.api_url("name/resolve", &[("arg", &peer_id)])?;
    let response = call(transport, Method::Get, url, "name resolve").await?;
    let root = required_string(&response, "Path", "name resolve")?;

    let url = pool.api_url("uid/login", &[("uid", uid), ("hash", &root)])?;
    call(transport, Method::Post, url, "uid login").await?;
    Ok(())
}

/// Renews the session by re-running the handshake; the uid itself never
/// rotates.
struct HandshakeRefresher {
    uid: String,
    pool: Arc<NodePool>,
    transport: Arc<dyn HttpTransport>,
}

#[async_trait]
impl TokenRefresher for HandshakeRefresher {
    async fn refresh(&self, _current: &AccessToken) -> Result<AccessToken> {
        synchronize(self.transport.as_ref(), &self.pool, &self.uid).await?;
        Ok(identity_token(&self.uid))
    }
}

/// Client for an IPFS-backed drive.
pub struct IpfsClient {
    uid: String,
    pool: Arc<NodePool>,
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<TokenStore>,
    executor: Arc<RequestExecutor>,
}

impl std::fmt::Debug for IpfsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpfsClient")
            .field("uid", &self.uid)
            .finish_non_exhaustive()
    }
}

impl IpfsClient {
    pub fn new(config: IpfsConfig, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        if config.uid.is_empty() {
            return Err(Error::InvalidArgument("uid cannot be empty".to_string()));
        }
        let pool = Arc::new(NodePool::new(config.nodes)?);
        let refresher = Arc::new(HandshakeRefresher {
            uid: config.uid.clone(),
            pool: pool.clone(),
            transport: transport.clone(),
        });
        let tokens = Arc::new(TokenStore::new(refresher));
        let executor = Arc::new(RequestExecutor::new(transport.clone(), tokens.clone()));

        Ok(Self {
            uid: config.uid,
            pool,
            transport,
            tokens,
            executor,
        })
    }

    /// Probe candidate nodes until one answers, advancing past dead ones.
    async fn ensure_reachable_node(&self) -> Result<()> {
        for _ in 0..self.pool.len() {
            let url = self.pool.api_url("version", &[])?;
            match self
                .transport
                .execute(HttpRequest::new(Method::Post, url))
                .await
            {
                Ok(response) if response.status == 200 => return Ok(()),
                Ok(response) => {
                    warn!(
                        "RPC node {} answered probe with status {}",
                        self.pool.current().host,
                        response.status
                    );
                }
                Err(e) => {
                    warn!("RPC node {} unreachable: {}", self.pool.current().host, e);
                }
            }
            self.pool.mark_unreachable();
        }
        Err(Error::Transport("no reachable RPC node".to_string()))
    }
}

#[async_trait]
impl Client for IpfsClient {
    async fn login(&self, _grant: &dyn AuthorizationGrant) -> Result<()> {
        self.ensure_reachable_node().await?;
        synchronize(self.transport.as_ref(), &self.pool, &self.uid).await?;
        self.tokens.install(identity_token(&self.uid)).await;
        info!("logged in to ipfs drive as {}", self.uid);
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        self.tokens.clear().await;
        info!("logged out of ipfs drive");
        Ok(())
    }

    async fn info(&self) -> Result<ClientInfo> {
        Ok(ClientInfo {
            user_id: self.uid.clone(),
            ..ClientInfo::default()
        })
    }

    async fn open_drive(&self) -> Result<Arc<dyn Drive>> {
        if !self.tokens.is_authenticated().await {
            return Err(Error::NotAuthenticated);
        }
        Ok(Arc::new(IpfsDrive::new(
            self.uid.clone(),
            self.pool.clone(),
            self.executor.clone(),
        )))
    }
}
