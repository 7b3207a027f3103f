//! Client interface: authentication bootstrap and drive construction.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use harbordrive_common::Result;

use crate::auth::AuthorizationGrant;
use crate::drive::Drive;

/// Identity of the authenticated user, with blank fields where a provider
/// has no value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub user_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email: String,
}

/// Provider-selection boundary: owns login/logout and hands out drives
/// bound to its token store.
#[async_trait]
pub trait Client: Send + Sync {
    /// Establish the initial session. Graph-style providers run the OAuth
    /// authorization-code flow through `grant`; providers without
    /// interactive auth ignore it and perform their own handshake.
    /// Logging in while already authenticated validates the held session
    /// instead of repeating the interactive step.
    async fn login(&self, grant: &dyn AuthorizationGrant) -> Result<()>;

    /// Invalidate local session state. Server-side authorization is not
    /// necessarily revoked.
    async fn logout(&self) -> Result<()>;

    /// Identity of the authenticated user.
    async fn info(&self) -> Result<ClientInfo>;

    /// A drive bound to this client's token store. Drives opened from one
    /// client share that store, so a refresh performed for one operation
    /// benefits all of them.
    async fn open_drive(&self) -> Result<Arc<dyn Drive>>;
}
