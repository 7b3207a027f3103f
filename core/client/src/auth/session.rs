//! Session persistence boundary.

use async_trait::async_trait;

use harbordrive_common::Result;

use super::token::AccessToken;

/// Application-owned persistence for the session's token record.
///
/// The core never touches disk; it notifies the sink after every install
/// and successful refresh, and asks it to clear on logout. Storage format
/// and location are the embedding application's concern. Sink failures are
/// logged and never fail the triggering operation.
#[async_trait]
pub trait SessionSink: Send + Sync {
    async fn save(&self, token: &AccessToken) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}
