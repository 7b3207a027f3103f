//! Access-token lifecycle with single-flight refresh.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use harbordrive_common::{Error, Result};

use super::session::SessionSink;

/// Refresh within this window before the provider-reported expiry, sparing
/// one round trip that would otherwise fail with an auth error.
const EXPIRY_LEEWAY_MINUTES: i64 = 5;

/// One access token plus the material needed to renew it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AccessToken {
    /// Opaque bearer value sent to the provider.
    pub value: String,
    /// Renewal material (OAuth refresh token). Absent for providers whose
    /// identity never expires.
    #[serde(default)]
    pub refresh_material: Option<String>,
    /// Provider-reported expiry, when it supplies one.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Whether the token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => at < Utc::now() + Duration::minutes(EXPIRY_LEEWAY_MINUTES),
            None => false,
        }
    }
}

/// Provider seam for renewing a token.
///
/// The Graph provider implements this with the OAuth refresh-token grant;
/// the IPFS provider re-runs its peer-identity handshake.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, current: &AccessToken) -> Result<AccessToken>;
}

#[derive(Default)]
struct TokenState {
    token: Option<AccessToken>,
    expired: bool,
    /// Bumped after every completed refresh attempt, success or failure.
    epoch: u64,
    /// Reason of the attempt at `epoch`, if it failed.
    last_error: Option<String>,
}

/// Thread-safe owner of one access token.
///
/// Concurrent refresh attempts collapse into a single network call: the
/// first caller through the gate performs the exchange, everyone queued
/// behind it observes that attempt's outcome via the epoch counter. This
/// matters because a redundant token exchange can race the provider's
/// refresh-token rotation and invalidate the sibling's token.
pub struct TokenStore {
    refresher: Arc<dyn TokenRefresher>,
    state: RwLock<TokenState>,
    gate: Mutex<()>,
    sink: Option<Arc<dyn SessionSink>>,
}

impl TokenStore {
    pub fn new(refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            refresher,
            state: RwLock::new(TokenState::default()),
            gate: Mutex::new(()),
            sink: None,
        }
    }

    /// Create a store preloaded with a restored session token. The sink is
    /// not notified; the token came from it.
    pub fn with_token(refresher: Arc<dyn TokenRefresher>, token: AccessToken) -> Self {
        Self {
            refresher,
            state: RwLock::new(TokenState {
                token: Some(token),
                ..TokenState::default()
            }),
            gate: Mutex::new(()),
            sink: None,
        }
    }

    /// Attach a persistence sink notified after install and refresh.
    pub fn with_sink(mut self, sink: Arc<dyn SessionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Install a freshly obtained token (login or session restore).
    pub async fn install(&self, token: AccessToken) {
        {
            let mut state = self.state.write().await;
            state.token = Some(token.clone());
            state.expired = false;
            state.last_error = None;
        }
        self.notify_sink(&token).await;
    }

    /// Drop the held token. Does not revoke anything server-side.
    pub async fn clear(&self) {
        {
            let mut state = self.state.write().await;
            *state = TokenState::default();
        }
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.clear().await {
                warn!("failed to clear persisted session: {}", e);
            }
        }
    }

    /// Current token, without any expiry check.
    pub async fn get(&self) -> Result<AccessToken> {
        self.state
            .read()
            .await
            .token
            .clone()
            .ok_or(Error::NotAuthenticated)
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.token.is_some()
    }

    /// Record that a consumer observed an authentication failure.
    /// Idempotent; safe to call concurrently.
    pub async fn mark_expired(&self) {
        self.state.write().await.expired = true;
    }

    /// Proactively refresh when the token is flagged or past its tracked
    /// expiry, so the next request does not burn a round trip on a
    /// guaranteed auth failure.
    pub async fn check_expire(&self) -> Result<()> {
        let stale = {
            let state = self.state.read().await;
            match &state.token {
                None => return Err(Error::NotAuthenticated),
                Some(token) => state.expired || token.is_expired(),
            }
        };
        if stale {
            self.refresh().await?;
        }
        Ok(())
    }

    /// Refresh the token, collapsing concurrent attempts into one exchange.
    ///
    /// Callers that queue behind an in-flight refresh receive that
    /// refresh's result, token or error, rather than starting another
    /// round trip.
    pub async fn refresh(&self) -> Result<AccessToken> {
        let seen = self.state.read().await.epoch;
        let _gate = self.gate.lock().await;

        {
            let state = self.state.read().await;
            if state.epoch != seen {
                // A refresh completed while we waited for the gate; share
                // its outcome.
                return match &state.last_error {
                    None => state.token.clone().ok_or(Error::NotAuthenticated),
                    Some(reason) => Err(Error::RefreshFailed(reason.clone())),
                };
            }
        }

        let current = self
            .state
            .read()
            .await
            .token
            .clone()
            .ok_or(Error::NotAuthenticated)?;

        debug!("refreshing access token");
        let outcome = self.refresher.refresh(&current).await;

        let mut state = self.state.write().await;
        state.epoch = state.epoch.wrapping_add(1);
        match outcome {
            Ok(token) => {
                state.token = Some(token.clone());
                state.expired = false;
                state.last_error = None;
                drop(state);
                info!("access token refreshed");
                self.notify_sink(&token).await;
                Ok(token)
            }
            Err(e) => {
                state.expired = true;
                let reason = e.to_string();
                state.last_error = Some(reason.clone());
                warn!("access token refresh failed: {}", reason);
                Err(Error::RefreshFailed(reason))
            }
        }
    }

    async fn notify_sink(&self, token: &AccessToken) {
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.save(token).await {
                warn!("failed to persist session: {}", e);
            }
        }
    }
}
