//! Authenticated request execution with bounded auth retry.
//!
//! Every drive operation funnels through [`RequestExecutor::execute`],
//! which applies one uniform protocol: proactive expiry check, token
//! injection, status classification through the operation's policy, and at
//! most one refresh-and-reissue cycle when the provider reports an expired
//! token.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use harbordrive_common::{Error, Result};

use crate::auth::TokenStore;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method};

/// How a response status is interpreted for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    Success,
    AuthExpired,
    Failure,
}

/// Provider-supplied mapping from HTTP status to outcome.
#[derive(Debug, Clone, Copy)]
pub struct StatusPolicy {
    success: &'static [u16],
    auth_expired: &'static [u16],
}

impl StatusPolicy {
    pub const fn new(success: &'static [u16], auth_expired: &'static [u16]) -> Self {
        Self {
            success,
            auth_expired,
        }
    }

    /// Policy for bearer-authenticated endpoints where 401 means the token
    /// expired.
    pub const fn bearer(success: &'static [u16]) -> Self {
        Self::new(success, &[401])
    }

    pub fn classify(&self, status: u16) -> StatusOutcome {
        if self.success.contains(&status) {
            StatusOutcome::Success
        } else if self.auth_expired.contains(&status) {
            StatusOutcome::AuthExpired
        } else {
            StatusOutcome::Failure
        }
    }
}

/// How the executor injects credentials into a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>` header.
    Bearer,
    /// No injected credentials (identity travels in the URL itself).
    None,
}

/// Description of one HTTP call: everything except the credentials, which
/// the executor injects. Built per call, consumed once.
#[derive(Debug, Clone)]
pub struct RemoteOperation {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
    pub auth: AuthScheme,
    pub policy: StatusPolicy,
    /// Short description (operation and path) carried into error context.
    pub context: String,
}

impl RemoteOperation {
    pub fn new(method: Method, url: impl Into<String>, policy: StatusPolicy) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            auth: AuthScheme::Bearer,
            policy,
            context: String::new(),
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, content_type: &str, body: Bytes) -> Self {
        self.headers
            .push(("Content-Type".to_string(), content_type.to_string()));
        self.body = Some(body);
        self
    }

    /// JSON request body.
    pub fn json(self, value: &serde_json::Value) -> Self {
        self.body("application/json", Bytes::from(value.to_string()))
    }

    pub fn auth(mut self, auth: AuthScheme) -> Self {
        self.auth = auth;
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

/// Issues one authenticated call, recovering at most one token expiry.
pub struct RequestExecutor {
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<TokenStore>,
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor").finish_non_exhaustive()
    }
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn HttpTransport>, tokens: Arc<TokenStore>) -> Self {
        Self { transport, tokens }
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// Execute one operation.
    ///
    /// On an `AuthExpired` status the token is marked expired, refreshed
    /// (single-flight across concurrent operations) and the identical
    /// request reissued exactly once. A second `AuthExpired` surfaces as
    /// `RefreshFailed` rather than looping. Transport failures are never
    /// retried here; outer retry policy belongs to the caller.
    pub async fn execute(&self, op: RemoteOperation) -> Result<HttpResponse> {
        self.tokens.check_expire().await?;
        let token = self.tokens.get().await?;

        let response = self.send(&op, &token.value).await?;
        match op.policy.classify(response.status) {
            StatusOutcome::Success => Ok(response),
            StatusOutcome::Failure => Err(Error::from_status(response.status, op.context)),
            StatusOutcome::AuthExpired => {
                debug!("{}: token rejected, refreshing and retrying once", op.context);
                self.tokens.mark_expired().await;
                let token = self.tokens.refresh().await?;

                let response = self.send(&op, &token.value).await?;
                match op.policy.classify(response.status) {
                    StatusOutcome::Success => Ok(response),
                    StatusOutcome::AuthExpired => Err(Error::RefreshFailed(format!(
                        "{}: token rejected again after refresh",
                        op.context
                    ))),
                    StatusOutcome::Failure => {
                        Err(Error::from_status(response.status, op.context))
                    }
                }
            }
        }
    }

    async fn send(&self, op: &RemoteOperation, token: &str) -> Result<HttpResponse> {
        let mut request = HttpRequest::new(op.method, op.url.clone());
        for (key, value) in &op.headers {
            request = request.header(key.clone(), value.clone());
        }
        match op.auth {
            AuthScheme::Bearer => {
                request = request.header("Authorization", format!("Bearer {}", token));
            }
            AuthScheme::None => {}
        }
        if let Some(body) = &op.body {
            request = request.body(body.clone());
        }
        self.transport.execute(request).await
    }
}
