//! In-memory doubles shared by the unit tests: a scripted transport and a
//! counting token refresher.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use harbordrive_common::{Error, Result};

use crate::auth::{AccessToken, TokenRefresher, TokenStore};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

enum Scripted {
    Response(HttpResponse),
    TransportError(String),
}

/// Transport double: replays scripted responses in order and records every
/// request it receives.
pub struct MockTransport {
    responses: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn push_status(&self, status: u16) {
        self.push_response(HttpResponse {
            status,
            body: Bytes::new(),
        });
    }

    pub fn push_json(&self, status: u16, body: serde_json::Value) {
        self.push_response(HttpResponse {
            status,
            body: Bytes::from(body.to_string()),
        });
    }

    pub fn push_body(&self, status: u16, body: &[u8]) {
        self.push_response(HttpResponse {
            status,
            body: Bytes::copy_from_slice(body),
        });
    }

    pub fn push_transport_error(&self, reason: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Scripted::TransportError(reason.to_string()));
    }

    fn push_response(&self, response: HttpResponse) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Scripted::Response(response));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.url.clone();
        self.requests.lock().unwrap().push(request);
        match self.responses.lock().unwrap().pop_front() {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::TransportError(reason)) => Err(Error::Transport(reason)),
            None => Err(Error::Transport(format!(
                "no scripted response for {}",
                url
            ))),
        }
    }
}

/// Refresher double: counts exchanges and can be told to fail the next one.
pub struct MockRefresher {
    calls: AtomicUsize,
    fail_next: AtomicBool,
}

impl MockRefresher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl TokenRefresher for MockRefresher {
    async fn refresh(&self, _current: &AccessToken) -> Result<AccessToken> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(Error::Transport("refresh endpoint unreachable".to_string()));
        }
        Ok(AccessToken {
            value: format!("refreshed-{}", n),
            refresh_material: Some("material".to_string()),
            expires_at: None,
        })
    }
}

/// A store preloaded with a live token, plus its counting refresher.
pub fn token_store() -> (Arc<TokenStore>, Arc<MockRefresher>) {
    let refresher = MockRefresher::new();
    let store = Arc::new(TokenStore::with_token(
        refresher.clone(),
        AccessToken {
            value: "current-token".to_string(),
            refresh_material: Some("material".to_string()),
            expires_at: None,
        },
    ));
    (store, refresher)
}
