//! IPFS RPC node pool.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use url::Url;

use harbordrive_common::{Error, Result};

/// Address of one IPFS RPC node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddr {
    pub host: String,
    pub port: u16,
}

impl NodeAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        let host = host.into();
        if host.is_empty() {
            return Err(Error::InvalidArgument(
                "node host cannot be empty".to_string(),
            ));
        }
        if port == 0 {
            return Err(Error::InvalidArgument(
                "node port cannot be zero".to_string(),
            ));
        }
        Ok(Self { host, port })
    }

    /// Root of the node's RPC API.
    pub fn api_base(&self) -> String {
        format!("http://{}:{}/api/v0", self.host, self.port)
    }
}

/// Rotating pool of candidate RPC nodes.
///
/// One node is current at a time; marking it unreachable advances to the
/// next candidate, wrapping around.
#[derive(Debug)]
pub struct NodePool {
    nodes: Vec<NodeAddr>,
    current: AtomicUsize,
}

impl NodePool {
    pub fn new(nodes: Vec<NodeAddr>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(Error::InvalidArgument(
                "at least one RPC node is required".to_string(),
            ));
        }
        Ok(Self {
            nodes,
            current: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn current(&self) -> &NodeAddr {
        &self.nodes[self.current.load(Ordering::SeqCst) % self.nodes.len()]
    }

    pub fn mark_unreachable(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
    }

    /// Build an API URL on the current node, with query parameters
    /// form-encoded.
    pub fn api_url(&self, route: &str, params: &[(&str, &str)]) -> Result<String> {
        let mut url = Url::parse(&format!("{}/{}", self.current().api_base(), route))
            .map_err(|e| Error::InvalidArgument(format!("invalid RPC URL: {}", e)))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params.iter().copied());
        }
        Ok(url.into())
    }
}
