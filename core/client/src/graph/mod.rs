//! Microsoft-Graph-style drive provider.
//!
//! Addressing is path-based (`/drive/root:{path}:`), authentication is the
//! OAuth2 authorization-code flow with automatic single-flight refresh, and
//! listings follow `@odata.nextLink` continuation links.

pub mod client;
pub mod config;
pub mod drive;
pub mod file;

pub use client::GraphClient;
pub use config::{GraphConfig, GRAPH_API_BASE};
pub use drive::GraphDrive;
pub use file::GraphFile;
