//! Remote drive client for HarborDrive.
//!
//! One logical drive interface (stat, list, mkdir, move, copy, delete,
//! open-for-read/write) backed interchangeably by remote providers: a
//! Microsoft-Graph-style REST drive and an IPFS-based content store.
//!
//! The resilient core is shared by every provider:
//! - [`auth::TokenStore`]: access-token lifecycle with single-flight
//!   refresh across concurrent operations
//! - [`executor::RequestExecutor`]: one authenticated call with at most
//!   one refresh-and-retry cycle on token expiry
//! - [`pager`]: sequential cursor-driven page aggregation for listings
//!
//! Everything provider-specific is URL and body construction layered on
//! top of that core. Network access goes through the
//! [`transport::HttpTransport`] capability, so the whole stack is testable
//! against an in-memory transport.

pub mod auth;
pub mod client;
pub mod drive;
pub mod executor;
pub mod graph;
pub mod ipfs;
pub mod pager;
pub mod transport;

#[cfg(test)]
pub(crate) mod testutil;

pub use auth::{
    AccessToken, AuthorizationGrant, OAuthConfig, OAuthFlow, SessionSink, TokenRefresher,
    TokenStore,
};
pub use client::{Client, ClientInfo};
pub use drive::{Drive, DriveInfo, Entry, EntryKind, FileInfo, OpenMode, RemoteFile};
pub use executor::{AuthScheme, RemoteOperation, RequestExecutor, StatusOutcome, StatusPolicy};
pub use graph::{GraphClient, GraphConfig};
pub use ipfs::{IpfsClient, IpfsConfig, NodeAddr};
pub use pager::{collect, next_cursor, Page};
pub use transport::{
    escape_path, HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport,
};
