//! IPFS-backed drive provider.
//!
//! The drive lives in a node cluster's mutable filesystem, keyed by the
//! owner uid. Login is a peer-identity handshake rather than an OAuth
//! exchange, and every mutation republishes the root hash so the peer
//! record follows the tree.

pub mod client;
pub mod drive;
pub mod rpc;

pub use client::{IpfsClient, IpfsConfig};
pub use drive::{IpfsDrive, IpfsFile};
pub use rpc::{NodeAddr, NodePool};
