//! Drive capability interface and shared models.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use harbordrive_common::{DrivePath, Result};

/// Whether an entry is a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    pub kind: EntryKind,
    /// Size in bytes, when the provider reports one.
    #[serde(default)]
    pub size: Option<u64>,
    /// Provider-specific identifier (Graph item id, IPFS hash).
    #[serde(default)]
    pub id: Option<String>,
}

/// Metadata of a single item, as returned by `stat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub id: String,
    pub kind: EntryKind,
    pub size: u64,
}

/// Identity of the drive itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveInfo {
    pub id: String,
}

/// Direction a file is opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

/// Handle to one remote file's content.
#[async_trait]
pub trait RemoteFile: Send + Sync + std::fmt::Debug {
    /// Fetch the whole content. Fails with `InvalidArgument` when the file
    /// was opened for writing.
    async fn read_all(&self) -> Result<Bytes>;

    /// Replace the whole content. Fails with `InvalidArgument` when the
    /// file was opened for reading.
    async fn write_all(&self, data: Bytes) -> Result<()>;
}

/// The capability set every provider drive implements.
///
/// One instance per provider, selected at client construction. Any number
/// of operations may run concurrently against one drive; the shared token
/// store serializes refreshes, everything else is per-operation state.
#[async_trait]
pub trait Drive: Send + Sync + std::fmt::Debug {
    /// Provider name (e.g. "graph", "ipfs").
    fn name(&self) -> &str;

    /// Identity of the backing drive.
    async fn info(&self) -> Result<DriveInfo>;

    /// Metadata of one item.
    async fn stat(&self, path: &DrivePath) -> Result<FileInfo>;

    /// Full listing of a directory, in provider order. An existing empty
    /// directory yields an empty listing; a missing one fails with
    /// `NotFound`.
    async fn list(&self, path: &DrivePath) -> Result<Vec<Entry>>;

    /// Create a directory. The parent must already exist.
    async fn mkdir(&self, path: &DrivePath) -> Result<()>;

    /// Move or rename an item. A `to` ending in '/' moves into that
    /// directory keeping the base name; a no-op relocation fails locally
    /// with `InvalidArgument` before any network call.
    async fn move_item(&self, from: &DrivePath, to: &str) -> Result<()>;

    /// Copy an item; destination semantics as for [`Drive::move_item`].
    async fn copy_item(&self, from: &DrivePath, to: &str) -> Result<()>;

    /// Delete an item.
    async fn delete(&self, path: &DrivePath) -> Result<()>;

    /// Open a file for reading or writing.
    async fn open_file(&self, path: &DrivePath, mode: OpenMode) -> Result<Box<dyn RemoteFile>>;
}
