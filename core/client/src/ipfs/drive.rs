//! IPFS drive operations over the node's mutable filesystem API.
//!
//! Every route takes the owner `uid` and a `path` as query parameters and
//! answers 200 on success. Mutations leave the published peer record
//! pointing at a stale root, so each one is followed by re-reading the root
//! hash and republishing it.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tracing::debug;

use harbordrive_common::{DrivePath, Error, Relocation, Result};

use crate::drive::{Drive, DriveInfo, Entry, EntryKind, FileInfo, OpenMode, RemoteFile};
use crate::executor::{AuthScheme, RemoteOperation, RequestExecutor, StatusPolicy};
use crate::pager::{self, Page};
use crate::transport::Method;

use super::rpc::NodePool;

/// A 401-class answer means the node dropped the uid session; the executor
/// re-runs the handshake and retries once.
const OK: StatusPolicy = StatusPolicy::new(&[200], &[401]);

const MULTIPART_BOUNDARY: &str = "HarborDriveBoundary";

fn mfs_op(
    pool: &NodePool,
    route: &str,
    params: &[(&str, &str)],
    context: String,
) -> Result<RemoteOperation> {
    let url = pool.api_url(route, params)?;
    Ok(RemoteOperation::new(Method::Post, url, OK)
        .auth(AuthScheme::None)
        .context(context))
}

async fn fetch_root_hash(
    uid: &str,
    pool: &NodePool,
    executor: &RequestExecutor,
) -> Result<String> {
    let op = mfs_op(
        pool,
        "files/stat",
        &[("uid", uid), ("path", "/")],
        "stat drive root".to_string(),
    )?;
    let response = executor.execute(op).await?;
    let json: Value = response.json()?;
    json.get("Hash")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| Error::MalformedResponse("stat drive root: missing Hash".to_string()))
}

/// Re-point the published peer record at the current root.
async fn publish_root(uid: &str, pool: &NodePool, executor: &RequestExecutor) -> Result<()> {
    let hash = fetch_root_hash(uid, pool, executor).await?;
    let root = format!("/ipfs/{}", hash);
    let op = mfs_op(
        pool,
        "name/publish",
        &[("uid", uid), ("path", &root)],
        "publish root".to_string(),
    )?;
    executor.execute(op).await?;
    debug!("published root {}", root);
    Ok(())
}

fn kind_from_stat(json: &Value, context: &str) -> Result<EntryKind> {
    match json.get("Type").and_then(Value::as_str) {
        Some("file") => Ok(EntryKind::File),
        Some("directory") => Ok(EntryKind::Directory),
        _ => Err(Error::MalformedResponse(format!(
            "{}: unrecognized item type",
            context
        ))),
    }
}

fn entry_from_value(item: &Value, context: &str) -> Result<Entry> {
    let name = item
        .get("Name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            Error::MalformedResponse(format!("{}: listing entry is missing a name", context))
        })?;
    let kind = match item.get("Type").and_then(Value::as_u64) {
        Some(0) => EntryKind::File,
        Some(1) => EntryKind::Directory,
        _ => {
            return Err(Error::MalformedResponse(format!(
                "{}: unrecognized entry type",
                context
            )))
        }
    };
    Ok(Entry {
        name: name.to_string(),
        kind,
        size: item.get("Size").and_then(Value::as_u64),
        id: item.get("Hash").and_then(Value::as_str).map(String::from),
    })
}

/// One fragment of a listing. The API answers the whole directory at once;
/// that is a single page with no continuation cursor.
fn parse_listing_page(body: &[u8], context: &str) -> Result<Page<Entry>> {
    let json: Value = serde_json::from_slice(body)
        .map_err(|e| Error::MalformedResponse(format!("{}: invalid JSON body: {}", context, e)))?;

    let entries = match json.get("Entries") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| entry_from_value(item, context))
            .collect::<Result<Vec<_>>>()?,
        Some(_) => {
            return Err(Error::MalformedResponse(format!(
                "{}: Entries is not an array",
                context
            )))
        }
    };
    Ok(Page {
        entries,
        next: None,
    })
}

/// Hand-assembled multipart payload for `files/write`.
fn multipart_body(data: &[u8]) -> Bytes {
    let mut body = Vec::with_capacity(data.len() + 192);
    body.extend_from_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"file\"\r\n");
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{}--", MULTIPART_BOUNDARY).as_bytes());
    Bytes::from(body)
}

/// IPFS-backed implementation of the drive capability set.
#[derive(Debug)]
pub struct IpfsDrive {
    uid: String,
    pool: Arc<NodePool>,
    executor: Arc<RequestExecutor>,
}

impl IpfsDrive {
    pub(crate) fn new(uid: String, pool: Arc<NodePool>, executor: Arc<RequestExecutor>) -> Self {
        Self {
            uid,
            pool,
            executor,
        }
    }
}

#[async_trait]
impl Drive for IpfsDrive {
    fn name(&self) -> &str {
        "ipfs"
    }

    async fn info(&self) -> Result<DriveInfo> {
        let hash = fetch_root_hash(&self.uid, &self.pool, &self.executor).await?;
        Ok(DriveInfo { id: hash })
    }

    async fn stat(&self, path: &DrivePath) -> Result<FileInfo> {
        let context = format!("stat {}", path);
        let op = mfs_op(
            &self.pool,
            "files/stat",
            &[("uid", &self.uid), ("path", &path.to_string_path())],
            context.clone(),
        )?;
        let response = self.executor.execute(op).await?;
        let json: Value = response.json()?;

        let id = json
            .get("Hash")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::MalformedResponse(format!("{}: missing Hash", context)))?;
        let kind = kind_from_stat(&json, &context)?;
        let size = json
            .get("Size")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::MalformedResponse(format!("{}: missing Size", context)))?;
        Ok(FileInfo {
            id: id.to_string(),
            kind,
            size,
        })
    }

    async fn list(&self, path: &DrivePath) -> Result<Vec<Entry>> {
        let context = format!("list {}", path);
        let first_url = self.pool.api_url(
            "files/ls",
            &[("uid", &self.uid), ("path", &path.to_string_path())],
        )?;
        pager::collect(
            &self.executor,
            first_url,
            |url| {
                RemoteOperation::new(Method::Post, url, OK)
                    .auth(AuthScheme::None)
                    .context(context.clone())
            },
            |body| parse_listing_page(body, &context),
        )
        .await
    }

    async fn mkdir(&self, path: &DrivePath) -> Result<()> {
        if path.is_root() {
            return Err(Error::InvalidArgument(
                "the root directory already exists".to_string(),
            ));
        }
        let op = mfs_op(
            &self.pool,
            "files/mkdir",
            &[
                ("uid", &self.uid),
                ("path", &path.to_string_path()),
                ("parents", "false"),
            ],
            format!("mkdir {}", path),
        )?;
        self.executor.execute(op).await?;
        publish_root(&self.uid, &self.pool, &self.executor).await
    }

    async fn move_item(&self, from: &DrivePath, to: &str) -> Result<()> {
        let relocation = Relocation::classify(from, to)?;
        let dest = relocation.destination(from).to_string_path();
        let op = mfs_op(
            &self.pool,
            "files/mv",
            &[
                ("uid", &self.uid),
                ("source", &from.to_string_path()),
                ("dest", &dest),
            ],
            format!("move {} -> {}", from, dest),
        )?;
        self.executor.execute(op).await?;
        publish_root(&self.uid, &self.pool, &self.executor).await
    }

    async fn copy_item(&self, from: &DrivePath, to: &str) -> Result<()> {
        let relocation = Relocation::classify(from, to)?;
        let dest = relocation.destination(from).to_string_path();
        let op = mfs_op(
            &self.pool,
            "files/cp",
            &[
                ("uid", &self.uid),
                ("source", &from.to_string_path()),
                ("dest", &dest),
            ],
            format!("copy {} -> {}", from, dest),
        )?;
        self.executor.execute(op).await?;
        publish_root(&self.uid, &self.pool, &self.executor).await
    }

    async fn delete(&self, path: &DrivePath) -> Result<()> {
        let op = mfs_op(
            &self.pool,
            "files/rm",
            &[
                ("uid", &self.uid),
                ("path", &path.to_string_path()),
                ("recursive", "true"),
            ],
            format!("delete {}", path),
        )?;
        self.executor.execute(op).await?;
        publish_root(&self.uid, &self.pool, &self.executor).await
    }

    async fn open_file(&self, path: &DrivePath, mode: OpenMode) -> Result<Box<dyn RemoteFile>> {
        if path.is_root() {
            return Err(Error::InvalidArgument(
                "cannot open the root directory as a file".to_string(),
            ));
        }
        Ok(Box::new(IpfsFile {
            uid: self.uid.clone(),
            path: path.clone(),
            mode,
            pool: self.pool.clone(),
            executor: self.executor.clone(),
        }))
    }
}

/// Handle to one file in the mutable filesystem.
#[derive(Debug)]
pub struct IpfsFile {
    uid: String,
    path: DrivePath,
    mode: OpenMode,
    pool: Arc<NodePool>,
    executor: Arc<RequestExecutor>,
}

#[async_trait]
impl RemoteFile for IpfsFile {
    async fn read_all(&self) -> Result<Bytes> {
        if self.mode != OpenMode::Read {
            return Err(Error::InvalidArgument(format!(
                "file {} is not open for reading",
                self.path
            )));
        }
        let op = mfs_op(
            &self.pool,
            "files/read",
            &[("uid", &self.uid), ("path", &self.path.to_string_path())],
            format!("read {}", self.path),
        )?;
        Ok(self.executor.execute(op).await?.body)
    }

    async fn write_all(&self, data: Bytes) -> Result<()> {
        if self.mode != OpenMode::Write {
            return Err(Error::InvalidArgument(format!(
                "file {} is not open for writing",
                self.path
            )));
        }
        let op = mfs_op(
            &self.pool,
            "files/write",
            &[
                ("uid", &self.uid),
                ("path", &self.path.to_string_path()),
                ("create", "true"),
                ("truncate", "true"),
            ],
            format!("write {}", self.path),
        )?
        .body(
            &format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
            multipart_body(&data),
        );
        self.executor.execute(op).await?;
        publish_root(&self.uid, &self.pool, &self.executor).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{token_store, MockTransport};
    use std::sync::Arc;

    use super::super::rpc::NodeAddr;

    fn drive(transport: Arc<MockTransport>) -> IpfsDrive {
        let (store, _) = token_store();
        let pool = Arc::new(NodePool::new(vec![NodeAddr::new("node1.test", 5001).unwrap()]).unwrap());
        IpfsDrive::new(
            "alice".to_string(),
            pool,
            Arc::new(RequestExecutor::new(transport, store)),
        )
    }

    fn push_publish_sequence(transport: &MockTransport) {
        transport.push_json(200, serde_json::json!({ "Hash": "QmNewRoot" }));
        transport.push_status(200);
    }

    #[tokio::test]
    async fn test_stat_parses_mfs_response() {
        let transport = MockTransport::new();
        transport.push_json(
            200,
            serde_json::json!({ "Hash": "QmFile", "Size": 12, "Type": "file" }),
        );
        let drive = drive(transport.clone());

        let info = drive
            .stat(&DrivePath::parse("/docs/a.txt").unwrap())
            .await
            .unwrap();
        assert_eq!(info.id, "QmFile");
        assert_eq!(info.kind, EntryKind::File);
        assert_eq!(info.size, 12);
        assert_eq!(
            transport.requests()[0].url,
            "http://node1.test:5001/api/v0/files/stat?uid=alice&path=%2Fdocs%2Fa.txt"
        );
    }

    #[tokio::test]
    async fn test_stat_rejects_unknown_type() {
        let transport = MockTransport::new();
        transport.push_json(
            200,
            serde_json::json!({ "Hash": "QmFile", "Size": 12, "Type": "symlink" }),
        );
        let drive = drive(transport);

        let err = drive
            .stat(&DrivePath::parse("/docs/a.txt").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_list_maps_entries() {
        let transport = MockTransport::new();
        transport.push_json(
            200,
            serde_json::json!({
                "Entries": [
                    { "Name": "a.txt", "Type": 0, "Size": 3, "Hash": "QmA" },
                    { "Name": "sub", "Type": 1, "Size": 0, "Hash": "QmSub" },
                ],
            }),
        );
        let drive = drive(transport);

        let entries = drive
            .list(&DrivePath::parse("/docs").unwrap())
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.txt");
        assert_eq!(entries[0].kind, EntryKind::File);
        assert_eq!(entries[1].kind, EntryKind::Directory);
        assert_eq!(entries[1].id.as_deref(), Some("QmSub"));
    }

    #[tokio::test]
    async fn test_list_null_entries_is_empty_directory() {
        let transport = MockTransport::new();
        transport.push_json(200, serde_json::json!({ "Entries": null }));
        let drive = drive(transport);

        let entries = drive
            .list(&DrivePath::parse("/empty").unwrap())
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_mkdir_republishes_root() {
        let transport = MockTransport::new();
        transport.push_status(200); // files/mkdir
        push_publish_sequence(&transport);
        let drive = drive(transport.clone());

        drive
            .mkdir(&DrivePath::parse("/docs/new").unwrap())
            .await
            .unwrap();

        let urls: Vec<String> = transport.requests().iter().map(|r| r.url.clone()).collect();
        assert_eq!(urls.len(), 3);
        assert_eq!(
            urls[0],
            "http://node1.test:5001/api/v0/files/mkdir?uid=alice&path=%2Fdocs%2Fnew&parents=false"
        );
        assert_eq!(
            urls[1],
            "http://node1.test:5001/api/v0/files/stat?uid=alice&path=%2F"
        );
        assert_eq!(
            urls[2],
            "http://node1.test:5001/api/v0/name/publish?uid=alice&path=%2Fipfs%2FQmNewRoot"
        );
    }

    #[tokio::test]
    async fn test_move_sends_source_and_dest() {
        let transport = MockTransport::new();
        transport.push_status(200); // files/mv
        push_publish_sequence(&transport);
        let drive = drive(transport.clone());

        drive
            .move_item(&DrivePath::parse("/docs/a.txt").unwrap(), "/archive/")
            .await
            .unwrap();

        assert_eq!(
            transport.requests()[0].url,
            "http://node1.test:5001/api/v0/files/mv?uid=alice&source=%2Fdocs%2Fa.txt&dest=%2Farchive%2Fa.txt"
        );
    }

    #[tokio::test]
    async fn test_move_noop_fails_without_network() {
        let transport = MockTransport::new();
        let drive = drive(transport.clone());

        let err = drive
            .move_item(&DrivePath::parse("/docs/a.txt").unwrap(), "/docs/a.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_recursive_and_republishes() {
        let transport = MockTransport::new();
        transport.push_status(200); // files/rm
        push_publish_sequence(&transport);
        let drive = drive(transport.clone());

        drive
            .delete(&DrivePath::parse("/docs/old").unwrap())
            .await
            .unwrap();

        let urls: Vec<String> = transport.requests().iter().map(|r| r.url.clone()).collect();
        assert!(urls[0].contains("files/rm"));
        assert!(urls[0].contains("recursive=true"));
        assert!(urls[2].contains("name/publish"));
    }

    #[tokio::test]
    async fn test_read_file_returns_body() {
        let transport = MockTransport::new();
        transport.push_body(200, b"content");
        let drive = drive(transport.clone());

        let file = drive
            .open_file(&DrivePath::parse("/docs/a.txt").unwrap(), OpenMode::Read)
            .await
            .unwrap();
        let data = file.read_all().await.unwrap();
        assert_eq!(&data[..], b"content");
        assert!(transport.requests()[0].url.contains("files/read"));
    }

    #[tokio::test]
    async fn test_write_file_sends_multipart_and_republishes() {
        let transport = MockTransport::new();
        transport.push_status(200); // files/write
        push_publish_sequence(&transport);
        let drive = drive(transport.clone());

        let file = drive
            .open_file(&DrivePath::parse("/docs/a.txt").unwrap(), OpenMode::Write)
            .await
            .unwrap();
        file.write_all(Bytes::from_static(b"payload")).await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].url.contains("files/write"));
        assert!(requests[0].url.contains("create=true"));
        let content_type = requests[0].header_value("content-type").unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        let body = requests[0].body.as_ref().unwrap();
        let text = std::str::from_utf8(body).unwrap();
        assert!(text.contains("payload"));
        assert!(text.starts_with(&format!("--{}", MULTIPART_BOUNDARY)));
        assert!(requests[2].url.contains("name/publish"));
    }

    #[tokio::test]
    async fn test_info_is_root_hash() {
        let transport = MockTransport::new();
        transport.push_json(200, serde_json::json!({ "Hash": "QmRoot" }));
        let drive = drive(transport);

        let info = drive.info().await.unwrap();
        assert_eq!(info.id, "QmRoot");
    }
}
