//! Graph drive operations.
//!
//! The item URL space follows the path-addressing convention: the root is
//! `…/drive/root`, any other item is `…/drive/root:{path}:`. Bodies for
//! move/copy carry a `parentReference` and/or `name` depending on which
//! parts of the item's identity change.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use harbordrive_common::{DrivePath, Error, Relocation, Result};

use crate::drive::{Drive, DriveInfo, Entry, EntryKind, FileInfo, OpenMode, RemoteFile};
use crate::executor::{RemoteOperation, RequestExecutor, StatusPolicy};
use crate::pager::{self, Page};
use crate::transport::{escape_path, Method};

use super::file::GraphFile;

const STAT: StatusPolicy = StatusPolicy::bearer(&[200]);
const LIST: StatusPolicy = StatusPolicy::bearer(&[200]);
const MKDIR: StatusPolicy = StatusPolicy::bearer(&[201]);
const MOVE: StatusPolicy = StatusPolicy::bearer(&[200]);
// The provider completes copies asynchronously; acceptance is success and
// the monitor URL is not polled.
const COPY: StatusPolicy = StatusPolicy::bearer(&[202]);
const DELETE: StatusPolicy = StatusPolicy::bearer(&[204]);

/// Graph-backed implementation of the drive capability set.
#[derive(Debug)]
pub struct GraphDrive {
    api_base: String,
    executor: Arc<RequestExecutor>,
}

impl GraphDrive {
    pub(crate) fn new(api_base: String, executor: Arc<RequestExecutor>) -> Self {
        Self { api_base, executor }
    }

    fn item_url(&self, path: &DrivePath) -> String {
        if path.is_root() {
            format!("{}/drive/root", self.api_base)
        } else {
            format!(
                "{}/drive/root:{}:",
                self.api_base,
                escape_path(&path.to_string_path())
            )
        }
    }

    fn children_url(&self, path: &DrivePath) -> String {
        if path.is_root() {
            format!("{}/drive/root/children", self.api_base)
        } else {
            format!(
                "{}/drive/root:{}:/children",
                self.api_base,
                escape_path(&path.to_string_path())
            )
        }
    }

    fn content_url(&self, path: &DrivePath) -> String {
        format!(
            "{}/drive/root:{}:/content",
            self.api_base,
            escape_path(&path.to_string_path())
        )
    }

    /// `parentReference`/`name` body for a classified relocation.
    fn relocation_body(relocation: &Relocation) -> Value {
        let mut body = serde_json::json!({});
        if let Some(parent) = &relocation.new_parent {
            let parent_path = if parent.is_root() {
                String::new()
            } else {
                parent.to_string_path()
            };
            body["parentReference"] = serde_json::json!({
                "path": format!("/drive/root:{}", parent_path),
            });
        }
        if let Some(name) = &relocation.new_name {
            body["name"] = serde_json::json!(name);
        }
        body
    }
}

/// File-xor-folder typing. An item claiming both facets, or neither, is
/// ambiguous and rejected rather than guessed at.
fn entry_kind(item: &Value, context: &str) -> Result<EntryKind> {
    match (item.get("file"), item.get("folder")) {
        (Some(_), None) => Ok(EntryKind::File),
        (None, Some(_)) => Ok(EntryKind::Directory),
        _ => Err(Error::MalformedResponse(format!(
            "{}: item is not clearly a file or a folder",
            context
        ))),
    }
}

fn entry_from_item(item: &Value, context: &str) -> Result<Entry> {
    let name = item
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            Error::MalformedResponse(format!("{}: listing entry is missing a name", context))
        })?;
    let kind = entry_kind(item, context)?;
    Ok(Entry {
        name: name.to_string(),
        kind,
        size: item.get("size").and_then(Value::as_u64),
        id: item.get("id").and_then(Value::as_str).map(String::from),
    })
}

fn file_info_from_item(item: &Value, context: &str) -> Result<FileInfo> {
    let id = item
        .get("cTag")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::MalformedResponse(format!("{}: missing cTag", context)))?;
    let kind = entry_kind(item, context)?;
    let size = item
        .get("size")
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::MalformedResponse(format!("{}: missing size", context)))?;
    Ok(FileInfo {
        id: id.to_string(),
        kind,
        size,
    })
}

fn parse_children_page(body: &[u8], context: &str) -> Result<Page<Entry>> {
    let json: Value = serde_json::from_slice(body)
        .map_err(|e| Error::MalformedResponse(format!("{}: invalid JSON body: {}", context, e)))?;
    let items = json
        .get("value")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            Error::MalformedResponse(format!("{}: listing is missing the value array", context))
        })?;

    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        entries.push(entry_from_item(item, context)?);
    }
    let next = pager::next_cursor(json.get("@odata.nextLink"))?;
    Ok(Page { entries, next })
}

#[async_trait]
impl Drive for GraphDrive {
    fn name(&self) -> &str {
        "graph"
    }

    async fn info(&self) -> Result<DriveInfo> {
        let op = RemoteOperation::new(Method::Get, format!("{}/drive", self.api_base), STAT)
            .context("drive info");
        let response = self.executor.execute(op).await?;
        let json: Value = response.json()?;
        let id = json
            .get("id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                Error::MalformedResponse("drive info: missing id".to_string())
            })?;
        Ok(DriveInfo { id: id.to_string() })
    }

    async fn stat(&self, path: &DrivePath) -> Result<FileInfo> {
        let context = format!("stat {}", path);
        let op = RemoteOperation::new(Method::Get, self.item_url(path), STAT)
            .context(context.clone());
        let response = self.executor.execute(op).await?;
        let json: Value = response.json()?;
        file_info_from_item(&json, &context)
    }

    async fn list(&self, path: &DrivePath) -> Result<Vec<Entry>> {
        let context = format!("list {}", path);
        pager::collect(
            &self.executor,
            self.children_url(path),
            |url| RemoteOperation::new(Method::Get, url, LIST).context(context.clone()),
            |body| parse_children_page(body, &context),
        )
        .await
    }

    async fn mkdir(&self, path: &DrivePath) -> Result<()> {
        let parent = path.parent().ok_or_else(|| {
            Error::InvalidArgument("the root directory already exists".to_string())
        })?;
        let name = path.name().unwrap_or_default();

        let body = serde_json::json!({
            "name": name,
            "folder": {},
            "@microsoft.graph.conflictBehavior": "fail",
        });
        let op = RemoteOperation::new(Method::Post, self.children_url(&parent), MKDIR)
            .json(&body)
            .context(format!("mkdir {}", path));
        self.executor.execute(op).await?;
        Ok(())
    }

    async fn move_item(&self, from: &DrivePath, to: &str) -> Result<()> {
        let relocation = Relocation::classify(from, to)?;
        let op = RemoteOperation::new(Method::Patch, self.item_url(from), MOVE)
            .json(&Self::relocation_body(&relocation))
            .context(format!("move {} -> {}", from, to));
        self.executor.execute(op).await?;
        Ok(())
    }

    async fn copy_item(&self, from: &DrivePath, to: &str) -> Result<()> {
        let relocation = Relocation::classify(from, to)?;
        let url = format!(
            "{}/drive/root:{}:/copy",
            self.api_base,
            escape_path(&from.to_string_path())
        );
        let op = RemoteOperation::new(Method::Post, url, COPY)
            .json(&Self::relocation_body(&relocation))
            .context(format!("copy {} -> {}", from, to));
        self.executor.execute(op).await?;
        Ok(())
    }

    async fn delete(&self, path: &DrivePath) -> Result<()> {
        let op = RemoteOperation::new(Method::Delete, self.item_url(path), DELETE)
            .context(format!("delete {}", path));
        self.executor.execute(op).await?;
        Ok(())
    }

    async fn open_file(&self, path: &DrivePath, mode: OpenMode) -> Result<Box<dyn RemoteFile>> {
        if path.is_root() {
            return Err(Error::InvalidArgument(
                "cannot open the root directory as a file".to_string(),
            ));
        }
        Ok(Box::new(GraphFile::new(
            self.content_url(path),
            format!("file {}", path),
            mode,
            self.executor.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{token_store, MockTransport};

    fn drive(transport: Arc<MockTransport>) -> GraphDrive {
        let (store, _) = token_store();
        GraphDrive::new(
            "https://graph.test/v1.0/me".to_string(),
            Arc::new(RequestExecutor::new(transport, store)),
        )
    }

    fn file_item(name: &str, size: u64) -> Value {
        serde_json::json!({ "name": name, "file": {}, "size": size, "id": format!("id-{}", name) })
    }

    fn folder_item(name: &str) -> Value {
        serde_json::json!({ "name": name, "folder": { "childCount": 0 }, "size": 0 })
    }

    fn body_json(request: &crate::transport::HttpRequest) -> Value {
        serde_json::from_slice(request.body.as_ref().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_list_merges_pages_in_order() {
        let transport = MockTransport::new();
        transport.push_json(
            200,
            serde_json::json!({
                "value": [file_item("a.txt", 3), folder_item("b")],
                "@odata.nextLink": "https://graph.test/v1.0/me/drive/next1",
            }),
        );
        transport.push_json(200, serde_json::json!({ "value": [file_item("c.txt", 1)] }));
        let drive = drive(transport.clone());

        let entries = drive
            .list(&DrivePath::parse("/docs").unwrap())
            .await
            .unwrap();

        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b", "c.txt"]);
        assert_eq!(entries[0].kind, EntryKind::File);
        assert_eq!(entries[1].kind, EntryKind::Directory);

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0].url,
            "https://graph.test/v1.0/me/drive/root:/docs:/children"
        );
        assert_eq!(requests[1].url, "https://graph.test/v1.0/me/drive/next1");
    }

    #[tokio::test]
    async fn test_list_root_uses_plain_children_url() {
        let transport = MockTransport::new();
        transport.push_json(200, serde_json::json!({ "value": [] }));
        let drive = drive(transport.clone());

        let entries = drive.list(&DrivePath::root()).await.unwrap();
        assert!(entries.is_empty());
        assert_eq!(
            transport.requests()[0].url,
            "https://graph.test/v1.0/me/drive/root/children"
        );
    }

    #[tokio::test]
    async fn test_list_rejects_invalid_cursor() {
        let transport = MockTransport::new();
        transport.push_json(
            200,
            serde_json::json!({ "value": [file_item("a.txt", 3)], "@odata.nextLink": "" }),
        );
        let drive = drive(transport);

        let err = drive
            .list(&DrivePath::parse("/docs").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_list_rejects_ambiguous_entry() {
        let transport = MockTransport::new();
        transport.push_json(
            200,
            serde_json::json!({
                "value": [{ "name": "weird", "file": {}, "folder": {} }],
            }),
        );
        let drive = drive(transport);

        let err = drive
            .list(&DrivePath::parse("/docs").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_stat_parses_item() {
        let transport = MockTransport::new();
        transport.push_json(
            200,
            serde_json::json!({ "cTag": "ctag-1", "file": {}, "size": 42 }),
        );
        let drive = drive(transport.clone());

        let info = drive
            .stat(&DrivePath::parse("/docs/a.txt").unwrap())
            .await
            .unwrap();
        assert_eq!(info.id, "ctag-1");
        assert_eq!(info.kind, EntryKind::File);
        assert_eq!(info.size, 42);
        assert_eq!(
            transport.requests()[0].url,
            "https://graph.test/v1.0/me/drive/root:/docs/a.txt:"
        );
    }

    #[tokio::test]
    async fn test_stat_missing_maps_to_not_found_without_retry() {
        let transport = MockTransport::new();
        transport.push_status(404);
        let drive = drive(transport.clone());

        let err = drive
            .stat(&DrivePath::parse("/missing").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_mkdir_posts_to_parent_children() {
        let transport = MockTransport::new();
        transport.push_json(201, serde_json::json!({ "id": "new" }));
        let drive = drive(transport.clone());

        drive
            .mkdir(&DrivePath::parse("/docs/reports").unwrap())
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(
            requests[0].url,
            "https://graph.test/v1.0/me/drive/root:/docs:/children"
        );
        let body = body_json(&requests[0]);
        assert_eq!(body["name"], "reports");
        assert!(body["folder"].is_object());
        assert_eq!(body["@microsoft.graph.conflictBehavior"], "fail");
    }

    #[tokio::test]
    async fn test_mkdir_conflict_maps_to_conflict() {
        let transport = MockTransport::new();
        transport.push_status(409);
        let drive = drive(transport);

        let err = drive
            .mkdir(&DrivePath::parse("/docs").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn test_move_identical_paths_fails_locally() {
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
    async fn test_move_rename_sends_name_only() {
        let transport = MockTransport::new();
        transport.push_json(200, serde_json::json!({ "id": "x" }));
        let drive = drive(transport.clone());

        drive
            .move_item(&DrivePath::parse("/docs/a.txt").unwrap(), "/docs/b.txt")
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::Patch);
        let body = body_json(&requests[0]);
        assert_eq!(body["name"], "b.txt");
        assert!(body.get("parentReference").is_none());
    }

    #[tokio::test]
    async fn test_move_into_directory_sends_parent_only() {
        let transport = MockTransport::new();
        transport.push_json(200, serde_json::json!({ "id": "x" }));
        let drive = drive(transport.clone());

        drive
            .move_item(&DrivePath::parse("/docs/a.txt").unwrap(), "/archive/")
            .await
            .unwrap();

        let body = body_json(&transport.requests()[0]);
        assert_eq!(body["parentReference"]["path"], "/drive/root:/archive");
        assert!(body.get("name").is_none());
    }

    #[tokio::test]
    async fn test_move_to_root_directory_parent_reference() {
        let transport = MockTransport::new();
        transport.push_json(200, serde_json::json!({ "id": "x" }));
        let drive = drive(transport.clone());

        drive
            .move_item(&DrivePath::parse("/docs/a.txt").unwrap(), "/")
            .await
            .unwrap();

        let body = body_json(&transport.requests()[0]);
        assert_eq!(body["parentReference"]["path"], "/drive/root:");
    }

    #[tokio::test]
    async fn test_copy_posts_to_copy_url_and_accepts_202() {
        let transport = MockTransport::new();
        transport.push_status(202);
        let drive = drive(transport.clone());

        drive
            .copy_item(
                &DrivePath::parse("/docs/a.txt").unwrap(),
                "/archive/a-copy.txt",
            )
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(
            requests[0].url,
            "https://graph.test/v1.0/me/drive/root:/docs/a.txt:/copy"
        );
        let body = body_json(&requests[0]);
        assert_eq!(body["parentReference"]["path"], "/drive/root:/archive");
        assert_eq!(body["name"], "a-copy.txt");
    }

    #[tokio::test]
    async fn test_delete_expects_no_content() {
        let transport = MockTransport::new();
        transport.push_status(204);
        let drive = drive(transport.clone());

        drive
            .delete(&DrivePath::parse("/docs/a.txt").unwrap())
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::Delete);
        assert_eq!(
            requests[0].url,
            "https://graph.test/v1.0/me/drive/root:/docs/a.txt:"
        );
    }

    #[tokio::test]
    async fn test_info_parses_drive_id() {
        let transport = MockTransport::new();
        transport.push_json(200, serde_json::json!({ "id": "drive-1" }));
        let drive = drive(transport);

        let info = drive.info().await.unwrap();
        assert_eq!(info.id, "drive-1");
    }

    #[tokio::test]
    async fn test_escaped_path_in_item_url() {
        let transport = MockTransport::new();
        transport.push_json(
            200,
            serde_json::json!({ "cTag": "c", "file": {}, "size": 1 }),
        );
        let drive = drive(transport.clone());

        drive
            .stat(&DrivePath::parse("/my files/a#1.txt").unwrap())
            .await
            .unwrap();
        assert_eq!(
            transport.requests()[0].url,
            "https://graph.test/v1.0/me/drive/root:/my%20files/a%231.txt:"
        );
    }
}
