//! Cursor-driven page aggregation.
//!
//! Providers return directory listings in fragments, each carrying an
//! optional continuation cursor. [`collect`] walks the cursor chain
//! strictly sequentially (each cursor is only known once the previous page
//! arrives) and concatenates entries in arrival order. The result is
//! all-or-nothing: any failure aborts the whole listing rather than
//! presenting a silently truncated directory.

use serde_json::Value;

use harbordrive_common::{Error, Result};

use crate::executor::{RemoteOperation, RequestExecutor};

/// One provider response fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub entries: Vec<T>,
    /// URL or token of the next page, already validated.
    pub next: Option<String>,
}

/// Validate a raw continuation field.
///
/// A present-but-invalid cursor (non-string or empty) must not be treated
/// as "no more pages"; that would silently truncate the listing.
pub fn next_cursor(field: Option<&Value>) -> Result<Option<String>> {
    match field {
        None => Ok(None),
        Some(Value::String(link)) if !link.is_empty() => Ok(Some(link.clone())),
        Some(_) => Err(Error::MalformedResponse(
            "continuation link is present but not a usable URL".to_string(),
        )),
    }
}

/// Drive the pagination protocol to completion.
///
/// `build` turns a page URL into the operation fetching it (reusing the
/// executor's auth retry per page); `extract` parses one page body into
/// entries and a validated cursor.
pub async fn collect<T, B, X>(
    executor: &RequestExecutor,
    first_url: String,
    build: B,
    extract: X,
) -> Result<Vec<T>>
where
    B: Fn(&str) -> RemoteOperation,
    X: Fn(&[u8]) -> Result<Page<T>>,
{
    let mut url = first_url;
    let mut entries = Vec::new();
    loop {
        let response = executor.execute(build(&url)).await?;
        let page = extract(&response.body)?;
        entries.extend(page.entries);
        match page.next {
            Some(next) => url = next,
            None => return Ok(entries),
        }
    }
}
