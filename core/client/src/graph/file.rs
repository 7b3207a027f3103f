//! Graph file content access.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use harbordrive_common::{Error, Result};

use crate::drive::{OpenMode, RemoteFile};
use crate::executor::{RemoteOperation, RequestExecutor, StatusPolicy};
use crate::transport::Method;

const READ: StatusPolicy = StatusPolicy::bearer(&[200]);
const WRITE: StatusPolicy = StatusPolicy::bearer(&[200, 201]);

/// Handle to one item's content endpoint (`…:/content`).
#[derive(Debug)]
pub struct GraphFile {
    url: String,
    context: String,
    mode: OpenMode,
    executor: Arc<RequestExecutor>,
}

impl GraphFile {
    pub(crate) fn new(
        url: String,
        context: String,
        mode: OpenMode,
        executor: Arc<RequestExecutor>,
    ) -> Self {
        Self {
            url,
            context,
            mode,
            executor,
        }
    }
}

#[async_trait]
impl RemoteFile for GraphFile {
    async fn read_all(&self) -> Result<Bytes> {
        if self.mode != OpenMode::Read {
            return Err(Error::InvalidArgument(format!(
                "{} is not open for reading",
                self.context
            )));
        }
        let op = RemoteOperation::new(Method::Get, self.url.clone(), READ)
            .context(format!("read {}", self.context));
        Ok(self.executor.execute(op).await?.body)
    }

    async fn write_all(&self, data: Bytes) -> Result<()> {
        if self.mode != OpenMode::Write {
            return Err(Error::InvalidArgument(format!(
                "{} is not open for writing",
                self.context
            )));
        }
        let op = RemoteOperation::new(Method::Put, self.url.clone(), WRITE)
            .body("application/octet-stream", data)
            .context(format!("write {}", self.context));
        self.executor.execute(op).await?;
        Ok(())
    }
}
