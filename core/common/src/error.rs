//! Common error types for HarborDrive.

use thiserror::Error;

/// Top-level error type for HarborDrive operations.
#[derive(Debug, Error)]
pub enum Error {
    /// No token is held and there is no way to obtain one.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Interactive authentication failed.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The token was invalid and the refresh attempt failed.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// Connection-level failure (timeout, refused, aborted). Never retried
    /// by the core.
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider's response was missing required fields or structurally
    /// invalid.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The provider reported a conflicting resource.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Access denied by the provider.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The provider rejected the request with a status the core does not
    /// map to a more specific kind.
    #[error("request rejected with status {status}: {context}")]
    Status { status: u16, context: String },

    /// Locally detected nonsensical request.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Map a provider HTTP status to an error kind.
    pub fn from_status(status: u16, context: impl Into<String>) -> Self {
        let context = context.into();
        match status {
            403 => Error::Forbidden(context),
            404 => Error::NotFound(context),
            409 => Error::Conflict(context),
            _ => Error::Status { status, context },
        }
    }

    /// Whether the failure may clear up on its own (worth retrying later),
    /// as opposed to a request that is fundamentally invalid.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::RefreshFailed(_))
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(Error::from_status(404, "x"), Error::NotFound(_)));
        assert!(matches!(Error::from_status(409, "x"), Error::Conflict(_)));
        assert!(matches!(Error::from_status(403, "x"), Error::Forbidden(_)));
        assert!(matches!(
            Error::from_status(500, "x"),
            Error::Status { status: 500, .. }
        ));
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::Transport("timed out".to_string()).is_transient());
        assert!(Error::RefreshFailed("revoked".to_string()).is_transient());
        assert!(!Error::NotFound("/missing".to_string()).is_transient());
        assert!(!Error::InvalidArgument("no-op move".to_string()).is_transient());
    }
}
