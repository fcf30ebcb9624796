use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    Network,
    Timeout,
    MalformedResponse,
}

/// Why a single status fetch did not produce a `NodeStatus`.
///
/// Errors are values stored inside `SyncState`, so they are cloneable and
/// comparable rather than wrapping the transport's error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Unreachable host or connection-level failure.
    #[error("network error: {0}")]
    Network(String),
    /// No response within the bounded window.
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    /// A response arrived but could not be read as a node status.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Network(_) => FetchErrorKind::Network,
            FetchError::Timeout(_) => FetchErrorKind::Timeout,
            FetchError::MalformedResponse(_) => FetchErrorKind::MalformedResponse,
        }
    }
}
