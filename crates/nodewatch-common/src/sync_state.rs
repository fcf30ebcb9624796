use std::sync::Arc;

use crate::{FetchError, NodeStatus};

/// What the view layer knows about a node at a given moment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncState {
    /// No fetch has succeeded yet.
    #[default]
    Pending,
    /// Result of the most recent fetch.
    Ready(Arc<NodeStatus>),
    /// The most recent fetch failed. `last_good` is the newest status seen
    /// before the failure, if any.
    Failed {
        last_good: Option<Arc<NodeStatus>>,
        error: FetchError,
    },
}

impl SyncState {
    /// State after one fetch outcome. Depends on nothing but `self` and
    /// `outcome`.
    pub fn advance(&self, outcome: Result<NodeStatus, FetchError>) -> SyncState {
        match outcome {
            Ok(status) => SyncState::Ready(Arc::new(status)),
            Err(error) => SyncState::Failed {
                last_good: self.status().cloned(),
                error,
            },
        }
    }

    /// The status to display: the current one when ready, the last good one
    /// when failed.
    pub fn status(&self) -> Option<&Arc<NodeStatus>> {
        match self {
            SyncState::Pending => None,
            SyncState::Ready(status) => Some(status),
            SyncState::Failed { last_good, .. } => last_good.as_ref(),
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            SyncState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, SyncState::Pending)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, SyncState::Ready(_))
    }

    /// A status is shown but the latest attempt to refresh it failed.
    pub fn is_stale(&self) -> bool {
        matches!(self, SyncState::Failed { last_good: Some(_), .. })
    }
}
