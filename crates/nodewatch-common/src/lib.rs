pub mod error;
pub mod node_status;
pub mod sync_state;

pub use error::{FetchError, FetchErrorKind};
pub use node_status::{NodeState, NodeStatus, NodeStatusReport};
pub use sync_state::SyncState;

pub mod telemetry;
