//! Keeps a single node's status fresh for a rendering layer.
//!
//! [`StatusFetcher`] performs one round trip; [`NodeStatusStore`] polls it on
//! a fixed interval and publishes the result as an immutable
//! [`SyncState`](nodewatch_common::SyncState) to subscribers.

pub mod config;
pub mod fetcher;
pub mod store;

pub use config::SyncConfig;
pub use fetcher::{decode_report, HttpStatusFetcher, StatusFetcher, DEFAULT_STATUS_PATH};
pub use store::{NodeStatusStore, Subscription, SyncStats, WeakNodeStatusStore};
