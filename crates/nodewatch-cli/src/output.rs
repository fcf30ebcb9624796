use chrono::{DateTime, Utc};

use nodewatch_common::{NodeState, NodeStatus, SyncState};

pub const LOADING: &str = "Loading...";

/// Full view for one state. Pure, so it can be redrawn on every change.
pub fn render(state: &SyncState, now: DateTime<Utc>) -> String {
    match state {
        SyncState::Pending => LOADING.to_string(),
        SyncState::Ready(status) => render_status(status, now),
        SyncState::Failed {
            last_good: Some(status),
            error,
        } => format!(
            "{}\n  ! data may be stale, last refresh failed: {}",
            render_status(status, now),
            error
        ),
        SyncState::Failed {
            last_good: None,
            error,
        } => format!("{LOADING}\n  ! node not reachable yet: {error}"),
    }
}

fn render_status(status: &NodeStatus, now: DateTime<Utc>) -> String {
    [
        render_header(status),
        render_ip(status),
        render_state(status),
        render_footer(status, now),
    ]
    .join("\n")
}

pub fn render_header(status: &NodeStatus) -> String {
    let title = status.node_name.as_deref().unwrap_or(&status.address);
    format!("\n=== {title} ===")
}

pub fn render_ip(status: &NodeStatus) -> String {
    format!("  {:<8} {}", "IP", status.address)
}

pub fn render_state(status: &NodeStatus) -> String {
    let label = match &status.state {
        NodeState::Starting => "STARTING".to_string(),
        NodeState::Healthy => "HEALTHY".to_string(),
        NodeState::Degraded => "DEGRADED".to_string(),
        NodeState::Unreachable => "UNREACHABLE".to_string(),
        NodeState::Other(tag) => tag.clone(),
    };
    format!("  {:<8} {}", "State", label)
}

pub fn render_footer(status: &NodeStatus, now: DateTime<Utc>) -> String {
    let age = seconds_ago(status.observed_at, now);
    match status.version.as_deref() {
        Some(version) => format!("  updated {age}s ago, agent v{version}"),
        None => format!("  updated {age}s ago"),
    }
}

fn seconds_ago(at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - at).num_seconds().max(0)
}
