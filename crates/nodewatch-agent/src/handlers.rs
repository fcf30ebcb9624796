use std::sync::atomic::Ordering;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use nodewatch_common::{NodeState, NodeStatusReport};

use crate::metrics::{metrics_handler, track_requests};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SetStateRequest {
    pub state: NodeState,
}

pub fn router(st: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .route("/api/data", get(get_status))
        .route("/api/state", put(set_state))
        .layer(middleware::from_fn_with_state(st.clone(), track_requests))
        .with_state(st)
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn get_status(State(st): State<AppState>) -> Json<NodeStatusReport> {
    st.metrics.status_reads_total.fetch_add(1, Ordering::Relaxed);
    Json(st.report.read().await.clone())
}

pub async fn set_state(State(st): State<AppState>, Json(req): Json<SetStateRequest>) -> Response {
    if req.state.as_str().trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "state must not be empty"})),
        )
            .into_response();
    }

    let report = {
        let mut guard = st.report.write().await;
        if guard.state != req.state {
            tracing::info!(from=%guard.state, to=%req.state, "reported state changed");
        }
        guard.state = req.state;
        guard.clone()
    };
    st.metrics.state_changes_total.fetch_add(1, Ordering::Relaxed);
    (StatusCode::OK, Json(report)).into_response()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use nodewatch_common::SyncState;
    use nodewatch_sync::{HttpStatusFetcher, NodeStatusStore, StatusFetcher, SyncConfig};

    use super::*;

    fn sample() -> AppState {
        AppState::new(NodeStatusReport {
            address: "10.0.0.5".to_string(),
            state: NodeState::Healthy,
            node_name: Some("node-a".to_string()),
            version: Some("0.1.0".to_string()),
        })
    }

    async fn serve(st: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(st)).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_get_status() {
        let st = sample();
        let Json(report) = get_status(State(st.clone())).await;
        assert_eq!(report.address, "10.0.0.5");
        assert_eq!(report.state, NodeState::Healthy);
        assert_eq!(st.metrics.status_reads_total.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_set_state() {
        let st = sample();
        let resp = set_state(
            State(st.clone()),
            Json(SetStateRequest {
                state: NodeState::Degraded,
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(st.report.read().await.state, NodeState::Degraded);

        let resp = set_state(
            State(st.clone()),
            Json(SetStateRequest {
                state: NodeState::from(" "),
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(st.report.read().await.state, NodeState::Degraded);
    }

    #[tokio::test]
    async fn test_fetcher_reads_agent() {
        let base = serve(sample()).await;
        let fetcher = HttpStatusFetcher::new(&base, &SyncConfig::default()).unwrap();

        let status = fetcher.fetch_once().await.unwrap();
        assert_eq!(status.address, "10.0.0.5");
        assert_eq!(status.state, NodeState::Healthy);
        assert_eq!(status.node_name.as_deref(), Some("node-a"));
        assert_eq!(status.version.as_deref(), Some("0.1.0"));
    }

    #[tokio::test]
    async fn test_store_follows_state_change() {
        let st = sample();
        let base = serve(st.clone()).await;
        let config = SyncConfig::default().with_interval_ms(100).with_timeout_ms(1_000);
        let store = NodeStatusStore::http(&base, config).unwrap();
        store.start();

        let wait_for = |want: NodeState| {
            let store = store.clone();
            async move {
                for _ in 0..50 {
                    if let SyncState::Ready(status) = store.snapshot() {
                        if status.state == want {
                            return true;
                        }
                    }
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                false
            }
        };

        assert!(wait_for(NodeState::Healthy).await);
        st.report.write().await.state = NodeState::Degraded;
        assert!(wait_for(NodeState::Degraded).await);
        store.stop();
    }
}
