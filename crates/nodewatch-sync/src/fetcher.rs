use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use nodewatch_common::{FetchError, NodeStatus, NodeStatusReport};

use crate::config::SyncConfig;

pub const DEFAULT_STATUS_PATH: &str = "/api/data";

/// One attempt at reading a node's status. Implementations keep no state
/// between calls and never retry.
#[async_trait]
pub trait StatusFetcher: Send + Sync {
    async fn fetch_once(&self) -> Result<NodeStatus, FetchError>;
}

/// Reads `GET {base_url}/api/data` from a node's reporting endpoint.
#[derive(Debug, Clone)]
pub struct HttpStatusFetcher {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpStatusFetcher {
    pub fn new(base_url: &str, config: &SyncConfig) -> Result<Self, FetchError> {
        Self::with_path(base_url, DEFAULT_STATUS_PATH, config)
    }

    pub fn with_path(base_url: &str, path: &str, config: &SyncConfig) -> Result<Self, FetchError> {
        let timeout = config.timeout();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(format!("failed to build http client: {e}")))?;
        let url = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Ok(Self { http, url, timeout })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else if err.is_decode() {
            FetchError::MalformedResponse(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl StatusFetcher for HttpStatusFetcher {
    async fn fetch_once(&self) -> Result<NodeStatus, FetchError> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let code = resp.status();
        if !code.is_success() {
            return Err(FetchError::MalformedResponse(format!(
                "unexpected status {code} from {}",
                self.url
            )));
        }

        let body = resp.bytes().await.map_err(|e| self.classify(e))?;
        let report = decode_report(&body)?;
        tracing::debug!(url=%self.url, address=%report.address, state=%report.state, "fetched node status");
        Ok(report.observed(Utc::now()))
    }
}

/// Parse a reporting endpoint body. A report without an address is rejected.
pub fn decode_report(body: &[u8]) -> Result<NodeStatusReport, FetchError> {
    let report: NodeStatusReport = serde_json::from_slice(body)
        .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;
    if report.address.trim().is_empty() {
        return Err(FetchError::MalformedResponse(
            "report has an empty address".to_string(),
        ));
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, routing::get, Json, Router};
    use nodewatch_common::{FetchErrorKind, NodeState};

    use super::*;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn config(timeout_ms: u64) -> SyncConfig {
        SyncConfig::default().with_timeout_ms(timeout_ms)
    }

    #[test]
    fn test_decode_report() {
        let report = decode_report(br#"{"address":"10.0.0.5","state":"healthy"}"#).unwrap();
        assert_eq!(report.address, "10.0.0.5");
        assert_eq!(report.state, NodeState::Healthy);

        let err = decode_report(br#"{"address":"  ","state":"healthy"}"#).unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::MalformedResponse);

        let err = decode_report(b"<html>").unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::MalformedResponse);
    }

    #[test]
    fn test_url_join() {
        let f = HttpStatusFetcher::new("http://127.0.0.1:8088/", &SyncConfig::default()).unwrap();
        assert_eq!(f.url(), "http://127.0.0.1:8088/api/data");

        let f = HttpStatusFetcher::with_path("http://node", "status", &SyncConfig::default()).unwrap();
        assert_eq!(f.url(), "http://node/status");
    }

    #[tokio::test]
    async fn test_fetch_success_stamps_time() {
        let app = Router::new().route(
            "/api/data",
            get(|| async {
                Json(serde_json::json!({
                    "address": "10.0.0.5",
                    "state": "healthy",
                    "node_name": "node-a",
                }))
            }),
        );
        let base = serve(app).await;
        let fetcher = HttpStatusFetcher::new(&base, &config(2_000)).unwrap();

        let before = Utc::now();
        let first = fetcher.fetch_once().await.unwrap();
        assert_eq!(first.address, "10.0.0.5");
        assert_eq!(first.state, NodeState::Healthy);
        assert_eq!(first.node_name.as_deref(), Some("node-a"));
        assert!(first.observed_at >= before);

        let second = fetcher.fetch_once().await.unwrap();
        assert!(second.observed_at >= first.observed_at);
    }

    #[tokio::test]
    async fn test_fetch_malformed_body() {
        let app = Router::new().route("/api/data", get(|| async { "not json" }));
        let base = serve(app).await;
        let fetcher = HttpStatusFetcher::new(&base, &config(2_000)).unwrap();

        let err = fetcher.fetch_once().await.unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn test_fetch_error_status() {
        let app = Router::new().route(
            "/api/data",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "busy") }),
        );
        let base = serve(app).await;
        let fetcher = HttpStatusFetcher::new(&base, &config(2_000)).unwrap();

        let err = fetcher.fetch_once().await.unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::MalformedResponse);
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let app = Router::new().route(
            "/api/data",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let base = serve(app).await;
        let fetcher = HttpStatusFetcher::new(&base, &config(200)).unwrap();

        let err = fetcher.fetch_once().await.unwrap_err();
        assert_eq!(err, FetchError::Timeout(Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        // grab a free port, then close it again
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = HttpStatusFetcher::new(&format!("http://{addr}"), &config(2_000)).unwrap();
        let err = fetcher.fetch_once().await.unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Network);
    }
}
