use std::sync::Arc;

use tokio::sync::RwLock;

use nodewatch_common::NodeStatusReport;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub report: Arc<RwLock<NodeStatusReport>>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(report: NodeStatusReport) -> Self {
        Self {
            report: Arc::new(RwLock::new(report)),
            metrics: Arc::new(Metrics::default()),
        }
    }
}
