mod args;
mod handlers;
mod metrics;
mod state;

use clap::Parser;

use nodewatch_common::telemetry::{init_tracing, TelemetryConfig};
use nodewatch_common::{NodeState, NodeStatusReport};

use crate::args::Args;
use crate::handlers::router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let telemetry = init_tracing(
        "nodewatch-agent",
        &TelemetryConfig {
            otlp_endpoint: args.otlp_endpoint.clone(),
            otlp_token: args.otlp_token.clone(),
        },
    );

    let report = NodeStatusReport {
        address: args.address.clone(),
        state: NodeState::from(args.state.as_str()),
        node_name: args.node_name.clone(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    };
    tracing::info!(
        listen_addr=%args.listen_addr,
        address=%report.address,
        state=%report.state,
        otlp = telemetry.exporting(),
        "nodewatch-agent starting"
    );

    let app = router(AppState::new(report));
    let listener = tokio::net::TcpListener::bind(&args.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await?;
    Ok(())
}
