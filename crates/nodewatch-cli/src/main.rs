mod args;
mod output;

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use futures_util::StreamExt;

use nodewatch_common::telemetry::{init_tracing, TelemetryConfig};
use nodewatch_common::SyncState;
use nodewatch_sync::{HttpStatusFetcher, NodeStatusStore, StatusFetcher, SyncConfig};

use crate::args::{Args, Command};
use crate::output::render;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let telemetry = init_tracing(
        "nodewatch-cli",
        &TelemetryConfig {
            otlp_endpoint: args.otlp_endpoint.clone(),
            otlp_token: args.otlp_token.clone(),
        },
    );
    if telemetry.exporting() {
        tracing::info!("exporting traces over OTLP");
    }
    let config = args.sync_config();

    match args.command {
        Command::Watch { updates } => watch(&args.node_url, config, updates).await,
        Command::Status { json } => status(&args.node_url, config, json).await,
    }
}

async fn watch(node_url: &str, config: SyncConfig, updates: Option<usize>) -> Result<()> {
    let store = NodeStatusStore::http(node_url, config)?;
    let _log = store.subscribe(|state| match state {
        SyncState::Pending => {}
        SyncState::Ready(status) => {
            tracing::debug!(address=%status.address, state=%status.state, "node status updated")
        }
        SyncState::Failed { error, .. } => tracing::debug!(kind=?error.kind(), "node status stale"),
    });

    let mut changes = store.changes();
    store.start();
    tracing::info!(
        %node_url,
        interval_ms = store.config().interval_ms,
        "watching node status"
    );

    let mut seen = 0usize;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
            next = changes.next() => {
                let Some(state) = next else { break };
                println!("{}", render(&state, Utc::now()));
                if !state.is_pending() {
                    seen += 1;
                    if updates.is_some_and(|n| seen >= n) {
                        break;
                    }
                }
            }
        }
    }

    store.stop();
    Ok(())
}

async fn status(node_url: &str, config: SyncConfig, json: bool) -> Result<()> {
    let fetcher = HttpStatusFetcher::new(node_url, &config)?;
    let status = fetcher.fetch_once().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("{}", render(&SyncState::Ready(Arc::new(status)), Utc::now()));
    }
    Ok(())
}
