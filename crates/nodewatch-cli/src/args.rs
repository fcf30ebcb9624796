use clap::{Parser, Subcommand};

use nodewatch_sync::SyncConfig;

#[derive(Debug, Parser)]
#[command(name = "nodewatch")]
#[command(about = "Show the live status of a single node", long_about = None)]
pub struct Args {
    /// Base URL of the node's status reporting endpoint
    #[arg(
        long,
        env = "NODEWATCH_NODE_URL",
        default_value = "http://127.0.0.1:8088"
    )]
    pub node_url: String,

    /// Milliseconds between fetch attempts (default from NODEWATCH_INTERVAL_MS, else 3000)
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Milliseconds before a fetch attempt times out (default from NODEWATCH_TIMEOUT_MS, else 3000)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// OTLP endpoint for exporting traces
    #[arg(long, env = "NODEWATCH_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    #[arg(long, env = "NODEWATCH_OTLP_TOKEN")]
    pub otlp_token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll the node and redraw whenever its status changes
    Watch {
        /// Exit after this many status updates
        #[arg(long)]
        updates: Option<usize>,
    },
    /// Fetch the status once
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Args {
    /// Environment defaults, overridden by flags.
    pub fn sync_config(&self) -> SyncConfig {
        let mut config = SyncConfig::from_env();
        if let Some(interval_ms) = self.interval_ms {
            config = config.with_interval_ms(interval_ms);
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config = config.with_timeout_ms(timeout_ms);
        }
        config
    }
}
