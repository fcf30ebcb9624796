use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "nodewatch-agent", version, about = "Serve this node's status for nodewatch")]
pub struct Args {
    #[arg(long, env = "NODEWATCH_AGENT_ADDR", default_value = "0.0.0.0:8088")]
    pub listen_addr: String,

    /// Address advertised in the status report.
    #[arg(long, env = "NODEWATCH_AGENT_ADVERTISE", default_value = "127.0.0.1")]
    pub address: String,

    /// Display name of this node.
    #[arg(long, env = "NODEWATCH_NODE_NAME")]
    pub node_name: Option<String>,

    /// Lifecycle tag reported until changed through `PUT /api/state`.
    #[arg(long, default_value = "healthy")]
    pub state: String,

    /// OTLP endpoint for exporting traces.
    #[arg(long, env = "NODEWATCH_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    #[arg(long, env = "NODEWATCH_OTLP_TOKEN")]
    pub otlp_token: Option<String>,
}
