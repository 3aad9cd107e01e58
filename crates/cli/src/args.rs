//! Command-line arguments for the gateway binary.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "ontology-rosetta",
    version,
    about = "Rosetta API gateway for the Ontology blockchain"
)]
pub struct CliArgs {
    /// Path to the server config file
    #[arg(long = "server-config", value_name = "FILE", default_value = "./server-config.json")]
    pub server_config: PathBuf,

    /// Run the Rosetta server in offline mode
    #[arg(long = "offline")]
    pub offline: bool,

    /// Validate the indexed data in the server's internal data store
    #[arg(long = "validate-store")]
    pub validate_store: bool,

    /// JSON-RPC endpoint of the full node
    #[arg(long = "node-rpc", value_name = "URL", default_value = "http://127.0.0.1:20336")]
    pub node_rpc: String,

    /// Directory for the internal data store
    #[arg(long = "data-dir", value_name = "DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Network to serve
    #[arg(long = "network", value_enum, default_value = "mainnet")]
    pub network: Network,

    /// The log level filter
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Timeout in seconds for node RPC calls
    #[arg(long = "node-timeout", value_name = "SECONDS", default_value = "30")]
    pub node_timeout: u64,
}

/// The network name advertised over the API and used for the data
/// directory layout.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
    Privatenet,
}

impl Network {
    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Privatenet => "privatenet",
        }
    }
}
