//! Server configuration.

use clap::Parser;

/// Command-line configuration for the signaling server.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "swarmlink-server",
    about = "Rendezvous and signaling server for peer-assisted content delivery"
)]
pub struct ServerConfig {
    /// TCP port to listen on (loopback only).
    #[arg(long, default_value_t = 6503, env = "SWARMLINK_PORT")]
    pub port: u16,
}
