//! Purpose: MCP stdio relay in front of the Bridge.
//! Exports: `client`, `handler`, `stdio`, `tools`, `RelayConfig`, `run`, `init_tracing`.
//! Role: Process B of the adapter pair; owns stdin/stdout, logs only to stderr.

pub mod client;
pub mod handler;
pub mod stdio;
pub mod tools;

use std::io;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::core::error::Error;
use crate::mcp::McpDispatcher;
use client::BridgeClient;
use handler::RelayHandler;
use stdio::SharedWriter;

#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub bridge_host: String,
    pub bridge_port: u16,
    pub skip_health_check: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bridge_host: client::DEFAULT_HOST.to_string(),
            bridge_port: crate::bridge::server::DEFAULT_PORT,
            skip_health_check: false,
        }
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

/// Serves MCP on this process's stdio until stdin closes.
pub fn run(config: &RelayConfig) -> Result<(), Error> {
    init_tracing();
    let client = BridgeClient::new(&config.bridge_host, config.bridge_port);
    if !config.skip_health_check {
        if client.is_available() {
            info!("bridge reachable at {}", client.base_url());
        } else {
            warn!(
                "bridge not reachable at {}; tool calls will fail until it starts",
                client.base_url()
            );
        }
    }

    let mut dispatcher = McpDispatcher::new(RelayHandler::new(client));
    let writer = SharedWriter::new(io::stdout());
    info!("relay serving MCP on stdio");
    stdio::serve(io::stdin().lock(), &writer, &mut dispatcher)?;
    info!("stdin closed, relay exiting");
    Ok(())
}
