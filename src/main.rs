//! RPC Gateway (v1)
//!
//! Serves a REST/JSON surface in front of a gRPC backend, plus a static
//! documentation listener.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                     RPC GATEWAY                       │
//!                      │                                                       │
//!   HTTP request       │  ┌─────────┐   ┌─────────┐   ┌──────────┐   ┌───────┐ │
//!   ───────────────────┼─▶│   net   │──▶│  http   │──▶│ routing  │──▶│ codec │ │
//!                      │  │listener │   │ server  │   │  rules   │   │decode │ │
//!                      │  └─────────┘   └─────────┘   └──────────┘   └───┬───┘ │
//!                      │                                                  ▼     │
//!   HTTP response      │  ┌─────────┐   ┌──────────┐               ┌────────┐ │
//!   ◀──────────────────┼──│  http   │◀──│  codec   │◀──────────────│upstream│◀┼──▶ gRPC
//!                      │  │response │   │  encode  │               │ channel│ │    backend
//!                      │  └─────────┘   └──────────┘               └────────┘ │
//!                      │                                                       │
//!   Docs request       │  ┌─────────┐   ┌──────────────────────────┐          │
//!   ───────────────────┼─▶│   net   │──▶│ http::assets (ServeDir)  │          │
//!                      │  └─────────┘   └──────────────────────────┘          │
//!                      │                                                       │
//!                      │  config · lifecycle · observability                   │
//!                      └──────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `rpc-gateway <upstream> <rest-addr> <docs-addr> [options]`

use clap::Parser;

use rpc_gateway::config::Cli;
use rpc_gateway::lifecycle::{self, signals, Shutdown};
use rpc_gateway::observability::logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init_logging("info");
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rpc-gateway starting");

    let shutdown = Shutdown::new();
    signals::install(shutdown.clone());

    if let Err(e) = lifecycle::run(config, shutdown).await {
        tracing::error!(error = %e, "Gateway terminated");
        std::process::exit(1);
    }
}
