//! Certificate gateway
//!
//! HTTP API that hashes uploaded certificate documents and registers or
//! verifies them against a certificate registry contract on an Ethereum
//! node.

use clap::Parser;
use std::sync::Arc;
use tokio::sync::Notify;

mod config;
mod digest;
mod handler;
mod http;
mod ledger;
mod logger;
mod server;
#[cfg(test)]
mod testing;

use ledger::{ContractLedger, Ledger};

#[derive(Parser)]
#[command(name = "certify-gateway")]
#[command(version)]
#[command(about = "Certificate hashing and verification API backed by an Ethereum registry")]
struct Cli {
    /// Configuration file, with or without the .toml extension
    #[arg(short, long, default_value = "config")]
    config: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let cfg = config::Config::load_from(&cli.config)?;
    logger::init(&cfg)?;

    // Worker threads follow the config, else one per core
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.socket_addr()?;
    let listener = server::create_reusable_listener(addr)?;

    let ledger: Option<Arc<dyn Ledger>> = match ContractLedger::connect(&cfg.ledger).await {
        Ok(ledger) => Some(Arc::new(ledger)),
        Err(e) => {
            logger::log_error(&format!("Blockchain initialization failed: {e}"));
            logger::log_warning("Starting without a blockchain connection");
            None
        }
    };

    logger::log_server_start(&addr, &cfg);

    let state = Arc::new(config::AppState::new(cfg, ledger));
    let shutdown = Arc::new(Notify::new());
    server::start_signal_handler(Arc::clone(&shutdown))?;

    // Use LocalSet for spawn_local support
    let local = tokio::task::LocalSet::new();
    local
        .run_until(server::run_server_loop(listener, state, shutdown))
        .await
}
