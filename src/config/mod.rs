// Configuration module entry point
// Loads layered configuration and holds runtime state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{
    Config, HttpConfig, LedgerConfig, LoggingConfig, PerformanceConfig, ServerConfig,
    UploadConfig,
};

impl Config {
    /// Load configuration from specified file path (without extension)
    ///
    /// Defaults, then the optional file, then `CERTIFY_`-prefixed environment
    /// variables with `__` between nested keys (e.g. `CERTIFY_LEDGER__RPC_URL`).
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 5000)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            // Uploads block on transaction receipts
            .set_default("performance.write_timeout", 150)?
            .set_default("http.server_name", "certify-gateway/0.1")?
            .set_default("http.enable_cors", true)?
            .set_default("http.max_body_size", 10_485_760)? // 10MB
            .set_default("upload.dir", "uploads")?
            .set_default("upload.allowed_extensions", vec!["pdf", "png", "jpg", "jpeg"])?
            .set_default("ledger.rpc_url", "http://127.0.0.1:7545")?
            .set_default("ledger.deployment_file", "deployments/CertificateVerifier.json")?
            .set_default("ledger.abi_file", "deployments/contract_abi.json")?
            .set_default("ledger.gas_limit", 500_000)?
            .set_default("ledger.rpc_timeout_secs", 10)?
            .set_default("ledger.receipt_poll_interval_ms", 100)?
            .set_default("ledger.receipt_timeout_secs", 120)?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("CERTIFY")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        settings.try_deserialize()
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}
