// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    pub upload: UploadConfig,
    pub ledger: LedgerConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Minimum level written: debug, info, warn or error
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common or json)
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    #[serde(default)]
    pub max_connections: Option<u64>,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub enable_cors: bool,
    /// Upper bound on request bodies, uploads included
    pub max_body_size: u64,
}

/// Where and what may be uploaded
#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    pub dir: String,
    /// Lowercase extensions without the dot
    pub allowed_extensions: Vec<String>,
}

/// Blockchain node and registry contract
#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    pub rpc_url: String,
    /// Written by the deploy script: `{ address, abi, ... }`
    pub deployment_file: String,
    /// Bare ABI array; preferred over the deployment's embedded `abi`
    pub abi_file: String,
    /// Sending account; first `eth_accounts` entry when unset
    #[serde(default)]
    pub from_account: Option<String>,
    pub gas_limit: u64,
    pub rpc_timeout_secs: u64,
    pub receipt_poll_interval_ms: u64,
    pub receipt_timeout_secs: u64,
}
