//! Ledger module
//!
//! The certificate registry lives in an external smart contract. This module
//! defines the operations the HTTP layer needs from it (`Ledger`), the views
//! it returns, and the JSON-RPC backed implementation.

pub mod abi;
pub mod contract;
pub mod deployment;
pub mod rpc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use contract::ContractLedger;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("ABI error: {0}")]
    Abi(#[from] abi::AbiError),

    #[error("Contract not loaded")]
    ContractNotLoaded,

    #[error("Certificate with ID {0} already exists on blockchain")]
    AlreadyExists(String),

    #[error("Transaction {0} reverted")]
    Reverted(String),

    #[error("Timed out waiting for receipt of transaction {0}")]
    ReceiptTimeout(String),

    #[error("Invalid node response: {0}")]
    InvalidResponse(String),

    #[error("Deployment error: {0}")]
    Deployment(String),
}

/// General node and account information
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    pub connected: bool,
    pub chain_id: u64,
    pub latest_block: u64,
    pub accounts: Vec<String>,
    pub default_account: String,
    /// Default account balance in ether
    pub balance: f64,
}

/// Full record returned by an id lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRecord {
    pub exists: bool,
    pub certificate_hash: String,
    pub holder_name: String,
    pub certificate_type: String,
    pub institution: String,
    pub issue_date: u64,
    pub timestamp: u64,
    pub issuer: String,
    pub verified: bool,
}

/// Record returned by a content-hash lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateMatch {
    pub exists: bool,
    pub certificate_id: String,
    pub holder_name: String,
    pub certificate_type: String,
    pub institution: String,
    pub verified: bool,
}

/// Row of the certificate listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSummary {
    pub certificate_id: String,
    pub holder_name: String,
    pub certificate_type: String,
    pub institution: String,
    pub issue_date: u64,
}

/// Arguments of a registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCertificate {
    pub id: String,
    pub hash: String,
    pub holder_name: String,
    pub certificate_type: String,
    pub institution: String,
    /// Unix timestamp, seconds
    pub issue_date: u64,
}

/// Mined transaction summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub transaction_hash: String,
    pub block_number: u64,
    pub gas_used: u64,
}

/// Operations on the certificate registry
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Whether the node answers at all
    async fn is_connected(&self) -> bool;

    /// Whether a contract address and ABI were loaded
    fn contract_loaded(&self) -> bool;

    async fn chain_info(&self) -> LedgerResult<ChainInfo>;

    async fn certificate_exists(&self, id: &str) -> LedgerResult<bool>;

    /// Register a certificate and wait until the transaction is mined
    ///
    /// Fails with `AlreadyExists` without sending anything if the id is taken.
    async fn store_certificate(&self, cert: &NewCertificate) -> LedgerResult<TxReceipt>;

    /// `None` when the contract reports no such id
    async fn verify_by_id(&self, id: &str) -> LedgerResult<Option<CertificateRecord>>;

    /// `None` when the contract reports no such hash
    async fn verify_by_hash(&self, hash: &str) -> LedgerResult<Option<CertificateMatch>>;

    /// All certificates in registration order
    async fn list_certificates(&self) -> LedgerResult<Vec<CertificateSummary>>;
}
