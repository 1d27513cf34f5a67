//! Request handler module
//!
//! Responsible for request routing dispatch and the certificate API.

pub mod certificates;
pub mod proof;
pub mod router;
pub mod status;
pub mod upload;

use hyper::body::Bytes;
use hyper::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::http::{self, ApiResponse};
use crate::ledger::LedgerError;
use crate::logger;

// Re-export main entry point
pub use router::handle_request;

/// Request data after routing: the collected body and its media type
#[derive(Debug, Default)]
pub struct ApiRequest {
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl ApiRequest {
    pub fn new(content_type: Option<String>, body: Bytes) -> Self {
        Self { content_type, body }
    }

    /// Parse the body as JSON
    pub fn json(&self) -> Result<Value, ApiError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))
    }

    /// A non-empty string member of the JSON body
    pub fn json_str(&self, key: &str, missing: &str) -> Result<String, ApiError> {
        self.json()?
            .get(key)
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .map(ToString::to_string)
            .ok_or_else(|| ApiError::BadRequest(missing.to_string()))
    }
}

/// Handler failures, each mapped to one status code
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Blockchain not initialized")]
    NotInitialized,

    #[error("Failed to store certificate on blockchain")]
    StoreFailed,

    #[error("Failed to save file: {0}")]
    Storage(#[from] std::io::Error),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ApiError {
    pub fn bad_request(message: &str) -> Self {
        Self::BadRequest(message.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotInitialized | Self::StoreFailed | Self::Storage(_) | Self::Ledger(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn into_response(self) -> ApiResponse {
        match &self {
            Self::Storage(e) => logger::log_error(&format!("Upload storage failed: {e}")),
            Self::Ledger(e) => logger::log_error(&format!("Ledger call failed: {e}")),
            _ => {}
        }
        http::error_response(self.status(), &self.to_string())
    }
}

pub type ApiResult = Result<ApiResponse, ApiError>;
