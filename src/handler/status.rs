//! Service health and node information

use hyper::StatusCode;
use serde::Serialize;

use super::{ApiError, ApiResult};
use crate::config::AppState;
use crate::http;

#[derive(Serialize)]
struct Health {
    status: &'static str,
    message: &'static str,
    blockchain_connected: bool,
    contract_loaded: bool,
}

/// `GET /`
pub async fn health(state: &AppState) -> ApiResult {
    let (blockchain_connected, contract_loaded) = match &state.ledger {
        Some(ledger) => (ledger.is_connected().await, ledger.contract_loaded()),
        None => (false, false),
    };

    Ok(http::json_response(
        StatusCode::OK,
        &Health {
            status: "ok",
            message: "Certificate Verifier API is running",
            blockchain_connected,
            contract_loaded,
        },
    ))
}

/// `GET /api/blockchain/info`
///
/// Needs a node connection but not a loaded contract.
pub async fn blockchain_info(state: &AppState) -> ApiResult {
    let ledger = state.ledger.as_ref().ok_or(ApiError::NotInitialized)?;
    let info = ledger.chain_info().await?;
    Ok(http::json_response(StatusCode::OK, &info))
}
