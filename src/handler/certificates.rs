//! Certificate registration, verification and listing

use hyper::StatusCode;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use super::upload::{allowed_file, parse_issue_date, save_upload, secure_filename};
use super::{ApiError, ApiRequest, ApiResult};
use crate::config::AppState;
use crate::digest;
use crate::http::multipart::{self, UploadForm, UploadedFile};
use crate::http::{self, ApiResponse};
use crate::ledger::{Ledger, NewCertificate};
use crate::logger;

const DEFAULT_INSTITUTION: &str = "Unknown Institution";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredResponse {
    success: bool,
    message: &'static str,
    certificate_id: String,
    certificate_hash: String,
    transaction_hash: String,
    block_number: u64,
    gas_used: u64,
}

fn registry(state: &AppState) -> Result<&Arc<dyn Ledger>, ApiError> {
    state.registry().ok_or(ApiError::NotInitialized)
}

/// Parse the form and take its non-empty file part
async fn read_file_form(req: ApiRequest) -> Result<(UploadForm, UploadedFile), ApiError> {
    let mut form = match multipart::parse_form(req.content_type.as_deref(), req.body).await {
        Ok(form) => form,
        Err(e) => {
            logger::log_debug(&format!("Rejected form body: {e}"));
            return Err(ApiError::bad_request("No file provided"));
        }
    };
    let file = form
        .file
        .take()
        .ok_or_else(|| ApiError::bad_request("No file provided"))?;
    if file.filename.is_empty() {
        return Err(ApiError::bad_request("No file selected"));
    }
    Ok((form, file))
}

fn verified(message: &str, certificate: &impl Serialize) -> ApiResponse {
    http::json_response(
        StatusCode::OK,
        &json!({ "verified": true, "message": message, "certificate": certificate }),
    )
}

fn not_verified(message: &str) -> ApiResponse {
    http::json_response(StatusCode::OK, &json!({ "verified": false, "message": message }))
}

/// `POST /api/certificate/upload`
pub async fn upload(state: &AppState, req: ApiRequest) -> ApiResult {
    let ledger = registry(state)?;
    let (form, file) = read_file_form(req).await?;

    if !allowed_file(&file.filename, &state.config.upload.allowed_extensions) {
        return Err(ApiError::bad_request("File type not allowed"));
    }

    let (Some(id), Some(holder_name), Some(certificate_type), Some(issue_date)) = (
        form.field("certificateId"),
        form.field("holderName"),
        form.field("certificateType"),
        form.field("issueDate"),
    ) else {
        return Err(ApiError::bad_request("Missing required fields"));
    };
    let institution = form
        .fields
        .get("institution")
        .map_or(DEFAULT_INSTITUTION, String::as_str);

    let issue_date =
        parse_issue_date(issue_date).ok_or_else(|| ApiError::bad_request("Invalid date format"))?;

    let hash = digest::sha256_hex(&file.data);

    // A taken id must not touch the archive on disk
    let taken = ledger.certificate_exists(id).await.map_err(|e| {
        logger::log_error(&format!("Error checking certificate {id}: {e}"));
        ApiError::StoreFailed
    })?;
    if taken {
        logger::log_error(&format!("Certificate {id} already exists"));
        return Err(ApiError::StoreFailed);
    }

    let stored_name = secure_filename(&format!("{id}_{}", file.filename));
    if stored_name.is_empty() {
        return Err(ApiError::bad_request("Invalid file name"));
    }
    let path = save_upload(&state.config.upload.dir, &stored_name, &file.data).await?;
    logger::log_debug(&format!("Saved upload to {}", path.display()));

    let cert = NewCertificate {
        id: id.to_string(),
        hash,
        holder_name: holder_name.to_string(),
        certificate_type: certificate_type.to_string(),
        institution: institution.to_string(),
        issue_date,
    };

    let receipt = ledger.store_certificate(&cert).await.map_err(|e| {
        logger::log_error(&format!("Error storing certificate {}: {e}", cert.id));
        ApiError::StoreFailed
    })?;

    Ok(http::json_response(
        StatusCode::OK,
        &StoredResponse {
            success: true,
            message: "Certificate stored successfully",
            certificate_id: cert.id,
            certificate_hash: cert.hash,
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
        },
    ))
}

/// `POST /api/certificate/verify/id`
pub async fn verify_by_id(state: &AppState, req: &ApiRequest) -> ApiResult {
    let ledger = registry(state)?;
    let id = req.json_str("certificateId", "Certificate ID is required")?;

    Ok(match ledger.verify_by_id(&id).await? {
        Some(record) => verified("Certificate verified successfully", &record),
        None => not_verified("Certificate not found"),
    })
}

/// `POST /api/certificate/verify/hash`
pub async fn verify_by_hash(state: &AppState, req: &ApiRequest) -> ApiResult {
    let ledger = registry(state)?;
    let hash = req.json_str("certificateHash", "Certificate hash is required")?;

    Ok(match ledger.verify_by_hash(&hash).await? {
        Some(found) => verified("Certificate verified successfully", &found),
        None => not_verified("Certificate not found"),
    })
}

/// `POST /api/certificate/verify/file`
///
/// Hashes the uploaded document and looks the digest up on the ledger.
pub async fn verify_by_file(state: &AppState, req: ApiRequest) -> ApiResult {
    let ledger = registry(state)?;
    let (_, file) = read_file_form(req).await?;
    let hash = digest::sha256_hex(&file.data);

    Ok(match ledger.verify_by_hash(&hash).await? {
        Some(found) => http::json_response(
            StatusCode::OK,
            &json!({
                "verified": true,
                "message": "Certificate is authentic and unmodified",
                "certificate": found,
                "certificateHash": hash,
            }),
        ),
        None => not_verified("Certificate not found or has been tampered with"),
    })
}

/// `GET /api/certificates/list`
pub async fn list(state: &AppState) -> ApiResult {
    let ledger = registry(state)?;
    let certificates = ledger.list_certificates().await?;

    Ok(http::json_response(
        StatusCode::OK,
        &json!({ "count": certificates.len(), "certificates": certificates }),
    ))
}
