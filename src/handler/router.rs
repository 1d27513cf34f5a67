//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: route matching, method
//! validation, body size limits, dispatch, and access logging.

use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::{Method, Request, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use super::{certificates, proof, status, ApiError, ApiRequest};
use crate::config::AppState;
use crate::http::{self, ApiResponse};
use crate::logger::{self, AccessLogEntry};

/// Routable API endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Health,
    BlockchainInfo,
    Upload,
    VerifyById,
    VerifyByHash,
    VerifyByFile,
    List,
    GenerateProof,
}

impl Endpoint {
    pub fn from_path(path: &str) -> Option<Self> {
        Some(match path {
            "/" => Self::Health,
            "/api/blockchain/info" => Self::BlockchainInfo,
            "/api/certificate/upload" => Self::Upload,
            "/api/certificate/verify/id" => Self::VerifyById,
            "/api/certificate/verify/hash" => Self::VerifyByHash,
            "/api/certificate/verify/file" => Self::VerifyByFile,
            "/api/certificates/list" => Self::List,
            "/api/zkp/generate" => Self::GenerateProof,
            _ => return None,
        })
    }

    pub fn method(self) -> Method {
        match self {
            Self::Health | Self::BlockchainInfo | Self::List => Method::GET,
            _ => Method::POST,
        }
    }

    fn allow(self) -> &'static str {
        if self.method() == Method::GET {
            "GET, OPTIONS"
        } else {
            "POST, OPTIONS"
        }
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<ApiResponse, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let mut entry = state.access_log_enabled().then(|| {
        let mut entry = AccessLogEntry::new(
            peer_addr.to_string(),
            req.method().to_string(),
            req.uri().path().to_string(),
        );
        entry.query = req.uri().query().map(ToString::to_string);
        entry.http_version = version_label(req.version()).to_string();
        let header = |name: hyper::header::HeaderName| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string)
        };
        entry.referer = header(hyper::header::REFERER);
        entry.user_agent = header(hyper::header::USER_AGENT);
        entry
    });

    let mut response = route(req, &state).await;
    http::response::finalize(
        &mut response,
        &state.config.http.server_name,
        state.config.http.enable_cors,
    );

    if let Some(entry) = entry.as_mut() {
        entry.status = response.status().as_u16();
        entry.body_bytes = response
            .body()
            .size_hint()
            .exact()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

async fn route<B>(req: Request<B>, state: &AppState) -> ApiResponse
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    // 1. Match the path
    let Some(endpoint) = Endpoint::from_path(req.uri().path()) else {
        return http::build_404_response();
    };

    // 2. Check HTTP method
    if req.method() == Method::OPTIONS {
        return http::build_options_response(endpoint.allow(), state.config.http.enable_cors);
    }
    if *req.method() != endpoint.method() {
        logger::log_warning(&format!(
            "Method not allowed: {} {}",
            req.method(),
            req.uri().path()
        ));
        return http::build_405_response(endpoint.allow());
    }

    // 3. Check body size
    let max_body_size = state.config.http.max_body_size;
    if let Some(resp) = check_body_size(&req, max_body_size) {
        return resp;
    }

    let content_type = req
        .headers()
        .get(hyper::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    // 4. Collect the body, capped while streaming
    let body = if endpoint.method() == Method::POST {
        match read_body(req.into_body(), max_body_size).await {
            Ok(body) => body,
            Err(resp) => return resp,
        }
    } else {
        Bytes::new()
    };

    dispatch(endpoint, state, ApiRequest::new(content_type, body))
        .await
        .unwrap_or_else(ApiError::into_response)
}

/// Run the handler behind an endpoint
pub async fn dispatch(endpoint: Endpoint, state: &AppState, req: ApiRequest) -> super::ApiResult {
    match endpoint {
        Endpoint::Health => status::health(state).await,
        Endpoint::BlockchainInfo => status::blockchain_info(state).await,
        Endpoint::Upload => certificates::upload(state, req).await,
        Endpoint::VerifyById => certificates::verify_by_id(state, &req).await,
        Endpoint::VerifyByHash => certificates::verify_by_hash(state, &req).await,
        Endpoint::VerifyByFile => certificates::verify_by_file(state, req).await,
        Endpoint::List => certificates::list(state).await,
        Endpoint::GenerateProof => proof::generate(&req),
    }
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size<B>(req: &Request<B>, max_body_size: u64) -> Option<ApiResponse> {
    let content_length = req.headers().get("content-length")?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_warning(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', relying on streaming limit"
                ));
                None
            }
            _ => None,
        },
    )
}

async fn read_body<B>(body: B, max_body_size: u64) -> Result<Bytes, ApiResponse>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            logger::log_warning(&format!("Request body exceeded {max_body_size} bytes"));
            Err(http::build_413_response())
        }
        Err(e) => {
            logger::log_warning(&format!("Failed to read request body: {e}"));
            Err(http::error_response(
                StatusCode::BAD_REQUEST,
                "Failed to read request body",
            ))
        }
    }
}

fn version_label(version: hyper::Version) -> &'static str {
    match version {
        hyper::Version::HTTP_10 => "1.0",
        hyper::Version::HTTP_2 => "2",
        _ => "1.1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest;
    use crate::handler::test_support::{read_json, state_with};
    use crate::http::multipart::encode_form;
    use crate::ledger::{Ledger, NewCertificate};
    use crate::testing::MemoryLedger;
    use http_body_util::Full;
    use hyper::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE};

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn request(method: Method, path: &str, body: Bytes) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Full::new(body))
            .unwrap()
    }

    fn app(ledger: Option<Arc<dyn Ledger>>, tag: &str) -> Arc<AppState> {
        let mut state = state_with(ledger, tag);
        state.config.logging.access_log = false;
        Arc::new(AppState::new(state.config, state.ledger))
    }

    async fn send(state: &Arc<AppState>, req: Request<Full<Bytes>>) -> ApiResponse {
        handle_request(req, Arc::clone(state), peer()).await.unwrap()
    }

    #[test]
    fn test_endpoint_table() {
        assert_eq!(Endpoint::from_path("/"), Some(Endpoint::Health));
        assert_eq!(
            Endpoint::from_path("/api/certificate/verify/file"),
            Some(Endpoint::VerifyByFile)
        );
        assert_eq!(Endpoint::from_path("/api/certificate/verify"), None);
        assert_eq!(Endpoint::from_path("/api/certificates/list/"), None);
        assert_eq!(Endpoint::List.method(), Method::GET);
        assert_eq!(Endpoint::GenerateProof.method(), Method::POST);
    }

    #[tokio::test]
    async fn test_health_has_cors() {
        let state = app(None, "router-health");
        let response = send(&state, request(Method::GET, "/", Bytes::new())).await;
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let (status, body) = read_json(response).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_not_found_and_wrong_method() {
        let state = app(None, "router-404");
        let (status, body) = read_json(send(&state, request(Method::GET, "/nope", Bytes::new())).await).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not Found");

        let response = send(&state, request(Method::GET, "/api/zkp/generate", Bytes::new())).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()["Allow"], "POST, OPTIONS");
    }

    #[tokio::test]
    async fn test_preflight() {
        let state = app(None, "router-options");
        let response = send(
            &state,
            request(Method::OPTIONS, "/api/certificate/upload", Bytes::new()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(response.headers()["Access-Control-Allow-Methods"], "POST, OPTIONS");
    }

    #[tokio::test]
    async fn test_cors_disabled() {
        let mut state = state_with(None, "router-nocors");
        state.config.http.enable_cors = false;
        let state = Arc::new(state);
        let response = send(&state, request(Method::GET, "/", Bytes::new())).await;
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn test_body_limits() {
        let mut state = state_with(None, "router-limit");
        state.config.http.max_body_size = 16;
        let state = Arc::new(state);

        let mut req = request(Method::POST, "/api/zkp/generate", Bytes::new());
        req.headers_mut().insert("content-length", "1024".parse().unwrap());
        assert_eq!(send(&state, req).await.status(), StatusCode::PAYLOAD_TOO_LARGE);

        // No Content-Length: caught while collecting
        let big = Bytes::from(format!(r#"{{"certificateId":"{}"}}"#, "x".repeat(64)));
        let response = send(&state, request(Method::POST, "/api/zkp/generate", big)).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_proof_without_ledger() {
        let state = app(None, "router-proof");
        let body = Bytes::from_static(br#"{"certificateId":"CERT-9"}"#);
        let (status, body) = read_json(send(&state, request(Method::POST, "/api/zkp/generate", body)).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["zkProof"]["proof"], digest::mock_proof("CERT-9"));
    }

    #[tokio::test]
    async fn test_upload_then_verify_file() {
        let ledger: Arc<dyn Ledger> = Arc::new(MemoryLedger::new());
        let state = app(Some(ledger), "router-flow");
        let document: &[u8] = b"\x89PNG certificate scan";

        let (content_type, body) = encode_form(
            &[
                ("certificateId", "CERT-42"),
                ("holderName", "Grace Hopper"),
                ("certificateType", "Award"),
                ("issueDate", "2023-06-01T09:00:00Z"),
            ],
            Some(("scan.png", document)),
        );
        let mut req = request(Method::POST, "/api/certificate/upload", body);
        req.headers_mut().insert(CONTENT_TYPE, content_type.parse().unwrap());
        let (status, stored) = read_json(send(&state, req).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stored["certificateHash"], digest::sha256_hex(document));

        let (content_type, body) = encode_form(&[], Some(("again.png", document)));
        let mut req = request(Method::POST, "/api/certificate/verify/file", body);
        req.headers_mut().insert(CONTENT_TYPE, content_type.parse().unwrap());
        let (status, verified) = read_json(send(&state, req).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(verified["verified"], true);
        assert_eq!(verified["certificate"]["certificateId"], "CERT-42");
        assert_eq!(verified["certificate"]["institution"], "Unknown Institution");

        let (_, listing) = read_json(
            send(&state, request(Method::GET, "/api/certificates/list", Bytes::new())).await,
        )
        .await;
        assert_eq!(listing["count"], 1);
        std::fs::remove_dir_all(&state.config.upload.dir).ok();
    }

    #[tokio::test]
    async fn test_dispatch_direct() {
        let ledger = MemoryLedger::new().with_certificate(NewCertificate {
            id: "CERT-1".to_string(),
            hash: digest::sha256_hex(b"doc"),
            holder_name: "A".to_string(),
            certificate_type: "B".to_string(),
            institution: "C".to_string(),
            issue_date: 1,
        });
        let state = state_with(Some(Arc::new(ledger)), "router-dispatch");
        let response = dispatch(Endpoint::List, &state, ApiRequest::default()).await.unwrap();
        let (_, body) = read_json(response).await;
        assert_eq!(body["count"], 1);
    }
}
