//! Test doubles shared across module tests

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use crate::ledger::{
    CertificateMatch, CertificateRecord, CertificateSummary, ChainInfo, Ledger, LedgerError,
    LedgerResult, NewCertificate, TxReceipt,
};

pub const ISSUER: &str = "0x627306090abaB3A6e1400e9345bC60c78a8BEf57";

/// Start a JSON-RPC node stub on an ephemeral port and return its URL
///
/// `handler` gets the method name and params and returns either a result or
/// a `(code, message)` error object.
pub async fn spawn_mock_node<F>(handler: F) -> String
where
    F: Fn(&str, &Value) -> Result<Value, (i64, String)> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let handler = Arc::clone(&handler);
                    async move {
                        let body = req
                            .into_body()
                            .collect()
                            .await
                            .map(|c| c.to_bytes())
                            .unwrap_or_default();
                        let call: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
                        let method = call["method"].as_str().unwrap_or_default();
                        let reply = match handler(method, &call["params"]) {
                            Ok(result) => json!({ "jsonrpc": "2.0", "id": call["id"], "result": result }),
                            Err((code, message)) => json!({
                                "jsonrpc": "2.0",
                                "id": call["id"],
                                "error": { "code": code, "message": message }
                            }),
                        };
                        Ok::<_, Infallible>(Response::new(Full::new(Bytes::from(reply.to_string()))))
                    }
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    format!("http://{addr}")
}

/// In-memory registry with the contract's id uniqueness rule
pub struct MemoryLedger {
    contract_loaded: bool,
    failing: bool,
    certificates: Mutex<Vec<NewCertificate>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            contract_loaded: true,
            failing: false,
            certificates: Mutex::new(Vec::new()),
        }
    }

    pub fn without_contract() -> Self {
        Self {
            contract_loaded: false,
            ..Self::new()
        }
    }

    /// Every call fails as if the node were unreachable
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new()
        }
    }

    pub fn with_certificate(self, cert: NewCertificate) -> Self {
        self.certificates.lock().unwrap().push(cert);
        self
    }

    pub fn stored(&self) -> Vec<NewCertificate> {
        self.certificates.lock().unwrap().clone()
    }

    fn check(&self) -> LedgerResult<()> {
        if self.failing {
            return Err(LedgerError::Transport("connection refused".to_string()));
        }
        if !self.contract_loaded {
            return Err(LedgerError::ContractNotLoaded);
        }
        Ok(())
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn is_connected(&self) -> bool {
        !self.failing
    }

    fn contract_loaded(&self) -> bool {
        self.contract_loaded
    }

    async fn chain_info(&self) -> LedgerResult<ChainInfo> {
        if self.failing {
            return Err(LedgerError::Transport("connection refused".to_string()));
        }
        Ok(ChainInfo {
            connected: true,
            chain_id: 1337,
            latest_block: 7,
            accounts: vec![ISSUER.to_string()],
            default_account: ISSUER.to_string(),
            balance: 99.5,
        })
    }

    async fn certificate_exists(&self, id: &str) -> LedgerResult<bool> {
        self.check()?;
        Ok(self.certificates.lock().unwrap().iter().any(|c| c.id == id))
    }

    async fn store_certificate(&self, cert: &NewCertificate) -> LedgerResult<TxReceipt> {
        if self.certificate_exists(&cert.id).await? {
            return Err(LedgerError::AlreadyExists(cert.id.clone()));
        }
        let mut certificates = self.certificates.lock().unwrap();
        certificates.push(cert.clone());
        Ok(TxReceipt {
            transaction_hash: format!("0x{:064x}", certificates.len()),
            block_number: certificates.len() as u64,
            gas_used: 21_000,
        })
    }

    async fn verify_by_id(&self, id: &str) -> LedgerResult<Option<CertificateRecord>> {
        self.check()?;
        let certificates = self.certificates.lock().unwrap();
        Ok(certificates.iter().find(|c| c.id == id).map(|c| CertificateRecord {
            exists: true,
            certificate_hash: c.hash.clone(),
            holder_name: c.holder_name.clone(),
            certificate_type: c.certificate_type.clone(),
            institution: c.institution.clone(),
            issue_date: c.issue_date,
            timestamp: c.issue_date + 60,
            issuer: ISSUER.to_string(),
            verified: true,
        }))
    }

    async fn verify_by_hash(&self, hash: &str) -> LedgerResult<Option<CertificateMatch>> {
        self.check()?;
        let certificates = self.certificates.lock().unwrap();
        Ok(certificates.iter().find(|c| c.hash == hash).map(|c| CertificateMatch {
            exists: true,
            certificate_id: c.id.clone(),
            holder_name: c.holder_name.clone(),
            certificate_type: c.certificate_type.clone(),
            institution: c.institution.clone(),
            verified: true,
        }))
    }

    async fn list_certificates(&self) -> LedgerResult<Vec<CertificateSummary>> {
        self.check()?;
        let certificates = self.certificates.lock().unwrap();
        Ok(certificates
            .iter()
            .map(|c| CertificateSummary {
                certificate_id: c.id.clone(),
                holder_name: c.holder_name.clone(),
                certificate_type: c.certificate_type.clone(),
                institution: c.institution.clone(),
                issue_date: c.issue_date,
            })
            .collect())
    }
}
