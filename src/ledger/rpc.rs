//! Ethereum JSON-RPC client
//!
//! A thin JSON-RPC 2.0 client over a pooled hyper-util HTTP client. Only the
//! handful of `eth_*` methods the registry needs are wrapped; everything is
//! sent to a single node URL.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{header, Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{LedgerError, LedgerResult};

const WEI_PER_ETHER: f64 = 1e18;

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Transaction receipt as reported by the node
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReceipt {
    pub transaction_hash: String,
    #[serde(default)]
    pub block_number: Option<String>,
    pub gas_used: String,
    /// `0x1` success, `0x0` reverted; absent on pre-Byzantium nodes
    #[serde(default)]
    pub status: Option<String>,
}

pub struct RpcClient {
    url: Uri,
    client: Client<HttpConnector, Full<Bytes>>,
    next_id: AtomicU64,
    timeout: Duration,
}

impl RpcClient {
    pub fn new(url: &str, timeout: Duration) -> LedgerResult<Self> {
        let url = url
            .parse::<Uri>()
            .map_err(|e| LedgerError::Transport(format!("Invalid RPC URL '{url}': {e}")))?;

        Ok(Self {
            url,
            client: Client::builder(TokioExecutor::new()).build_http(),
            next_id: AtomicU64::new(1),
            timeout,
        })
    }

    /// Issue a call and deserialize its `result`
    pub async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> LedgerResult<T> {
        let result = self.request_value(method, params).await?;
        serde_json::from_value(result)
            .map_err(|e| LedgerError::InvalidResponse(format!("{method}: {e}")))
    }

    async fn request_value(&self, method: &str, params: Value) -> LedgerResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::to_vec(&RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        })
        .map_err(|e| LedgerError::Transport(format!("Failed to encode {method}: {e}")))?;

        let req = Request::builder()
            .method(Method::POST)
            .uri(self.url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        let exchange = async {
            let resp = self
                .client
                .request(req)
                .await
                .map_err(|e| LedgerError::Transport(format!("{method}: {e}")))?;
            let status = resp.status();
            let bytes = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| LedgerError::Transport(format!("{method}: {e}")))?
                .to_bytes();
            Ok::<_, LedgerError>((status, bytes))
        };

        let (status, bytes) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                LedgerError::Transport(format!(
                    "{method} timed out after {}s",
                    self.timeout.as_secs()
                ))
            })??;

        let parsed: RpcResponse = serde_json::from_slice(&bytes).map_err(|e| {
            if status.is_success() {
                LedgerError::InvalidResponse(format!("{method}: {e}"))
            } else {
                LedgerError::Transport(format!("{method}: HTTP {status}"))
            }
        })?;

        if let Some(err) = parsed.error {
            return Err(LedgerError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(parsed.result.unwrap_or(Value::Null))
    }

    pub async fn client_version(&self) -> LedgerResult<String> {
        self.request("web3_clientVersion", json!([])).await
    }

    pub async fn chain_id(&self) -> LedgerResult<u64> {
        let quantity: String = self.request("eth_chainId", json!([])).await?;
        parse_quantity_u64(&quantity)
    }

    pub async fn block_number(&self) -> LedgerResult<u64> {
        let quantity: String = self.request("eth_blockNumber", json!([])).await?;
        parse_quantity_u64(&quantity)
    }

    pub async fn accounts(&self) -> LedgerResult<Vec<String>> {
        self.request("eth_accounts", json!([])).await
    }

    /// Balance in wei at the latest block
    pub async fn balance(&self, account: &str) -> LedgerResult<u128> {
        let quantity: String = self
            .request("eth_getBalance", json!([account, "latest"]))
            .await?;
        parse_quantity_u128(&quantity)
    }

    /// Read-only contract call against the latest block
    pub async fn call(&self, from: &str, to: &str, data: &[u8]) -> LedgerResult<Vec<u8>> {
        let output: String = self
            .request(
                "eth_call",
                json!([{ "from": from, "to": to, "data": encode_data(data) }, "latest"]),
            )
            .await?;
        decode_data(&output)
    }

    /// Submit a transaction signed by the node's unlocked `from` account
    pub async fn send_transaction(
        &self,
        from: &str,
        to: &str,
        data: &[u8],
        gas: u64,
    ) -> LedgerResult<String> {
        self.request(
            "eth_sendTransaction",
            json!([{
                "from": from,
                "to": to,
                "gas": encode_quantity(gas),
                "data": encode_data(data),
            }]),
        )
        .await
    }

    pub async fn transaction_receipt(&self, tx_hash: &str) -> LedgerResult<Option<RawReceipt>> {
        self.request("eth_getTransactionReceipt", json!([tx_hash]))
            .await
    }

    /// Poll until the transaction is mined or `timeout` elapses
    pub async fn wait_for_receipt(
        &self,
        tx_hash: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> LedgerResult<RawReceipt> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(receipt) = self.transaction_receipt(tx_hash).await? {
                return Ok(receipt);
            }
            if tokio::time::Instant::now() + poll_interval > deadline {
                return Err(LedgerError::ReceiptTimeout(tx_hash.to_string()));
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

pub fn parse_quantity_u64(quantity: &str) -> LedgerResult<u64> {
    u64::from_str_radix(quantity_digits(quantity)?, 16)
        .map_err(|e| LedgerError::InvalidResponse(format!("bad quantity '{quantity}': {e}")))
}

pub fn parse_quantity_u128(quantity: &str) -> LedgerResult<u128> {
    u128::from_str_radix(quantity_digits(quantity)?, 16)
        .map_err(|e| LedgerError::InvalidResponse(format!("bad quantity '{quantity}': {e}")))
}

fn quantity_digits(quantity: &str) -> LedgerResult<&str> {
    match quantity.strip_prefix("0x") {
        Some(digits) if !digits.is_empty() => Ok(digits),
        _ => Err(LedgerError::InvalidResponse(format!(
            "bad quantity '{quantity}'"
        ))),
    }
}

pub fn encode_quantity(value: u64) -> String {
    format!("{value:#x}")
}

pub fn encode_data(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

pub fn decode_data(data: &str) -> LedgerResult<Vec<u8>> {
    let digits = data.strip_prefix("0x").unwrap_or(data);
    hex::decode(digits).map_err(|e| LedgerError::InvalidResponse(format!("bad data '{data}': {e}")))
}

#[allow(clippy::cast_precision_loss)]
pub fn wei_to_ether(wei: u128) -> f64 {
    wei as f64 / WEI_PER_ETHER
}
