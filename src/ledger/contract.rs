//! Registry contract reached through a JSON-RPC node
//!
//! Reads go through `eth_call`. Registrations are sent with
//! `eth_sendTransaction` from an account the node holds unlocked (a local
//! development chain such as Ganache or Hardhat), then the receipt is polled.

use async_trait::async_trait;
use std::time::Duration;

use super::abi::{self, to_checksum_address, Token};
use super::deployment::{self, DeployedContract};
use super::rpc::{self, RpcClient};
use super::{
    CertificateMatch, CertificateRecord, CertificateSummary, ChainInfo, Ledger, LedgerError,
    LedgerResult, NewCertificate, TxReceipt,
};
use crate::config::LedgerConfig;
use crate::logger;

/// Transaction submission settings
#[derive(Debug, Clone, Copy)]
pub struct TxSettings {
    pub gas_limit: u64,
    pub poll_interval: Duration,
    pub receipt_timeout: Duration,
}

impl From<&LedgerConfig> for TxSettings {
    fn from(cfg: &LedgerConfig) -> Self {
        Self {
            gas_limit: cfg.gas_limit,
            poll_interval: Duration::from_millis(cfg.receipt_poll_interval_ms),
            receipt_timeout: Duration::from_secs(cfg.receipt_timeout_secs),
        }
    }
}

pub struct ContractLedger {
    rpc: RpcClient,
    account: String,
    contract: Option<DeployedContract>,
    tx: TxSettings,
}

impl ContractLedger {
    pub fn new(
        rpc: RpcClient,
        account: String,
        contract: Option<DeployedContract>,
        tx: TxSettings,
    ) -> Self {
        Self {
            rpc,
            account,
            contract,
            tx,
        }
    }

    /// Connect to the node, pick the sending account and load the deployment
    ///
    /// Failing to load the deployment is logged, not fatal: the ledger then
    /// answers chain queries but reports the contract as not loaded.
    pub async fn connect(cfg: &LedgerConfig) -> LedgerResult<Self> {
        let rpc = RpcClient::new(&cfg.rpc_url, Duration::from_secs(cfg.rpc_timeout_secs))?;

        let version = rpc.client_version().await.map_err(|e| {
            LedgerError::Transport(format!("Failed to connect to node at {}: {e}", cfg.rpc_url))
        })?;
        let chain_id = rpc.chain_id().await?;
        let latest_block = rpc.block_number().await?;
        logger::log_info(&format!(
            "[Ledger] Connected to {version} at {} (chain id {chain_id}, latest block {latest_block})",
            cfg.rpc_url
        ));

        let account = match &cfg.from_account {
            Some(configured) => to_checksum_address(&abi::parse_address(configured)?),
            None => rpc.accounts().await?.into_iter().next().ok_or_else(|| {
                LedgerError::InvalidResponse("node exposes no unlocked accounts".to_string())
            })?,
        };
        logger::log_info(&format!("[Ledger] Sending transactions from {account}"));

        let contract = match deployment::load(cfg) {
            Ok(Some(contract)) => {
                logger::log_info(&format!(
                    "[Ledger] Contract loaded at address: {} (network: {})",
                    contract.address,
                    contract.network.as_deref().unwrap_or("unknown")
                ));
                Some(contract)
            }
            Ok(None) => {
                logger::log_warning(&format!(
                    "Contract not deployed yet ({} not found)",
                    cfg.deployment_file
                ));
                None
            }
            Err(e) => {
                logger::log_error(&format!("Error loading contract: {e}"));
                None
            }
        };

        Ok(Self::new(rpc, account, contract, TxSettings::from(cfg)))
    }

    fn contract(&self) -> LedgerResult<&DeployedContract> {
        self.contract.as_ref().ok_or(LedgerError::ContractNotLoaded)
    }

    /// `eth_call` a registry function and decode its outputs
    async fn call(&self, name: &str, args: &[Token]) -> LedgerResult<std::vec::IntoIter<Token>> {
        let contract = self.contract()?;
        let function = contract.abi.function(name)?;
        let data = abi::encode_call(&function.signature(), args);
        let output = self.rpc.call(&self.account, &contract.address, &data).await?;
        Ok(abi::decode(&function.outputs, &output)?.into_iter())
    }
}

fn next_token(tokens: &mut std::vec::IntoIter<Token>) -> LedgerResult<Token> {
    tokens
        .next()
        .ok_or_else(|| LedgerError::InvalidResponse("missing return value".to_string()))
}

fn next_string(tokens: &mut std::vec::IntoIter<Token>) -> LedgerResult<String> {
    Ok(next_token(tokens)?.into_string()?)
}

fn next_u64(tokens: &mut std::vec::IntoIter<Token>) -> LedgerResult<u64> {
    Ok(next_token(tokens)?.as_u64()?)
}

fn next_bool(tokens: &mut std::vec::IntoIter<Token>) -> LedgerResult<bool> {
    Ok(next_token(tokens)?.as_bool()?)
}

#[async_trait]
impl Ledger for ContractLedger {
    async fn is_connected(&self) -> bool {
        self.rpc.client_version().await.is_ok()
    }

    fn contract_loaded(&self) -> bool {
        self.contract.is_some()
    }

    async fn chain_info(&self) -> LedgerResult<ChainInfo> {
        let wei = self.rpc.balance(&self.account).await?;
        Ok(ChainInfo {
            connected: self.is_connected().await,
            chain_id: self.rpc.chain_id().await?,
            latest_block: self.rpc.block_number().await?,
            accounts: self.rpc.accounts().await?,
            default_account: self.account.clone(),
            balance: rpc::wei_to_ether(wei),
        })
    }

    async fn certificate_exists(&self, id: &str) -> LedgerResult<bool> {
        let mut out = self
            .call("certificateExists", &[Token::String(id.to_string())])
            .await?;
        next_bool(&mut out)
    }

    async fn store_certificate(&self, cert: &NewCertificate) -> LedgerResult<TxReceipt> {
        if self.certificate_exists(&cert.id).await? {
            return Err(LedgerError::AlreadyExists(cert.id.clone()));
        }

        let contract = self.contract()?;
        let function = contract.abi.function("storeCertificate")?;
        let data = abi::encode_call(
            &function.signature(),
            &[
                Token::String(cert.id.clone()),
                Token::String(cert.hash.clone()),
                Token::String(cert.holder_name.clone()),
                Token::String(cert.certificate_type.clone()),
                Token::String(cert.institution.clone()),
                Token::Uint(u128::from(cert.issue_date)),
            ],
        );

        logger::log_info(&format!("[Ledger] Storing certificate {} on blockchain...", cert.id));
        let tx_hash = self
            .rpc
            .send_transaction(&self.account, &contract.address, &data, self.tx.gas_limit)
            .await?;
        let receipt = self
            .rpc
            .wait_for_receipt(&tx_hash, self.tx.poll_interval, self.tx.receipt_timeout)
            .await?;

        if receipt.status.as_deref() == Some("0x0") {
            return Err(LedgerError::Reverted(tx_hash));
        }

        let block_number = receipt
            .block_number
            .as_deref()
            .ok_or_else(|| LedgerError::InvalidResponse("receipt without block number".to_string()))
            .and_then(rpc::parse_quantity_u64)?;
        let receipt = TxReceipt {
            transaction_hash: receipt.transaction_hash,
            block_number,
            gas_used: rpc::parse_quantity_u64(&receipt.gas_used)?,
        };

        logger::log_info(&format!(
            "[Ledger] Certificate {} stored: tx {} in block {} ({} gas)",
            cert.id, receipt.transaction_hash, receipt.block_number, receipt.gas_used
        ));
        Ok(receipt)
    }

    async fn verify_by_id(&self, id: &str) -> LedgerResult<Option<CertificateRecord>> {
        let mut out = self
            .call("verifyCertificateById", &[Token::String(id.to_string())])
            .await?;

        if !next_bool(&mut out)? {
            logger::log_debug(&format!("[Ledger] Certificate {id} not found on blockchain"));
            return Ok(None);
        }

        Ok(Some(CertificateRecord {
            exists: true,
            certificate_hash: next_string(&mut out)?,
            holder_name: next_string(&mut out)?,
            certificate_type: next_string(&mut out)?,
            institution: next_string(&mut out)?,
            issue_date: next_u64(&mut out)?,
            timestamp: next_u64(&mut out)?,
            issuer: to_checksum_address(&next_token(&mut out)?.as_address()?),
            verified: true,
        }))
    }

    async fn verify_by_hash(&self, hash: &str) -> LedgerResult<Option<CertificateMatch>> {
        let mut out = self
            .call("verifyCertificateByHash", &[Token::String(hash.to_string())])
            .await?;

        if !next_bool(&mut out)? {
            let prefix: String = hash.chars().take(16).collect();
            logger::log_debug(&format!("[Ledger] Certificate with hash {prefix}... not found"));
            return Ok(None);
        }

        Ok(Some(CertificateMatch {
            exists: true,
            certificate_id: next_string(&mut out)?,
            holder_name: next_string(&mut out)?,
            certificate_type: next_string(&mut out)?,
            institution: next_string(&mut out)?,
            verified: true,
        }))
    }

    async fn list_certificates(&self) -> LedgerResult<Vec<CertificateSummary>> {
        let count = next_u64(&mut self.call("getCertificateCount", &[]).await?)?;

        let mut certificates = Vec::new();
        for index in 0..count {
            let mut out = self
                .call("getCertificateByIndex", &[Token::Uint(u128::from(index))])
                .await?;
            certificates.push(CertificateSummary {
                certificate_id: next_string(&mut out)?,
                holder_name: next_string(&mut out)?,
                certificate_type: next_string(&mut out)?,
                institution: next_string(&mut out)?,
                issue_date: next_u64(&mut out)?,
            });
        }

        logger::log_debug(&format!("[Ledger] Retrieved {count} certificates from blockchain"));
        Ok(certificates)
    }
}
