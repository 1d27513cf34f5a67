//! Deployed contract descriptor
//!
//! The deploy script writes `{ address, abi, network, deploymentTime }` to a
//! JSON file, and the bare ABI to a second file. Both are read once at
//! startup. Call signatures are derived from the ABI entries, so a contract
//! whose ABI does not match the functions below is rejected up front.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::abi::{parse_address, to_checksum_address, ParamKind};
use super::{LedgerError, LedgerResult};
use crate::config::LedgerConfig;

use super::abi::ParamKind::{Address, Bool, String as Str, Uint256};

/// Functions the gateway calls, with their expected inputs and outputs
const REGISTRY_FUNCTIONS: &[(&str, &[ParamKind], &[ParamKind])] = &[
    ("certificateExists", &[Str], &[Bool]),
    (
        "storeCertificate",
        &[Str, Str, Str, Str, Str, Uint256],
        &[],
    ),
    (
        "verifyCertificateById",
        &[Str],
        &[Bool, Str, Str, Str, Str, Uint256, Uint256, Address],
    ),
    (
        "verifyCertificateByHash",
        &[Str],
        &[Bool, Str, Str, Str, Str],
    ),
    ("getCertificateCount", &[], &[Uint256]),
    (
        "getCertificateByIndex",
        &[Uint256],
        &[Str, Str, Str, Str, Uint256],
    ),
];

#[derive(Deserialize)]
struct DeploymentInfo {
    address: String,
    #[serde(default)]
    abi: Option<Value>,
    #[serde(default)]
    network: Option<String>,
}

#[derive(Deserialize)]
struct AbiEntry {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    inputs: Vec<AbiParam>,
    #[serde(default)]
    outputs: Vec<AbiParam>,
}

#[derive(Deserialize)]
struct AbiParam {
    #[serde(rename = "type")]
    ty: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionAbi {
    pub name: String,
    pub inputs: Vec<ParamKind>,
    pub outputs: Vec<ParamKind>,
}

impl FunctionAbi {
    /// Canonical signature, e.g. `certificateExists(string)`
    pub fn signature(&self) -> String {
        let inputs: Vec<&str> = self.inputs.iter().map(|k| k.canonical()).collect();
        format!("{}({})", self.name, inputs.join(","))
    }
}

/// Functions of a contract ABI that use only supported parameter types
#[derive(Debug, Clone, Default)]
pub struct ContractAbi {
    functions: HashMap<String, FunctionAbi>,
}

impl ContractAbi {
    pub fn from_json(value: &Value) -> LedgerResult<Self> {
        let entries: Vec<AbiEntry> = serde_json::from_value(value.clone())
            .map_err(|e| LedgerError::Deployment(format!("Malformed ABI: {e}")))?;

        let functions = entries
            .into_iter()
            .filter(|entry| entry.kind == "function")
            .filter_map(|entry| {
                let inputs = parse_params(&entry.inputs)?;
                let outputs = parse_params(&entry.outputs)?;
                Some((
                    entry.name.clone(),
                    FunctionAbi {
                        name: entry.name,
                        inputs,
                        outputs,
                    },
                ))
            })
            .collect();

        Ok(Self { functions })
    }

    pub fn function(&self, name: &str) -> LedgerResult<&FunctionAbi> {
        self.functions
            .get(name)
            .ok_or_else(|| LedgerError::Deployment(format!("ABI has no usable function '{name}'")))
    }

    /// Check every registry function is present with the expected shape
    pub fn validate_registry(&self) -> LedgerResult<()> {
        for (name, inputs, outputs) in REGISTRY_FUNCTIONS {
            let function = self.function(name)?;
            if function.inputs != *inputs || function.outputs != *outputs {
                return Err(LedgerError::Deployment(format!(
                    "ABI function '{}' does not match the certificate registry",
                    function.signature()
                )));
            }
        }
        Ok(())
    }
}

fn parse_params(params: &[AbiParam]) -> Option<Vec<ParamKind>> {
    params.iter().map(|p| ParamKind::parse(&p.ty).ok()).collect()
}

/// Contract address plus its validated ABI
#[derive(Debug, Clone)]
pub struct DeployedContract {
    /// EIP-55 checksummed
    pub address: String,
    pub abi: ContractAbi,
    pub network: Option<String>,
}

/// Load the deployed contract, if a deployment file exists
///
/// The separate ABI file takes precedence over the `abi` field embedded in
/// the deployment file.
pub fn load(cfg: &LedgerConfig) -> LedgerResult<Option<DeployedContract>> {
    let deployment_path = Path::new(&cfg.deployment_file);
    if !deployment_path.exists() {
        return Ok(None);
    }

    let info: DeploymentInfo = read_json(deployment_path)?;

    let abi_path = Path::new(&cfg.abi_file);
    let abi_value = if abi_path.exists() {
        read_json::<Value>(abi_path)?
    } else {
        info.abi.ok_or_else(|| {
            LedgerError::Deployment(format!(
                "No ABI in {} and {} does not exist",
                cfg.deployment_file, cfg.abi_file
            ))
        })?
    };

    let abi = ContractAbi::from_json(&abi_value)?;
    abi.validate_registry()?;

    let address = to_checksum_address(&parse_address(&info.address)?);

    Ok(Some(DeployedContract {
        address,
        abi,
        network: info.network,
    }))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> LedgerResult<T> {
    let raw = fs::read_to_string(path)
        .map_err(|e| LedgerError::Deployment(format!("Failed to read {}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| LedgerError::Deployment(format!("Failed to parse {}: {e}", path.display())))
}

/// ABI JSON for the registry functions, in the layout hardhat emits
#[cfg(test)]
pub fn registry_abi_json() -> Value {
    let params = |kinds: &[ParamKind]| -> Vec<Value> {
        kinds
            .iter()
            .map(|k| serde_json::json!({ "name": "", "type": k.canonical() }))
            .collect()
    };
    let mut entries: Vec<Value> = REGISTRY_FUNCTIONS
        .iter()
        .map(|(name, inputs, outputs)| {
            serde_json::json!({
                "type": "function",
                "name": name,
                "inputs": params(*inputs),
                "outputs": params(*outputs),
                "stateMutability": if outputs.is_empty() { "nonpayable" } else { "view" },
            })
        })
        .collect();
    entries.push(serde_json::json!({
        "type": "event",
        "name": "CertificateStored",
        "inputs": [{ "name": "certificateId", "type": "string", "indexed": false }],
    }));
    Value::Array(entries)
}
