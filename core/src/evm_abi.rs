use ethers::abi::{encode, Token};
use ethers::types::{Address, U256};
use ethers::utils::{id, parse_units};
use moka::future::Cache;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

const ARTIFACT_CACHE_CAPACITY: u64 = 64;

#[derive(Debug, Error)]
pub enum AbiError {
    #[error("artifact `{name}` could not be read: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact `{name}` is malformed: {reason}")]
    InvalidArtifact { name: String, reason: String },

    #[error("invalid address `{0}`")]
    InvalidAddress(String),

    #[error("invalid amount `{amount}` for {decimals} decimals")]
    InvalidAmount { amount: String, decimals: u8 },
}

/// Bytecode field as emitted by Hardhat (`"0x…"`) or Foundry (`{"object": "0x…"}`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum BytecodeField {
    Hex(String),
    Object { object: String },
}

/// Compiled contract loaded from a build artifact JSON file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    #[serde(default)]
    pub contract_name: String,
    #[serde(default)]
    pub abi: Value,
    bytecode: BytecodeField,
}

impl ContractArtifact {
    pub fn from_bytecode(name: &str, bytecode_hex: &str) -> Self {
        Self {
            contract_name: name.to_string(),
            abi: Value::Array(Vec::new()),
            bytecode: BytecodeField::Hex(bytecode_hex.to_string()),
        }
    }

    pub fn bytecode(&self) -> Result<Vec<u8>, AbiError> {
        let raw = match &self.bytecode {
            BytecodeField::Hex(s) | BytecodeField::Object { object: s } => s,
        };
        let bytes = hex::decode(raw.trim_start_matches("0x")).map_err(|e| {
            AbiError::InvalidArtifact {
                name: self.contract_name.clone(),
                reason: e.to_string(),
            }
        })?;
        if bytes.is_empty() {
            return Err(AbiError::InvalidArtifact {
                name: self.contract_name.clone(),
                reason: "empty bytecode (abstract contract or interface?)".to_string(),
            });
        }
        Ok(bytes)
    }
}

/// Build artifacts read from `<dir>/<Name>.json`, cached after first load.
pub struct ArtifactStore {
    dir: PathBuf,
    cache: Cache<String, Arc<ContractArtifact>>,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: Cache::builder().max_capacity(ARTIFACT_CACHE_CAPACITY).build(),
        }
    }

    /// Register an artifact directly, bypassing the filesystem.
    pub async fn insert(&self, name: &str, artifact: ContractArtifact) {
        self.cache.insert(name.to_string(), Arc::new(artifact)).await;
    }

    pub async fn load(&self, name: &str) -> Result<Arc<ContractArtifact>, AbiError> {
        if let Some(hit) = self.cache.get(name).await {
            return Ok(hit);
        }

        let path = self.dir.join(format!("{name}.json"));
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| AbiError::Io {
                name: name.to_string(),
                source,
            })?;
        let mut artifact: ContractArtifact =
            serde_json::from_str(&text).map_err(|e| AbiError::InvalidArtifact {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        if artifact.contract_name.is_empty() {
            artifact.contract_name = name.to_string();
        }
        artifact.bytecode()?;

        tracing::debug!(artifact = %name, path = %path.display(), "Loaded contract artifact");
        let artifact = Arc::new(artifact);
        self.cache.insert(name.to_string(), Arc::clone(&artifact)).await;
        Ok(artifact)
    }
}

/// Creation bytecode followed by ABI-encoded constructor arguments.
pub fn deployment_data(artifact: &ContractArtifact, constructor: &[Token]) -> Result<Vec<u8>, AbiError> {
    let mut data = artifact.bytecode()?;
    data.extend(encode(constructor));
    Ok(data)
}

/// Function selector for `signature` followed by the encoded arguments.
pub fn call_data(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = id(signature).to_vec();
    data.extend(encode(args));
    data
}

/// Scale a decimal amount by `decimals` into base units.
pub fn scale_amount(amount: &str, decimals: u8) -> Result<U256, AbiError> {
    parse_units(amount.trim(), u32::from(decimals))
        .map(Into::into)
        .map_err(|_| AbiError::InvalidAmount {
            amount: amount.to_string(),
            decimals,
        })
}

pub fn parse_address(address: &str) -> Result<Address, AbiError> {
    Address::from_str(address.trim()).map_err(|_| AbiError::InvalidAddress(address.to_string()))
}

pub fn hex_data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
