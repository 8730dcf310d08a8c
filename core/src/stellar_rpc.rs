use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use serde_json::{json, Value};
use soroban_sdk::xdr::{
    LedgerEntryData, LedgerKey, LedgerKeyAccount, Limits, ReadXdr, ScVal,
    SorobanAuthorizationEntry, SorobanTransactionData, WriteXdr,
};
use std::sync::Arc;

use crate::rpc_provider::ProviderRegistry;
use crate::stellar_tx;
use crate::submitter::{PolledStatus, SubmissionEndpoint, SubmitError, TransactionStatus};

/// Result of `simulateTransaction`, decoded from XDR.
#[derive(Debug, Clone, Default)]
pub struct SimulationOutcome {
    pub transaction_data: Option<SorobanTransactionData>,
    pub min_resource_fee: u64,
    pub auth: Vec<SorobanAuthorizationEntry>,
    pub return_value: Option<ScVal>,
    /// Host error reported by the node, e.g. `HostError: Error(Contract, #1001)`.
    pub error: Option<String>,
    pub latest_ledger: u64,
}

/// Read-only Soroban RPC queries a Stellar deployment needs besides submission.
#[async_trait]
pub trait StellarEndpoint: SubmissionEndpoint {
    /// Current sequence number of `account`.
    async fn account_sequence(&self, account: &str) -> Result<i64, SubmitError>;

    /// Simulate a base64 transaction envelope.
    async fn simulate(&self, envelope_xdr: &str) -> Result<SimulationOutcome, SubmitError>;
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendTransactionResult {
    status: String,
    hash: String,
    #[serde(default)]
    error_result_xdr: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetTransactionResult {
    status: String,
}

#[derive(Debug, Deserialize)]
struct LedgerEntriesResult {
    #[serde(default)]
    entries: Option<Vec<LedgerEntryResult>>,
}

#[derive(Debug, Deserialize)]
struct LedgerEntryResult {
    xdr: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimulationRpcResult {
    #[serde(default)]
    transaction_data: String,
    #[serde(default)]
    min_resource_fee: Option<String>,
    #[serde(default)]
    latest_ledger: u64,
    #[serde(default)]
    results: Vec<HostFunctionResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HostFunctionResult {
    #[serde(default)]
    auth: Vec<String>,
    #[serde(default)]
    xdr: String,
}

fn invalid(e: impl std::fmt::Display) -> SubmitError {
    SubmitError::InvalidResponse(e.to_string())
}

fn decode_xdr<T: ReadXdr>(b64: &str) -> Result<T, SubmitError> {
    let bytes = BASE64.decode(b64).map_err(invalid)?;
    T::from_xdr(&bytes, Limits::none()).map_err(invalid)
}

fn parse_send_result(result: Value) -> Result<String, SubmitError> {
    let sent: SendTransactionResult = serde_json::from_value(result).map_err(invalid)?;
    match sent.status.as_str() {
        "PENDING" | "DUPLICATE" => Ok(sent.hash),
        "TRY_AGAIN_LATER" => Err(SubmitError::Rejected(
            "node is busy, try again later".to_string(),
        )),
        "ERROR" => Err(SubmitError::Rejected(
            sent.error_result_xdr
                .unwrap_or_else(|| "transaction rejected".to_string()),
        )),
        other => Err(invalid(format!("unknown sendTransaction status `{other}`"))),
    }
}

fn parse_get_transaction(result: Value) -> Result<PolledStatus, SubmitError> {
    let tx: GetTransactionResult = serde_json::from_value(result.clone()).map_err(invalid)?;
    let status = match tx.status.as_str() {
        "NOT_FOUND" => TransactionStatus::Pending,
        "SUCCESS" => TransactionStatus::Success,
        "FAILED" => TransactionStatus::Failed,
        other => return Err(invalid(format!("unknown getTransaction status `{other}`"))),
    };
    Ok(PolledStatus {
        status,
        raw: result,
    })
}

fn parse_account_sequence(result: Value) -> Result<Option<i64>, SubmitError> {
    let entries: LedgerEntriesResult = serde_json::from_value(result).map_err(invalid)?;
    let Some(entry) = entries.entries.unwrap_or_default().into_iter().next() else {
        return Ok(None);
    };
    match decode_xdr::<LedgerEntryData>(&entry.xdr)? {
        LedgerEntryData::Account(account) => Ok(Some(account.seq_num.0)),
        _ => Err(invalid("ledger entry is not an account")),
    }
}

fn parse_simulation(result: Value) -> Result<SimulationOutcome, SubmitError> {
    let sim: SimulationRpcResult = serde_json::from_value(result).map_err(invalid)?;
    if let Some(error) = sim.error {
        return Ok(SimulationOutcome {
            error: Some(error),
            latest_ledger: sim.latest_ledger,
            ..Default::default()
        });
    }

    let transaction_data = if sim.transaction_data.is_empty() {
        None
    } else {
        Some(decode_xdr::<SorobanTransactionData>(&sim.transaction_data)?)
    };
    let min_resource_fee = sim
        .min_resource_fee
        .as_deref()
        .map(str::parse::<u64>)
        .transpose()
        .map_err(invalid)?
        .unwrap_or(0);

    let mut auth = Vec::new();
    let mut return_value = None;
    if let Some(first) = sim.results.into_iter().next() {
        for entry in &first.auth {
            auth.push(decode_xdr::<SorobanAuthorizationEntry>(entry)?);
        }
        if !first.xdr.is_empty() {
            return_value = Some(decode_xdr::<ScVal>(&first.xdr)?);
        }
    }

    Ok(SimulationOutcome {
        transaction_data,
        min_resource_fee,
        auth,
        return_value,
        error: None,
        latest_ledger: sim.latest_ledger,
    })
}

// ── Client ────────────────────────────────────────────────────────────────────

/// Soroban RPC client over a failover provider registry.
pub struct StellarRpcClient {
    registry: Arc<ProviderRegistry>,
}

impl StellarRpcClient {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }
}

#[async_trait]
impl SubmissionEndpoint for StellarRpcClient {
    async fn send(&self, signed_payload: &str) -> Result<String, SubmitError> {
        let result = self
            .registry
            .call("sendTransaction", json!({ "transaction": signed_payload }))
            .await
            .map_err(SubmitError::from_send)?;
        parse_send_result(result).inspect_err(|e| {
            tracing::error!(error = %e, "sendTransaction rejected");
        })
    }

    async fn status(&self, hash: &str) -> Result<PolledStatus, SubmitError> {
        let result = self
            .registry
            .call("getTransaction", json!({ "hash": hash }))
            .await?;
        parse_get_transaction(result)
    }
}

#[async_trait]
impl StellarEndpoint for StellarRpcClient {
    async fn account_sequence(&self, account: &str) -> Result<i64, SubmitError> {
        let account_id = stellar_tx::parse_account_id(account).map_err(invalid)?;
        let key = LedgerKey::Account(LedgerKeyAccount { account_id });
        let key_xdr = BASE64.encode(key.to_xdr(Limits::none()).map_err(invalid)?);

        let result = self
            .registry
            .call("getLedgerEntries", json!({ "keys": [key_xdr] }))
            .await?;
        parse_account_sequence(result)?.ok_or_else(|| {
            SubmitError::Rejected(format!("account {account} does not exist on this network"))
        })
    }

    async fn simulate(&self, envelope_xdr: &str) -> Result<SimulationOutcome, SubmitError> {
        tracing::debug!("Sending simulateTransaction request");
        let result = self
            .registry
            .call("simulateTransaction", json!({ "transaction": envelope_xdr }))
            .await?;
        let outcome = parse_simulation(result)?;
        match &outcome.error {
            Some(error) => tracing::warn!(error = %error, "Simulation reported an error"),
            None => tracing::info!(
                latest_ledger = outcome.latest_ledger,
                min_resource_fee = outcome.min_resource_fee,
                "Simulation successful"
            ),
        }
        Ok(outcome)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
