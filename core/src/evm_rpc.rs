use async_trait::async_trait;
use ethers::types::U256;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::rpc_provider::ProviderRegistry;
use crate::submitter::{PolledStatus, SubmissionEndpoint, SubmitError, TransactionStatus};

/// Read-only JSON-RPC queries an EVM deployment needs besides submission.
#[async_trait]
pub trait EvmEndpoint: SubmissionEndpoint {
    async fn chain_id(&self) -> Result<u64, SubmitError>;

    /// Pending nonce of `address`.
    async fn transaction_count(&self, address: &str) -> Result<U256, SubmitError>;

    async fn gas_price(&self) -> Result<U256, SubmitError>;

    /// `eth_estimateGas` for a transaction request object.
    async fn estimate_gas(&self, request: &Value) -> Result<U256, SubmitError>;
}

pub struct EvmRpcClient {
    registry: Arc<ProviderRegistry>,
}

impl EvmRpcClient {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    async fn quantity(&self, method: &str, params: Value) -> Result<U256, SubmitError> {
        let result = self.registry.call(method, params).await?;
        parse_quantity(result)
    }
}

fn parse_quantity(value: Value) -> Result<U256, SubmitError> {
    serde_json::from_value(value)
        .map_err(|e| SubmitError::InvalidResponse(format!("expected hex quantity: {e}")))
}

fn parse_receipt(receipt: Value) -> Result<PolledStatus, SubmitError> {
    if receipt.is_null() {
        return Ok(PolledStatus::pending());
    }
    let status = match receipt["status"].as_str() {
        Some("0x1") => TransactionStatus::Success,
        Some("0x0") => TransactionStatus::Failed,
        other => {
            return Err(SubmitError::InvalidResponse(format!(
                "unexpected receipt status {other:?}"
            )))
        }
    };
    Ok(PolledStatus {
        status,
        raw: receipt,
    })
}

#[async_trait]
impl SubmissionEndpoint for EvmRpcClient {
    async fn send(&self, signed_payload: &str) -> Result<String, SubmitError> {
        let result = self
            .registry
            .call("eth_sendRawTransaction", json!([signed_payload]))
            .await
            .map_err(SubmitError::from_send)?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| SubmitError::InvalidResponse("missing transaction hash".to_string()))
    }

    async fn status(&self, hash: &str) -> Result<PolledStatus, SubmitError> {
        let receipt = self
            .registry
            .call("eth_getTransactionReceipt", json!([hash]))
            .await?;
        parse_receipt(receipt)
    }
}

#[async_trait]
impl EvmEndpoint for EvmRpcClient {
    async fn chain_id(&self) -> Result<u64, SubmitError> {
        Ok(self.quantity("eth_chainId", json!([])).await?.low_u64())
    }

    async fn transaction_count(&self, address: &str) -> Result<U256, SubmitError> {
        self.quantity("eth_getTransactionCount", json!([address, "pending"]))
            .await
    }

    async fn gas_price(&self) -> Result<U256, SubmitError> {
        self.quantity("eth_gasPrice", json!([])).await
    }

    async fn estimate_gas(&self, request: &Value) -> Result<U256, SubmitError> {
        self.quantity("eth_estimateGas", json!([request])).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
