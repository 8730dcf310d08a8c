use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::rpc_provider::RpcCallError;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The endpoint could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// The chain refused the payload synchronously.
    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("transaction {hash} still pending after {waited:?}")]
    Timeout { hash: String, waited: Duration },

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<RpcCallError> for SubmitError {
    fn from(err: RpcCallError) -> Self {
        match err {
            RpcCallError::Rpc { code, message, .. } => Self::Rpc { code, message },
            RpcCallError::InvalidResponse(msg) => Self::InvalidResponse(msg),
            other => Self::Network(other.to_string()),
        }
    }
}

impl SubmitError {
    /// Map a failed submission call. A reachable node answering with a
    /// JSON-RPC error refused the payload.
    pub fn from_send(err: RpcCallError) -> Self {
        match err {
            RpcCallError::Rpc { message, .. } => Self::Rejected(message),
            other => other.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A submitted transaction. Its status only ever moves from `Pending` to a
/// terminal status, and stays there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionHandle {
    hash: String,
    status: TransactionStatus,
}

impl TransactionHandle {
    pub fn pending(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            status: TransactionStatus::Pending,
        }
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Record a terminal status. Returns false (and changes nothing) when the
    /// handle is already terminal or `status` is `Pending`.
    pub fn settle(&mut self, status: TransactionStatus) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        true
    }
}

/// One poll answer from an endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct PolledStatus {
    pub status: TransactionStatus,
    pub raw: Value,
}

impl PolledStatus {
    pub fn pending() -> Self {
        Self {
            status: TransactionStatus::Pending,
            raw: Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TerminalOutcome {
    pub hash: String,
    pub status: TransactionStatus,
    /// Chain-specific payload of the final poll (receipt or getTransaction result).
    pub raw: Value,
}

/// A chain endpoint that accepts signed payloads and reports their status.
#[async_trait]
pub trait SubmissionEndpoint: Send + Sync {
    /// Submit a signed payload and return the transaction hash.
    async fn send(&self, signed_payload: &str) -> Result<String, SubmitError>;

    /// Query the current status of a previously submitted transaction.
    async fn status(&self, hash: &str) -> Result<PolledStatus, SubmitError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitterConfig {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Submits signed payloads and polls them to a terminal status.
///
/// Keeps no memory between calls; callers decide the ordering of submissions.
pub struct TransactionSubmitter<E: ?Sized> {
    endpoint: Arc<E>,
    config: SubmitterConfig,
}

impl<E: ?Sized> Clone for TransactionSubmitter<E> {
    fn clone(&self) -> Self {
        Self {
            endpoint: Arc::clone(&self.endpoint),
            config: self.config,
        }
    }
}

impl<E: SubmissionEndpoint + ?Sized> TransactionSubmitter<E> {
    pub fn new(endpoint: Arc<E>, config: SubmitterConfig) -> Self {
        Self { endpoint, config }
    }

    pub fn config(&self) -> SubmitterConfig {
        self.config
    }

    /// Single round-trip submission.
    pub async fn submit(&self, signed_payload: &str) -> Result<TransactionHandle, SubmitError> {
        let hash = self.endpoint.send(signed_payload).await?;
        tracing::debug!(hash = %hash, "Transaction submitted");
        Ok(TransactionHandle::pending(hash))
    }

    /// Poll until the transaction is terminal or the timeout elapses.
    ///
    /// Unreachable-endpoint errors while polling are treated as transient; the
    /// transaction has already been accepted, so polling continues until the
    /// deadline. Any other error aborts the wait.
    pub async fn await_terminal(
        &self,
        handle: &mut TransactionHandle,
    ) -> Result<TerminalOutcome, SubmitError> {
        if handle.status().is_terminal() {
            return Ok(TerminalOutcome {
                hash: handle.hash().to_string(),
                status: handle.status(),
                raw: Value::Null,
            });
        }

        let started = Instant::now();
        let deadline = started + self.config.timeout;
        loop {
            match self.endpoint.status(handle.hash()).await {
                Ok(polled) if polled.status.is_terminal() => {
                    handle.settle(polled.status);
                    tracing::debug!(
                        hash = %handle.hash(),
                        status = ?polled.status,
                        "Transaction reached terminal status"
                    );
                    return Ok(TerminalOutcome {
                        hash: handle.hash().to_string(),
                        status: polled.status,
                        raw: polled.raw,
                    });
                }
                Ok(_) => {}
                Err(SubmitError::Network(e)) => {
                    tracing::warn!(hash = %handle.hash(), error = %e, "Status poll failed, retrying");
                }
                Err(e) => return Err(e),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(SubmitError::Timeout {
                    hash: handle.hash().to_string(),
                    waited: now - started,
                });
            }
            tokio::time::sleep(self.config.poll_interval.min(deadline - now)).await;
        }
    }

    pub async fn submit_and_wait(&self, signed_payload: &str) -> Result<TerminalOutcome, SubmitError> {
        let mut handle = self.submit(signed_payload).await?;
        self.await_terminal(&mut handle).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
