//! Write calls against contracts that may not be initialized yet.
//!
//! A write whose simulation fails with the Unauthorized contract error
//! (#1001) gets one best-effort `initialize` call followed by exactly one
//! retried simulation. Every other failure escalates immediately.

use serde::Serialize;
use soroban_sdk::xdr::ScVal;
use std::sync::Arc;
use thiserror::Error;

use crate::contract::{ContractCall, ContractInvoker, InvokeError, PreparedCall};
use crate::submitter::{SubmissionEndpoint, SubmitError, TransactionStatus, TransactionSubmitter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContractWriteState {
    Initial,
    Simulated,
    InitRecovery,
    Retried,
    Signed,
    Failed,
}

/// What happened to the remedial initialization. Never fails the write by
/// itself; the retried call decides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitRecoveryOutcome {
    Initialized { hash: String },
    /// The contract refused initialization, e.g. it already has an admin.
    PermissionDenied { code: u32, message: String },
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractWriteError {
    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error("transaction {hash} failed on chain")]
    TransactionFailed { hash: String },
}

impl ContractWriteError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Invoke(e) if e.is_unauthorized())
    }
}

/// Per-invocation state. Dropped when the call resolves.
#[derive(Debug)]
struct ContractWriteAttempt {
    call: ContractCall,
    initialization_attempted: bool,
    initialization: Option<InitRecoveryOutcome>,
    states: Vec<ContractWriteState>,
}

impl ContractWriteAttempt {
    fn new(call: ContractCall) -> Self {
        Self {
            call,
            initialization_attempted: false,
            initialization: None,
            states: vec![ContractWriteState::Initial],
        }
    }

    fn enter(&mut self, state: ContractWriteState) {
        tracing::debug!(method = %self.call.method, state = ?state, "Contract write transition");
        self.states.push(state);
    }

    fn fail(&mut self, err: impl Into<ContractWriteError>) -> ContractWriteError {
        self.enter(ContractWriteState::Failed);
        let err = err.into();
        tracing::error!(
            contract = %self.call.contract_id,
            method = %self.call.method,
            error = %err,
            "Contract write failed"
        );
        err
    }
}

#[derive(Debug, Clone)]
pub struct ContractWriteOutcome {
    pub hash: String,
    pub return_value: Option<ScVal>,
    /// Set when the Unauthorized recovery path ran.
    pub initialization: Option<InitRecoveryOutcome>,
    pub states: Vec<ContractWriteState>,
}

/// Runs contract writes through a [`ContractInvoker`] and submits them with a
/// [`TransactionSubmitter`].
pub struct ContractWriteProtocol<I: ?Sized> {
    invoker: Arc<I>,
    submitter: TransactionSubmitter<dyn SubmissionEndpoint>,
}

impl<I: ContractInvoker + ?Sized> ContractWriteProtocol<I> {
    pub fn new(invoker: Arc<I>, submitter: TransactionSubmitter<dyn SubmissionEndpoint>) -> Self {
        Self { invoker, submitter }
    }

    /// Execute `call`. `init_call` is only used if the first simulation fails
    /// with the Unauthorized error.
    pub async fn run(
        &self,
        call: ContractCall,
        init_call: ContractCall,
    ) -> Result<ContractWriteOutcome, ContractWriteError> {
        let mut attempt = ContractWriteAttempt::new(call);

        let first = self.invoker.simulate(&attempt.call).await;
        attempt.enter(ContractWriteState::Simulated);
        let prepared = match first {
            Ok(prepared) => prepared,
            Err(e) if e.is_unauthorized() => {
                tracing::warn!(
                    contract = %attempt.call.contract_id,
                    method = %attempt.call.method,
                    "Contract not initialized, attempting initialization"
                );
                attempt.enter(ContractWriteState::InitRecovery);
                attempt.initialization_attempted = true;
                attempt.initialization = Some(self.initialize(&init_call).await);

                attempt.enter(ContractWriteState::Retried);
                match self.invoker.simulate(&attempt.call).await {
                    Ok(prepared) => prepared,
                    Err(e) => return Err(attempt.fail(e)),
                }
            }
            Err(e) => return Err(attempt.fail(e)),
        };

        let hash = match self.sign_and_submit(&prepared).await {
            Ok(hash) => hash,
            Err(e) => return Err(attempt.fail(e)),
        };
        attempt.enter(ContractWriteState::Signed);
        tracing::info!(
            method = %attempt.call.method,
            hash = %hash,
            recovered = attempt.initialization_attempted,
            "Contract write confirmed"
        );

        Ok(ContractWriteOutcome {
            hash,
            return_value: prepared.return_value,
            initialization: attempt.initialization,
            states: attempt.states,
        })
    }

    async fn sign_and_submit(&self, prepared: &PreparedCall) -> Result<String, ContractWriteError> {
        let signed = self.invoker.sign(prepared).await?;
        let outcome = self.submitter.submit_and_wait(&signed).await?;
        match outcome.status {
            TransactionStatus::Success => Ok(outcome.hash),
            _ => Err(ContractWriteError::TransactionFailed { hash: outcome.hash }),
        }
    }

    /// Best effort: every failure is logged and reported, never returned.
    async fn initialize(&self, init_call: &ContractCall) -> InitRecoveryOutcome {
        let outcome = match self.invoker.simulate(init_call).await {
            Err(InvokeError::Contract { code, message }) => {
                InitRecoveryOutcome::PermissionDenied { code, message }
            }
            Err(e) => InitRecoveryOutcome::Rejected(e.to_string()),
            Ok(prepared) => match self.sign_and_submit(&prepared).await {
                Ok(hash) => InitRecoveryOutcome::Initialized { hash },
                Err(e) => InitRecoveryOutcome::Rejected(e.to_string()),
            },
        };
        match &outcome {
            InitRecoveryOutcome::Initialized { hash } => {
                tracing::info!(contract = %init_call.contract_id, hash = %hash, "Contract initialized")
            }
            InitRecoveryOutcome::PermissionDenied { code, message } => tracing::warn!(
                contract = %init_call.contract_id,
                code,
                error = %message,
                "Initialization denied by contract"
            ),
            InitRecoveryOutcome::Rejected(reason) => tracing::warn!(
                contract = %init_call.contract_id,
                error = %reason,
                "Initialization failed"
            ),
        }
        outcome
    }
}
