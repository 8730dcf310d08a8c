//! Soroban contract calls: simulate a method invocation, assemble it with the
//! simulated resources, and have the wallet sign it.

use async_trait::async_trait;
use soroban_sdk::xdr::ScVal;
use std::sync::Arc;
use thiserror::Error;

use crate::stellar_rpc::StellarEndpoint;
use crate::stellar_tx::{self, TxBuildError};
use crate::submitter::SubmitError;
use crate::wallet::{SharedWallet, WalletError, WalletSession};

/// Contract error raised by a write method whose contract was never
/// initialized (no admin stored).
pub const UNAUTHORIZED_ERROR_CODE: u32 = 1001;

const CONTRACT_ERROR_MARKER: &str = "Error(Contract, #";

const DEFAULT_BASE_FEE_STROOPS: u32 = 100;

/// Extract `N` from a host error containing `Error(Contract, #N)`.
pub fn contract_error_code(message: &str) -> Option<u32> {
    let start = message.find(CONTRACT_ERROR_MARKER)? + CONTRACT_ERROR_MARKER.len();
    let digits: String = message[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    #[error("contract error #{code}: {message}")]
    Contract { code: u32, message: String },

    #[error("simulation failed: {0}")]
    Simulation(String),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("transaction encoding failed: {0}")]
    Encoding(String),
}

impl From<TxBuildError> for InvokeError {
    fn from(err: TxBuildError) -> Self {
        Self::Encoding(err.to_string())
    }
}

impl InvokeError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Contract { code, .. } if *code == UNAUTHORIZED_ERROR_CODE)
    }

    /// Map a simulation error string to a contract error when it carries a code.
    pub fn from_simulation(message: String) -> Self {
        match contract_error_code(&message) {
            Some(code) => Self::Contract { code, message },
            None => Self::Simulation(message),
        }
    }
}

/// One contract method invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractCall {
    pub contract_id: String,
    pub method: String,
    pub args: Vec<ScVal>,
}

impl ContractCall {
    pub fn new(contract_id: impl Into<String>, method: impl Into<String>, args: Vec<ScVal>) -> Self {
        Self {
            contract_id: contract_id.into(),
            method: method.into(),
            args,
        }
    }

    /// `initialize(admin)` on the same contract.
    pub fn initialize(contract_id: &str, admin: &str) -> Result<Self, TxBuildError> {
        Ok(Self::new(
            contract_id,
            "initialize",
            vec![ScVal::Address(stellar_tx::sc_address(admin)?)],
        ))
    }
}

/// A successfully simulated call, assembled and ready for signing.
#[derive(Debug, Clone)]
pub struct PreparedCall {
    pub call: ContractCall,
    /// Unsigned envelope carrying the simulated resources and auth entries.
    pub envelope_xdr: String,
    pub return_value: Option<ScVal>,
    pub latest_ledger: u64,
}

/// Simulate and sign contract calls. Submission is left to the caller.
#[async_trait]
pub trait ContractInvoker: Send + Sync {
    async fn simulate(&self, call: &ContractCall) -> Result<PreparedCall, InvokeError>;

    async fn sign(&self, prepared: &PreparedCall) -> Result<String, InvokeError>;
}

/// [`ContractInvoker`] backed by Soroban RPC and a wallet session.
pub struct SorobanContractClient {
    endpoint: Arc<dyn StellarEndpoint>,
    wallet: SharedWallet,
    passphrase: String,
    source: String,
    base_fee: u32,
}

impl SorobanContractClient {
    pub fn new(
        endpoint: Arc<dyn StellarEndpoint>,
        wallet: SharedWallet,
        passphrase: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            endpoint,
            wallet,
            passphrase: passphrase.into(),
            source: source.into(),
            base_fee: DEFAULT_BASE_FEE_STROOPS,
        }
    }

    /// Source account taken from the wallet's public key.
    pub async fn connect(
        endpoint: Arc<dyn StellarEndpoint>,
        wallet: SharedWallet,
        passphrase: impl Into<String>,
    ) -> Result<Self, InvokeError> {
        let source = wallet.public_key().await?;
        Ok(Self::new(endpoint, wallet, passphrase, source))
    }

    pub fn with_base_fee(mut self, base_fee: u32) -> Self {
        self.base_fee = base_fee;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

#[async_trait]
impl ContractInvoker for SorobanContractClient {
    async fn simulate(&self, call: &ContractCall) -> Result<PreparedCall, InvokeError> {
        let sequence = self.endpoint.account_sequence(&self.source).await? + 1;
        let op = stellar_tx::invoke_contract(&call.contract_id, &call.method, call.args.clone())?;
        let tx = stellar_tx::build_transaction(&self.source, sequence, self.base_fee, vec![op])?;

        let outcome = self
            .endpoint
            .simulate(&stellar_tx::unsigned_envelope_xdr(tx.clone())?)
            .await?;
        if let Some(error) = outcome.error {
            tracing::debug!(method = %call.method, error = %error, "Contract simulation failed");
            return Err(InvokeError::from_simulation(error));
        }
        let data = outcome
            .transaction_data
            .ok_or_else(|| InvokeError::Simulation("no transaction data returned".to_string()))?;
        let tx = stellar_tx::assemble_soroban(tx, data, outcome.min_resource_fee, outcome.auth)?;

        Ok(PreparedCall {
            call: call.clone(),
            envelope_xdr: stellar_tx::unsigned_envelope_xdr(tx)?,
            return_value: outcome.return_value,
            latest_ledger: outcome.latest_ledger,
        })
    }

    async fn sign(&self, prepared: &PreparedCall) -> Result<String, InvokeError> {
        Ok(self.wallet.sign(&prepared.envelope_xdr, &self.passphrase).await?)
    }
}
