use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::estimator::DeploymentStepEstimate;
use crate::evm_abi::{AbiError, ArtifactStore};
use crate::evm_backend::EvmBackend;
use crate::evm_rpc::EvmEndpoint;
use crate::plan::{Chain, DeploymentPlan, Network, PlanError};
use crate::progress::ProgressSink;
use crate::result::DeploymentResult;
use crate::stellar_backend::StellarBackend;
use crate::stellar_rpc::StellarEndpoint;
use crate::stellar_tx::TxBuildError;
use crate::submitter::{SubmitError, SubmitterConfig};
use crate::wallet::{SharedWallet, WalletError};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("wallet not connected")]
    WalletNotConnected,

    #[error("network {network} is not supported: {reason}")]
    UnsupportedNetwork { network: Network, reason: String },

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Wallet(WalletError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Artifact(#[from] AbiError),

    #[error("transaction encoding failed: {0}")]
    Encoding(#[from] TxBuildError),

    #[error("simulation failed: {0}")]
    Simulation(String),

    #[error("transaction {hash} failed on chain")]
    TransactionFailed { hash: String },

    #[error("{0}")]
    Precondition(String),
}

impl From<WalletError> for BackendError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::NotConnected => Self::WalletNotConnected,
            other => Self::Wallet(other),
        }
    }
}

impl BackendError {
    pub(crate) fn unsupported(network: Network, reason: impl Into<String>) -> Self {
        Self::UnsupportedNetwork {
            network,
            reason: reason.into(),
        }
    }
}

/// Per-chain deployment adapter. One variant per chain family.
pub enum ChainBackend {
    Evm(EvmBackend),
    Stellar(StellarBackend),
}

impl ChainBackend {
    pub fn chain(&self) -> Chain {
        match self {
            Self::Evm(_) => Chain::Evm,
            Self::Stellar(_) => Chain::Stellar,
        }
    }

    /// Resolve the signer's public key.
    pub async fn connect_wallet(&mut self) -> Result<String, BackendError> {
        match self {
            Self::Evm(b) => b.connect_wallet().await,
            Self::Stellar(b) => b.connect_wallet().await,
        }
    }

    pub async fn ensure_network(&mut self, plan: &DeploymentPlan) -> Result<(), BackendError> {
        match self {
            Self::Evm(b) => b.ensure_network(plan).await,
            Self::Stellar(b) => b.ensure_network(plan).await,
        }
    }

    /// Validate the plan and describe the steps `deploy` would run.
    pub fn estimate(&self, plan: &DeploymentPlan) -> Result<DeploymentStepEstimate, BackendError> {
        if plan.chain != self.chain() {
            return Err(BackendError::unsupported(
                plan.network,
                format!("plan targets {}, backend serves {}", plan.chain, self.chain()),
            ));
        }
        plan.validate()?;
        Ok(crate::estimator::estimate(plan))
    }

    /// Run every step in order. Never retried automatically: a failed run may
    /// already have changed chain state.
    pub async fn deploy(&self, plan: &DeploymentPlan, sink: &dyn ProgressSink) -> DeploymentResult {
        match self {
            Self::Evm(b) => b.deploy(plan, sink).await,
            Self::Stellar(b) => b.deploy(plan, sink).await,
        }
    }
}

/// Endpoints, wallets and artifacts available to backends. Shared read-only
/// between concurrent runs.
#[derive(Clone)]
pub struct ChainEnvironment {
    pub evm_endpoints: HashMap<Network, Arc<dyn EvmEndpoint>>,
    pub stellar_endpoints: HashMap<Network, Arc<dyn StellarEndpoint>>,
    pub evm_wallet: Option<SharedWallet>,
    pub stellar_wallet: Option<SharedWallet>,
    pub artifacts: Arc<ArtifactStore>,
    pub submitter: SubmitterConfig,
}

impl ChainEnvironment {
    pub fn new(artifacts: Arc<ArtifactStore>, submitter: SubmitterConfig) -> Self {
        Self {
            evm_endpoints: HashMap::new(),
            stellar_endpoints: HashMap::new(),
            evm_wallet: None,
            stellar_wallet: None,
            artifacts,
            submitter,
        }
    }

    /// Backend for a chain. Depends on nothing but `chain`.
    pub fn backend_for(&self, chain: Chain) -> ChainBackend {
        match chain {
            Chain::Evm => ChainBackend::Evm(EvmBackend::new(
                self.evm_endpoints.clone(),
                self.evm_wallet.clone(),
                Arc::clone(&self.artifacts),
                self.submitter,
            )),
            Chain::Stellar => ChainBackend::Stellar(StellarBackend::new(
                self.stellar_endpoints.clone(),
                self.stellar_wallet.clone(),
                self.submitter,
            )),
        }
    }

    pub fn has_endpoint(&self, network: Network) -> bool {
        match network.chain() {
            Chain::Evm => self.evm_endpoints.contains_key(&network),
            Chain::Stellar => self.stellar_endpoints.contains_key(&network),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{EvmTokenConfig, StellarTokenConfig, TokenStandard};

    fn env() -> ChainEnvironment {
        ChainEnvironment::new(
            Arc::new(ArtifactStore::new("artifacts")),
            SubmitterConfig::default(),
        )
    }

    #[test]
    fn test_backend_selection_by_chain() {
        let env = env();
        assert_eq!(env.backend_for(Chain::Evm).chain(), Chain::Evm);
        assert_eq!(env.backend_for(Chain::Stellar).chain(), Chain::Stellar);
    }

    #[tokio::test]
    async fn test_connect_without_wallet_fails() {
        let env = env();
        for chain in [Chain::Evm, Chain::Stellar] {
            let mut backend = env.backend_for(chain);
            assert!(matches!(
                backend.connect_wallet().await,
                Err(BackendError::WalletNotConnected)
            ));
        }
    }

    #[tokio::test]
    async fn test_ensure_network_without_endpoint_fails() {
        let mut backend = env().backend_for(Chain::Stellar);
        let plan = DeploymentPlan::stellar(
            TokenStandard::ClassicAsset,
            crate::plan::Network::StellarMainnet,
            StellarTokenConfig {
                asset_code: "ABC".into(),
                ..Default::default()
            },
        );
        assert!(matches!(
            backend.ensure_network(&plan).await,
            Err(BackendError::UnsupportedNetwork { .. })
        ));
    }

    #[test]
    fn test_estimate_rejects_plan_for_other_chain() {
        let backend = env().backend_for(Chain::Stellar);
        let plan = DeploymentPlan::evm(
            TokenStandard::Erc20,
            crate::plan::Network::PolygonAmoy,
            EvmTokenConfig {
                name: "X".into(),
                symbol: "X".into(),
                ..Default::default()
            },
        );
        assert!(matches!(
            backend.estimate(&plan),
            Err(BackendError::UnsupportedNetwork { .. })
        ));
    }

    #[test]
    fn test_estimate_validates_plan() {
        let backend = env().backend_for(Chain::Evm);
        let plan = DeploymentPlan::evm(
            TokenStandard::Erc20,
            crate::plan::Network::PolygonAmoy,
            EvmTokenConfig::default(),
        );
        assert!(matches!(
            backend.estimate(&plan),
            Err(BackendError::Plan(PlanError::MissingField(_)))
        ));
    }

    #[test]
    fn test_wallet_not_connected_maps_to_backend_error() {
        assert!(matches!(
            BackendError::from(WalletError::NotConnected),
            BackendError::WalletNotConnected
        ));
        assert!(matches!(
            BackendError::from(WalletError::UserRejected),
            BackendError::Wallet(WalletError::UserRejected)
        ));
    }
}
