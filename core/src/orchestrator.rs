//! Drives one deployment through connect, network check, estimate and deploy.

use serde::Serialize;
use std::fmt;

use crate::backend::{ChainBackend, ChainEnvironment};
use crate::plan::DeploymentPlan;
use crate::progress::ProgressSink;
use crate::result::DeploymentResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrchestratorState {
    Idle,
    Connecting,
    NetworkCheck,
    Estimating,
    Deploying,
    Completed,
    Failed,
}

impl OrchestratorState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::NetworkCheck => "network check",
            Self::Estimating => "estimating",
            Self::Deploying => "deploying",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Forward-only state machine around a single [`ChainBackend`].
///
/// Runs at most once; a finished orchestrator answers further runs with a
/// failed result and touches nothing.
pub struct DeploymentOrchestrator {
    backend: ChainBackend,
    state: OrchestratorState,
    history: Vec<OrchestratorState>,
}

impl DeploymentOrchestrator {
    pub fn new(backend: ChainBackend) -> Self {
        Self {
            backend,
            state: OrchestratorState::Idle,
            history: vec![OrchestratorState::Idle],
        }
    }

    /// Orchestrator whose backend matches the plan's chain.
    pub fn for_plan(env: &ChainEnvironment, plan: &DeploymentPlan) -> Self {
        Self::new(env.backend_for(plan.chain))
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// Every state entered so far, starting with `Idle`.
    pub fn history(&self) -> &[OrchestratorState] {
        &self.history
    }

    fn enter(&mut self, state: OrchestratorState, sink: &dyn ProgressSink, message: &str) {
        tracing::info!(from = %self.state, to = %state, "Orchestrator transition");
        self.state = state;
        self.history.push(state);
        sink.report(message);
    }

    fn fail(&mut self, sink: &dyn ProgressSink, result: DeploymentResult) -> DeploymentResult {
        let message = format!(
            "Deployment failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
        self.enter(OrchestratorState::Failed, sink, &message);
        result
    }

    pub async fn run(&mut self, plan: DeploymentPlan, sink: &dyn ProgressSink) -> DeploymentResult {
        if self.state != OrchestratorState::Idle {
            return DeploymentResult::failure(format!(
                "orchestrator already ran (state: {})",
                self.state
            ));
        }

        self.enter(OrchestratorState::Connecting, sink, "Connecting wallet...");
        match self.backend.connect_wallet().await {
            Ok(account) => sink.report(&format!("Wallet connected: {account}")),
            Err(e) => return self.fail(sink, DeploymentResult::failure(e.to_string())),
        }

        self.enter(
            OrchestratorState::NetworkCheck,
            sink,
            &format!("Checking network {}...", plan.network),
        );
        if let Err(e) = self.backend.ensure_network(&plan).await {
            return self.fail(sink, DeploymentResult::failure(e.to_string()));
        }

        self.enter(OrchestratorState::Estimating, sink, "Estimating deployment...");
        match self.backend.estimate(&plan) {
            Ok(estimate) => {
                for (index, step) in estimate.steps.iter().enumerate() {
                    sink.report(&format!("  {}. {step}", index + 1));
                }
                if !estimate.fees_hint.is_empty() {
                    sink.report(&estimate.fees_hint);
                }
            }
            Err(e) => return self.fail(sink, DeploymentResult::failure(e.to_string())),
        }

        self.enter(OrchestratorState::Deploying, sink, "Deploying...");
        let result = self.backend.deploy(&plan, sink).await;
        if result.success {
            self.enter(OrchestratorState::Completed, sink, "Deployment completed");
            result
        } else {
            self.fail(sink, result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evm_abi::{ArtifactStore, ContractArtifact};
    use crate::evm_rpc::EvmEndpoint;
    use crate::plan::{EvmTokenConfig, Network, StellarTokenConfig, TokenStandard};
    use crate::progress::ProgressLog;
    use crate::stellar_rpc::StellarEndpoint;
    use crate::submitter::SubmitterConfig;
    use crate::testing::{EchoWallet, EventLog, FakeEvmEndpoint, FakeStellarEndpoint, Script, EVM_ACCOUNT};
    use crate::wallet::{KeypairWallet, SharedWallet, WalletSession};
    use std::sync::Arc;
    use std::time::Duration;
    use stellar_strkey::Strkey;
    use OrchestratorState::*;

    fn account(byte: u8) -> String {
        Strkey::PublicKeyEd25519(stellar_strkey::ed25519::PublicKey([byte; 32])).to_string()
    }

    async fn env(script: Script, events: Arc<EventLog>) -> ChainEnvironment {
        let artifacts = ArtifactStore::new("does-not-exist");
        artifacts
            .insert("RealEstateToken", ContractArtifact::from_bytecode("RealEstateToken", "0x6080"))
            .await;
        let mut env = ChainEnvironment::new(
            Arc::new(artifacts),
            SubmitterConfig {
                poll_interval: Duration::from_millis(1),
                timeout: Duration::from_secs(5),
            },
        );
        let evm: Arc<dyn EvmEndpoint> = FakeEvmEndpoint::new(80002, script, events.clone());
        env.evm_endpoints.insert(Network::PolygonAmoy, evm);
        let stellar: Arc<dyn StellarEndpoint> = FakeStellarEndpoint::new(Script::default(), events);
        env.stellar_endpoints.insert(Network::StellarTestnet, stellar);
        env.evm_wallet = Some(SharedWallet::new(EchoWallet(EVM_ACCOUNT.into())));
        env.stellar_wallet = Some(SharedWallet::new(KeypairWallet::generate()));
        env
    }

    fn scenario_a() -> DeploymentPlan {
        DeploymentPlan::evm(
            TokenStandard::Erc20,
            Network::PolygonAmoy,
            EvmTokenConfig {
                name: "X".into(),
                symbol: "X".into(),
                initial_supply: Some("1000".into()),
                ..Default::default()
            },
        )
    }

    fn scenario_b() -> DeploymentPlan {
        DeploymentPlan::stellar(
            TokenStandard::ClassicAsset,
            Network::StellarTestnet,
            StellarTokenConfig {
                asset_code: "ABC".into(),
                distribution_account: Some(account(9)),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_scenario_evm_erc20() {
        let events = Arc::new(EventLog::default());
        let env = env(Script::default(), events.clone()).await;
        let plan = scenario_a();
        let mut orchestrator = DeploymentOrchestrator::for_plan(&env, &plan);
        let log = ProgressLog::new();

        let result = orchestrator.run(plan, &log).await;

        assert!(result.success, "{:?}", result.error);
        assert!(result.artifacts.contains_key("tokenAddress"));
        assert!(!result.transaction_hashes.is_empty());
        assert_eq!(
            orchestrator.history(),
            &[Idle, Connecting, NetworkCheck, Estimating, Deploying, Completed]
        );
        let messages = log.messages();
        assert!(messages.contains(&"  1. Deploy ERC-20 token contract".to_string()));
        assert!(messages.contains(&"  2. Mint initial supply: 1000 X".to_string()));
        events.assert_sequential();
    }

    #[tokio::test]
    async fn test_scenario_stellar_classic() {
        let events = Arc::new(EventLog::default());
        let env = env(Script::default(), events).await;
        let wallet_key = env.stellar_wallet.as_ref().unwrap().public_key().await.unwrap();
        let plan = scenario_b();
        let mut orchestrator = DeploymentOrchestrator::for_plan(&env, &plan);
        let log = ProgressLog::new();

        let result = orchestrator.run(plan, &log).await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.artifacts["assetId"], format!("ABC:{wallet_key}"));
        assert_eq!(result.artifacts["issuer"], wallet_key);
        assert!(log
            .messages()
            .iter()
            .any(|m| m.contains("Send initial payment to distribution account")));
        assert_eq!(orchestrator.state(), Completed);
        assert!(orchestrator.state().is_terminal());
    }

    #[tokio::test]
    async fn test_scenario_first_operation_rejected() {
        let events = Arc::new(EventLog::default());
        let script = Script { reject_send: Some(0), ..Default::default() };
        let env = env(script, events).await;
        let plan = scenario_a();
        let mut orchestrator = DeploymentOrchestrator::for_plan(&env, &plan);

        let result = orchestrator.run(plan, &ProgressLog::new()).await;

        assert!(!result.success);
        assert!(result.artifacts.is_empty());
        assert!(!result.error.unwrap().is_empty());
        assert_eq!(orchestrator.state(), Failed);
        assert!(orchestrator.state().is_terminal());
        assert!(!Deploying.is_terminal());
        assert_eq!(orchestrator.history().last(), Some(&Failed));
    }

    #[tokio::test]
    async fn test_missing_wallet_fails_in_connecting() {
        let events = Arc::new(EventLog::default());
        let mut env = env(Script::default(), events).await;
        env.evm_wallet = None;
        let plan = scenario_a();
        let mut orchestrator = DeploymentOrchestrator::for_plan(&env, &plan);

        let result = orchestrator.run(plan, &ProgressLog::new()).await;

        assert_eq!(result.error.as_deref(), Some("wallet not connected"));
        assert_eq!(orchestrator.history(), &[Idle, Connecting, Failed]);
    }

    #[tokio::test]
    async fn test_unsupported_network_fails_in_network_check() {
        let events = Arc::new(EventLog::default());
        let env = env(Script::default(), events).await;
        let mut plan = scenario_a();
        plan.network = Network::Polygon;
        let mut orchestrator = DeploymentOrchestrator::for_plan(&env, &plan);

        let result = orchestrator.run(plan, &ProgressLog::new()).await;

        assert!(!result.success);
        assert_eq!(orchestrator.history(), &[Idle, Connecting, NetworkCheck, Failed]);
    }

    #[tokio::test]
    async fn test_every_transition_reports_progress() {
        let events = Arc::new(EventLog::default());
        let env = env(Script::default(), events).await;
        let plan = scenario_a();
        let mut orchestrator = DeploymentOrchestrator::for_plan(&env, &plan);
        let log = ProgressLog::new();

        orchestrator.run(plan, &log).await;

        let messages = log.messages();
        for expected in ["Connecting wallet...", "Estimating deployment...", "Deploying...", "Deployment completed"] {
            assert!(messages.iter().any(|m| m == expected), "missing {expected}");
        }
        assert!(messages.iter().any(|m| m.starts_with("Checking network")));
    }

    #[tokio::test]
    async fn test_second_run_is_refused() {
        let events = Arc::new(EventLog::default());
        let env = env(Script::default(), events.clone()).await;
        let plan = scenario_a();
        let mut orchestrator = DeploymentOrchestrator::for_plan(&env, &plan);

        assert!(orchestrator.run(plan.clone(), &ProgressLog::new()).await.success);
        let sent = events.events().len();
        let second = orchestrator.run(plan, &ProgressLog::new()).await;

        assert!(!second.success);
        assert!(second.error.unwrap().contains("already ran"));
        assert_eq!(events.events().len(), sent);
        assert_eq!(orchestrator.state(), Completed);
    }
}
