use ethers::abi::Token;
use ethers::types::{Address, U256};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::BackendError;
use crate::estimator::{plan_steps, StepKind};
use crate::evm_abi::{self, ArtifactStore};
use crate::evm_rpc::EvmEndpoint;
use crate::networks::{self, NetworkProfile};
use crate::plan::{Chain, DeploymentPlan, EvmTokenConfig, Network, TokenConfig, TokenStandard};
use crate::progress::ProgressSink;
use crate::result::{DeploymentLedger, DeploymentResult};
use crate::submitter::{SubmitterConfig, TerminalOutcome, TransactionStatus, TransactionSubmitter};
use crate::wallet::{SharedWallet, WalletSession};

const COMPLIANCE_REGISTRY_ARTIFACT: &str = "ComplianceRegistry";

/// Gas estimates are padded by this percentage before signing.
const GAS_HEADROOM_PERCENT: u64 = 20;

/// Network the backend has been bound to by `ensure_network`.
struct ActiveNetwork {
    profile: NetworkProfile,
    endpoint: Arc<dyn EvmEndpoint>,
}

/// Deploys RealEstate token contracts and the optional compliance registry
/// on EVM networks, one transaction at a time.
pub struct EvmBackend {
    endpoints: HashMap<Network, Arc<dyn EvmEndpoint>>,
    wallet: Option<SharedWallet>,
    artifacts: Arc<ArtifactStore>,
    submitter_config: SubmitterConfig,
    account: Option<String>,
    active: Option<ActiveNetwork>,
}

impl EvmBackend {
    pub fn new(
        endpoints: HashMap<Network, Arc<dyn EvmEndpoint>>,
        wallet: Option<SharedWallet>,
        artifacts: Arc<ArtifactStore>,
        submitter_config: SubmitterConfig,
    ) -> Self {
        Self {
            endpoints,
            wallet,
            artifacts,
            submitter_config,
            account: None,
            active: None,
        }
    }

    pub async fn connect_wallet(&mut self) -> Result<String, BackendError> {
        let wallet = self.wallet.as_ref().ok_or(BackendError::WalletNotConnected)?;
        let account = wallet.public_key().await?;
        evm_abi::parse_address(&account)?;
        tracing::info!(account = %account, "EVM wallet connected");
        self.account = Some(account.clone());
        Ok(account)
    }

    /// Bind to the plan's network, checking the endpoint serves the expected
    /// chain id.
    pub async fn ensure_network(&mut self, plan: &DeploymentPlan) -> Result<(), BackendError> {
        if plan.network.chain() != Chain::Evm {
            return Err(BackendError::unsupported(plan.network, "not an EVM network"));
        }
        let endpoint = self
            .endpoints
            .get(&plan.network)
            .cloned()
            .ok_or_else(|| BackendError::unsupported(plan.network, "no RPC endpoint configured"))?;
        let profile = networks::profile(plan.network);
        let expected = profile.chain_id.unwrap_or_default();
        let reported = endpoint.chain_id().await?;
        if reported != expected {
            return Err(BackendError::unsupported(
                plan.network,
                format!("endpoint reports chain id {reported}, expected {expected}"),
            ));
        }
        tracing::info!(network = %plan.network, chain_id = reported, "EVM network ready");
        self.active = Some(ActiveNetwork { profile, endpoint });
        Ok(())
    }

    pub async fn deploy(&self, plan: &DeploymentPlan, sink: &dyn ProgressSink) -> DeploymentResult {
        let (Some(account), Some(wallet)) = (&self.account, &self.wallet) else {
            return DeploymentResult::failure(BackendError::WalletNotConnected.to_string());
        };
        let Some(active) = &self.active else {
            return DeploymentResult::failure(
                BackendError::unsupported(plan.network, "network not checked").to_string(),
            );
        };
        let TokenConfig::Evm(cfg) = &plan.token_config else {
            return DeploymentResult::failure("token configuration is not an EVM configuration");
        };
        if let Err(e) = plan.validate() {
            return DeploymentResult::failure(e.to_string());
        }

        let run = EvmRun {
            account,
            wallet,
            plan,
            cfg,
            profile: &active.profile,
            endpoint: &active.endpoint,
            artifacts: &self.artifacts,
            submitter: TransactionSubmitter::new(Arc::clone(&active.endpoint), self.submitter_config),
        };
        let mut ledger = DeploymentLedger::new(active.profile.clone());
        let steps = plan_steps(plan);
        let total = steps.len();

        sink.report(&format!("Starting deployment on {}...", active.profile.display_name));
        for (index, step) in steps.iter().enumerate() {
            sink.report(&format!("[{}/{}] {}...", index + 1, total, step.description));
            match run.execute(&step.kind, &mut ledger).await {
                Ok(hash) => {
                    sink.report(&format!("[{}/{}] {} confirmed ({hash})", index + 1, total, step.description));
                }
                Err(e) => {
                    tracing::error!(step = %step.description, error = %e, "EVM deployment step failed");
                    sink.report(&format!("Deployment failed: {e}"));
                    return ledger.fail(e.to_string());
                }
            }
        }
        sink.report("Deployment completed successfully!");
        ledger.succeed()
    }
}

/// Borrowed state for one `deploy` call.
struct EvmRun<'a> {
    account: &'a str,
    wallet: &'a SharedWallet,
    plan: &'a DeploymentPlan,
    cfg: &'a EvmTokenConfig,
    profile: &'a NetworkProfile,
    endpoint: &'a Arc<dyn EvmEndpoint>,
    artifacts: &'a ArtifactStore,
    submitter: TransactionSubmitter<dyn EvmEndpoint>,
}

impl EvmRun<'_> {
    /// Run one step and return the hash of its confirmed transaction.
    async fn execute(&self, kind: &StepKind, ledger: &mut DeploymentLedger) -> Result<String, BackendError> {
        let outcome = match kind {
            StepKind::DeployToken { artifact } => {
                let outcome = self.deploy_contract(artifact, &self.constructor_args()?, ledger).await?;
                ledger.artifact("tokenAddress", contract_address(&outcome)?);
                outcome
            }
            StepKind::DeployComplianceRegistry => {
                let token = self.artifact_address(ledger, "tokenAddress")?;
                let outcome = self
                    .deploy_contract(COMPLIANCE_REGISTRY_ARTIFACT, &[Token::Address(token)], ledger)
                    .await?;
                ledger.artifact("complianceRegistry", contract_address(&outcome)?);
                outcome
            }
            StepKind::ConfigureCompliance {
                require_kyc,
                lockups,
                pausable,
                snapshots,
            } => {
                let registry = self.artifact_address(ledger, "complianceRegistry")?;
                let data = evm_abi::call_data(
                    "configure(bool,bool,bool,bool)",
                    &[
                        Token::Bool(*require_kyc),
                        Token::Bool(*lockups),
                        Token::Bool(*pausable),
                        Token::Bool(*snapshots),
                    ],
                );
                self.transact(Some(registry), data, ledger).await?
            }
            StepKind::MintInitialSupply { amount } => {
                let token = self.artifact_address(ledger, "tokenAddress")?;
                let units = evm_abi::scale_amount(amount, self.cfg.decimals())?;
                let data = evm_abi::call_data(
                    "mint(address,uint256)",
                    &[Token::Address(self.account_address()?), Token::Uint(units)],
                );
                self.transact(Some(token), data, ledger).await?
            }
            StepKind::MintTranche { id, supply } => {
                let token = self.artifact_address(ledger, "tokenAddress")?;
                let units = evm_abi::scale_amount(supply, 0)?;
                let data = evm_abi::call_data(
                    "mint(address,uint256,uint256,bytes)",
                    &[
                        Token::Address(self.account_address()?),
                        Token::Uint(U256::from(*id)),
                        Token::Uint(units),
                        Token::Bytes(Vec::new()),
                    ],
                );
                self.transact(Some(token), data, ledger).await?
            }
            StepKind::SetLockup { address, until } => {
                let registry = self.artifact_address(ledger, "complianceRegistry")?;
                let data = evm_abi::call_data(
                    "setLockup(address,uint64)",
                    &[
                        Token::Address(evm_abi::parse_address(address)?),
                        Token::Uint(U256::from(*until)),
                    ],
                );
                self.transact(Some(registry), data, ledger).await?
            }
            StepKind::ApplyKyc { addresses } => {
                let target = match ledger.get("complianceRegistry") {
                    Some(_) => self.artifact_address(ledger, "complianceRegistry")?,
                    None => self.artifact_address(ledger, "tokenAddress")?,
                };
                let accounts = addresses
                    .iter()
                    .map(|a| evm_abi::parse_address(a).map(Token::Address))
                    .collect::<Result<Vec<_>, _>>()?;
                let data = evm_abi::call_data(
                    "setKycStatus(address[],bool)",
                    &[Token::Array(accounts), Token::Bool(true)],
                );
                self.transact(Some(target), data, ledger).await?
            }
            other => {
                return Err(BackendError::Precondition(format!(
                    "step {other:?} cannot run on an EVM network"
                )))
            }
        };
        Ok(outcome.hash)
    }

    fn constructor_args(&self) -> Result<Vec<Token>, BackendError> {
        let cfg = self.cfg;
        let property_uri = cfg.property_uri.clone().unwrap_or_default();
        Ok(match self.plan.token_standard {
            TokenStandard::Erc721 => vec![
                Token::String(cfg.name.clone()),
                Token::String(cfg.symbol.clone()),
                Token::String(cfg.base_token_uri.clone().unwrap_or(property_uri)),
            ],
            TokenStandard::Erc1155 => vec![Token::String(
                cfg.base_token_uri.clone().unwrap_or(property_uri),
            )],
            TokenStandard::Erc20 => vec![
                Token::String(cfg.name.clone()),
                Token::String(cfg.symbol.clone()),
                Token::Uint(U256::from(cfg.decimals())),
                Token::String(property_uri),
            ],
            other => {
                return Err(BackendError::unsupported(
                    self.plan.network,
                    format!("{other} is not an EVM token standard"),
                ))
            }
        })
    }

    async fn deploy_contract(
        &self,
        artifact: &str,
        constructor: &[Token],
        ledger: &mut DeploymentLedger,
    ) -> Result<TerminalOutcome, BackendError> {
        let artifact = self.artifacts.load(artifact).await?;
        let data = evm_abi::deployment_data(&artifact, constructor)?;
        self.transact(None, data, ledger).await
    }

    /// Build, sign, submit and confirm a single transaction.
    async fn transact(
        &self,
        to: Option<Address>,
        data: Vec<u8>,
        ledger: &mut DeploymentLedger,
    ) -> Result<TerminalOutcome, BackendError> {
        let mut request = json!({
            "from": self.account,
            "data": evm_abi::hex_data(&data),
            "value": "0x0",
        });
        if let Some(to) = to {
            request["to"] = json!(to);
        }

        let gas = self.endpoint.estimate_gas(&request).await?;
        let gas = gas + gas * GAS_HEADROOM_PERCENT / 100;
        let nonce = self.endpoint.transaction_count(self.account).await?;
        let gas_price = self.endpoint.gas_price().await?;
        request["gas"] = json!(gas);
        request["gasPrice"] = json!(gas_price);
        request["nonce"] = json!(nonce);
        request["chainId"] = Value::String(format!("{:#x}", self.profile.chain_id.unwrap_or_default()));

        let signed = self
            .wallet
            .sign(&request.to_string(), &self.profile.signing_network_id())
            .await?;
        let outcome = self.submitter.submit_and_wait(&signed).await?;
        match outcome.status {
            TransactionStatus::Success => {
                ledger.confirmed(&outcome.hash);
                Ok(outcome)
            }
            _ => Err(BackendError::TransactionFailed { hash: outcome.hash }),
        }
    }

    fn account_address(&self) -> Result<Address, BackendError> {
        Ok(evm_abi::parse_address(self.account)?)
    }

    fn artifact_address(&self, ledger: &DeploymentLedger, key: &str) -> Result<Address, BackendError> {
        let value = ledger
            .get(key)
            .ok_or_else(|| BackendError::Precondition(format!("{key} is not available yet")))?;
        Ok(evm_abi::parse_address(value)?)
    }
}

fn contract_address(outcome: &TerminalOutcome) -> Result<String, BackendError> {
    outcome
        .raw
        .get("contractAddress")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            BackendError::Precondition(format!("receipt for {} has no contract address", outcome.hash))
        })
}
