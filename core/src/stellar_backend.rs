use soroban_sdk::xdr::{Asset, Operation};
use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::BackendError;
use crate::estimator::{plan_steps, StepKind};
use crate::networks::{self, FeeSchedule, NetworkProfile};
use crate::plan::{Chain, DeploymentPlan, Network, StellarTokenConfig, TokenConfig};
use crate::progress::ProgressSink;
use crate::result::{DeploymentLedger, DeploymentResult};
use crate::stellar_rpc::StellarEndpoint;
use crate::stellar_tx::{self, TomlInfo};
use crate::submitter::{SubmitterConfig, TerminalOutcome, TransactionStatus, TransactionSubmitter};
use crate::wallet::{SharedWallet, WalletSession};

const DEFAULT_BASE_FEE_STROOPS: u32 = 100;

struct ActiveNetwork {
    profile: NetworkProfile,
    passphrase: String,
    endpoint: Arc<dyn StellarEndpoint>,
}

/// Issues a classic Stellar asset from the connected account and, for
/// Soroban tokens, deploys its Stellar Asset Contract.
pub struct StellarBackend {
    endpoints: HashMap<Network, Arc<dyn StellarEndpoint>>,
    wallet: Option<SharedWallet>,
    submitter_config: SubmitterConfig,
    account: Option<String>,
    active: Option<ActiveNetwork>,
}

impl StellarBackend {
    pub fn new(
        endpoints: HashMap<Network, Arc<dyn StellarEndpoint>>,
        wallet: Option<SharedWallet>,
        submitter_config: SubmitterConfig,
    ) -> Self {
        Self {
            endpoints,
            wallet,
            submitter_config,
            account: None,
            active: None,
        }
    }

    pub async fn connect_wallet(&mut self) -> Result<String, BackendError> {
        let wallet = self.wallet.as_ref().ok_or(BackendError::WalletNotConnected)?;
        let account = wallet.public_key().await?;
        stellar_tx::parse_account_id(&account)?;
        tracing::info!(account = %account, "Stellar wallet connected");
        self.account = Some(account.clone());
        Ok(account)
    }

    pub async fn ensure_network(&mut self, plan: &DeploymentPlan) -> Result<(), BackendError> {
        if plan.network.chain() != Chain::Stellar {
            return Err(BackendError::unsupported(plan.network, "not a Stellar network"));
        }
        let endpoint = self
            .endpoints
            .get(&plan.network)
            .cloned()
            .ok_or_else(|| BackendError::unsupported(plan.network, "no RPC endpoint configured"))?;
        let profile = networks::profile(plan.network);
        let passphrase = profile
            .passphrase
            .clone()
            .ok_or_else(|| BackendError::unsupported(plan.network, "network has no passphrase"))?;
        tracing::info!(network = %plan.network, "Stellar network ready");
        self.active = Some(ActiveNetwork {
            profile,
            passphrase,
            endpoint,
        });
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
        let TokenConfig::Stellar(cfg) = &plan.token_config else {
            return DeploymentResult::failure("token configuration is not a Stellar configuration");
        };
        if let Err(e) = plan.validate() {
            return DeploymentResult::failure(e.to_string());
        }
        if let Some(issuer) = cfg.issuer_account.as_deref() {
            if issuer != account.as_str() {
                return DeploymentResult::failure(format!(
                    "issuer account {issuer} does not match connected account {account}"
                ));
            }
        }
        let asset = match stellar_tx::credit_asset(&cfg.asset_code, account) {
            Ok(asset) => asset,
            Err(e) => return DeploymentResult::failure(e.to_string()),
        };

        let run = StellarRun {
            issuer: account,
            wallet,
            cfg,
            asset,
            passphrase: &active.passphrase,
            base_fee: match active.profile.fee {
                FeeSchedule::PerOperation { base_fee_stroops } => base_fee_stroops,
                FeeSchedule::Gas { .. } => DEFAULT_BASE_FEE_STROOPS,
            },
            endpoint: &active.endpoint,
            submitter: TransactionSubmitter::new(Arc::clone(&active.endpoint), self.submitter_config),
        };
        let mut ledger = DeploymentLedger::new(active.profile.clone());

        let steps = plan_steps(plan);
        let total = steps.len();
        sink.report("Starting Stellar asset deployment...");
        for (index, step) in steps.iter().enumerate() {
            sink.report(&format!("[{}/{}] {}...", index + 1, total, step.description));
            match run.execute(&step.kind, &mut ledger).await {
                Ok(hash) => {
                    sink.report(&format!("[{}/{}] {} confirmed ({hash})", index + 1, total, step.description));
                }
                Err(e) => {
                    tracing::error!(step = %step.description, error = %e, "Stellar deployment step failed");
                    sink.report(&format!("Stellar deployment failed: {e}"));
                    return ledger.fail(e.to_string());
                }
            }
        }
        sink.report("Stellar asset deployment completed successfully!");
        ledger.succeed()
    }
}

struct StellarRun<'a> {
    issuer: &'a str,
    wallet: &'a SharedWallet,
    cfg: &'a StellarTokenConfig,
    asset: Asset,
    passphrase: &'a str,
    base_fee: u32,
    endpoint: &'a Arc<dyn StellarEndpoint>,
    submitter: TransactionSubmitter<dyn StellarEndpoint>,
}

impl StellarRun<'_> {
    async fn execute(&self, kind: &StepKind, ledger: &mut DeploymentLedger) -> Result<String, BackendError> {
        let cfg = self.cfg;
        let outcome = match kind {
            StepKind::SetHomeDomain { domain } => {
                let outcome = self
                    .transact(vec![stellar_tx::set_home_domain(domain)?], false, ledger)
                    .await?;
                ledger.artifact("tomlUrl", stellar_tx::toml_url(domain));
                ledger.artifact(
                    "tomlContent",
                    stellar_tx::stellar_toml(&TomlInfo {
                        asset_code: &cfg.asset_code,
                        issuer: self.issuer,
                        name: cfg.name.as_deref().unwrap_or(&cfg.asset_code),
                        description: cfg.description.as_deref(),
                        property_uri: cfg.property_uri.as_deref(),
                    }),
                );
                outcome
            }
            StepKind::SetAuthFlags { required, revocable } => {
                self.transact(vec![stellar_tx::set_auth_flags(*required, *revocable)], false, ledger)
                    .await?
            }
            StepKind::CreateAsset => {
                let mut ops = vec![stellar_tx::manage_data("asset_code", &cfg.asset_code)?];
                if let Some(uri) = cfg.property_uri.as_deref() {
                    ops.push(stellar_tx::manage_data("property_uri", uri)?);
                }
                if let Some(name) = cfg.name.as_deref() {
                    ops.push(stellar_tx::manage_data("token_name", name)?);
                }
                let outcome = self.transact(ops, false, ledger).await?;
                ledger.artifact("assetCode", cfg.asset_code.clone());
                ledger.artifact("issuer", self.issuer);
                ledger.artifact("assetId", format!("{}:{}", cfg.asset_code, self.issuer));
                outcome
            }
            StepKind::DeployAssetContract => {
                let op = stellar_tx::deploy_asset_contract(self.asset.clone());
                let outcome = self.transact(vec![op], true, ledger).await?;
                ledger.artifact(
                    "contractId",
                    stellar_tx::asset_contract_id(&self.asset, self.passphrase)?,
                );
                outcome
            }
            StepKind::AuthorizeTrustlines { trustors } => {
                let ops = trustors
                    .iter()
                    .map(|t| stellar_tx::authorize_trustline(t, self.asset.clone()))
                    .collect::<Result<Vec<_>, _>>()?;
                self.transact(ops, false, ledger).await?
            }
            StepKind::DistributeInitialSupply { destination, amount } => {
                let amount = stellar_tx::parse_amount(amount)?;
                let op = stellar_tx::payment(destination, self.asset.clone(), amount)?;
                let outcome = self.transact(vec![op], false, ledger).await?;
                ledger.artifact("distributionAccount", destination.clone());
                outcome
            }
            other => {
                return Err(BackendError::Precondition(format!(
                    "step {other:?} cannot run on a Stellar network"
                )))
            }
        };
        Ok(outcome.hash)
    }

    /// Build a transaction from the issuer's next sequence number, sign it,
    /// submit it, and wait for a terminal status. Soroban transactions are
    /// simulated first to obtain their resource footprint and fee.
    async fn transact(
        &self,
        operations: Vec<Operation>,
        soroban: bool,
        ledger: &mut DeploymentLedger,
    ) -> Result<TerminalOutcome, BackendError> {
        let sequence = self.endpoint.account_sequence(self.issuer).await? + 1;
        let mut tx = stellar_tx::build_transaction(self.issuer, sequence, self.base_fee, operations)?;

        if soroban {
            let draft = stellar_tx::unsigned_envelope_xdr(tx.clone())?;
            let simulation = self.endpoint.simulate(&draft).await?;
            if let Some(error) = simulation.error {
                return Err(BackendError::Simulation(error));
            }
            let data = simulation
                .transaction_data
                .ok_or_else(|| BackendError::Simulation("no transaction data returned".to_string()))?;
            tx = stellar_tx::assemble_soroban(tx, data, simulation.min_resource_fee, simulation.auth)?;
        }

        let envelope = stellar_tx::unsigned_envelope_xdr(tx)?;
        let signed = self.wallet.sign(&envelope, self.passphrase).await?;
        let outcome = self.submitter.submit_and_wait(&signed).await?;
        match outcome.status {
            TransactionStatus::Success => {
                ledger.confirmed(&outcome.hash);
                Ok(outcome)
            }
            _ => Err(BackendError::TransactionFailed { hash: outcome.hash }),
        }
    }
}
