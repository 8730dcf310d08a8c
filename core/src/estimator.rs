//! Turns a [`DeploymentPlan`] into the ordered list of steps a backend will
//! execute, plus an advisory fee hint. Nothing here touches the network.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::networks::{self, FeeSchedule, NetworkProfile};
use crate::plan::{
    DeploymentPlan, EvmTokenConfig, StellarTokenConfig, TokenConfig, TokenStandard,
};

/// Default amount sent to the distribution account when no supply is given.
pub const DEFAULT_DISTRIBUTION_AMOUNT: &str = "1000000";

// Reference gas per EVM step, used only for the fee hint.
const GAS_DEPLOY_TOKEN: u64 = 2_500_000;
const GAS_DEPLOY_REGISTRY: u64 = 1_200_000;
const GAS_CONFIGURE: u64 = 80_000;
const GAS_MINT: u64 = 100_000;
const GAS_MINT_TRANCHE: u64 = 120_000;
const GAS_LOCKUP: u64 = 60_000;
const GAS_KYC_BASE: u64 = 50_000;
const GAS_KYC_PER_ADDRESS: u64 = 25_000;

/// What a step does, with the parameters needed to execute it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    DeployToken { artifact: &'static str },
    DeployComplianceRegistry,
    ConfigureCompliance {
        require_kyc: bool,
        lockups: bool,
        pausable: bool,
        snapshots: bool,
    },
    MintInitialSupply { amount: String },
    MintTranche { id: u64, supply: String },
    SetLockup { address: String, until: u64 },
    ApplyKyc { addresses: Vec<String> },

    SetHomeDomain { domain: String },
    SetAuthFlags { required: bool, revocable: bool },
    CreateAsset,
    DeployAssetContract,
    AuthorizeTrustlines { trustors: Vec<String> },
    DistributeInitialSupply { destination: String, amount: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub kind: StepKind,
    pub description: String,
}

impl PlannedStep {
    fn new(kind: StepKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
        }
    }
}

/// Advisory estimate: step descriptions in execution order and a fee hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStepEstimate {
    pub steps: Vec<String>,
    pub fees_hint: String,
}

/// Solidity artifact deployed for an EVM standard.
pub fn evm_artifact(standard: TokenStandard) -> &'static str {
    match standard {
        TokenStandard::Erc721 => "RealEstateNFT",
        TokenStandard::Erc1155 => "RealEstateMultiToken",
        _ => "RealEstateToken",
    }
}

/// Ordered steps for a plan. Deterministic for a given plan.
pub fn plan_steps(plan: &DeploymentPlan) -> Vec<PlannedStep> {
    match &plan.token_config {
        TokenConfig::Evm(cfg) => evm_steps(plan, cfg),
        TokenConfig::Stellar(cfg) => stellar_steps(plan, cfg),
    }
}

fn evm_steps(plan: &DeploymentPlan, cfg: &EvmTokenConfig) -> Vec<PlannedStep> {
    let rules = plan.compliance();
    let mut steps = vec![PlannedStep::new(
        StepKind::DeployToken {
            artifact: evm_artifact(plan.token_standard),
        },
        format!("Deploy {} token contract", plan.token_standard),
    )];

    let with_registry = rules.needs_registry();
    if with_registry {
        steps.push(PlannedStep::new(
            StepKind::DeployComplianceRegistry,
            "Deploy ComplianceRegistry contract",
        ));
        steps.push(PlannedStep::new(
            StepKind::ConfigureCompliance {
                require_kyc: rules.require_kyc,
                lockups: rules.lockups,
                pausable: rules.pausable,
                snapshots: rules.snapshots,
            },
            "Configure compliance rules",
        ));
    }

    match plan.token_standard {
        TokenStandard::Erc20 => {
            if let Some(supply) = cfg.mintable_supply() {
                steps.push(PlannedStep::new(
                    StepKind::MintInitialSupply {
                        amount: supply.to_string(),
                    },
                    format!("Mint initial supply: {} {}", supply, cfg.symbol),
                ));
            }
        }
        TokenStandard::Erc1155 => {
            for tranche in &cfg.tranches {
                steps.push(PlannedStep::new(
                    StepKind::MintTranche {
                        id: tranche.id,
                        supply: tranche.supply.clone(),
                    },
                    format!(
                        "Mint tranche #{} ({}): {}",
                        tranche.id, tranche.name, tranche.supply
                    ),
                ));
            }
        }
        _ => {}
    }

    if with_registry && rules.lockups {
        if let (Some(address), Some(until)) = (&rules.lock_address, rules.lock_until) {
            steps.push(PlannedStep::new(
                StepKind::SetLockup {
                    address: address.clone(),
                    until,
                },
                format!("Lock {address} until {until}"),
            ));
        }
    }

    if !rules.whitelist.is_empty() {
        steps.push(PlannedStep::new(
            StepKind::ApplyKyc {
                addresses: rules.whitelist.clone(),
            },
            format!("Apply KYC to {} addresses", rules.whitelist.len()),
        ));
    }
    steps
}

fn stellar_steps(plan: &DeploymentPlan, cfg: &StellarTokenConfig) -> Vec<PlannedStep> {
    let rules = plan.compliance();
    let auth_required = cfg.auth_required || rules.auth_required;
    let auth_revocable = cfg.auth_revocable || rules.auth_revocable;
    let mut steps = Vec::new();

    if let Some(domain) = cfg.home_domain.as_deref() {
        steps.push(PlannedStep::new(
            StepKind::SetHomeDomain {
                domain: domain.to_string(),
            },
            "Set home domain for issuer account",
        ));
    }
    if auth_required || auth_revocable {
        steps.push(PlannedStep::new(
            StepKind::SetAuthFlags {
                required: auth_required,
                revocable: auth_revocable,
            },
            "Set account flags (AUTH_REQUIRED, AUTH_REVOCABLE)",
        ));
    }

    steps.push(PlannedStep::new(
        StepKind::CreateAsset,
        format!("Create {} asset", cfg.asset_code),
    ));

    if plan.token_standard == TokenStandard::SorobanToken {
        steps.push(PlannedStep::new(
            StepKind::DeployAssetContract,
            format!("Deploy Stellar Asset Contract for {}", cfg.asset_code),
        ));
    }

    if auth_required {
        let mut trustors: Vec<String> = cfg.distribution_account.iter().cloned().collect();
        for account in &cfg.allowlist {
            if !trustors.contains(account) {
                trustors.push(account.clone());
            }
        }
        if !trustors.is_empty() {
            let description = if cfg.allowlist.is_empty() {
                "Authorize distribution account trustline".to_string()
            } else {
                format!("Authorize trustlines for {} accounts", trustors.len())
            };
            steps.push(PlannedStep::new(
                StepKind::AuthorizeTrustlines { trustors },
                description,
            ));
        }
    }

    if let Some(destination) = cfg.distribution_account.as_deref() {
        let amount = cfg
            .initial_supply
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_DISTRIBUTION_AMOUNT);
        steps.push(PlannedStep::new(
            StepKind::DistributeInitialSupply {
                destination: destination.to_string(),
                amount: amount.to_string(),
            },
            "Send initial payment to distribution account",
        ));
    }
    steps
}

/// Number of ledger operations a Stellar step submits.
pub fn stellar_operation_count(kind: &StepKind, cfg: &StellarTokenConfig) -> u64 {
    match kind {
        StepKind::CreateAsset => {
            1 + u64::from(cfg.property_uri.is_some()) + u64::from(cfg.name.is_some())
        }
        StepKind::AuthorizeTrustlines { trustors } => trustors.len() as u64,
        _ => 1,
    }
}

fn reference_gas(kind: &StepKind) -> u64 {
    match kind {
        StepKind::DeployToken { .. } => GAS_DEPLOY_TOKEN,
        StepKind::DeployComplianceRegistry => GAS_DEPLOY_REGISTRY,
        StepKind::ConfigureCompliance { .. } => GAS_CONFIGURE,
        StepKind::MintInitialSupply { .. } => GAS_MINT,
        StepKind::MintTranche { .. } => GAS_MINT_TRANCHE,
        StepKind::SetLockup { .. } => GAS_LOCKUP,
        StepKind::ApplyKyc { addresses } => {
            GAS_KYC_BASE + GAS_KYC_PER_ADDRESS * addresses.len() as u64
        }
        _ => 0,
    }
}

/// Render `units / 10^decimals` without floating point, trimming trailing zeros.
fn format_units(units: u128, decimals: u32) -> String {
    let scale = 10u128.pow(decimals);
    let whole = units / scale;
    let fraction = units % scale;
    if fraction == 0 {
        return whole.to_string();
    }
    let digits = format!("{fraction:0width$}", width = decimals as usize);
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

fn fees_hint(plan: &DeploymentPlan, steps: &[PlannedStep], profile: &NetworkProfile) -> String {
    match (profile.fee, &plan.token_config) {
        (FeeSchedule::Gas { reference_gas_price_gwei }, _) => {
            let gas: u64 = steps.iter().map(|s| reference_gas(&s.kind)).sum();
            let wei = u128::from(gas) * u128::from(reference_gas_price_gwei) * 1_000_000_000;
            format!(
                "Estimated fees: ~{} {} ({} gas at {} gwei reference price)",
                format_units(wei, profile.native_decimals),
                profile.native_currency,
                gas,
                reference_gas_price_gwei
            )
        }
        (FeeSchedule::PerOperation { base_fee_stroops }, TokenConfig::Stellar(cfg)) => {
            let ops: u64 = steps
                .iter()
                .map(|s| stellar_operation_count(&s.kind, cfg))
                .sum();
            let stroops = u128::from(ops) * u128::from(base_fee_stroops);
            let mut hint = format!(
                "Estimated fees: {} {} ({} operations at {} stroops each)",
                format_units(stroops, profile.native_decimals),
                profile.native_currency,
                ops,
                base_fee_stroops
            );
            if steps
                .iter()
                .any(|s| s.kind == StepKind::DeployAssetContract)
            {
                hint.push_str(" plus the Soroban resource fee");
            }
            hint
        }
        (FeeSchedule::PerOperation { .. }, TokenConfig::Evm(_)) => String::new(),
    }
}

/// Steps and fee hint for `plan`. Pure and idempotent.
pub fn estimate(plan: &DeploymentPlan) -> DeploymentStepEstimate {
    let steps = plan_steps(plan);
    let profile = networks::profile(plan.network);
    DeploymentStepEstimate {
        fees_hint: fees_hint(plan, &steps, &profile),
        steps: steps.into_iter().map(|s| s.description).collect(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
