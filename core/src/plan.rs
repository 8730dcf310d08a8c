use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use stellar_strkey::Strkey;
use thiserror::Error;
use utoipa::ToSchema;

/// Decimal places used by Stellar classic asset amounts.
pub const STELLAR_AMOUNT_DECIMALS: u32 = 7;

/// Default ERC-20 decimals when the plan does not specify any.
pub const DEFAULT_EVM_DECIMALS: u8 = 18;

/// Errors raised while validating a [`DeploymentPlan`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("token standard {standard} is not available on {chain}")]
    StandardMismatch { standard: TokenStandard, chain: Chain },

    #[error("network {network} does not belong to {chain}")]
    NetworkMismatch { network: Network, chain: Chain },

    #[error("token configuration does not match chain {chain}")]
    ConfigMismatch { chain: Chain },

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("malformed token configuration: {0}")]
    Malformed(String),
}

impl PlanError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

// ── Enumerations ──────────────────────────────────────────────────────────────

/// Target chain family. Backend selection is a pure function of this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Chain {
    #[serde(rename = "EVM")]
    Evm,
    Stellar,
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chain::Evm => f.write_str("EVM"),
            Chain::Stellar => f.write_str("Stellar"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum TokenStandard {
    #[serde(rename = "ERC-20")]
    Erc20,
    #[serde(rename = "ERC-721")]
    Erc721,
    #[serde(rename = "ERC-1155")]
    Erc1155,
    ClassicAsset,
    SorobanToken,
}

impl TokenStandard {
    pub fn chain(self) -> Chain {
        match self {
            Self::Erc20 | Self::Erc721 | Self::Erc1155 => Chain::Evm,
            Self::ClassicAsset | Self::SorobanToken => Chain::Stellar,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Erc20 => "ERC-20",
            Self::Erc721 => "ERC-721",
            Self::Erc1155 => "ERC-1155",
            Self::ClassicAsset => "ClassicAsset",
            Self::SorobanToken => "SorobanToken",
        }
    }
}

impl fmt::Display for TokenStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Network {
    #[serde(rename = "polygon-amoy")]
    PolygonAmoy,
    #[serde(rename = "polygon")]
    Polygon,
    #[serde(rename = "testnet")]
    StellarTestnet,
    #[serde(rename = "mainnet")]
    StellarMainnet,
}

impl Network {
    pub const ALL: [Network; 4] = [
        Network::PolygonAmoy,
        Network::Polygon,
        Network::StellarTestnet,
        Network::StellarMainnet,
    ];

    pub fn chain(self) -> Chain {
        match self {
            Self::PolygonAmoy | Self::Polygon => Chain::Evm,
            Self::StellarTestnet | Self::StellarMainnet => Chain::Stellar,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PolygonAmoy => "polygon-amoy",
            Self::Polygon => "polygon",
            Self::StellarTestnet => "testnet",
            Self::StellarMainnet => "mainnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Network::ALL
            .into_iter()
            .find(|n| n.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| PlanError::invalid("network", format!("unknown network `{s}`")))
    }
}

// ── Token configuration ───────────────────────────────────────────────────────

/// One ERC-1155 tranche minted after deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Tranche {
    pub id: u64,
    pub name: String,
    pub supply: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvmTokenConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default, rename = "propertyURI", skip_serializing_if = "Option::is_none")]
    pub property_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_supply: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
    #[serde(default, rename = "baseTokenURI", skip_serializing_if = "Option::is_none")]
    pub base_token_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tranches: Vec<Tranche>,
}

impl EvmTokenConfig {
    pub fn decimals(&self) -> u8 {
        self.decimals.unwrap_or(DEFAULT_EVM_DECIMALS)
    }

    /// Initial supply worth minting: present and not numerically zero.
    pub fn mintable_supply(&self) -> Option<&str> {
        self.initial_supply
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && !is_zero_decimal(s))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StellarTokenConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub asset_code: String,
    #[serde(default, rename = "propertyURI", skip_serializing_if = "Option::is_none")]
    pub property_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_supply: Option<String>,
    #[serde(default)]
    pub auth_required: bool,
    #[serde(default)]
    pub auth_revocable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowlist: Vec<String>,
}

/// Chain-specific token parameters. The variant is chosen by the plan's chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum TokenConfig {
    Evm(EvmTokenConfig),
    Stellar(StellarTokenConfig),
}

impl TokenConfig {
    pub fn chain(&self) -> Chain {
        match self {
            TokenConfig::Evm(_) => Chain::Evm,
            TokenConfig::Stellar(_) => Chain::Stellar,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ComplianceRules {
    #[serde(rename = "requireKYC")]
    pub require_kyc: bool,
    pub lockups: bool,
    pub pausable: bool,
    pub snapshots: bool,
    pub whitelist: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_until: Option<u64>,
    pub auth_required: bool,
    pub auth_revocable: bool,
}

impl ComplianceRules {
    /// Whether the EVM deployment needs a compliance registry contract.
    pub fn needs_registry(&self) -> bool {
        self.require_kyc
            || self.lockups
            || self.pausable
            || self.snapshots
            || !self.whitelist.is_empty()
    }
}

// ── Plan ──────────────────────────────────────────────────────────────────────

/// Declarative description of what to issue and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[serde(try_from = "RawPlan")]
pub struct DeploymentPlan {
    pub chain: Chain,
    pub token_standard: TokenStandard,
    pub network: Network,
    pub token_config: TokenConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_rules: Option<ComplianceRules>,
}

/// Wire shape of a plan before the token configuration is resolved against the chain.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlan {
    chain: Chain,
    token_standard: TokenStandard,
    network: Network,
    #[serde(default)]
    token_config: serde_json::Value,
    #[serde(default)]
    compliance_rules: Option<ComplianceRules>,
}

impl TryFrom<RawPlan> for DeploymentPlan {
    type Error = PlanError;

    fn try_from(raw: RawPlan) -> Result<Self, Self::Error> {
        let value = match raw.token_config {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            other => other,
        };
        let token_config = match raw.chain {
            Chain::Evm => serde_json::from_value(value).map(TokenConfig::Evm),
            Chain::Stellar => serde_json::from_value(value).map(TokenConfig::Stellar),
        }
        .map_err(|e| PlanError::Malformed(e.to_string()))?;

        Ok(Self {
            chain: raw.chain,
            token_standard: raw.token_standard,
            network: raw.network,
            token_config,
            compliance_rules: raw.compliance_rules,
        })
    }
}

impl DeploymentPlan {
    pub fn evm(
        token_standard: TokenStandard,
        network: Network,
        token_config: EvmTokenConfig,
    ) -> Self {
        Self {
            chain: Chain::Evm,
            token_standard,
            network,
            token_config: TokenConfig::Evm(token_config),
            compliance_rules: None,
        }
    }

    pub fn stellar(
        token_standard: TokenStandard,
        network: Network,
        token_config: StellarTokenConfig,
    ) -> Self {
        Self {
            chain: Chain::Stellar,
            token_standard,
            network,
            token_config: TokenConfig::Stellar(token_config),
            compliance_rules: None,
        }
    }

    pub fn with_compliance(mut self, rules: ComplianceRules) -> Self {
        self.compliance_rules = Some(rules);
        self
    }

    pub fn compliance(&self) -> ComplianceRules {
        self.compliance_rules.clone().unwrap_or_default()
    }

    /// Check every structural invariant of the plan without touching the network.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.token_standard.chain() != self.chain {
            return Err(PlanError::StandardMismatch {
                standard: self.token_standard,
                chain: self.chain,
            });
        }
        if self.network.chain() != self.chain {
            return Err(PlanError::NetworkMismatch {
                network: self.network,
                chain: self.chain,
            });
        }
        if self.token_config.chain() != self.chain {
            return Err(PlanError::ConfigMismatch { chain: self.chain });
        }

        let rules = self.compliance();
        match &self.token_config {
            TokenConfig::Evm(cfg) => validate_evm(self.token_standard, cfg, &rules),
            TokenConfig::Stellar(cfg) => validate_stellar(cfg, &rules),
        }
    }
}

fn validate_evm(
    standard: TokenStandard,
    cfg: &EvmTokenConfig,
    rules: &ComplianceRules,
) -> Result<(), PlanError> {
    if cfg.name.trim().is_empty() {
        return Err(PlanError::MissingField("tokenConfig.name"));
    }
    if cfg.symbol.trim().is_empty() && standard != TokenStandard::Erc1155 {
        return Err(PlanError::MissingField("tokenConfig.symbol"));
    }
    if cfg.decimals() > 36 {
        return Err(PlanError::invalid("tokenConfig.decimals", "must be at most 36"));
    }
    if let Some(supply) = cfg.initial_supply.as_deref() {
        check_decimal(
            "tokenConfig.initialSupply",
            supply,
            u32::from(cfg.decimals()),
        )?;
    }
    for tranche in &cfg.tranches {
        check_decimal("tokenConfig.tranches.supply", &tranche.supply, 0)?;
    }
    if !cfg.tranches.is_empty() && standard != TokenStandard::Erc1155 {
        return Err(PlanError::invalid(
            "tokenConfig.tranches",
            "tranches are only supported for ERC-1155",
        ));
    }
    for address in &rules.whitelist {
        if !is_valid_evm_address(address) {
            return Err(PlanError::invalid(
                "complianceRules.whitelist",
                format!("`{address}` is not an EVM address"),
            ));
        }
    }
    if let Some(address) = rules.lock_address.as_deref() {
        if !is_valid_evm_address(address) {
            return Err(PlanError::invalid(
                "complianceRules.lockAddress",
                format!("`{address}` is not an EVM address"),
            ));
        }
    }
    Ok(())
}

fn validate_stellar(cfg: &StellarTokenConfig, rules: &ComplianceRules) -> Result<(), PlanError> {
    let code = cfg.asset_code.trim();
    if code.is_empty() {
        return Err(PlanError::MissingField("tokenConfig.assetCode"));
    }
    if code.len() > 12 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(PlanError::invalid(
            "tokenConfig.assetCode",
            "must be 1-12 alphanumeric characters",
        ));
    }
    for (field, account) in [
        ("tokenConfig.issuerAccount", cfg.issuer_account.as_deref()),
        ("tokenConfig.distributionAccount", cfg.distribution_account.as_deref()),
    ] {
        if let Some(account) = account {
            if !is_valid_stellar_account(account) {
                return Err(PlanError::invalid(
                    field,
                    format!("`{account}` is not a Stellar account"),
                ));
            }
        }
    }
    for account in &cfg.allowlist {
        if !is_valid_stellar_account(account) {
            return Err(PlanError::invalid(
                "tokenConfig.allowlist",
                format!("`{account}` is not a Stellar account"),
            ));
        }
    }
    if let Some(supply) = cfg.initial_supply.as_deref() {
        check_decimal("tokenConfig.initialSupply", supply, STELLAR_AMOUNT_DECIMALS)?;
        // Stellar payments must move a positive amount.
        if is_zero_decimal(supply.trim()) {
            return Err(PlanError::invalid(
                "tokenConfig.initialSupply",
                "must be greater than zero",
            ));
        }
    }
    // Stored on the issuer account as data entries, 64 bytes max each.
    for (field, value) in [
        ("tokenConfig.propertyURI", cfg.property_uri.as_deref()),
        ("tokenConfig.name", cfg.name.as_deref()),
    ] {
        if value.is_some_and(|v| v.len() > 64) {
            return Err(PlanError::invalid(field, "must be at most 64 bytes"));
        }
    }
    if let Some(domain) = cfg.home_domain.as_deref() {
        if domain.is_empty() || domain.len() > 32 || domain.contains('/') || domain.contains(':') {
            return Err(PlanError::invalid(
                "tokenConfig.homeDomain",
                "must be a bare domain of at most 32 characters",
            ));
        }
    }
    if !rules.whitelist.is_empty() {
        return Err(PlanError::invalid(
            "complianceRules.whitelist",
            "use tokenConfig.allowlist for Stellar assets",
        ));
    }
    Ok(())
}

/// Accepts a non-negative decimal with at most `max_fraction` fractional digits.
fn check_decimal(field: &'static str, value: &str, max_fraction: u32) -> Result<(), PlanError> {
    let value = value.trim();
    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    let digits_only = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if whole.is_empty() || !digits_only(whole) || !digits_only(fraction) {
        return Err(PlanError::invalid(
            field,
            format!("`{value}` is not a non-negative decimal number"),
        ));
    }
    if fraction.len() as u32 > max_fraction {
        return Err(PlanError::invalid(
            field,
            format!("at most {max_fraction} decimal places are allowed"),
        ));
    }
    Ok(())
}

fn is_zero_decimal(value: &str) -> bool {
    value.chars().all(|c| c == '0' || c == '.')
}

pub fn is_valid_evm_address(address: &str) -> bool {
    address
        .strip_prefix("0x")
        .map(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

pub fn is_valid_stellar_account(account: &str) -> bool {
    matches!(Strkey::from_string(account), Ok(Strkey::PublicKeyEd25519(_)))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn account(byte: u8) -> String {
        Strkey::PublicKeyEd25519(stellar_strkey::ed25519::PublicKey([byte; 32])).to_string()
    }

    fn erc20_plan() -> DeploymentPlan {
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

    #[test]
    fn test_plan_deserializes_evm_config_from_chain() {
        let json = r#"{
            "chain": "EVM",
            "tokenStandard": "ERC-20",
            "network": "polygon-amoy",
            "tokenConfig": {"name": "X", "symbol": "X", "initialSupply": "1000"}
        }"#;
        let plan: DeploymentPlan = serde_json::from_str(json).unwrap();
        assert_eq!(plan, erc20_plan());
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_plan_deserializes_stellar_config_from_chain() {
        let distribution = account(9);
        let json = format!(
            r#"{{
                "chain": "Stellar",
                "tokenStandard": "ClassicAsset",
                "network": "testnet",
                "tokenConfig": {{"assetCode": "ABC", "distributionAccount": "{distribution}"}}
            }}"#
        );
        let plan: DeploymentPlan = serde_json::from_str(&json).unwrap();
        match &plan.token_config {
            TokenConfig::Stellar(cfg) => {
                assert_eq!(cfg.asset_code, "ABC");
                assert_eq!(cfg.distribution_account.as_deref(), Some(distribution.as_str()));
            }
            other => panic!("expected Stellar config, got {other:?}"),
        }
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_plan_serializes_camel_case() {
        let json = serde_json::to_value(erc20_plan()).unwrap();
        assert_eq!(json["chain"], "EVM");
        assert_eq!(json["tokenStandard"], "ERC-20");
        assert_eq!(json["network"], "polygon-amoy");
        assert_eq!(json["tokenConfig"]["initialSupply"], "1000");
    }

    #[test]
    fn test_validate_rejects_standard_from_other_chain() {
        let mut plan = erc20_plan();
        plan.token_standard = TokenStandard::ClassicAsset;
        assert!(matches!(
            plan.validate(),
            Err(PlanError::StandardMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_network_from_other_chain() {
        let mut plan = erc20_plan();
        plan.network = Network::StellarTestnet;
        assert!(matches!(
            plan.validate(),
            Err(PlanError::NetworkMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_blended_config() {
        let mut plan = erc20_plan();
        plan.token_config = TokenConfig::Stellar(StellarTokenConfig {
            asset_code: "ABC".into(),
            ..Default::default()
        });
        assert_eq!(
            plan.validate(),
            Err(PlanError::ConfigMismatch { chain: Chain::Evm })
        );
    }

    #[test]
    fn test_validate_requires_asset_code() {
        let plan = DeploymentPlan::stellar(
            TokenStandard::ClassicAsset,
            Network::StellarTestnet,
            StellarTokenConfig::default(),
        );
        assert_eq!(
            plan.validate(),
            Err(PlanError::MissingField("tokenConfig.assetCode"))
        );
    }

    #[test]
    fn test_validate_rejects_long_asset_code() {
        let plan = DeploymentPlan::stellar(
            TokenStandard::ClassicAsset,
            Network::StellarTestnet,
            StellarTokenConfig {
                asset_code: "ABCDEFGHIJKLM".into(),
                ..Default::default()
            },
        );
        assert!(matches!(
            plan.validate(),
            Err(PlanError::InvalidField { field: "tokenConfig.assetCode", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_distribution_account() {
        let plan = DeploymentPlan::stellar(
            TokenStandard::ClassicAsset,
            Network::StellarTestnet,
            StellarTokenConfig {
                asset_code: "ABC".into(),
                distribution_account: Some("G123".into()),
                ..Default::default()
            },
        );
        assert!(matches!(
            plan.validate(),
            Err(PlanError::InvalidField { field: "tokenConfig.distributionAccount", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_long_property_uri_on_stellar() {
        let plan = DeploymentPlan::stellar(
            TokenStandard::ClassicAsset,
            Network::StellarTestnet,
            StellarTokenConfig {
                asset_code: "ABC".into(),
                property_uri: Some(format!("ipfs://{}", "a".repeat(64))),
                ..Default::default()
            },
        );
        assert!(matches!(
            plan.validate(),
            Err(PlanError::InvalidField { field: "tokenConfig.propertyURI", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_excess_decimals() {
        let mut plan = erc20_plan();
        if let TokenConfig::Evm(cfg) = &mut plan.token_config {
            cfg.decimals = Some(2);
            cfg.initial_supply = Some("1.125".into());
        }
        assert!(matches!(
            plan.validate(),
            Err(PlanError::InvalidField { field: "tokenConfig.initialSupply", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_whitelist_address() {
        let plan = erc20_plan().with_compliance(ComplianceRules {
            require_kyc: true,
            whitelist: vec!["0x1234".into()],
            ..Default::default()
        });
        assert!(matches!(
            plan.validate(),
            Err(PlanError::InvalidField { field: "complianceRules.whitelist", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_stellar_supply() {
        let plan = DeploymentPlan::stellar(
            TokenStandard::ClassicAsset,
            Network::StellarTestnet,
            StellarTokenConfig {
                asset_code: "ABC".into(),
                distribution_account: Some(account(9)),
                initial_supply: Some("0.000".into()),
                ..Default::default()
            },
        );
        assert!(matches!(
            plan.validate(),
            Err(PlanError::InvalidField { field: "tokenConfig.initialSupply", .. })
        ));
    }

    #[test]
    fn test_mintable_supply_skips_zero() {
        let mut cfg = EvmTokenConfig {
            initial_supply: Some("0.0".into()),
            ..Default::default()
        };
        assert_eq!(cfg.mintable_supply(), None);
        cfg.initial_supply = Some("25".into());
        assert_eq!(cfg.mintable_supply(), Some("25"));
    }

    #[test]
    fn test_network_from_str_case_insensitive() {
        assert_eq!("Polygon-Amoy".parse::<Network>().unwrap(), Network::PolygonAmoy);
        assert_eq!("TESTNET".parse::<Network>().unwrap(), Network::StellarTestnet);
        assert!("ropsten".parse::<Network>().is_err());
    }

    #[test]
    fn test_address_helpers() {
        assert!(is_valid_evm_address(
            "0x742d35Cc6634C0532925a3b8D4C9db96C4b4d8b6"
        ));
        assert!(!is_valid_evm_address("742d35Cc6634C0532925a3b8D4C9db96C4b4d8b6"));
        let valid = account(3);
        assert!(is_valid_stellar_account(&valid));
        assert!(!is_valid_stellar_account(&valid[..55]));
        assert!(!is_valid_stellar_account(
            "CDLZFC3SYJYDZT7K67VZ75HPJVIEUVNIXF47ZG2FB2RMQQVU2HHGCYSC"
        ));
    }
}
