use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::plan::{Chain, Network};

// ── Fee schedules ─────────────────────────────────────────────────────────────

/// How a network prices operations, used only for advisory fee hints.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FeeSchedule {
    /// EVM: gas units are multiplied by a reference gas price.
    #[serde(rename_all = "camelCase")]
    Gas { reference_gas_price_gwei: u64 },
    /// Stellar: every operation pays the base fee (stroops).
    #[serde(rename_all = "camelCase")]
    PerOperation { base_fee_stroops: u32 },
}

/// Static description of a deployment target network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProfile {
    pub network: Network,
    /// Human-readable label for this network.
    pub display_name: String,
    pub chain: Chain,
    /// EIP-155 chain id (EVM only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// Network passphrase (Stellar only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
    /// Default JSON-RPC endpoint, overridable through configuration.
    pub rpc_url: String,
    pub explorer_url: String,
    pub native_currency: String,
    /// Decimal places of the native currency unit used in fee hints.
    pub native_decimals: u32,
    pub fee: FeeSchedule,
}

impl NetworkProfile {
    /// Identifier handed to the wallet when signing: chain id for EVM,
    /// passphrase for Stellar.
    pub fn signing_network_id(&self) -> String {
        match (self.chain_id, &self.passphrase) {
            (Some(id), _) => id.to_string(),
            (None, Some(passphrase)) => passphrase.clone(),
            (None, None) => self.network.to_string(),
        }
    }

    pub fn explorer_tx_url(&self, hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url, hash)
    }

    pub fn explorer_address_url(&self, address: &str) -> String {
        format!("{}/address/{}", self.explorer_url, address)
    }
}

// ── Presets ───────────────────────────────────────────────────────────────────

/// Polygon Amoy testnet.
pub fn polygon_amoy() -> NetworkProfile {
    NetworkProfile {
        network: Network::PolygonAmoy,
        display_name: "Polygon Amoy Testnet".to_string(),
        chain: Chain::Evm,
        chain_id: Some(80_002),
        passphrase: None,
        rpc_url: "https://rpc-amoy.polygon.technology".to_string(),
        explorer_url: "https://www.oklink.com/amoy".to_string(),
        native_currency: "POL".to_string(),
        native_decimals: 18,
        fee: FeeSchedule::Gas {
            reference_gas_price_gwei: 30,
        },
    }
}

/// Polygon PoS mainnet.
pub fn polygon() -> NetworkProfile {
    NetworkProfile {
        network: Network::Polygon,
        display_name: "Polygon".to_string(),
        chain: Chain::Evm,
        chain_id: Some(137),
        passphrase: None,
        rpc_url: "https://polygon-rpc.com".to_string(),
        explorer_url: "https://polygonscan.com".to_string(),
        native_currency: "POL".to_string(),
        native_decimals: 18,
        fee: FeeSchedule::Gas {
            reference_gas_price_gwei: 50,
        },
    }
}

pub fn stellar_testnet() -> NetworkProfile {
    NetworkProfile {
        network: Network::StellarTestnet,
        display_name: "Stellar Testnet".to_string(),
        chain: Chain::Stellar,
        chain_id: None,
        passphrase: Some("Test SDF Network ; September 2015".to_string()),
        rpc_url: "https://soroban-testnet.stellar.org".to_string(),
        explorer_url: "https://testnet.stellarchain.io".to_string(),
        native_currency: "XLM".to_string(),
        native_decimals: 7,
        fee: FeeSchedule::PerOperation {
            base_fee_stroops: 100,
        },
    }
}

pub fn stellar_mainnet() -> NetworkProfile {
    NetworkProfile {
        network: Network::StellarMainnet,
        display_name: "Stellar Mainnet".to_string(),
        chain: Chain::Stellar,
        chain_id: None,
        passphrase: Some("Public Global Stellar Network ; September 2015".to_string()),
        rpc_url: "https://soroban-rpc.mainnet.stellar.gateway.fm".to_string(),
        explorer_url: "https://stellar.expert".to_string(),
        native_currency: "XLM".to_string(),
        native_decimals: 7,
        fee: FeeSchedule::PerOperation {
            base_fee_stroops: 100,
        },
    }
}

/// Profile for a plan network.
pub fn profile(network: Network) -> NetworkProfile {
    match network {
        Network::PolygonAmoy => polygon_amoy(),
        Network::Polygon => polygon(),
        Network::StellarTestnet => stellar_testnet(),
        Network::StellarMainnet => stellar_mainnet(),
    }
}

/// All presets, EVM first.
pub fn all_profiles() -> Vec<NetworkProfile> {
    Network::ALL.into_iter().map(profile).collect()
}

/// Resolve a preset name to the corresponding `NetworkProfile`.
///
/// Recognised names (case-insensitive):
/// - `"polygon-amoy"` / `"amoy"`
/// - `"polygon"` / `"matic"`
/// - `"testnet"` / `"stellar-testnet"`
/// - `"mainnet"` / `"stellar-mainnet"` / `"pubnet"`
pub fn resolve_preset(name: &str) -> Option<NetworkProfile> {
    match name.trim().to_lowercase().as_str() {
        "polygon-amoy" | "amoy" => Some(polygon_amoy()),
        "polygon" | "matic" => Some(polygon()),
        "testnet" | "stellar-testnet" => Some(stellar_testnet()),
        "mainnet" | "stellar-mainnet" | "pubnet" => Some(stellar_mainnet()),
        _ => None,
    }
}

/// Networks a chain backend may deploy to.
pub fn networks_for(chain: Chain) -> Vec<Network> {
    Network::ALL
        .into_iter()
        .filter(|n| n.chain() == chain)
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
