use config::{Config, ConfigError};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::backend::ChainEnvironment;
use crate::evm_abi::ArtifactStore;
use crate::evm_rpc::{EvmEndpoint, EvmRpcClient};
use crate::networks;
use crate::plan::{Chain, Network};
use crate::rpc_provider::{ProbeKind, ProviderRegistry, RpcProvider};
use crate::stellar_rpc::{StellarEndpoint, StellarRpcClient};
use crate::submitter::SubmitterConfig;
use crate::wallet::{KeypairWallet, NodeSignerWallet, SharedWallet, WalletError};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid STELLAR_SECRET_SEED: {0}")]
    Wallet(#[from] WalletError),
}

/// Process configuration read from the environment (and `.env`).
#[derive(Clone, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub rust_log: String,
    /// Comma-separated RPC URLs per network, in failover order.
    pub polygon_amoy_rpc_url: Option<String>,
    pub polygon_rpc_url: Option<String>,
    pub stellar_testnet_rpc_url: Option<String>,
    pub stellar_mainnet_rpc_url: Option<String>,
    pub poll_interval_ms: u64,
    pub submission_timeout_secs: u64,
    pub health_check_interval_secs: u64,
    pub artifacts_dir: String,
    pub stellar_secret_seed: Option<String>,
    pub evm_signer_url: Option<String>,
    pub evm_signer_address: Option<String>,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("server_port", &self.server_port)
            .field("rust_log", &self.rust_log)
            .field("polygon_amoy_rpc_url", &self.polygon_amoy_rpc_url)
            .field("polygon_rpc_url", &self.polygon_rpc_url)
            .field("stellar_testnet_rpc_url", &self.stellar_testnet_rpc_url)
            .field("stellar_mainnet_rpc_url", &self.stellar_mainnet_rpc_url)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("submission_timeout_secs", &self.submission_timeout_secs)
            .field("health_check_interval_secs", &self.health_check_interval_secs)
            .field("artifacts_dir", &self.artifacts_dir)
            .field(
                "stellar_secret_seed",
                &self.stellar_secret_seed.as_ref().map(|_| "<redacted>"),
            )
            .field("evm_signer_url", &self.evm_signer_url)
            .field("evm_signer_address", &self.evm_signer_address)
            .finish()
    }
}

fn build_config(environment: config::Environment) -> Result<AppConfig, ConfigError> {
    Config::builder()
        .add_source(environment)
        .set_default("server_port", 8080)?
        .set_default("rust_log", "info")?
        .set_default("poll_interval_ms", 1000)?
        .set_default("submission_timeout_secs", 120)?
        .set_default("health_check_interval_secs", 60)?
        .set_default("artifacts_dir", "artifacts")?
        .build()?
        .try_deserialize()
}

pub fn load_config() -> Result<AppConfig, ConfigError> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    build_config(config::Environment::default())
}

impl AppConfig {
    /// RPC URLs for `network`: configured list, else the preset default.
    pub fn rpc_urls(&self, network: Network) -> Vec<String> {
        let configured = match network {
            Network::PolygonAmoy => &self.polygon_amoy_rpc_url,
            Network::Polygon => &self.polygon_rpc_url,
            Network::StellarTestnet => &self.stellar_testnet_rpc_url,
            Network::StellarMainnet => &self.stellar_mainnet_rpc_url,
        };
        let urls: Vec<String> = configured
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect();
        if urls.is_empty() {
            vec![networks::profile(network).rpc_url]
        } else {
            urls
        }
    }

    pub fn submitter_config(&self) -> SubmitterConfig {
        SubmitterConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            timeout: Duration::from_secs(self.submission_timeout_secs),
        }
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs.max(1))
    }
}

/// Wired-up clients, wallets and the provider registries behind them.
pub struct Runtime {
    pub environment: ChainEnvironment,
    pub registries: HashMap<Network, Arc<ProviderRegistry>>,
}

impl Runtime {
    pub fn build(config: &AppConfig) -> Result<Self, SettingsError> {
        let mut environment = ChainEnvironment::new(
            Arc::new(ArtifactStore::new(&config.artifacts_dir)),
            config.submitter_config(),
        );
        let mut registries = HashMap::new();

        for network in Network::ALL {
            let providers = config
                .rpc_urls(network)
                .into_iter()
                .enumerate()
                .map(|(i, url)| RpcProvider::public(format!("{network}-{i}"), url))
                .collect();
            match network.chain() {
                Chain::Evm => {
                    let registry = ProviderRegistry::new(providers, ProbeKind::EvmBlockNumber);
                    let client: Arc<dyn EvmEndpoint> = Arc::new(EvmRpcClient::new(Arc::clone(&registry)));
                    environment.evm_endpoints.insert(network, client);
                    registries.insert(network, registry);
                }
                Chain::Stellar => {
                    let registry = ProviderRegistry::new(providers, ProbeKind::StellarLatestLedger);
                    let client: Arc<dyn StellarEndpoint> =
                        Arc::new(StellarRpcClient::new(Arc::clone(&registry)));
                    environment.stellar_endpoints.insert(network, client);
                    registries.insert(network, registry);
                }
            }
        }

        if let Some(seed) = config.stellar_secret_seed.as_deref().filter(|s| !s.trim().is_empty()) {
            let wallet = KeypairWallet::from_secret_seed(seed)?;
            tracing::info!(account = %wallet.public_address(), "Stellar keypair wallet loaded");
            environment.stellar_wallet = Some(SharedWallet::new(wallet));
        }
        if let Some(url) = config.evm_signer_url.as_deref().filter(|s| !s.trim().is_empty()) {
            let signer = ProviderRegistry::new(
                vec![RpcProvider::public("evm-signer", url)],
                ProbeKind::EvmBlockNumber,
            );
            environment.evm_wallet = Some(SharedWallet::new(NodeSignerWallet::new(
                signer,
                config.evm_signer_address.clone(),
            )));
            tracing::info!(signer = %url, "EVM node signer configured");
        }

        Ok(Self {
            environment,
            registries,
        })
    }

    /// Start one background health checker per network.
    pub fn spawn_health_checkers(&self, interval: Duration) {
        for registry in self.registries.values() {
            registry.spawn_health_checker(interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> AppConfig {
        build_config(config::Environment::with_prefix("TOKENEASY_SETTINGS_TEST")).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = defaults();
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.rust_log, "info");
        assert_eq!(config.artifacts_dir, "artifacts");
        assert_eq!(
            config.submitter_config(),
            SubmitterConfig {
                poll_interval: Duration::from_secs(1),
                timeout: Duration::from_secs(120),
            }
        );
        assert!(config.stellar_secret_seed.is_none());
    }

    #[test]
    fn test_rpc_url_override_list() {
        let mut config = defaults();
        config.stellar_testnet_rpc_url = Some("https://a.example, https://b.example".into());
        assert_eq!(
            config.rpc_urls(Network::StellarTestnet),
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(
            config.rpc_urls(Network::Polygon),
            vec![networks::polygon().rpc_url]
        );
    }

    #[test]
    fn test_secret_seed_is_redacted() {
        let mut config = defaults();
        config.stellar_secret_seed = Some("SSECRET".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("SSECRET"));
        assert!(debug.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_runtime_wires_every_network() {
        let mut config = defaults();
        let wallet = KeypairWallet::generate();
        config.stellar_secret_seed = Some(wallet.secret_seed());
        let runtime = Runtime::build(&config).unwrap();

        for network in Network::ALL {
            assert!(runtime.environment.has_endpoint(network), "{network}");
            assert!(runtime.registries.contains_key(&network));
        }
        assert!(runtime.environment.stellar_wallet.is_some());
        assert!(runtime.environment.evm_wallet.is_none());
    }

    #[test]
    fn test_invalid_seed_is_rejected() {
        let mut config = defaults();
        config.stellar_secret_seed = Some("not-a-seed".into());
        assert!(matches!(
            Runtime::build(&config),
            Err(SettingsError::Wallet(_))
        ));
    }
}
