use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use rand::RngCore;
use serde_json::Value;
use std::sync::Arc;
use stellar_strkey::Strkey;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::rpc_provider::{ProviderRegistry, RpcCallError};
use crate::stellar_tx;

/// EIP-1193 "user rejected request".
const USER_REJECTED_CODE: i64 = 4001;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("wallet not connected")]
    NotConnected,

    #[error("signing request rejected by user")]
    UserRejected,

    #[error("signer error: {0}")]
    Signer(String),
}

/// Signing capability supplied by the runtime environment.
///
/// `payload` is chain specific: a base64 unsigned transaction envelope on
/// Stellar, a JSON transaction request on EVM. `network_id` is the Stellar
/// passphrase or the EVM chain id.
#[async_trait]
pub trait WalletSession: Send + Sync {
    async fn public_key(&self) -> Result<String, WalletError>;

    async fn sign(&self, payload: &str, network_id: &str) -> Result<String, WalletError>;
}

// ── Shared session ────────────────────────────────────────────────────────────

/// Cloneable handle to a wallet whose signing requests are serialized.
#[derive(Clone)]
pub struct SharedWallet {
    inner: Arc<dyn WalletSession>,
    signing: Arc<Mutex<()>>,
}

impl SharedWallet {
    pub fn new(session: impl WalletSession + 'static) -> Self {
        Self::from_arc(Arc::new(session))
    }

    pub fn from_arc(inner: Arc<dyn WalletSession>) -> Self {
        Self {
            inner,
            signing: Arc::new(Mutex::new(())),
        }
    }
}

#[async_trait]
impl WalletSession for SharedWallet {
    async fn public_key(&self) -> Result<String, WalletError> {
        self.inner.public_key().await
    }

    async fn sign(&self, payload: &str, network_id: &str) -> Result<String, WalletError> {
        let _guard = self.signing.lock().await;
        self.inner.sign(payload, network_id).await
    }
}

// ── Stellar keypair ───────────────────────────────────────────────────────────

/// Ed25519 Stellar keypair for headless signing.
pub struct KeypairWallet {
    key: SigningKey,
}

impl KeypairWallet {
    /// Load from an `S…` secret seed.
    pub fn from_secret_seed(seed: &str) -> Result<Self, WalletError> {
        match Strkey::from_string(seed.trim()) {
            Ok(Strkey::PrivateKeyEd25519(sk)) => Ok(Self {
                key: SigningKey::from_bytes(&sk.0),
            }),
            _ => Err(WalletError::Signer("invalid secret seed".to_string())),
        }
    }

    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Self {
            key: SigningKey::from_bytes(&seed),
        }
    }

    /// `G…` account address.
    pub fn public_address(&self) -> String {
        Strkey::PublicKeyEd25519(stellar_strkey::ed25519::PublicKey(
            self.key.verifying_key().to_bytes(),
        ))
        .to_string()
    }

    /// `S…` secret seed.
    pub fn secret_seed(&self) -> String {
        Strkey::PrivateKeyEd25519(stellar_strkey::ed25519::PrivateKey(self.key.to_bytes()))
            .to_string()
    }
}

#[async_trait]
impl WalletSession for KeypairWallet {
    async fn public_key(&self) -> Result<String, WalletError> {
        Ok(self.public_address())
    }

    async fn sign(&self, payload: &str, network_id: &str) -> Result<String, WalletError> {
        stellar_tx::sign_envelope(payload, network_id, &self.key)
            .map_err(|e| WalletError::Signer(e.to_string()))
    }
}

// ── EVM node signer ───────────────────────────────────────────────────────────

/// Delegates EVM signing to a node that holds the account
/// (`eth_accounts` / `eth_signTransaction`).
pub struct NodeSignerWallet {
    registry: Arc<ProviderRegistry>,
    address: Option<String>,
}

impl NodeSignerWallet {
    pub fn new(registry: Arc<ProviderRegistry>, address: Option<String>) -> Self {
        Self { registry, address }
    }
}

fn signer_error(err: RpcCallError) -> WalletError {
    match err {
        RpcCallError::Rpc { code, .. } if code == USER_REJECTED_CODE => WalletError::UserRejected,
        e if e.is_unreachable() => WalletError::NotConnected,
        e => WalletError::Signer(e.to_string()),
    }
}

#[async_trait]
impl WalletSession for NodeSignerWallet {
    async fn public_key(&self) -> Result<String, WalletError> {
        if let Some(address) = &self.address {
            return Ok(address.clone());
        }
        let accounts = self
            .registry
            .call("eth_accounts", Value::Array(Vec::new()))
            .await
            .map_err(signer_error)?;
        accounts
            .as_array()
            .and_then(|a| a.first())
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(WalletError::NotConnected)
    }

    async fn sign(&self, payload: &str, network_id: &str) -> Result<String, WalletError> {
        let mut request: Value = serde_json::from_str(payload)
            .map_err(|e| WalletError::Signer(format!("malformed transaction request: {e}")))?;
        if let Some(obj) = request.as_object_mut() {
            if !obj.contains_key("from") {
                obj.insert("from".to_string(), Value::String(self.public_key().await?));
            }
            if !obj.contains_key("chainId") {
                if let Ok(id) = network_id.parse::<u64>() {
                    obj.insert("chainId".to_string(), Value::String(format!("{id:#x}")));
                }
            }
        }

        let signed = self
            .registry
            .call("eth_signTransaction", Value::Array(vec![request]))
            .await
            .map_err(signer_error)?;
        // Geth answers `{raw, tx}`, other nodes a bare hex string.
        signed
            .get("raw")
            .and_then(Value::as_str)
            .or_else(|| signed.as_str())
            .map(str::to_string)
            .ok_or_else(|| WalletError::Signer("node returned no raw transaction".to_string()))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc_provider::{ProbeKind, RpcProvider};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const TESTNET: &str = "Test SDF Network ; September 2015";

    #[test]
    fn test_keypair_roundtrips_through_secret_seed() {
        let wallet = KeypairWallet::generate();
        let seed = wallet.secret_seed();
        assert!(seed.starts_with('S'));
        let restored = KeypairWallet::from_secret_seed(&seed).unwrap();
        assert_eq!(restored.public_address(), wallet.public_address());
        assert!(wallet.public_address().starts_with('G'));
    }

    #[test]
    fn test_from_secret_seed_rejects_public_key() {
        let wallet = KeypairWallet::generate();
        assert!(matches!(
            KeypairWallet::from_secret_seed(&wallet.public_address()),
            Err(WalletError::Signer(_))
        ));
    }

    #[tokio::test]
    async fn test_keypair_signs_envelope() {
        let wallet = KeypairWallet::generate();
        let source = wallet.public_address();
        let tx = stellar_tx::build_transaction(
            &source,
            1,
            100,
            vec![stellar_tx::set_auth_flags(true, false)],
        )
        .unwrap();
        let unsigned = stellar_tx::unsigned_envelope_xdr(tx).unwrap();
        let signed = wallet.sign(&unsigned, TESTNET).await.unwrap();
        assert_ne!(signed, unsigned);
        assert_eq!(stellar_tx::decode_envelope(&signed).unwrap().signatures.len(), 1);
    }

    #[tokio::test]
    async fn test_keypair_rejects_garbage_payload() {
        let wallet = KeypairWallet::generate();
        assert!(matches!(
            wallet.sign("not-an-envelope", TESTNET).await,
            Err(WalletError::Signer(_))
        ));
    }

    /// Records the maximum number of concurrent `sign` calls.
    struct SlowWallet {
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    #[async_trait]
    impl WalletSession for SlowWallet {
        async fn public_key(&self) -> Result<String, WalletError> {
            Ok("GSLOW".to_string())
        }

        async fn sign(&self, payload: &str, _network_id: &str) -> Result<String, WalletError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(format!("signed:{payload}"))
        }
    }

    #[tokio::test]
    async fn test_shared_wallet_serializes_signing() {
        let inner = Arc::new(SlowWallet {
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        });
        let shared = SharedWallet::from_arc(inner.clone());

        let tasks: Vec<_> = (0..4)
            .map(|i| {
                let wallet = shared.clone();
                tokio::spawn(async move { wallet.sign(&format!("p{i}"), "n").await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
        assert_eq!(inner.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_node_signer_uses_configured_address() {
        let registry = ProviderRegistry::new(Vec::new(), ProbeKind::EvmBlockNumber);
        let wallet = NodeSignerWallet::new(registry, Some("0xabc".into()));
        assert_eq!(wallet.public_key().await.unwrap(), "0xabc");
    }

    #[tokio::test]
    async fn test_node_signer_without_provider_is_not_connected() {
        let registry = ProviderRegistry::new(Vec::new(), ProbeKind::EvmBlockNumber);
        let wallet = NodeSignerWallet::new(registry, None);
        assert_eq!(wallet.public_key().await, Err(WalletError::NotConnected));
    }

    #[tokio::test]
    async fn test_node_signer_rejects_malformed_request() {
        let registry = ProviderRegistry::new(
            vec![RpcProvider::public("local", "http://127.0.0.1:1")],
            ProbeKind::EvmBlockNumber,
        );
        let wallet = NodeSignerWallet::new(registry, Some("0xabc".into()));
        assert!(matches!(
            wallet.sign("{not json", "80002").await,
            Err(WalletError::Signer(_))
        ));
    }

    #[test]
    fn test_signer_error_mapping() {
        assert_eq!(
            signer_error(RpcCallError::Rpc {
                code: 4001,
                message: "User denied".into(),
                data: None
            }),
            WalletError::UserRejected
        );
        assert_eq!(
            signer_error(RpcCallError::NoHealthyProvider),
            WalletError::NotConnected
        );
    }
}
