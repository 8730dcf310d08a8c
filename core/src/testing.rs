//! In-memory endpoints and wallets shared by the backend, orchestrator and
//! contract-write tests.

use async_trait::async_trait;
use ethers::types::U256;
use serde_json::{json, Value};
use soroban_sdk::xdr::{Limits, ReadXdr, SorobanTransactionData};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::evm_rpc::EvmEndpoint;
use crate::stellar_rpc::{SimulationOutcome, StellarEndpoint};
use crate::submitter::{PolledStatus, SubmissionEndpoint, SubmitError, TransactionStatus};
use crate::wallet::{WalletError, WalletSession};

/// Ordered record of endpoint events (`send <hash>`, `terminal <hash>`).
#[derive(Default)]
pub struct EventLog(Mutex<Vec<String>>);

impl EventLog {
    pub fn push(&self, event: String) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Assert no `send` happens while an earlier transaction is still pending.
    pub fn assert_sequential(&self) {
        let mut open: Option<String> = None;
        for event in self.events() {
            let (kind, hash) = event.split_once(' ').unwrap();
            match kind {
                "send" => {
                    assert!(open.is_none(), "sent {hash} while {open:?} was pending");
                    open = Some(hash.to_string());
                }
                "terminal" => {
                    assert_eq!(open.as_deref(), Some(hash));
                    open = None;
                }
                _ => {}
            }
        }
    }
}

/// Scripted submission behaviour shared by the fake endpoints.
#[derive(Default)]
pub struct Script {
    /// Zero-based index of the send that is rejected synchronously.
    pub reject_send: Option<usize>,
    /// Zero-based index of the send whose transaction ends up Failed.
    pub fail_send: Option<usize>,
    /// Pending answers before a transaction turns terminal.
    pub pending_polls: usize,
    /// Zero-based index of the send that never leaves Pending.
    pub stall_send: Option<usize>,
}

struct Submitted {
    index: usize,
    payload: String,
    polls: usize,
}

pub struct FakeChain {
    script: Script,
    pub events: Arc<EventLog>,
    sends: AtomicUsize,
    submitted: Mutex<HashMap<String, Submitted>>,
}

impl FakeChain {
    fn new(script: Script, events: Arc<EventLog>) -> Self {
        Self {
            script,
            events,
            sends: AtomicUsize::new(0),
            submitted: Mutex::new(HashMap::new()),
        }
    }

    pub fn send_count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    fn send(&self, payload: &str, hash_for: impl Fn(usize) -> String) -> Result<String, SubmitError> {
        let index = self.sends.fetch_add(1, Ordering::SeqCst);
        if self.script.reject_send == Some(index) {
            return Err(SubmitError::Rejected("tx_insufficient_balance".to_string()));
        }
        let hash = hash_for(index);
        self.events.push(format!("send {hash}"));
        self.submitted.lock().unwrap().insert(
            hash.clone(),
            Submitted {
                index,
                payload: payload.to_string(),
                polls: 0,
            },
        );
        Ok(hash)
    }

    /// Returns (status, index, payload) for a poll.
    fn poll(&self, hash: &str) -> Result<(TransactionStatus, usize, String), SubmitError> {
        let mut submitted = self.submitted.lock().unwrap();
        let entry = submitted
            .get_mut(hash)
            .ok_or_else(|| SubmitError::InvalidResponse(format!("unknown hash {hash}")))?;
        entry.polls += 1;
        if self.script.stall_send == Some(entry.index) || entry.polls <= self.script.pending_polls {
            return Ok((TransactionStatus::Pending, entry.index, entry.payload.clone()));
        }
        let status = if self.script.fail_send == Some(entry.index) {
            TransactionStatus::Failed
        } else {
            TransactionStatus::Success
        };
        self.events.push(format!("terminal {hash}"));
        Ok((status, entry.index, entry.payload.clone()))
    }
}

// ── EVM ───────────────────────────────────────────────────────────────────────

pub struct FakeEvmEndpoint {
    pub chain: FakeChain,
    pub chain_id: u64,
}

impl FakeEvmEndpoint {
    pub fn new(chain_id: u64, script: Script, events: Arc<EventLog>) -> Arc<Self> {
        Arc::new(Self {
            chain: FakeChain::new(script, events),
            chain_id,
        })
    }

    pub fn contract_address(index: usize) -> String {
        format!("0x{:040x}", 0xc0de_0000 + index)
    }
}

#[async_trait]
impl SubmissionEndpoint for FakeEvmEndpoint {
    async fn send(&self, signed_payload: &str) -> Result<String, SubmitError> {
        self.chain
            .send(signed_payload, |i| format!("0x{:064x}", i + 1))
    }

    async fn status(&self, hash: &str) -> Result<PolledStatus, SubmitError> {
        let (status, index, payload) = self.chain.poll(hash)?;
        let raw = match status {
            TransactionStatus::Pending => return Ok(PolledStatus::pending()),
            TransactionStatus::Success => {
                // The echo wallet signs by returning the request itself.
                let request: Value = serde_json::from_str(&payload).unwrap_or(Value::Null);
                let contract = if request.get("to").is_none() {
                    Value::String(Self::contract_address(index))
                } else {
                    Value::Null
                };
                json!({"status": "0x1", "transactionHash": hash, "contractAddress": contract})
            }
            TransactionStatus::Failed => json!({"status": "0x0", "transactionHash": hash}),
        };
        Ok(PolledStatus { status, raw })
    }
}

#[async_trait]
impl EvmEndpoint for FakeEvmEndpoint {
    async fn chain_id(&self) -> Result<u64, SubmitError> {
        Ok(self.chain_id)
    }

    async fn transaction_count(&self, _address: &str) -> Result<U256, SubmitError> {
        Ok(U256::from(self.chain.send_count()))
    }

    async fn gas_price(&self) -> Result<U256, SubmitError> {
        Ok(U256::from(30_000_000_000u64))
    }

    async fn estimate_gas(&self, _request: &Value) -> Result<U256, SubmitError> {
        Ok(U256::from(100_000u64))
    }
}

// ── Stellar ───────────────────────────────────────────────────────────────────

pub struct FakeStellarEndpoint {
    pub chain: FakeChain,
    /// Error string returned by every simulation, if set.
    pub simulation_error: Option<String>,
}

impl FakeStellarEndpoint {
    pub fn new(script: Script, events: Arc<EventLog>) -> Arc<Self> {
        Arc::new(Self {
            chain: FakeChain::new(script, events),
            simulation_error: None,
        })
    }

    pub fn with_simulation_error(error: &str, events: Arc<EventLog>) -> Arc<Self> {
        Arc::new(Self {
            chain: FakeChain::new(Script::default(), events),
            simulation_error: Some(error.to_string()),
        })
    }

    /// Signed envelopes in submission order.
    pub fn payloads(&self) -> Vec<String> {
        let submitted = self.chain.submitted.lock().unwrap();
        let mut entries: Vec<_> = submitted.values().map(|s| (s.index, s.payload.clone())).collect();
        entries.sort();
        entries.into_iter().map(|(_, p)| p).collect()
    }
}

/// All-zero resource data; decodes as an empty footprint with zero fees.
pub fn empty_transaction_data() -> SorobanTransactionData {
    SorobanTransactionData::from_xdr([0u8; 32], Limits::none()).unwrap()
}

#[async_trait]
impl SubmissionEndpoint for FakeStellarEndpoint {
    async fn send(&self, signed_payload: &str) -> Result<String, SubmitError> {
        self.chain.send(signed_payload, |i| format!("{:064x}", i + 1))
    }

    async fn status(&self, hash: &str) -> Result<PolledStatus, SubmitError> {
        let (status, _, _) = self.chain.poll(hash)?;
        Ok(PolledStatus {
            status,
            raw: json!({"status": format!("{status:?}").to_uppercase()}),
        })
    }
}

#[async_trait]
impl StellarEndpoint for FakeStellarEndpoint {
    async fn account_sequence(&self, _account: &str) -> Result<i64, SubmitError> {
        Ok(100 + self.chain.send_count() as i64)
    }

    async fn simulate(&self, _envelope_xdr: &str) -> Result<SimulationOutcome, SubmitError> {
        if let Some(error) = &self.simulation_error {
            return Ok(SimulationOutcome {
                error: Some(error.clone()),
                ..Default::default()
            });
        }
        Ok(SimulationOutcome {
            transaction_data: Some(empty_transaction_data()),
            min_resource_fee: 5_000,
            latest_ledger: 1,
            ..Default::default()
        })
    }
}

// ── Wallets ───────────────────────────────────────────────────────────────────

/// Signs by echoing the payload back.
pub struct EchoWallet(pub String);

#[async_trait]
impl WalletSession for EchoWallet {
    async fn public_key(&self) -> Result<String, WalletError> {
        Ok(self.0.clone())
    }

    async fn sign(&self, payload: &str, _network_id: &str) -> Result<String, WalletError> {
        Ok(payload.to_string())
    }
}

/// Connected, but refuses every signing request.
pub struct RefusingWallet(pub String);

#[async_trait]
impl WalletSession for RefusingWallet {
    async fn public_key(&self) -> Result<String, WalletError> {
        Ok(self.0.clone())
    }

    async fn sign(&self, _payload: &str, _network_id: &str) -> Result<String, WalletError> {
        Err(WalletError::UserRejected)
    }
}

pub const EVM_ACCOUNT: &str = "0x742d35Cc6634C0532925a3b8D4C9db96C4b4d8b6";
