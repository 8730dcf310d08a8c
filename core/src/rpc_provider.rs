use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use utoipa::ToSchema;

// ── Configuration constants ───────────────────────────────────────────────────

/// Number of consecutive failures before a provider is tripped.
const CIRCUIT_BREAKER_THRESHOLD: u64 = 3;

/// How long a tripped provider is excluded from the pool.
const CIRCUIT_BREAKER_COOLDOWN: Duration = Duration::from_secs(5 * 60); // 5 minutes

/// Timeout for the lightweight health probe.
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for a regular JSON-RPC request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Error)]
pub enum RpcCallError {
    #[error("no healthy RPC provider available")]
    NoHealthyProvider,

    #[error("transport error from {provider}: {message}")]
    Transport { provider: String, message: String },

    #[error("request to {provider} timed out")]
    Timeout { provider: String },

    #[error("{provider} answered HTTP {status}")]
    Http { provider: String, status: u16 },

    /// JSON-RPC error object returned by a reachable node.
    #[error("RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    #[error("invalid RPC response: {0}")]
    InvalidResponse(String),
}

impl RpcCallError {
    /// True when the node could not be reached at all, as opposed to a node
    /// that answered with an error.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            Self::NoHealthyProvider | Self::Transport { .. } | Self::Timeout { .. } | Self::Http { .. }
        )
    }
}

/// Describe a standard JSON-RPC 2.0 error code.
pub fn describe_rpc_code(code: i64) -> &'static str {
    match code {
        -32700 => "parse error",
        -32600 => "invalid request",
        -32601 => "method not found",
        -32602 => "invalid params",
        -32603 => "internal error",
        -32099..=-32000 => "server error",
        _ => "application error",
    }
}

// ── Types ─────────────────────────────────────────────────────────────────────

/// A single JSON-RPC endpoint with optional authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcProvider {
    /// Human-readable label (e.g. "soroban-testnet", "amoy-public").
    pub name: String,
    /// Full JSON-RPC URL.
    pub url: String,
    /// Optional authentication header name (e.g. "Authorization", "X-API-Key").
    #[serde(default)]
    pub auth_header: Option<String>,
    /// Optional authentication header value (e.g. "Bearer <token>", "<api-key>").
    #[serde(default, skip_serializing)]
    pub auth_value: Option<String>,
}

impl RpcProvider {
    pub fn public(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            auth_header: None,
            auth_value: None,
        }
    }
}

/// Which lightweight call the health checker uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    /// Soroban RPC `getLatestLedger`, reads `result.sequence`.
    StellarLatestLedger,
    /// Ethereum `eth_blockNumber`, reads a hex quantity.
    EvmBlockNumber,
}

impl ProbeKind {
    fn method(self) -> &'static str {
        match self {
            Self::StellarLatestLedger => "getLatestLedger",
            Self::EvmBlockNumber => "eth_blockNumber",
        }
    }

    fn params(self) -> Value {
        match self {
            Self::StellarLatestLedger => Value::Null,
            Self::EvmBlockNumber => Value::Array(Vec::new()),
        }
    }

    fn read_height(self, result: &Value) -> Option<u64> {
        match self {
            Self::StellarLatestLedger => result["sequence"].as_u64(),
            Self::EvmBlockNumber => result
                .as_str()
                .and_then(|s| s.strip_prefix("0x"))
                .and_then(|hex| u64::from_str_radix(hex, 16).ok()),
        }
    }
}

/// Point-in-time health of one provider, for the `/networks` endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealth {
    pub name: String,
    pub url: String,
    pub healthy: bool,
    pub consecutive_failures: u64,
    /// Latest ledger or block height seen by the health checker (0 = never).
    pub latest_height: u64,
}

/// Runtime health state for a single provider.
#[derive(Debug)]
struct ProviderState {
    provider: RpcProvider,
    /// Rolling count of consecutive failures (reset on success).
    consecutive_failures: AtomicU64,
    /// When the circuit breaker was tripped (None = healthy).
    tripped_at: RwLock<Option<Instant>>,
    latest_height: AtomicU64,
}

/// Thread-safe registry that tracks provider health and drives failover.
pub struct ProviderRegistry {
    states: Vec<Arc<ProviderState>>,
    client: Client,
    probe: ProbeKind,
    next_id: AtomicU64,
}

impl ProviderRegistry {
    /// Build a registry from a prioritized list of providers.
    ///
    /// The order matters: the first provider is preferred when healthy.
    pub fn new(providers: Vec<RpcProvider>, probe: ProbeKind) -> Arc<Self> {
        let states = providers
            .into_iter()
            .map(|p| {
                Arc::new(ProviderState {
                    provider: p,
                    consecutive_failures: AtomicU64::new(0),
                    tripped_at: RwLock::new(None),
                    latest_height: AtomicU64::new(0),
                })
            })
            .collect();

        Arc::new(Self {
            states,
            client: Client::new(),
            probe,
            next_id: AtomicU64::new(1),
        })
    }

    /// Return the providers currently available for requests, in priority
    /// order (skipping tripped providers whose cooldown hasn't elapsed).
    pub async fn healthy_providers(&self) -> Vec<&RpcProvider> {
        let mut available = Vec::new();
        for state in &self.states {
            if self.is_available(state).await {
                available.push(&state.provider);
            }
        }
        available
    }

    pub async fn provider_health(&self) -> Vec<ProviderHealth> {
        let mut out = Vec::with_capacity(self.states.len());
        for state in &self.states {
            out.push(ProviderHealth {
                name: state.provider.name.clone(),
                url: state.provider.url.clone(),
                healthy: self.is_available(state).await,
                consecutive_failures: state.consecutive_failures.load(Ordering::Relaxed),
                latest_height: state.latest_height.load(Ordering::Relaxed),
            });
        }
        out
    }

    /// Report a successful request to `url`. Resets the failure counter and
    /// clears any active trip.
    pub async fn report_success(&self, url: &str) {
        if let Some(state) = self.find_by_url(url) {
            state.consecutive_failures.store(0, Ordering::Relaxed);
            let mut tripped = state.tripped_at.write().await;
            *tripped = None;
        }
    }

    /// Report a failed request to `url`. Increments the failure counter and
    /// trips the circuit breaker when the threshold is reached.
    pub async fn report_failure(&self, url: &str) {
        if let Some(state) = self.find_by_url(url) {
            self.record_failure(state).await;
        }
    }

    /// Whether an HTTP status should move the request to the next provider.
    pub fn is_retryable_status(status: u16) -> bool {
        status == 429 || status >= 500
    }

    // ── Requests ──────────────────────────────────────────────────────────

    /// Send one JSON-RPC request and return its `result` member.
    ///
    /// Unreachable providers (transport errors, timeouts, HTTP 429/5xx) are
    /// reported and the request moves on to the next healthy provider. A
    /// JSON-RPC error object is returned as-is without failover.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcCallError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let mut last_err = RpcCallError::NoHealthyProvider;
        for state in &self.states {
            if !self.is_available(state).await {
                continue;
            }
            match self.send_to(state, &body, REQUEST_TIMEOUT).await {
                Ok(envelope) => {
                    self.report_success(&state.provider.url).await;
                    return into_result(envelope);
                }
                Err(e) => {
                    tracing::warn!(
                        provider = %state.provider.name,
                        method,
                        error = %e,
                        "RPC provider failed, trying next"
                    );
                    self.record_failure(state).await;
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    async fn send_to(
        &self,
        state: &ProviderState,
        body: &Value,
        timeout: Duration,
    ) -> Result<Value, RpcCallError> {
        let mut req = self.client.post(&state.provider.url).json(body);

        // Attach provider-specific auth header if configured.
        if let (Some(header), Some(value)) =
            (&state.provider.auth_header, &state.provider.auth_value)
        {
            req = req.header(header.as_str(), value.as_str());
        }

        let response = tokio::time::timeout(timeout, req.send())
            .await
            .map_err(|_| RpcCallError::Timeout {
                provider: state.provider.name.clone(),
            })?
            .map_err(|e| RpcCallError::Transport {
                provider: state.provider.name.clone(),
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        if Self::is_retryable_status(status) {
            return Err(RpcCallError::Http {
                provider: state.provider.name.clone(),
                status,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| RpcCallError::InvalidResponse(format!("parse error: {e}")))
    }

    // ── Background health checker ─────────────────────────────────────────

    /// Spawn a background Tokio task that periodically probes every provider.
    pub fn spawn_health_checker(
        self: &Arc<Self>,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.run_health_checks().await;
            }
        })
    }

    /// Execute a single round of health checks against all providers.
    async fn run_health_checks(&self) {
        for state in &self.states {
            match self.probe_provider(state).await {
                Ok(height) => {
                    state.latest_height.store(height, Ordering::Relaxed);
                    state.consecutive_failures.store(0, Ordering::Relaxed);
                    let mut tripped = state.tripped_at.write().await;
                    *tripped = None;
                    tracing::debug!(
                        provider = %state.provider.name,
                        latest_height = height,
                        "Health check OK"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        provider = %state.provider.name,
                        error = %e,
                        "Health check FAILED"
                    );
                    self.record_failure(state).await;
                }
            }
        }
    }

    async fn probe_provider(&self, state: &ProviderState) -> Result<u64, RpcCallError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": self.probe.method(),
            "params": self.probe.params(),
        });
        let result = into_result(self.send_to(state, &body, HEALTH_CHECK_TIMEOUT).await?)?;
        self.probe
            .read_height(&result)
            .ok_or_else(|| RpcCallError::InvalidResponse("missing height in probe".to_string()))
    }

    // ── Internal helpers ──────────────────────────────────────────────────

    fn find_by_url(&self, url: &str) -> Option<&Arc<ProviderState>> {
        self.states.iter().find(|s| s.provider.url == url)
    }

    async fn record_failure(&self, state: &ProviderState) {
        let prev = state.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        if prev + 1 >= CIRCUIT_BREAKER_THRESHOLD {
            let mut tripped = state.tripped_at.write().await;
            if tripped.is_none() {
                tracing::warn!(
                    provider = %state.provider.name,
                    url = %state.provider.url,
                    failures = prev + 1,
                    "Circuit breaker TRIPPED, provider excluded for {:?}",
                    CIRCUIT_BREAKER_COOLDOWN
                );
            }
            *tripped = Some(Instant::now());
        }
    }

    async fn is_available(&self, state: &ProviderState) -> bool {
        let tripped = state.tripped_at.read().await;
        match *tripped {
            None => true,
            Some(when) => when.elapsed() >= CIRCUIT_BREAKER_COOLDOWN,
        }
    }
}

/// Split a JSON-RPC response envelope into its result or error.
fn into_result(mut envelope: Value) -> Result<Value, RpcCallError> {
    if let Some(err) = envelope.get("error").filter(|e| !e.is_null()) {
        let code = err["code"].as_i64().unwrap_or(0);
        let message = err["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| describe_rpc_code(code).to_string());
        return Err(RpcCallError::Rpc {
            code,
            message,
            data: err.get("data").cloned(),
        });
    }
    match envelope.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(RpcCallError::InvalidResponse(
            "response has neither result nor error".to_string(),
        )),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
