use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::networks::NetworkProfile;

/// Normalized outcome of one deployment run.
///
/// `explorer_links` always has the same length as `transaction_hashes`, and
/// `error` is present exactly when `success` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentResult {
    pub success: bool,
    pub artifacts: BTreeMap<String, String>,
    #[serde(default)]
    pub transaction_hashes: Vec<String>,
    #[serde(default)]
    pub explorer_links: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeploymentResult {
    /// Failed result without any chain side effects.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            artifacts: BTreeMap::new(),
            transaction_hashes: Vec::new(),
            explorer_links: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Accumulates artifacts and confirmed transactions while steps run.
pub struct DeploymentLedger {
    profile: NetworkProfile,
    artifacts: BTreeMap<String, String>,
    hashes: Vec<String>,
    links: Vec<String>,
}

impl DeploymentLedger {
    pub fn new(profile: NetworkProfile) -> Self {
        Self {
            profile,
            artifacts: BTreeMap::new(),
            hashes: Vec::new(),
            links: Vec::new(),
        }
    }

    pub fn artifact(&mut self, key: &str, value: impl Into<String>) {
        self.artifacts.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.artifacts.get(key).map(String::as_str)
    }

    /// Record a transaction that reached Success.
    pub fn confirmed(&mut self, hash: &str) {
        self.links.push(self.profile.explorer_tx_url(hash));
        self.hashes.push(hash.to_string());
    }

    pub fn succeed(self) -> DeploymentResult {
        DeploymentResult {
            success: true,
            artifacts: self.artifacts,
            transaction_hashes: self.hashes,
            explorer_links: self.links,
            error: None,
        }
    }

    /// Failed result that keeps whatever earlier steps produced.
    pub fn fail(self, error: impl Into<String>) -> DeploymentResult {
        DeploymentResult {
            success: false,
            artifacts: self.artifacts,
            transaction_hashes: self.hashes,
            explorer_links: self.links,
            error: Some(error.into()),
        }
    }
}
