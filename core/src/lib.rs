//! Multi-chain asset issuance: declarative deployment plans executed against
//! EVM and Stellar networks through a wallet session.

pub mod api;
pub mod args;
pub mod backend;
pub mod contract;
pub mod contract_write;
pub mod errors;
pub mod estimator;
pub mod evm_abi;
pub mod evm_backend;
pub mod evm_rpc;
pub mod networks;
pub mod orchestrator;
pub mod plan;
pub mod progress;
pub mod result;
pub mod rpc_provider;
pub mod settings;
pub mod stellar_backend;
pub mod stellar_rpc;
pub mod stellar_tx;
pub mod submitter;
pub mod wallet;

#[cfg(test)]
mod testing;
