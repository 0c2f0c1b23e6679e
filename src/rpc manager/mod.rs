//! RPC Manager Module
//!
//! Blockchain client capability (nonce, fees, balances, calls, broadcast,
//! receipts) and its JSON-RPC implementation

// Submodules
pub mod chain_client;
pub mod ethers_client;
pub mod rpc_errors;

// Re-exports for convenience
pub use chain_client::{ChainClient, SignedTransaction};
pub use ethers_client::EthersClient;
pub use rpc_errors::{RpcError, RpcResult};
