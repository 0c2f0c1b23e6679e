//! Asset Airlift - EVM account migration library
//!
//! Moves every ERC20, ERC721 and ERC1155 holding plus the native coin balance
//! from a source account to a freshly generated one, dispatching transfers
//! concurrently over a single gapless nonce sequence.

pub mod config;
pub mod dispatcher;
pub mod holdings;
pub mod metrics;
pub mod migration;
pub mod report;
pub mod structured_logging;
pub mod sweep;
pub mod types;
pub mod wallet;

// Component modules with non-standard paths (directories with spaces)
#[path = "nonce manager/mod.rs"]
pub mod nonce_manager;

#[path = "rpc manager/mod.rs"]
pub mod rpc_manager;

pub mod tx_builder;

pub mod test_utils;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::Config;
pub use dispatcher::{DispatchError, TransactionDispatcher};
pub use migration::{Migration, MigrationOptions, MigrationSummary};
pub use sweep::NativeSweep;
pub use types::{AssetClass, Holding, TransferOutcome, TransferReport};
