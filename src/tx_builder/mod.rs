//! Transfer transaction builder
//!
//! ## Architecture
//!
//! - **errors**: per-transfer error taxonomy
//! - **args**: holding → transfer arguments (ERC20 / ERC721 / ERC1155)
//! - **contracts**: per-class ABIs and the memoized contract handle cache
//! - **context**: state shared by every transfer of a run
//! - **envelope**: legacy envelope assembly and nonce-leased submission
//!
//! ## Nonce handling
//!
//! A transfer draws its nonce only after everything fallible that does not
//! need one (live balance read, call encoding, gas price) has succeeded, and
//! holds the sequencer while it signs and broadcasts. Broadcast order is
//! therefore issuance order, and a rejected broadcast returns its nonce.

// Public API - Error types
pub mod errors;
pub use errors::{TransferError, TransferResult};

mod args;
mod contracts;
mod context;
mod envelope;

// Re-export key types for convenience
pub use args::{build_args, TransferArgs, TransferCall};
pub use context::{TransferContext, TxSettings};
pub use contracts::{AbiSet, ContractHandle, ContractRegistry};
pub use envelope::{assemble, TransferRequest};
