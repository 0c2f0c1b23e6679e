//! Nonce Manager Module
//!
//! Gapless, strictly increasing nonce issuance for the source account

// Submodules
pub mod nonce_errors;
pub mod nonce_sequencer;

// Re-exports for convenience
pub use nonce_errors::{SequencerError, SequencerResult};
pub use nonce_sequencer::{NonceLease, NonceSequencer};
