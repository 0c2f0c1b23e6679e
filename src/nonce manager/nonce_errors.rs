use thiserror::Error;

use crate::rpc_manager::RpcError;

/// Nonce sequencer errors.
///
/// `AlreadyInitialized` and `NotInitialized` are call-order bugs and are
/// treated as fatal by the dispatcher.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SequencerError {
    /// `initialize()` called a second time
    #[error("Nonce sequencer already initialized (start {start}, next {next})")]
    AlreadyInitialized { start: u64, next: u64 },

    /// Issuance requested before `initialize()`
    #[error("Nonce sequencer used before initialization")]
    NotInitialized,

    /// Could not read the account's transaction count
    #[error("Failed to read transaction count: {0}")]
    Rpc(#[from] RpcError),
}

impl SequencerError {
    /// Misuse of the two-phase lifecycle, as opposed to a network failure
    pub fn is_logic_error(&self) -> bool {
        matches!(
            self,
            SequencerError::AlreadyInitialized { .. } | SequencerError::NotInitialized
        )
    }
}

pub type SequencerResult<T> = Result<T, SequencerError>;
