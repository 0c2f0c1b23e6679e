//! Error types for building and submitting transfers
//!
//! Every variant is isolated to a single transfer except `DestinationNotSet`
//! and sequencer logic errors, which the dispatcher treats as fatal before
//! any task is started.

use ethers::types::H256;
use thiserror::Error;

use crate::nonce_manager::SequencerError;
use crate::rpc_manager::RpcError;
use crate::types::{AssetClass, FailureKind, TransferOutcome};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransferError {
    /// A holding field that must be a decimal integer is not one
    #[error("Invalid {field} '{value}': not a decimal integer")]
    Parse { field: &'static str, value: String },

    /// The embedded ABI for a class could not be loaded
    #[error("ABI error ({class}): {reason}")]
    Abi { class: AssetClass, reason: String },

    /// Call data could not be encoded, or a call output decoded
    #[error("Encoding error ({function}): {reason}")]
    Encoding { function: &'static str, reason: String },

    #[error("Signing failed: {0}")]
    Signing(String),

    /// Transfers need a destination before they can be built
    #[error("Destination account is not set")]
    DestinationNotSet,

    /// The destination is immutable once set
    #[error("Destination account already set to {0:?}")]
    DestinationAlreadySet(ethers::types::Address),

    /// Network failure that did not consume a nonce
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// Broadcast failed in a way that may still have put the transaction on
    /// chain (lost response, nonce already taken). The nonce is consumed.
    #[error("Broadcast of nonce {nonce} failed: {source}")]
    Broadcast {
        nonce: u64,
        #[source]
        source: RpcError,
    },

    #[error(transparent)]
    Sequencer(#[from] SequencerError),

    /// Broadcast succeeded (nonce consumed) but the receipt never arrived or
    /// reported a revert
    #[error("Transaction {tx_hash:?} (nonce {nonce}) not confirmed: {source}")]
    Confirmation {
        nonce: u64,
        tx_hash: H256,
        #[source]
        source: RpcError,
    },
}

impl TransferError {
    /// Malformed holding data, as opposed to network or signing problems
    pub fn is_data_error(&self) -> bool {
        matches!(self, TransferError::Parse { .. })
    }

    /// Whether retrying could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            TransferError::Rpc(e)
            | TransferError::Broadcast { source: e, .. }
            | TransferError::Confirmation { source: e, .. }
            | TransferError::Sequencer(SequencerError::Rpc(e)) => e.is_transient(),
            _ => false,
        }
    }

    pub fn failure_kind(&self) -> FailureKind {
        if self.is_data_error() {
            FailureKind::Data
        } else if self.is_transient() {
            FailureKind::Transient
        } else {
            FailureKind::Permanent
        }
    }

    /// `Failed` outcome recorded for a transfer that ended with this error
    pub fn to_outcome(&self) -> TransferOutcome {
        TransferOutcome::Failed {
            reason: self.to_string(),
            nonce: self.consumed_nonce(),
            kind: self.failure_kind(),
        }
    }

    /// Nonce that was used by a broadcast transaction despite the failure
    pub fn consumed_nonce(&self) -> Option<u64> {
        match self {
            TransferError::Broadcast { nonce, .. } => Some(*nonce),
            TransferError::Confirmation { nonce, .. } => Some(*nonce),
            _ => None,
        }
    }
}

pub type TransferResult<T> = Result<T, TransferError>;
