use ethers::providers::ProviderError;
use ethers::types::H256;
use thiserror::Error;

/// Errors raised by the blockchain client
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RpcError {
    /// Transport-level errors (network, connection, malformed response)
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport { endpoint: String, message: String },

    /// The node refused the transaction on its own merits (underpriced,
    /// intrinsic gas too low). The nonce stays free.
    #[error("Transaction rejected by node: {0}")]
    Rejected(String),

    /// The nonce is already taken on chain or in the pool
    #[error("Nonce conflict: {0}")]
    NonceConflict(String),

    /// Insufficient native balance to pay for value + gas
    #[error("Insufficient funds (endpoint: {endpoint})")]
    InsufficientFunds { endpoint: String },

    /// No receipt within the confirmation window
    #[error("No receipt for {tx_hash:?} after {timeout_secs}s")]
    ConfirmationTimeout { tx_hash: H256, timeout_secs: u64 },

    /// Included, but execution reverted
    #[error("Transaction {0:?} reverted")]
    Reverted(H256),

    /// Unexpected or undecodable response payload
    #[error("Decode error: {0}")]
    Decode(String),

    /// Invalid client configuration (bad URL)
    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type RpcResult<T> = Result<T, RpcError>;

impl RpcError {
    /// Whether retrying could plausibly succeed. Only used to annotate logs;
    /// a transfer is attempted once.
    pub fn is_transient(&self) -> bool {
        match self {
            RpcError::Transport { .. } => true,
            RpcError::ConfirmationTimeout { .. } => true,

            RpcError::Rejected(_) => false,
            RpcError::NonceConflict(_) => false,
            RpcError::InsufficientFunds { .. } => false,
            RpcError::Reverted(_) => false,
            RpcError::Decode(_) => false,
            RpcError::Configuration(_) => false,
        }
    }

    /// Whether a broadcast that failed with this error certainly left its
    /// nonce unused. Anything else (lost responses, conflicts) must be
    /// treated as having consumed it.
    pub fn leaves_nonce_unused(&self) -> bool {
        match self {
            RpcError::Rejected(_) => true,
            RpcError::InsufficientFunds { .. } => true,
            RpcError::Configuration(_) => true,

            RpcError::Transport { .. } => false,
            RpcError::NonceConflict(_) => false,
            RpcError::ConfirmationTimeout { .. } => false,
            RpcError::Reverted(_) => false,
            RpcError::Decode(_) => false,
        }
    }

    /// Classify a provider error by its message
    pub fn from_provider_error(err: ProviderError, endpoint: &str) -> Self {
        let message = err.to_string();
        let lowered = message.to_lowercase();

        if lowered.contains("insufficient funds") {
            RpcError::InsufficientFunds {
                endpoint: endpoint.to_string(),
            }
        } else if lowered.contains("nonce too low")
            || lowered.contains("already known")
            || lowered.contains("replacement transaction underpriced")
        {
            RpcError::NonceConflict(message)
        } else if lowered.contains("transaction underpriced")
            || lowered.contains("intrinsic gas too low")
            || lowered.contains("gas price too low")
        {
            RpcError::Rejected(message)
        } else {
            RpcError::Transport {
                endpoint: endpoint.to_string(),
                message,
            }
        }
    }
}
