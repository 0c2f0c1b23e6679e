//! Blockchain client capability used by the sequencer, dispatcher and sweep

use async_trait::async_trait;
use ethers::types::{
    transaction::eip2718::TypedTransaction, Address, Bytes, Signature, TransactionReceipt, H256,
    U256,
};

use super::rpc_errors::RpcResult;

/// A transaction envelope together with the source account's signature
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub tx: TypedTransaction,
    pub signature: Signature,
}

impl SignedTransaction {
    /// RLP-encoded signed bytes, ready for `eth_sendRawTransaction`
    pub fn raw(&self) -> Bytes {
        self.tx.rlp_signed(&self.signature)
    }

    pub fn hash(&self) -> H256 {
        self.tx.hash(&self.signature)
    }

    pub fn nonce(&self) -> Option<u64> {
        self.tx.nonce().map(|n| n.low_u64())
    }
}

/// Network operations the migration needs from a node.
///
/// Every method is a single attempt; callers decide what a failure means.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Next nonce the network expects from `address` (pending count)
    async fn transaction_count(&self, address: Address) -> RpcResult<u64>;

    /// Current legacy gas price in wei
    async fn gas_price(&self) -> RpcResult<U256>;

    /// Native balance of `address` in wei
    async fn native_balance(&self, address: Address) -> RpcResult<U256>;

    /// Read-only contract call (`eth_call`) returning the raw output
    async fn call(&self, to: Address, data: Bytes) -> RpcResult<Bytes>;

    /// Submit a signed transaction, returning its hash
    async fn broadcast(&self, tx: &SignedTransaction) -> RpcResult<H256>;

    /// Block until the transaction is included or the client gives up
    async fn wait_for_receipt(&self, tx_hash: H256) -> RpcResult<TransactionReceipt>;
}
