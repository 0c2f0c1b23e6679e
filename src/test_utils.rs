//! Test Utilities Module
//!
//! In-memory blockchain client and fixtures for deterministic tests of the
//! sequencer, dispatcher and sweep. No network calls are made.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::signers::LocalWallet;
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256, U64};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::nonce_manager::NonceSequencer;
use crate::rpc_manager::{ChainClient, RpcError, RpcResult, SignedTransaction};
use crate::tx_builder::{AbiSet, ContractRegistry, TransferContext, TxSettings};
use crate::types::{
    FungibleHolding, Holding, MultiTokenHolding, NonFungibleHolding,
};
use crate::wallet::Account;

/// A transaction the mock accepted
#[derive(Debug, Clone)]
pub struct BroadcastRecord {
    pub nonce: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Option<Bytes>,
    pub tx_hash: H256,
}

type FailPredicate = Box<dyn Fn(&SignedTransaction) -> bool + Send + Sync>;

/// Error injected into matching broadcasts. With `accepted` set the
/// transaction is still recorded, as when the node takes it but the
/// response is lost.
struct BroadcastFault {
    predicate: FailPredicate,
    error: RpcError,
    accepted: bool,
}

type RevertPredicate = Box<dyn Fn(&BroadcastRecord) -> bool + Send + Sync>;

/// In-memory [`ChainClient`]
pub struct MockChainClient {
    transaction_count: u64,
    gas_price: Mutex<U256>,
    native_balance: Mutex<U256>,
    token_balances: Mutex<HashMap<Address, U256>>,
    broadcasts: Mutex<Vec<BroadcastRecord>>,
    fail_broadcast: Mutex<Option<BroadcastFault>>,
    fail_receipt: Mutex<Option<RevertPredicate>>,
    max_jitter_ms: u64,
    calls: AtomicU64,
}

impl MockChainClient {
    /// Network reports `transaction_count` as the account's next nonce
    pub fn new(transaction_count: u64) -> Self {
        Self {
            transaction_count,
            gas_price: Mutex::new(U256::from(25_000_000_000u64)),
            native_balance: Mutex::new(U256::zero()),
            token_balances: Mutex::new(HashMap::new()),
            broadcasts: Mutex::new(Vec::new()),
            fail_broadcast: Mutex::new(None),
            fail_receipt: Mutex::new(None),
            max_jitter_ms: 0,
            calls: AtomicU64::new(0),
        }
    }

    /// Sleep a random 0..=max_ms before each network call
    pub fn with_jitter(mut self, max_ms: u64) -> Self {
        self.max_jitter_ms = max_ms;
        self
    }

    pub fn set_gas_price(&self, price: U256) {
        *self.gas_price.lock().unwrap() = price;
    }

    pub fn set_native_balance(&self, balance: U256) {
        *self.native_balance.lock().unwrap() = balance;
    }

    /// `balanceOf` result for any owner of `contract`
    pub fn set_token_balance(&self, contract: Address, balance: U256) {
        self.token_balances.lock().unwrap().insert(contract, balance);
    }

    /// Reject broadcasts matching `predicate` as underpriced
    pub fn fail_broadcast_when<F>(&self, predicate: F)
    where
        F: Fn(&SignedTransaction) -> bool + Send + Sync + 'static,
    {
        self.fail_broadcast_with(predicate, RpcError::Rejected("transaction underpriced".into()));
    }

    /// Reject broadcasts matching `predicate` with `error`
    pub fn fail_broadcast_with<F>(&self, predicate: F, error: RpcError)
    where
        F: Fn(&SignedTransaction) -> bool + Send + Sync + 'static,
    {
        self.set_broadcast_fault(predicate, error, false);
    }

    /// Record broadcasts matching `predicate` but answer with a transport
    /// error, as if the response was lost
    pub fn lose_broadcast_response_when<F>(&self, predicate: F)
    where
        F: Fn(&SignedTransaction) -> bool + Send + Sync + 'static,
    {
        let error = RpcError::Transport {
            endpoint: "mock".into(),
            message: "operation timed out".into(),
        };
        self.set_broadcast_fault(predicate, error, true);
    }

    fn set_broadcast_fault<F>(&self, predicate: F, error: RpcError, accepted: bool)
    where
        F: Fn(&SignedTransaction) -> bool + Send + Sync + 'static,
    {
        *self.fail_broadcast.lock().unwrap() = Some(BroadcastFault {
            predicate: Box::new(predicate),
            error,
            accepted,
        });
    }

    /// Accept broadcasts matching `predicate` but report them reverted
    pub fn fail_receipt_when<F>(&self, predicate: F)
    where
        F: Fn(&BroadcastRecord) -> bool + Send + Sync + 'static,
    {
        *self.fail_receipt.lock().unwrap() = Some(Box::new(predicate));
    }

    /// Accepted transactions in broadcast order
    pub fn broadcasts(&self) -> Vec<BroadcastRecord> {
        self.broadcasts.lock().unwrap().clone()
    }

    pub fn broadcast_nonces(&self) -> Vec<u64> {
        self.broadcasts().iter().map(|b| b.nonce).collect()
    }

    /// Number of client calls made so far
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn jitter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.max_jitter_ms > 0 {
            let ms = fastrand::u64(0..=self.max_jitter_ms);
            tokio::time::sleep(Duration::from_millis(ms)).await;
        } else {
            tokio::task::yield_now().await;
        }
    }

    fn broadcast_fault(&self, tx: &SignedTransaction) -> Option<(RpcError, bool)> {
        self.fail_broadcast
            .lock()
            .unwrap()
            .as_ref()
            .filter(|fault| (fault.predicate)(tx))
            .map(|fault| (fault.error.clone(), fault.accepted))
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn transaction_count(&self, _address: Address) -> RpcResult<u64> {
        self.jitter().await;
        Ok(self.transaction_count)
    }

    async fn gas_price(&self) -> RpcResult<U256> {
        self.jitter().await;
        Ok(*self.gas_price.lock().unwrap())
    }

    async fn native_balance(&self, _address: Address) -> RpcResult<U256> {
        self.jitter().await;
        Ok(*self.native_balance.lock().unwrap())
    }

    async fn call(&self, to: Address, _data: Bytes) -> RpcResult<Bytes> {
        self.jitter().await;
        let balance = self
            .token_balances
            .lock()
            .unwrap()
            .get(&to)
            .copied()
            .unwrap_or_default();
        Ok(Bytes::from(ethers::abi::encode(&[Token::Uint(balance)])))
    }

    async fn broadcast(&self, tx: &SignedTransaction) -> RpcResult<H256> {
        self.jitter().await;
        let fault = self.broadcast_fault(tx);
        if let Some((error, false)) = &fault {
            return Err(error.clone());
        }

        let record = BroadcastRecord {
            nonce: tx.nonce().unwrap_or_default(),
            to: tx.tx.to_addr().copied(),
            value: tx.tx.value().copied().unwrap_or_default(),
            data: tx.tx.data().cloned(),
            tx_hash: tx.hash(),
        };
        let tx_hash = record.tx_hash;
        let mut broadcasts = self.broadcasts.lock().unwrap();
        if broadcasts.iter().any(|b| b.nonce == record.nonce) {
            return Err(RpcError::NonceConflict(format!(
                "nonce too low: nonce {} already used",
                record.nonce
            )));
        }
        broadcasts.push(record);
        match fault {
            Some((error, _)) => Err(error),
            None => Ok(tx_hash),
        }
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> RpcResult<TransactionReceipt> {
        self.jitter().await;
        let broadcasts = self.broadcasts();
        let Some(index) = broadcasts.iter().position(|b| b.tx_hash == tx_hash) else {
            return Err(RpcError::ConfirmationTimeout {
                tx_hash,
                timeout_secs: 0,
            });
        };

        let reverted = self
            .fail_receipt
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|p| p(&broadcasts[index]));
        if reverted {
            return Err(RpcError::Reverted(tx_hash));
        }

        Ok(TransactionReceipt {
            transaction_hash: tx_hash,
            block_number: Some(U64::from(1_000 + index as u64)),
            gas_used: Some(U256::from(50_000)),
            status: Some(U64::one()),
            ..Default::default()
        })
    }
}

/// Deterministic source account
pub fn test_account() -> Account {
    let wallet: LocalWallet = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
        .parse()
        .expect("valid dev key");
    Account::from_wallet(wallet)
}

/// Context over `client` with an uninitialized sequencer and no destination
pub fn test_context(client: Arc<MockChainClient>) -> Arc<TransferContext> {
    let source = test_account();
    let chain: Arc<dyn ChainClient> = client;
    let sequencer = Arc::new(NonceSequencer::new(chain.clone(), source.address()));
    let contracts = ContractRegistry::new(AbiSet::load().expect("embedded ABIs"));
    Arc::new(TransferContext::new(
        chain,
        source,
        sequencer,
        contracts,
        TxSettings {
            chain_id: 43114,
            gas_limit: 200_000,
        },
    ))
}

pub fn fungible(contract: Address, symbol: &str) -> Holding {
    Holding::Fungible(FungibleHolding {
        contract,
        quantity: "1000000".into(),
        decimals: 6,
        symbol: symbol.into(),
        name: format!("{} Token", symbol),
    })
}

pub fn non_fungible(contract: Address, token_id: &str) -> Holding {
    Holding::NonFungible(NonFungibleHolding {
        contract,
        token_id: token_id.into(),
        symbol: "NFT".into(),
        name: "Collection".into(),
    })
}

pub fn multi_token(contract: Address, token_id: &str, balance: &str) -> Holding {
    Holding::MultiToken(MultiTokenHolding {
        contract,
        token_id: token_id.into(),
        balance: balance.into(),
    })
}
