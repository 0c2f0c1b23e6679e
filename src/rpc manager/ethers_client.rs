//! JSON-RPC implementation of [`ChainClient`] on top of an ethers HTTP provider

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{
    transaction::eip2718::TypedTransaction, Address, BlockId, BlockNumber, Bytes,
    TransactionReceipt, TransactionRequest, H256, U256, U64,
};
use std::time::Duration;
use tracing::{debug, trace};

use super::chain_client::{ChainClient, SignedTransaction};
use super::rpc_errors::{RpcError, RpcResult};
use crate::config::NetworkConfig;

pub struct EthersClient {
    provider: Provider<Http>,
    endpoint: String,
    confirmation_timeout: Duration,
    poll_interval: Duration,
}

impl EthersClient {
    pub fn new(network: &NetworkConfig) -> RpcResult<Self> {
        let poll_interval = Duration::from_millis(network.receipt_poll_interval_ms);
        let provider = Provider::<Http>::try_from(network.rpc_url.as_str())
            .map_err(|e| RpcError::Configuration(format!("{}: {}", network.rpc_url, e)))?
            .interval(poll_interval);

        Ok(Self {
            provider,
            endpoint: network.rpc_url.clone(),
            confirmation_timeout: Duration::from_secs(network.confirmation_timeout_secs),
            poll_interval,
        })
    }

    fn map_err(&self, err: ethers::providers::ProviderError) -> RpcError {
        RpcError::from_provider_error(err, &self.endpoint)
    }

    async fn poll_receipt(&self, tx_hash: H256) -> RpcResult<TransactionReceipt> {
        loop {
            match self
                .provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|e| self.map_err(e))?
            {
                Some(receipt) => return Ok(receipt),
                None => {
                    trace!(tx = ?tx_hash, "Receipt not yet available");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

#[async_trait]
impl ChainClient for EthersClient {
    async fn transaction_count(&self, address: Address) -> RpcResult<u64> {
        let block: BlockId = BlockNumber::Pending.into();
        let count = self
            .provider
            .get_transaction_count(address, Some(block))
            .await
            .map_err(|e| self.map_err(e))?;
        if count.bits() > 64 {
            return Err(RpcError::Decode(format!("transaction count overflow: {}", count)));
        }
        Ok(count.low_u64())
    }

    async fn gas_price(&self) -> RpcResult<U256> {
        self.provider.get_gas_price().await.map_err(|e| self.map_err(e))
    }

    async fn native_balance(&self, address: Address) -> RpcResult<U256> {
        self.provider
            .get_balance(address, None)
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn call(&self, to: Address, data: Bytes) -> RpcResult<Bytes> {
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        self.provider.call(&tx, None).await.map_err(|e| self.map_err(e))
    }

    async fn broadcast(&self, tx: &SignedTransaction) -> RpcResult<H256> {
        let pending = self
            .provider
            .send_raw_transaction(tx.raw())
            .await
            .map_err(|e| self.map_err(e))?;
        let tx_hash = pending.tx_hash();
        debug!(tx = ?tx_hash, nonce = ?tx.nonce(), "Transaction broadcast");
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> RpcResult<TransactionReceipt> {
        let receipt = tokio::time::timeout(self.confirmation_timeout, self.poll_receipt(tx_hash))
            .await
            .map_err(|_| RpcError::ConfirmationTimeout {
                tx_hash,
                timeout_secs: self.confirmation_timeout.as_secs(),
            })??;

        if receipt.status == Some(U64::zero()) {
            return Err(RpcError::Reverted(tx_hash));
        }
        Ok(receipt)
    }
}
