//! Envelope assembly, signing and submission under a nonce lease
//!
//! The nonce is drawn as late as possible: gas price and call data are
//! prepared first, then the lease is held only while the envelope is signed
//! and broadcast. A broadcast the node clearly refused drops the lease
//! uncommitted, so the next transfer reuses the value. Any other broadcast
//! error commits the nonce, since the transaction may be in the pool. The
//! receipt is awaited after the lease is committed and released.

use ethers::types::{
    transaction::eip2718::TypedTransaction, Address, Bytes, TransactionRequest, U256,
};
use tracing::{debug, warn};

use super::context::{TransferContext, TxSettings};
use super::errors::{TransferError, TransferResult};
use crate::types::TransferReceipt;

/// Everything an envelope needs except the nonce
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub to: Address,
    pub value: U256,
    pub data: Option<Bytes>,
    pub gas_price: U256,
}

/// Legacy (gasPrice) transaction from the source account
pub fn assemble(
    from: Address,
    request: &TransferRequest,
    nonce: u64,
    settings: TxSettings,
) -> TypedTransaction {
    let mut tx = TransactionRequest::new()
        .from(from)
        .to(request.to)
        .gas(settings.gas_limit)
        .gas_price(request.gas_price)
        .value(request.value)
        .nonce(nonce)
        .chain_id(settings.chain_id);
    if let Some(data) = &request.data {
        tx = tx.data(data.clone());
    }
    tx.into()
}

impl TransferContext {
    /// Sign, broadcast and confirm one transaction
    pub async fn submit(&self, request: TransferRequest) -> TransferResult<TransferReceipt> {
        let lease = self.sequencer.reserve().await?;
        let nonce = lease.nonce();

        let tx = assemble(self.source.address(), &request, nonce, self.settings);
        let signed = self
            .source
            .sign(tx)
            .map_err(|e| TransferError::Signing(e.to_string()))?;

        let tx_hash = match self.client.broadcast(&signed).await {
            Ok(tx_hash) => tx_hash,
            Err(e) if e.leaves_nonce_unused() => return Err(e.into()),
            Err(source) => {
                lease.commit();
                warn!(nonce, error = %source, "Broadcast outcome unknown, nonce consumed");
                return Err(TransferError::Broadcast { nonce, source });
            }
        };
        lease.commit();
        debug!(nonce, tx = ?tx_hash, to = ?request.to, "Broadcast accepted");

        let receipt = self
            .client
            .wait_for_receipt(tx_hash)
            .await
            .map_err(|source| TransferError::Confirmation {
                nonce,
                tx_hash,
                source,
            })?;

        Ok(TransferReceipt {
            tx_hash,
            nonce,
            block_number: receipt.block_number.map(|b| b.as_u64()),
            gas_used: receipt.gas_used,
        })
    }
}
