//! Concurrent token transfer dispatch
//!
//! One task per holding, all sharing a [`TransferContext`]. Tasks build,
//! sign and confirm independently; the sequencer lease inside
//! [`TransferContext::submit`] is the only point where they serialize.
//! A failure inside a task becomes a `Failed` report for that holding and
//! never cancels its siblings.

use ethers::types::U256;
use futures::future::join_all;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::holdings::ClassifiedHoldings;
use crate::metrics::{metrics, Timer};
use crate::nonce_manager::SequencerError;
use crate::structured_logging::MigrationLogger;
use crate::tx_builder::{
    build_args, TransferArgs, TransferContext, TransferRequest, TransferResult,
};
use crate::types::{FailureKind, Holding, TransferOutcome, TransferReport};

/// Errors that abort a whole dispatch before any transaction is built
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Destination account must be set before dispatching transfers")]
    DestinationNotSet,

    #[error("Nonce sequencer not usable: {0}")]
    Sequencer(#[from] SequencerError),
}

/// Fail fast on context misuse
pub(crate) async fn ensure_ready(ctx: &TransferContext) -> Result<(), DispatchError> {
    ctx.destination()
        .map_err(|_| DispatchError::DestinationNotSet)?;
    if !ctx.sequencer().is_initialized().await {
        return Err(SequencerError::NotInitialized.into());
    }
    Ok(())
}

pub struct TransactionDispatcher {
    ctx: Arc<TransferContext>,
    logger: MigrationLogger,
    max_in_flight: Option<usize>,
}

impl TransactionDispatcher {
    pub fn new(ctx: Arc<TransferContext>, logger: MigrationLogger) -> Self {
        Self {
            ctx,
            logger,
            max_in_flight: None,
        }
    }

    /// Cap the number of transfers in progress at once. `None` or zero
    /// means unbounded.
    pub fn with_max_in_flight(mut self, limit: Option<usize>) -> Self {
        self.max_in_flight = limit.filter(|n| *n > 0);
        self
    }

    /// Transfer every holding to the destination.
    ///
    /// Returns one report per holding, in the order of `holdings.iter()`.
    pub async fn dispatch(
        &self,
        holdings: &ClassifiedHoldings,
    ) -> Result<Vec<TransferReport>, DispatchError> {
        ensure_ready(&self.ctx).await?;

        let all: Vec<Holding> = holdings.iter().cloned().collect();
        if all.is_empty() {
            info!("No token holdings to dispatch");
            return Ok(Vec::new());
        }
        info!(
            count = all.len(),
            max_in_flight = ?self.max_in_flight,
            "Dispatching token transfers"
        );

        let limiter = self.max_in_flight.map(|n| Arc::new(Semaphore::new(n)));
        let handles: Vec<_> = all
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, holding)| {
                let ctx = self.ctx.clone();
                let logger = self.logger.clone();
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    let _permit = match limiter {
                        Some(semaphore) => semaphore.acquire_owned().await.ok(),
                        None => None,
                    };
                    run_transfer(&ctx, &logger, holding, index).await
                })
            })
            .collect();

        let reports = join_all(handles)
            .await
            .into_iter()
            .zip(all)
            .map(|(joined, holding)| match joined {
                Ok(report) => report,
                Err(e) => {
                    let outcome = TransferOutcome::Failed {
                        reason: format!("transfer task aborted: {}", e),
                        nonce: None,
                        kind: FailureKind::Permanent,
                    };
                    metrics().record_outcome(&outcome, &Timer::new());
                    let report = TransferReport::token(holding, outcome);
                    self.logger.log_transfer_outcome(&report, 0);
                    report
                }
            })
            .collect();

        Ok(reports)
    }
}

async fn run_transfer(
    ctx: &TransferContext,
    logger: &MigrationLogger,
    holding: Holding,
    index: usize,
) -> TransferReport {
    logger.log_transfer_attempt(&holding.label(), index);
    let timer = Timer::new();

    let mut amount = None;
    let outcome = match transfer_holding(ctx, &holding, &mut amount).await {
        Ok(outcome) => outcome,
        Err(e) => e.to_outcome(),
    };

    metrics().record_outcome(&outcome, &timer);
    let report = TransferReport::token(holding, outcome).with_amount(amount);
    logger.log_transfer_outcome(&report, (timer.elapsed_secs() * 1000.0) as u64);
    report
}

/// Build and submit the transfer call for one holding. `amount` is set once
/// the ERC20 live balance is known, so a later failure still reports it.
async fn transfer_holding(
    ctx: &TransferContext,
    holding: &Holding,
    amount: &mut Option<U256>,
) -> TransferResult<TransferOutcome> {
    let destination = ctx.destination()?;
    let source = ctx.source().address();
    let handle = ctx.contracts().get_handle(holding.contract(), holding.class());
    let args = build_args(holding)?;

    // ERC20 moves the live balance, not the indexed quantity
    let live_balance = match args {
        TransferArgs::Fungible => {
            let output = ctx
                .client
                .call(handle.address(), handle.encode_balance_of(source)?)
                .await?;
            let balance = handle.decode_balance_of(&output)?;
            *amount = Some(balance);
            if balance.is_zero() {
                return Ok(TransferOutcome::Skipped("zero live balance".into()));
            }
            balance
        }
        _ => U256::zero(),
    };

    let call = args.into_call(live_balance);
    let data = handle.encode_transfer(source, destination, &call)?;
    let gas_price = ctx.client.gas_price().await?;
    debug!(asset = %holding.label(), ?call, "Submitting transfer");

    let receipt = ctx
        .submit(TransferRequest {
            to: handle.address(),
            value: U256::zero(),
            data: Some(data),
            gas_price,
        })
        .await?;
    Ok(TransferOutcome::Confirmed(receipt))
}
