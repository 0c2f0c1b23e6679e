//! Native coin sweep
//!
//! Runs strictly after token dispatch so token transfers are paid for first.
//! Sends the balance minus one transfer's worth of fees (gas price times the
//! configured gas limit).

use ethers::types::U256;
use std::sync::Arc;
use tracing::info;

use crate::dispatcher::{ensure_ready, DispatchError};
use crate::metrics::{metrics, Timer};
use crate::structured_logging::MigrationLogger;
use crate::tx_builder::{TransferContext, TransferRequest, TransferResult};
use crate::types::{TransferOutcome, TransferReport};

/// Amount left after reserving `gas_price * gas_limit`, or `None` when
/// nothing positive remains.
pub fn compute_sweep_amount(balance: U256, gas_price: U256, gas_limit: u64) -> Option<U256> {
    let reserve = gas_price.checked_mul(U256::from(gas_limit))?;
    balance.checked_sub(reserve).filter(|amount| !amount.is_zero())
}

pub struct NativeSweep {
    ctx: Arc<TransferContext>,
    logger: MigrationLogger,
}

impl NativeSweep {
    pub fn new(ctx: Arc<TransferContext>, logger: MigrationLogger) -> Self {
        Self { ctx, logger }
    }

    /// Move the remaining native balance to the destination.
    ///
    /// A balance that does not cover the fee reserve yields a `Skipped`
    /// report and draws no nonce.
    pub async fn sweep(&self) -> Result<TransferReport, DispatchError> {
        ensure_ready(&self.ctx).await?;
        let timer = Timer::new();

        let mut amount = None;
        let outcome = match self.transfer_remaining(&mut amount).await {
            Ok(outcome) => outcome,
            Err(e) => e.to_outcome(),
        };
        let report = TransferReport::native(amount, outcome);

        metrics().record_outcome(&report.outcome, &timer);
        self.logger
            .log_transfer_outcome(&report, (timer.elapsed_secs() * 1000.0) as u64);
        Ok(report)
    }

    /// `amount` is set once the sweep value is computed
    async fn transfer_remaining(
        &self,
        amount: &mut Option<U256>,
    ) -> TransferResult<TransferOutcome> {
        let destination = self.ctx.destination()?;
        let source = self.ctx.source().address();
        let gas_limit = self.ctx.settings().gas_limit;

        let balance = self.ctx.client.native_balance(source).await?;
        let gas_price = self.ctx.client.gas_price().await?;
        self.logger.log_sweep_amount(
            &balance.to_string(),
            &gas_price.saturating_mul(U256::from(gas_limit)).to_string(),
        );

        let Some(value) = compute_sweep_amount(balance, gas_price, gas_limit) else {
            info!(%balance, %gas_price, gas_limit, "Native balance does not cover fees");
            return Ok(TransferOutcome::Skipped("nothing to sweep".into()));
        };
        *amount = Some(value);

        let receipt = self
            .ctx
            .submit(TransferRequest {
                to: destination,
                value,
                data: None,
                gas_price,
            })
            .await?;
        Ok(TransferOutcome::Confirmed(receipt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_amount_reserves_fees() {
        let amount = compute_sweep_amount(U256::from(5_000_000u64), U256::from(10), 200_000);
        assert_eq!(amount, Some(U256::from(3_000_000u64)));
    }

    #[test]
    fn test_sweep_amount_none_when_fees_exceed_balance() {
        assert_eq!(
            compute_sweep_amount(U256::from(1_000_000u64), U256::from(10), 200_000),
            None
        );
    }

    #[test]
    fn test_sweep_amount_none_when_exactly_covered() {
        assert_eq!(
            compute_sweep_amount(U256::from(2_000_000u64), U256::from(10), 200_000),
            None
        );
    }

    #[test]
    fn test_sweep_amount_none_on_overflowing_reserve() {
        assert_eq!(compute_sweep_amount(U256::MAX, U256::MAX, 2), None);
    }
}
