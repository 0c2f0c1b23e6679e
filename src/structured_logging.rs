//! Structured logging for migration events

use uuid::Uuid;

use crate::types::{TransferOutcome, TransferReport};

/// Structured logger for one migration run
#[derive(Debug, Clone)]
pub struct MigrationLogger {
    run_id: String,
}

impl MigrationLogger {
    pub fn new() -> Self {
        Self::with_run_id(Uuid::new_v4().to_string())
    }

    pub fn with_run_id(run_id: String) -> Self {
        Self { run_id }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn log_run_start(&self, source: &str, destination: &str) {
        tracing::info!(
            run_id = %self.run_id,
            source = %source,
            destination = %destination,
            "Migration started"
        );
    }

    pub fn log_transfer_attempt(&self, asset: &str, index: usize) {
        tracing::debug!(
            run_id = %self.run_id,
            asset = %asset,
            index = %index,
            "Dispatching transfer"
        );
    }

    /// One line per finished transfer, level chosen by outcome
    pub fn log_transfer_outcome(&self, report: &TransferReport, latency_ms: u64) {
        let asset = report.describe();
        match &report.outcome {
            TransferOutcome::Confirmed(receipt) => tracing::info!(
                run_id = %self.run_id,
                asset = %asset,
                nonce = %receipt.nonce,
                tx_hash = ?receipt.tx_hash,
                latency_ms = %latency_ms,
                "Transfer confirmed"
            ),
            TransferOutcome::Failed {
                reason,
                nonce,
                kind,
            } => tracing::warn!(
                run_id = %self.run_id,
                asset = %asset,
                amount = ?report.amount,
                nonce = ?nonce,
                kind = %kind,
                error = %reason,
                latency_ms = %latency_ms,
                "Transfer failed"
            ),
            TransferOutcome::Skipped(reason) => tracing::info!(
                run_id = %self.run_id,
                asset = %asset,
                reason = %reason,
                "Transfer skipped"
            ),
        }
    }

    pub fn log_sweep_amount(&self, balance: &str, fee_reserve: &str) {
        tracing::info!(
            run_id = %self.run_id,
            balance = %balance,
            fee_reserve = %fee_reserve,
            "Computing native sweep"
        );
    }

    pub fn log_summary(&self, confirmed: usize, failed: usize, skipped: usize) {
        tracing::info!(
            run_id = %self.run_id,
            confirmed = %confirmed,
            failed = %failed,
            skipped = %skipped,
            "Migration finished"
        );
    }
}

impl Default for MigrationLogger {
    fn default() -> Self {
        Self::new()
    }
}
