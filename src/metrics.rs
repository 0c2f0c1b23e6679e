//! Metrics collection and export module

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder};
use std::time::Instant;

use crate::types::TransferOutcome;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Nonce-related counters
    pub nonces_issued: IntCounter,
    pub nonce_leases_rolled_back: IntCounter,

    // Transfer counters
    pub transfers_confirmed: IntCounter,
    pub transfers_failed: IntCounter,
    pub transfers_skipped: IntCounter,

    // Histograms
    pub transfer_latency: Histogram,
    pub nonce_lease_hold: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let nonces_issued = IntCounter::with_opts(Opts::new(
            "nonces_issued_total",
            "Number of nonces committed by the sequencer",
        ))?;

        let nonce_leases_rolled_back = IntCounter::with_opts(Opts::new(
            "nonce_leases_rolled_back_total",
            "Number of nonce leases released without being consumed",
        ))?;

        let transfers_confirmed = IntCounter::with_opts(Opts::new(
            "transfers_confirmed_total",
            "Number of transfers included on chain",
        ))?;

        let transfers_failed = IntCounter::with_opts(Opts::new(
            "transfers_failed_total",
            "Number of transfers that failed to build, broadcast or confirm",
        ))?;

        let transfers_skipped = IntCounter::with_opts(Opts::new(
            "transfers_skipped_total",
            "Number of transfers skipped because there was nothing to send",
        ))?;

        let transfer_latency = Histogram::with_opts(
            HistogramOpts::new(
                "transfer_latency_seconds",
                "Time from dispatch to confirmed receipt",
            )
            .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
        )?;

        let nonce_lease_hold = Histogram::with_opts(
            HistogramOpts::new(
                "nonce_lease_hold_seconds",
                "Duration the sequencer is held while signing and broadcasting",
            )
            .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(nonces_issued.clone()))?;
        registry.register(Box::new(nonce_leases_rolled_back.clone()))?;
        registry.register(Box::new(transfers_confirmed.clone()))?;
        registry.register(Box::new(transfers_failed.clone()))?;
        registry.register(Box::new(transfers_skipped.clone()))?;
        registry.register(Box::new(transfer_latency.clone()))?;
        registry.register(Box::new(nonce_lease_hold.clone()))?;

        Ok(Self {
            registry,
            nonces_issued,
            nonce_leases_rolled_back,
            transfers_confirmed,
            transfers_failed,
            transfers_skipped,
            transfer_latency,
            nonce_lease_hold,
        })
    }

    /// Count a finished transfer and, when it was confirmed, its latency
    /// since `timer` started
    pub fn record_outcome(&self, outcome: &TransferOutcome, timer: &Timer) {
        match outcome {
            TransferOutcome::Confirmed(_) => {
                self.transfers_confirmed.inc();
                timer.observe_duration(&self.transfer_latency);
            }
            TransferOutcome::Failed { .. } => self.transfers_failed.inc(),
            TransferOutcome::Skipped(_) => self.transfers_skipped.inc(),
        }
    }

    /// Prometheus text exposition of every registered metric
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::debug!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.start.elapsed().as_secs_f64());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_registered_metrics() {
        let m = Metrics::new().unwrap();
        m.nonces_issued.inc();
        let text = m.render();
        assert!(text.contains("nonces_issued_total 1"));
        assert!(text.contains("transfers_failed_total 0"));
    }

    #[test]
    fn test_only_confirmed_transfers_record_latency() {
        let m = Metrics::new().unwrap();
        let timer = Timer::new();
        m.record_outcome(&TransferOutcome::Skipped("zero live balance".into()), &timer);
        assert_eq!(m.transfer_latency.get_sample_count(), 0);

        let receipt = crate::types::TransferReceipt {
            tx_hash: ethers::types::H256::zero(),
            nonce: 0,
            block_number: None,
            gas_used: None,
        };
        m.record_outcome(&TransferOutcome::Confirmed(receipt), &timer);
        assert_eq!(m.transfer_latency.get_sample_count(), 1);
        assert_eq!(m.transfers_confirmed.get(), 1);
        assert_eq!(m.transfers_skipped.get(), 1);
    }
}
