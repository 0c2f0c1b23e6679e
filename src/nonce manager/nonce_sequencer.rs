//! Account nonce sequencer
//!
//! One sequencer exists per source account and run. It is constructed
//! uninitialized, initialized exactly once from the network's pending
//! transaction count, and then hands out strictly increasing, gapless
//! nonces to any number of concurrent tasks.
//!
//! Two issuance styles are offered:
//! - [`NonceSequencer::next`] consumes the next value immediately.
//! - [`NonceSequencer::reserve`] returns a [`NonceLease`] that keeps the
//!   exclusive section held while the caller signs and broadcasts. Calling
//!   [`NonceLease::commit`] consumes the value; dropping the lease leaves the
//!   counter untouched, so a failed broadcast does not open a gap.

use ethers::types::Address;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::nonce_errors::{SequencerError, SequencerResult};
use crate::metrics::{metrics, Timer};
use crate::rpc_manager::ChainClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SequencerState {
    Uninitialized,
    Ready { start: u64, next: u64 },
}

pub struct NonceSequencer {
    client: Arc<dyn ChainClient>,
    address: Address,
    state: Mutex<SequencerState>,
}

impl NonceSequencer {
    pub fn new(client: Arc<dyn ChainClient>, address: Address) -> Self {
        Self {
            client,
            address,
            state: Mutex::new(SequencerState::Uninitialized),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Load the starting nonce from the network.
    ///
    /// Returns the starting value. A second call fails with
    /// [`SequencerError::AlreadyInitialized`] and leaves the state as is.
    pub async fn initialize(&self) -> SequencerResult<u64> {
        let mut state = self.state.lock().await;
        if let SequencerState::Ready { start, next } = *state {
            warn!(start, next, "Nonce sequencer initialized twice");
            return Err(SequencerError::AlreadyInitialized { start, next });
        }

        let start = self.client.transaction_count(self.address).await?;
        *state = SequencerState::Ready { start, next: start };
        info!(address = ?self.address, start, "Nonce sequencer initialized");
        Ok(start)
    }

    pub async fn is_initialized(&self) -> bool {
        matches!(*self.state.lock().await, SequencerState::Ready { .. })
    }

    /// Issue the next nonce.
    pub async fn next(&self) -> SequencerResult<u64> {
        let lease = self.reserve().await?;
        Ok(lease.commit())
    }

    /// Hold the next nonce until the lease is committed or dropped.
    ///
    /// Other callers block until this lease goes away.
    pub async fn reserve(&self) -> SequencerResult<NonceLease<'_>> {
        let guard = self.state.lock().await;
        match *guard {
            SequencerState::Uninitialized => Err(SequencerError::NotInitialized),
            SequencerState::Ready { next, .. } => Ok(NonceLease {
                guard,
                nonce: next,
                held: Timer::new(),
                committed: false,
            }),
        }
    }

    /// Next value that would be issued, if initialized
    pub async fn peek(&self) -> Option<u64> {
        match *self.state.lock().await {
            SequencerState::Ready { next, .. } => Some(next),
            SequencerState::Uninitialized => None,
        }
    }

    /// Number of nonces issued since initialization
    pub async fn issued(&self) -> u64 {
        match *self.state.lock().await {
            SequencerState::Ready { start, next } => next - start,
            SequencerState::Uninitialized => 0,
        }
    }
}

/// Exclusive hold on the sequencer's next value
pub struct NonceLease<'a> {
    guard: MutexGuard<'a, SequencerState>,
    nonce: u64,
    held: Timer,
    committed: bool,
}

impl NonceLease<'_> {
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Consume the nonce and release the sequencer
    pub fn commit(mut self) -> u64 {
        if let SequencerState::Ready { next, .. } = &mut *self.guard {
            *next += 1;
        }
        self.committed = true;

        let m = metrics();
        m.nonces_issued.inc();
        self.held.observe_duration(&m.nonce_lease_hold);
        debug!(nonce = self.nonce, "Nonce committed");
        self.nonce
    }
}

impl Drop for NonceLease<'_> {
    fn drop(&mut self) {
        if !self.committed {
            metrics().nonce_leases_rolled_back.inc();
            debug!(nonce = self.nonce, "Nonce lease released without commit");
        }
    }
}

impl std::fmt::Debug for NonceLease<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceLease")
            .field("nonce", &self.nonce)
            .field("committed", &self.committed)
            .finish()
    }
}
