//! Concurrency tests for the nonce sequencer
//!
//! - contiguous, duplicate-free issuance under concurrent callers
//! - two-phase lifecycle guards
//! - lease rollback and exclusivity

use ethers::types::Address;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::nonce_manager::{NonceSequencer, SequencerError};
use crate::rpc_manager::ChainClient;
use crate::test_utils::MockChainClient;

/// Helper: sequencer over a mock reporting `start` as the next nonce
fn create_sequencer(start: u64) -> Arc<NonceSequencer> {
    let client: Arc<dyn ChainClient> = Arc::new(MockChainClient::new(start).with_jitter(2));
    Arc::new(NonceSequencer::new(client, Address::repeat_byte(0x11)))
}

/// Helper: `n` tasks each drawing one nonce after a random delay
async fn issue_concurrently(sequencer: Arc<NonceSequencer>, n: usize) -> Vec<u64> {
    let handles: Vec<_> = (0..n)
        .map(|_| {
            let sequencer = sequencer.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_micros(fastrand::u64(0..500))).await;
                sequencer.next().await.unwrap()
            })
        })
        .collect();

    futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_issuance_is_contiguous() {
    const NUM_TASKS: usize = 200;

    let sequencer = create_sequencer(17);
    assert_eq!(sequencer.initialize().await.unwrap(), 17);

    let mut issued = issue_concurrently(sequencer.clone(), NUM_TASKS).await;
    issued.sort_unstable();

    let expected: Vec<u64> = (17..17 + NUM_TASKS as u64).collect();
    assert_eq!(issued, expected);
    assert_eq!(sequencer.issued().await, NUM_TASKS as u64);
    assert_eq!(sequencer.peek().await, Some(17 + NUM_TASKS as u64));
}

#[tokio::test]
async fn test_initialize_twice_is_rejected() {
    let sequencer = create_sequencer(5);
    sequencer.initialize().await.unwrap();
    sequencer.next().await.unwrap();

    let err = sequencer.initialize().await.unwrap_err();
    assert_eq!(err, SequencerError::AlreadyInitialized { start: 5, next: 6 });
    assert!(err.is_logic_error());

    // State untouched by the failed call
    assert_eq!(sequencer.next().await.unwrap(), 6);
}

#[tokio::test]
async fn test_issuance_before_initialize_fails() {
    let sequencer = create_sequencer(0);
    assert!(!sequencer.is_initialized().await);

    let err = sequencer.next().await.unwrap_err();
    assert_eq!(err, SequencerError::NotInitialized);
    assert!(err.is_logic_error());
    assert!(matches!(
        sequencer.reserve().await,
        Err(SequencerError::NotInitialized)
    ));
    assert_eq!(sequencer.peek().await, None);
}

#[tokio::test]
async fn test_dropped_lease_rolls_back() {
    let sequencer = create_sequencer(3);
    sequencer.initialize().await.unwrap();

    {
        let lease = sequencer.reserve().await.unwrap();
        assert_eq!(lease.nonce(), 3);
    }

    assert_eq!(sequencer.issued().await, 0);
    assert_eq!(sequencer.next().await.unwrap(), 3);
    assert_eq!(sequencer.next().await.unwrap(), 4);
}

#[tokio::test]
async fn test_lease_excludes_other_callers() {
    let sequencer = create_sequencer(9);
    sequencer.initialize().await.unwrap();

    let lease = sequencer.reserve().await.unwrap();
    let blocked = timeout(Duration::from_millis(50), sequencer.next()).await;
    assert!(blocked.is_err(), "next() must wait while a lease is held");

    assert_eq!(lease.commit(), 9);
    assert_eq!(sequencer.next().await.unwrap(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_commit_and_rollback_stays_gapless() {
    let sequencer = create_sequencer(100);
    sequencer.initialize().await.unwrap();

    let handles: Vec<_> = (0..50)
        .map(|i| {
            let sequencer = sequencer.clone();
            tokio::spawn(async move {
                let lease = sequencer.reserve().await.unwrap();
                if i % 3 == 0 {
                    None
                } else {
                    Some(lease.commit())
                }
            })
        })
        .collect();

    let mut committed: Vec<u64> = futures::future::join_all(handles)
        .await
        .into_iter()
        .filter_map(|r| r.unwrap())
        .collect();
    committed.sort_unstable();

    let expected: Vec<u64> = (100..100 + committed.len() as u64).collect();
    assert_eq!(committed, expected);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_concurrent_issuance_matches_range(start in 0u64..1_000_000, n in 1usize..64) {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();

        let mut issued = rt.block_on(async {
            let sequencer = create_sequencer(start);
            sequencer.initialize().await.unwrap();
            issue_concurrently(sequencer, n).await
        });
        issued.sort_unstable();

        let expected: Vec<u64> = (start..start + n as u64).collect();
        prop_assert_eq!(issued, expected);
    }
}
