//! Native sweep tests

use ethers::types::{Address, H160, U256};
use std::sync::Arc;

use crate::dispatcher::DispatchError;
use crate::structured_logging::MigrationLogger;
use crate::sweep::NativeSweep;
use crate::test_utils::{test_context, MockChainClient};
use crate::tx_builder::TransferContext;
use crate::types::{FailureKind, TransferOutcome, TransferSubject};

const DESTINATION: Address = H160([0xde; 20]);

async fn ready_context(client: Arc<MockChainClient>) -> Arc<TransferContext> {
    let ctx = test_context(client);
    ctx.set_destination(DESTINATION).unwrap();
    ctx.sequencer().initialize().await.unwrap();
    ctx
}

fn sweeper(ctx: Arc<TransferContext>) -> NativeSweep {
    NativeSweep::new(ctx, MigrationLogger::with_run_id("test".into()))
}

#[tokio::test]
async fn test_fees_exceeding_balance_skip_without_nonce() {
    // 1,000,000 - 10 * 200,000 is negative
    let client = Arc::new(MockChainClient::new(6));
    client.set_native_balance(U256::from(1_000_000u64));
    client.set_gas_price(U256::from(10u64));

    let ctx = ready_context(client.clone()).await;
    let report = sweeper(ctx.clone()).sweep().await.unwrap();

    assert_eq!(
        report.outcome,
        TransferOutcome::Skipped("nothing to sweep".into())
    );
    assert!(client.broadcasts().is_empty());
    assert_eq!(ctx.sequencer().issued().await, 0);
}

#[tokio::test]
async fn test_sweeps_balance_minus_fee_reserve() {
    let client = Arc::new(MockChainClient::new(6));
    client.set_native_balance(U256::from(10_000_000u64));
    client.set_gas_price(U256::from(10u64));

    let ctx = ready_context(client.clone()).await;
    let report = sweeper(ctx).sweep().await.unwrap();

    assert_eq!(report.subject, TransferSubject::Native);
    assert_eq!(report.amount, Some(U256::from(8_000_000u64)));
    assert_eq!(report.outcome.nonce(), Some(6));
    assert!(report.outcome.is_confirmed());

    let broadcasts = client.broadcasts();
    assert_eq!(broadcasts.len(), 1);
    assert_eq!(broadcasts[0].to, Some(DESTINATION));
    assert_eq!(broadcasts[0].value, U256::from(8_000_000u64));
    assert!(broadcasts[0].data.as_ref().map_or(true, |d| d.is_empty()));
}

#[tokio::test]
async fn test_rejected_sweep_returns_nonce() {
    let client = Arc::new(MockChainClient::new(2));
    client.set_native_balance(U256::from(10_000_000u64));
    client.set_gas_price(U256::one());
    client.fail_broadcast_when(|_| true);

    let ctx = ready_context(client.clone()).await;
    let report = sweeper(ctx.clone()).sweep().await.unwrap();

    assert!(report.outcome.is_failed());
    assert_eq!(report.outcome.nonce(), None);
    assert_eq!(ctx.sequencer().peek().await, Some(2));
    // The attempted value is still reported
    assert_eq!(report.amount, Some(U256::from(9_800_000u64)));
    assert_eq!(report.describe(), "native 9800000");
}

#[tokio::test]
async fn test_lost_sweep_response_consumes_nonce() {
    let client = Arc::new(MockChainClient::new(2));
    client.set_native_balance(U256::from(10_000_000u64));
    client.set_gas_price(U256::one());
    client.lose_broadcast_response_when(|_| true);

    let ctx = ready_context(client.clone()).await;
    let report = sweeper(ctx.clone()).sweep().await.unwrap();

    match &report.outcome {
        TransferOutcome::Failed { nonce, kind, .. } => {
            assert_eq!(*nonce, Some(2));
            assert_eq!(*kind, FailureKind::Transient);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(client.broadcast_nonces(), vec![2]);
    assert_eq!(ctx.sequencer().peek().await, Some(3));
}

#[tokio::test]
async fn test_sweep_requires_destination() {
    let client = Arc::new(MockChainClient::new(0));
    client.set_native_balance(U256::from(10_000_000u64));
    let ctx = test_context(client.clone());
    ctx.sequencer().initialize().await.unwrap();

    let err = sweeper(ctx).sweep().await.unwrap_err();
    assert!(matches!(err, DispatchError::DestinationNotSet));
    assert!(client.broadcasts().is_empty());
}
