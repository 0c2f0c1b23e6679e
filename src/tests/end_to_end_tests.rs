//! Full migration runs against in-memory chain and holdings sources

use async_trait::async_trait;
use ethers::types::{Address, H160, U256};
use std::sync::Arc;

use crate::holdings::{HoldingsSource, RawHoldings};
use crate::migration::{Migration, MigrationOptions};
use crate::test_utils::{test_context, MockChainClient};
use crate::types::{AssetClass, RawHolding, TransferSubject};

const TOKEN_A: Address = H160([0xa1; 20]);
const TOKEN_B: Address = H160([0xa2; 20]);
const NFT: Address = H160([0xb1; 20]);

/// Fixed holdings per class
struct StaticHoldings(RawHoldings);

#[async_trait]
impl HoldingsSource for StaticHoldings {
    async fn fetch(&self, _address: Address, class: AssetClass) -> Option<Vec<RawHolding>> {
        self.0.get(&class).cloned()
    }
}

fn erc20(contract: Address, symbol: &str) -> RawHolding {
    RawHolding {
        token_address: Some(format!("{:?}", contract)),
        token_quantity: Some("5000000".into()),
        token_decimals: Some(6),
        token_symbol: Some(symbol.into()),
        token_name: Some(format!("{} Token", symbol)),
        ..Default::default()
    }
}

fn erc721(contract: Address, token_id: Option<&str>) -> RawHolding {
    RawHolding {
        token_address: Some(format!("{:?}", contract)),
        token_id: token_id.map(String::from),
        collection_symbol: Some("APE".into()),
        collection_name: Some("Apes".into()),
        ..Default::default()
    }
}

fn two_tokens_one_nft() -> RawHoldings {
    let mut raw = RawHoldings::new();
    raw.insert(
        AssetClass::Fungible,
        vec![erc20(TOKEN_A, "USDC"), erc20(TOKEN_B, "JOE")],
    );
    raw.insert(AssetClass::NonFungible, vec![erc721(NFT, Some("42"))]);
    raw
}

fn funded_client(start: u64) -> Arc<MockChainClient> {
    let client = Arc::new(MockChainClient::new(start).with_jitter(5));
    client.set_token_balance(TOKEN_A, U256::from(5_000_000u64));
    client.set_token_balance(TOKEN_B, U256::from(9u64));
    client.set_native_balance(U256::exp10(18));
    client
}

fn options(dir: &tempfile::TempDir, dry_run: bool) -> MigrationOptions {
    MigrationOptions {
        dry_run,
        max_in_flight: None,
        report_dir: dir.path().to_path_buf(),
        echo: false,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tokens_then_sweep() {
    let dir = tempfile::tempdir().unwrap();
    let client = funded_client(42);
    let ctx = test_context(client.clone());
    let source = Arc::new(StaticHoldings(two_tokens_one_nft()));

    let summary = Migration::new(ctx, source, options(&dir, false))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.reports.len(), 4);
    assert_eq!(summary.confirmed(), 4);

    let (sweep, tokens) = summary.reports.split_last().unwrap();
    assert!(matches!(sweep.subject, TransferSubject::Native));

    let mut token_nonces: Vec<u64> = tokens.iter().filter_map(|r| r.outcome.nonce()).collect();
    token_nonces.sort_unstable();
    assert_eq!(token_nonces, vec![42, 43, 44]);

    let sweep_nonce = sweep.outcome.nonce().unwrap();
    assert!(token_nonces.iter().all(|n| sweep_nonce > *n));
    assert_eq!(sweep_nonce, 45);

    // The sweep is the last transaction to reach the network
    let broadcasts = client.broadcasts();
    assert_eq!(broadcasts.len(), 4);
    assert_eq!(broadcasts[3].to, Some(summary.destination));
    assert!(broadcasts[3].value > U256::zero());

    let text = std::fs::read_to_string(&summary.report_path).unwrap();
    assert!(text.contains(&format!("TO: {:?}", summary.destination)));
    assert!(text.contains("PRIVATE KEY: 0x"));
    assert!(text.contains("ERC20 HOLDINGS"));
    assert!(text.contains("5.00"));
    assert!(text.contains("TRANSFERS"));
    assert!(text.contains("confirmed: 4, failed: 0, skipped: 0"));
}

#[tokio::test]
async fn test_dry_run_sends_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let client = funded_client(0);
    let ctx = test_context(client.clone());
    let source = Arc::new(StaticHoldings(two_tokens_one_nft()));

    let summary = Migration::new(ctx.clone(), source, options(&dir, true))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.holdings.len(), 3);
    assert!(summary.reports.is_empty());
    assert!(client.broadcasts().is_empty());
    // Holdings come from the indexer; the chain is never touched
    assert_eq!(client.call_count(), 0);
    assert!(!ctx.sequencer().is_initialized().await);
    assert!(summary.report_path.exists());
}

#[tokio::test]
async fn test_malformed_record_does_not_stop_run() {
    let dir = tempfile::tempdir().unwrap();
    let client = funded_client(0);
    let ctx = test_context(client.clone());

    let mut raw = two_tokens_one_nft();
    raw.get_mut(&AssetClass::NonFungible)
        .unwrap()
        .push(erc721(NFT, None));
    let source = Arc::new(StaticHoldings(raw));

    let summary = Migration::new(ctx, source, options(&dir, false))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.holdings.rejected.len(), 1);
    assert_eq!(summary.reports.len(), 4);
    assert_eq!(client.broadcasts().len(), 4);
}

#[tokio::test]
async fn test_missing_class_is_treated_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let client = funded_client(3);
    let ctx = test_context(client.clone());
    let mut raw = RawHoldings::new();
    raw.insert(AssetClass::Fungible, vec![erc20(TOKEN_A, "USDC")]);
    let source = Arc::new(StaticHoldings(raw));

    let summary = Migration::new(ctx, source, options(&dir, false))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.reports.len(), 2);
    assert_eq!(client.broadcast_nonces(), vec![3, 4]);
}
