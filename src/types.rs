//! Common types used throughout the migration pipeline

use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Asset class of a holding, one per token standard
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AssetClass {
    /// ERC20
    Fungible,
    /// ERC721
    NonFungible,
    /// ERC1155
    MultiToken,
}

impl AssetClass {
    /// All classes in dispatch order
    pub const ALL: [AssetClass; 3] = [
        AssetClass::Fungible,
        AssetClass::NonFungible,
        AssetClass::MultiToken,
    ];

    /// Numeric token standard (20, 721, 1155) as used by the indexer
    pub fn erc_number(&self) -> u16 {
        match self {
            AssetClass::Fungible => 20,
            AssetClass::NonFungible => 721,
            AssetClass::MultiToken => 1155,
        }
    }

    /// Upper-case standard name, e.g. `ERC721`
    pub fn erc_name(&self) -> &'static str {
        match self {
            AssetClass::Fungible => "ERC20",
            AssetClass::NonFungible => "ERC721",
            AssetClass::MultiToken => "ERC1155",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.erc_name())
    }
}

/// Holding record as returned by the indexing service.
///
/// Every field is optional here; the classifier decides which ones are
/// required for a given class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawHolding {
    #[serde(default)]
    pub token_address: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub token_quantity: Option<String>,
    #[serde(default)]
    pub token_decimals: Option<u8>,
    #[serde(default)]
    pub token_symbol: Option<String>,
    #[serde(default)]
    pub token_name: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub token_id: Option<String>,
    #[serde(default)]
    pub collection_symbol: Option<String>,
    #[serde(default)]
    pub collection_name: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub balance: Option<String>,
}

/// The indexer is inconsistent about quoting big integers.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// ERC20 balance snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FungibleHolding {
    pub contract: Address,
    /// Raw integer quantity, display only (the live balance is sent)
    pub quantity: String,
    pub decimals: u8,
    pub symbol: String,
    pub name: String,
}

/// One ERC721 token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonFungibleHolding {
    pub contract: Address,
    pub token_id: String,
    pub symbol: String,
    pub name: String,
}

/// One ERC1155 id-keyed balance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiTokenHolding {
    pub contract: Address,
    pub token_id: String,
    pub balance: String,
}

/// A validated holding, tagged by asset class
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Holding {
    Fungible(FungibleHolding),
    NonFungible(NonFungibleHolding),
    MultiToken(MultiTokenHolding),
}

impl Holding {
    pub fn class(&self) -> AssetClass {
        match self {
            Holding::Fungible(_) => AssetClass::Fungible,
            Holding::NonFungible(_) => AssetClass::NonFungible,
            Holding::MultiToken(_) => AssetClass::MultiToken,
        }
    }

    pub fn contract(&self) -> Address {
        match self {
            Holding::Fungible(h) => h.contract,
            Holding::NonFungible(h) => h.contract,
            Holding::MultiToken(h) => h.contract,
        }
    }

    /// Short human label used in logs and the report
    pub fn label(&self) -> String {
        match self {
            Holding::Fungible(h) => format!("{} ({:?})", h.symbol, h.contract),
            Holding::NonFungible(h) => format!("{} #{} ({:?})", h.symbol, h.token_id, h.contract),
            Holding::MultiToken(h) => {
                format!("id {} x{} ({:?})", h.token_id, h.balance, h.contract)
            }
        }
    }
}

/// Receipt data kept for a confirmed transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub tx_hash: H256,
    pub nonce: u64,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
}

/// Why a transfer failed, for logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Malformed holding data
    Data,
    /// Network trouble; a later run could succeed
    Transient,
    Permanent,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureKind::Data => "data",
            FailureKind::Transient => "transient",
            FailureKind::Permanent => "permanent",
        })
    }
}

/// Final state of one outbound transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Included on chain
    Confirmed(TransferReceipt),
    /// Build, broadcast or confirmation failed. `nonce` is set when the
    /// nonce was consumed by a broadcast transaction.
    Failed {
        reason: String,
        nonce: Option<u64>,
        kind: FailureKind,
    },
    /// Nothing to send (zero live balance, nothing to sweep)
    Skipped(String),
}

impl TransferOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, TransferOutcome::Confirmed(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TransferOutcome::Failed { .. })
    }

    /// Nonce consumed by this transfer, if any
    pub fn nonce(&self) -> Option<u64> {
        match self {
            TransferOutcome::Confirmed(r) => Some(r.nonce),
            TransferOutcome::Failed { nonce, .. } => *nonce,
            TransferOutcome::Skipped(_) => None,
        }
    }
}

/// What was transferred, for reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferSubject {
    Token(Holding),
    Native,
}

/// Outcome of one transfer together with its subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub subject: TransferSubject,
    /// Amount sent or attempted: the live ERC20 balance or the swept native
    /// value. `None` when it was never determined.
    pub amount: Option<U256>,
    pub outcome: TransferOutcome,
}

impl TransferReport {
    pub fn token(holding: Holding, outcome: TransferOutcome) -> Self {
        Self {
            subject: TransferSubject::Token(holding),
            amount: None,
            outcome,
        }
    }

    pub fn native(amount: Option<U256>, outcome: TransferOutcome) -> Self {
        Self {
            subject: TransferSubject::Native,
            amount,
            outcome,
        }
    }

    pub fn with_amount(mut self, amount: Option<U256>) -> Self {
        self.amount = amount;
        self
    }

    /// e.g. `ERC20 USDC (0x...) amount 777` or `native 1000000`
    pub fn describe(&self) -> String {
        match (&self.subject, self.amount) {
            (TransferSubject::Token(h), Some(amount)) => {
                format!("{} {} amount {}", h.class(), h.label(), amount)
            }
            (TransferSubject::Token(h), None) => format!("{} {}", h.class(), h.label()),
            (TransferSubject::Native, Some(amount)) => format!("native {}", amount),
            (TransferSubject::Native, None) => "native balance".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_holding_accepts_numeric_ids() {
        let raw: RawHolding = serde_json::from_str(
            r#"{"tokenAddress":"0x01","tokenId":42,"balance":"1000"}"#,
        )
        .unwrap();
        assert_eq!(raw.token_id.as_deref(), Some("42"));
        assert_eq!(raw.balance.as_deref(), Some("1000"));
        assert_eq!(raw.token_quantity, None);
    }

    #[test]
    fn test_describe_includes_attempted_amount() {
        let holding = Holding::Fungible(FungibleHolding {
            contract: Address::repeat_byte(0x01),
            quantity: "5".into(),
            decimals: 0,
            symbol: "USDC".into(),
            name: "USD Coin".into(),
        });
        let outcome = TransferOutcome::Skipped("test".into());

        let report =
            TransferReport::token(holding, outcome.clone()).with_amount(Some(U256::from(777)));
        assert!(report.describe().starts_with("ERC20 USDC"));
        assert!(report.describe().ends_with("amount 777"));

        let native = TransferReport::native(Some(U256::from(9)), outcome.clone());
        assert_eq!(native.describe(), "native 9");
        assert_eq!(
            TransferReport::native(None, outcome).describe(),
            "native balance"
        );
    }

    #[test]
    fn test_asset_class_names() {
        assert_eq!(AssetClass::Fungible.erc_number(), 20);
        assert_eq!(AssetClass::MultiToken.to_string(), "ERC1155");
    }
}
