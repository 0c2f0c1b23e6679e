//! Holdings lookup and classification
//!
//! Raw records come from the indexing service grouped by asset class. The
//! classifier validates them into typed [`Holding`]s and tallies ERC721
//! tokens per collection for the report. Dispatch still sends one transfer
//! per token id; the tallies are display only.

use async_trait::async_trait;
use ethers::types::Address;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::HoldingsConfig;
use crate::types::{
    AssetClass, FungibleHolding, Holding, MultiTokenHolding, NonFungibleHolding, RawHolding,
};

/// Raw indexer records per class
pub type RawHoldings = BTreeMap<AssetClass, Vec<RawHolding>>;

/// A record that could not be turned into a holding
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HoldingsError {
    #[error("{class} record #{index} is missing required field '{field}'")]
    MissingField {
        class: AssetClass,
        index: usize,
        field: &'static str,
    },

    #[error("{class} record #{index} has invalid contract address '{value}'")]
    InvalidAddress {
        class: AssetClass,
        index: usize,
        value: String,
    },
}

/// Number of ERC721 tokens held per collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionTally {
    pub contract: Address,
    pub symbol: String,
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ClassifiedHoldings {
    pub by_class: BTreeMap<AssetClass, Vec<Holding>>,
    /// ERC721 collections in first-seen order
    pub collections: Vec<CollectionTally>,
    /// Records dropped as malformed
    pub rejected: Vec<HoldingsError>,
}

impl ClassifiedHoldings {
    pub fn of_class(&self, class: AssetClass) -> &[Holding] {
        self.by_class.get(&class).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All holdings in dispatch order (ERC20, ERC721, ERC1155)
    pub fn iter(&self) -> impl Iterator<Item = &Holding> {
        AssetClass::ALL.iter().flat_map(move |c| self.of_class(*c).iter())
    }

    pub fn len(&self) -> usize {
        self.by_class.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn classify(raw: &RawHoldings) -> ClassifiedHoldings {
    let mut classified = ClassifiedHoldings::default();

    for (class, records) in raw {
        let holdings = classified.by_class.entry(*class).or_default();
        for (index, record) in records.iter().enumerate() {
            match validate(*class, index, record) {
                Ok(holding) => holdings.push(holding),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed holding");
                    classified.rejected.push(e);
                }
            }
        }
    }

    classified.collections = tally_collections(classified.of_class(AssetClass::NonFungible));
    classified
}

fn validate(class: AssetClass, index: usize, record: &RawHolding) -> Result<Holding, HoldingsError> {
    let required = |value: &Option<String>, field: &'static str| {
        value
            .clone()
            .ok_or(HoldingsError::MissingField { class, index, field })
    };

    let address = required(&record.token_address, "tokenAddress")?;
    let contract = Address::from_str(address.trim()).map_err(|_| HoldingsError::InvalidAddress {
        class,
        index,
        value: address.clone(),
    })?;

    Ok(match class {
        AssetClass::Fungible => Holding::Fungible(FungibleHolding {
            contract,
            quantity: required(&record.token_quantity, "tokenQuantity")?,
            decimals: record.token_decimals.ok_or(HoldingsError::MissingField {
                class,
                index,
                field: "tokenDecimals",
            })?,
            symbol: record.token_symbol.clone().unwrap_or_default(),
            name: record.token_name.clone().unwrap_or_default(),
        }),
        AssetClass::NonFungible => Holding::NonFungible(NonFungibleHolding {
            contract,
            token_id: required(&record.token_id, "tokenId")?,
            symbol: record
                .collection_symbol
                .clone()
                .or_else(|| record.token_symbol.clone())
                .unwrap_or_default(),
            name: record
                .collection_name
                .clone()
                .or_else(|| record.token_name.clone())
                .unwrap_or_default(),
        }),
        AssetClass::MultiToken => Holding::MultiToken(MultiTokenHolding {
            contract,
            token_id: required(&record.token_id, "tokenId")?,
            balance: required(&record.balance, "balance")?,
        }),
    })
}

fn tally_collections(nfts: &[Holding]) -> Vec<CollectionTally> {
    let mut tallies: Vec<CollectionTally> = Vec::new();
    for holding in nfts {
        let Holding::NonFungible(nft) = holding else {
            continue;
        };
        match tallies.iter_mut().find(|t| t.contract == nft.contract) {
            Some(tally) => tally.count += 1,
            None => tallies.push(CollectionTally {
                contract: nft.contract,
                symbol: nft.symbol.clone(),
                name: nft.name.clone(),
                count: 1,
            }),
        }
    }
    tallies
}

/// Indexer lookup of one class of holdings for an address.
///
/// `None` means the lookup did not succeed; callers treat that as "no
/// holdings of that class".
#[async_trait]
pub trait HoldingsSource: Send + Sync {
    async fn fetch(&self, address: Address, class: AssetClass) -> Option<Vec<RawHolding>>;
}

/// Query every class, in order
pub async fn fetch_all(source: &dyn HoldingsSource, address: Address) -> RawHoldings {
    let mut raw = RawHoldings::new();
    for class in AssetClass::ALL {
        match source.fetch(address, class).await {
            Some(items) => {
                info!(%class, count = items.len(), "Holdings fetched");
                raw.entry(class).or_default().extend(items);
            }
            None => {
                raw.entry(class).or_default();
            }
        }
    }
    raw
}

#[derive(Debug, Deserialize)]
struct HoldingsPage {
    #[serde(default)]
    items: Vec<RawHolding>,
}

/// Routescan holdings API
pub struct RoutescanSource {
    http: reqwest::Client,
    base_url: String,
    path_template: String,
}

impl RoutescanSource {
    pub fn new(config: &HoldingsConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            path_template: config.path_template.clone(),
        })
    }

    fn url(&self, address: Address, class: AssetClass) -> String {
        let path = self
            .path_template
            .replace("{address}", &format!("{:?}", address))
            .replace("{erc}", &class.erc_number().to_string());
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl HoldingsSource for RoutescanSource {
    async fn fetch(&self, address: Address, class: AssetClass) -> Option<Vec<RawHolding>> {
        let url = self.url(address, class);
        debug!(%url, "Fetching holdings");

        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(%class, error = %e, "Holdings request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(%class, status = %response.status(), "Holdings request unsuccessful");
            return None;
        }

        match response.json::<HoldingsPage>().await {
            Ok(page) => Some(page.items),
            Err(e) => {
                warn!(%class, error = %e, "Holdings response not understood");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: &str) -> RawHolding {
        serde_json::from_str(json).unwrap()
    }

    const A: &str = "0x1111111111111111111111111111111111111111";
    const B: &str = "0x2222222222222222222222222222222222222222";

    fn sample() -> RawHoldings {
        let mut map = RawHoldings::new();
        map.insert(
            AssetClass::Fungible,
            vec![raw(&format!(
                r#"{{"tokenAddress":"{A}","tokenQuantity":"1500000","tokenDecimals":6,"tokenSymbol":"USDC","tokenName":"USD Coin"}}"#
            ))],
        );
        map.insert(
            AssetClass::NonFungible,
            vec![
                raw(&format!(r#"{{"tokenAddress":"{B}","tokenId":"1","collectionSymbol":"APE","collectionName":"Apes"}}"#)),
                raw(&format!(r#"{{"tokenAddress":"{A}","tokenId":"9","collectionSymbol":"CAT","collectionName":"Cats"}}"#)),
                raw(&format!(r#"{{"tokenAddress":"{B}","tokenId":"2","collectionSymbol":"APE","collectionName":"Apes"}}"#)),
            ],
        );
        map.insert(
            AssetClass::MultiToken,
            vec![raw(&format!(r#"{{"tokenAddress":"{A}","tokenId":"7","balance":"1000"}}"#))],
        );
        map
    }

    #[test]
    fn test_classify_groups_and_keeps_every_token() {
        let classified = classify(&sample());
        assert_eq!(classified.of_class(AssetClass::Fungible).len(), 1);
        assert_eq!(classified.of_class(AssetClass::NonFungible).len(), 3);
        assert_eq!(classified.of_class(AssetClass::MultiToken).len(), 1);
        assert_eq!(classified.len(), 5);
        assert!(classified.rejected.is_empty());

        let classes: Vec<_> = classified.iter().map(Holding::class).collect();
        assert_eq!(classes[0], AssetClass::Fungible);
        assert_eq!(classes[4], AssetClass::MultiToken);
    }

    #[test]
    fn test_collections_tallied_in_first_seen_order() {
        let classified = classify(&sample());
        let tallies: Vec<_> = classified
            .collections
            .iter()
            .map(|t| (t.symbol.as_str(), t.count))
            .collect();
        assert_eq!(tallies, vec![("APE", 2), ("CAT", 1)]);
    }

    #[test]
    fn test_missing_field_is_rejected_not_fatal() {
        let mut map = sample();
        map.get_mut(&AssetClass::MultiToken)
            .unwrap()
            .push(raw(&format!(r#"{{"tokenAddress":"{A}","tokenId":"8"}}"#)));
        map.get_mut(&AssetClass::Fungible)
            .unwrap()
            .push(raw(r#"{"tokenAddress":"nope","tokenQuantity":"1","tokenDecimals":18}"#));

        let classified = classify(&map);
        assert_eq!(classified.len(), 5);
        assert_eq!(
            classified.rejected,
            vec![
                HoldingsError::InvalidAddress {
                    class: AssetClass::Fungible,
                    index: 1,
                    value: "nope".into()
                },
                HoldingsError::MissingField {
                    class: AssetClass::MultiToken,
                    index: 1,
                    field: "balance"
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_routescan_non_200_means_no_holdings() {
        let mut server = mockito::Server::new_async().await;
        let erc20 = server
            .mock("GET", mockito::Matcher::Regex("erc20-holdings".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{"items":[{{"tokenAddress":"{A}","tokenQuantity":"5","tokenDecimals":0}}],"count":1}}"#
            ))
            .create_async()
            .await;
        let erc721 = server
            .mock("GET", mockito::Matcher::Regex("erc721-holdings".into()))
            .with_status(500)
            .create_async()
            .await;

        let config = HoldingsConfig {
            base_url: server.url(),
            path_template: "/address/{address}/erc{erc}-holdings".into(),
            timeout_secs: 5,
        };
        let source = RoutescanSource::new(&config).unwrap();
        let raw = fetch_all(&source, Address::repeat_byte(0x01)).await;

        erc20.assert_async().await;
        erc721.assert_async().await;
        assert_eq!(raw[&AssetClass::Fungible].len(), 1);
        assert!(raw[&AssetClass::NonFungible].is_empty());
        assert!(raw[&AssetClass::MultiToken].is_empty());
    }

    #[test]
    fn test_url_substitution() {
        let config = HoldingsConfig {
            base_url: "https://api.example/".into(),
            path_template: "/a/{address}/erc{erc}-holdings?limit=100".into(),
            timeout_secs: 5,
        };
        let source = RoutescanSource::new(&config).unwrap();
        assert_eq!(
            source.url(Address::repeat_byte(0xab), AssetClass::MultiToken),
            "https://api.example/a/0xabababababababababababababababababababab/erc1155-holdings?limit=100"
        );
    }
}
