//! Contract handles and their per-run cache
//!
//! One ABI per asset class is parsed at startup. A handle binds an ABI to a
//! contract address and is built at most once per (address, class) for the
//! lifetime of a [`ContractRegistry`], even under concurrent lookups.

use dashmap::DashMap;
use ethers::abi::Abi;
use ethers::contract::BaseContract;
use ethers::types::{Address, Bytes, U256};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::args::TransferCall;
use super::errors::{TransferError, TransferResult};
use crate::types::AssetClass;

const ERC20_ABI: &str = include_str!("../../abis/erc20.json");
const ERC721_ABI: &str = include_str!("../../abis/erc721.json");
const ERC1155_ABI: &str = include_str!("../../abis/erc1155.json");

/// Parsed ABI definitions, one per asset class
#[derive(Debug, Clone)]
pub struct AbiSet {
    erc20: Abi,
    erc721: Abi,
    erc1155: Abi,
}

impl AbiSet {
    pub fn load() -> TransferResult<Self> {
        Ok(Self {
            erc20: parse_abi(AssetClass::Fungible, ERC20_ABI)?,
            erc721: parse_abi(AssetClass::NonFungible, ERC721_ABI)?,
            erc1155: parse_abi(AssetClass::MultiToken, ERC1155_ABI)?,
        })
    }

    pub fn for_class(&self, class: AssetClass) -> &Abi {
        match class {
            AssetClass::Fungible => &self.erc20,
            AssetClass::NonFungible => &self.erc721,
            AssetClass::MultiToken => &self.erc1155,
        }
    }
}

fn parse_abi(class: AssetClass, json: &str) -> TransferResult<Abi> {
    serde_json::from_str(json).map_err(|e| TransferError::Abi {
        class,
        reason: e.to_string(),
    })
}

/// Callable interface of one token contract
#[derive(Debug, Clone)]
pub struct ContractHandle {
    address: Address,
    class: AssetClass,
    contract: BaseContract,
}

impl ContractHandle {
    pub fn new(address: Address, class: AssetClass, abi: Abi) -> Self {
        Self {
            address,
            class,
            contract: BaseContract::from(abi),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn class(&self) -> AssetClass {
        self.class
    }

    /// `balanceOf(owner)` call data (ERC20 / ERC721 signature)
    pub fn encode_balance_of(&self, owner: Address) -> TransferResult<Bytes> {
        self.contract
            .encode("balanceOf", owner)
            .map_err(|e| encoding_error("balanceOf", e))
    }

    pub fn decode_balance_of(&self, output: &Bytes) -> TransferResult<U256> {
        self.contract
            .decode_output::<U256, _>("balanceOf", output)
            .map_err(|e| encoding_error("balanceOf", e))
    }

    /// Call data moving `call` from `from` to `to`
    pub fn encode_transfer(
        &self,
        from: Address,
        to: Address,
        call: &TransferCall,
    ) -> TransferResult<Bytes> {
        match (self.class, call) {
            (AssetClass::Fungible, TransferCall::Fungible { amount }) => self
                .contract
                .encode("transfer", (to, *amount))
                .map_err(|e| encoding_error("transfer", e)),
            (AssetClass::NonFungible, TransferCall::NonFungible { token_id }) => self
                .contract
                .encode("transferFrom", (from, to, *token_id))
                .map_err(|e| encoding_error("transferFrom", e)),
            (AssetClass::MultiToken, TransferCall::MultiToken { token_id, amount }) => self
                .contract
                .encode("safeTransferFrom", (from, to, *token_id, *amount, Bytes::new()))
                .map_err(|e| encoding_error("safeTransferFrom", e)),
            (class, call) => Err(TransferError::Encoding {
                function: "transfer",
                reason: format!("{:?} does not apply to a {} contract", call, class),
            }),
        }
    }
}

fn encoding_error(function: &'static str, err: ethers::contract::AbiError) -> TransferError {
    TransferError::Encoding {
        function,
        reason: err.to_string(),
    }
}

/// Memoized contract handles for one run
pub struct ContractRegistry {
    abis: AbiSet,
    handles: DashMap<(Address, AssetClass), Arc<ContractHandle>>,
    constructed: AtomicUsize,
}

impl ContractRegistry {
    pub fn new(abis: AbiSet) -> Self {
        Self {
            abis,
            handles: DashMap::new(),
            constructed: AtomicUsize::new(0),
        }
    }

    /// Cached handle for (address, class), built on first request.
    ///
    /// The shard lock held by `entry` makes check-then-insert a single step,
    /// so concurrent callers never build the same handle twice.
    pub fn get_handle(&self, address: Address, class: AssetClass) -> Arc<ContractHandle> {
        self.handles
            .entry((address, class))
            .or_insert_with(|| {
                self.constructed.fetch_add(1, Ordering::SeqCst);
                debug!(contract = ?address, %class, "Loading contract handle");
                Arc::new(ContractHandle::new(
                    address,
                    class,
                    self.abis.for_class(class).clone(),
                ))
            })
            .value()
            .clone()
    }

    /// How many handles have been built so far
    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
