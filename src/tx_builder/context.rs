//! Execution context shared by every transfer of a run
//!
//! Holds the chain client, the source account, the destination (set once),
//! the nonce sequencer, the contract handle cache and the fixed transaction
//! parameters. Dispatcher tasks and the native sweep share one context
//! through an `Arc`.

use ethers::types::Address;
use once_cell::sync::OnceCell;
use std::sync::Arc;

use super::contracts::ContractRegistry;
use super::errors::{TransferError, TransferResult};
use crate::config::NetworkConfig;
use crate::nonce_manager::NonceSequencer;
use crate::rpc_manager::ChainClient;
use crate::wallet::Account;

/// Parameters applied to every envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxSettings {
    pub chain_id: u64,
    /// Gas limit of every transfer; also the sweep's fee reserve
    pub gas_limit: u64,
}

impl From<&NetworkConfig> for TxSettings {
    fn from(network: &NetworkConfig) -> Self {
        Self {
            chain_id: network.chain_id,
            gas_limit: network.gas_limit,
        }
    }
}

pub struct TransferContext {
    pub(crate) client: Arc<dyn ChainClient>,
    pub(crate) source: Account,
    destination: OnceCell<Address>,
    pub(crate) sequencer: Arc<NonceSequencer>,
    pub(crate) contracts: ContractRegistry,
    pub(crate) settings: TxSettings,
}

impl TransferContext {
    /// The sequencer must belong to `source`
    pub fn new(
        client: Arc<dyn ChainClient>,
        source: Account,
        sequencer: Arc<NonceSequencer>,
        contracts: ContractRegistry,
        settings: TxSettings,
    ) -> Self {
        debug_assert_eq!(sequencer.address(), source.address());
        Self {
            client,
            source,
            destination: OnceCell::new(),
            sequencer,
            contracts,
            settings,
        }
    }

    /// Set the destination. It cannot change once set.
    pub fn set_destination(&self, destination: Address) -> TransferResult<()> {
        let current = self.destination.get_or_init(|| destination);
        if *current != destination {
            return Err(TransferError::DestinationAlreadySet(*current));
        }
        Ok(())
    }

    pub fn destination(&self) -> TransferResult<Address> {
        self.destination
            .get()
            .copied()
            .ok_or(TransferError::DestinationNotSet)
    }

    pub fn source(&self) -> &Account {
        &self.source
    }

    pub fn sequencer(&self) -> &Arc<NonceSequencer> {
        &self.sequencer
    }

    pub fn contracts(&self) -> &ContractRegistry {
        &self.contracts
    }

    pub fn settings(&self) -> TxSettings {
        self.settings
    }
}
