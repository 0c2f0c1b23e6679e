//! Transfer argument building
//!
//! Turns a holding snapshot into the arguments of its transfer call. ERC20
//! carries no arguments: the balance is read live when the transfer is sent,
//! so whatever the account holds at that moment moves, not the snapshot
//! quantity.

use ethers::types::U256;

use super::errors::{TransferError, TransferResult};
use crate::types::Holding;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferArgs {
    Fungible,
    NonFungible { token_id: U256 },
    MultiToken { token_id: U256, amount: U256 },
}

/// Fully resolved transfer call, ready for ABI encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferCall {
    /// `transfer(to, amount)`
    Fungible { amount: U256 },
    /// `transferFrom(from, to, tokenId)`
    NonFungible { token_id: U256 },
    /// `safeTransferFrom(from, to, id, amount, 0x)`
    MultiToken { token_id: U256, amount: U256 },
}

pub fn build_args(holding: &Holding) -> TransferResult<TransferArgs> {
    match holding {
        Holding::Fungible(_) => Ok(TransferArgs::Fungible),
        Holding::NonFungible(h) => Ok(TransferArgs::NonFungible {
            token_id: parse_integer("tokenId", &h.token_id)?,
        }),
        Holding::MultiToken(h) => Ok(TransferArgs::MultiToken {
            token_id: parse_integer("tokenId", &h.token_id)?,
            amount: parse_integer("balance", &h.balance)?,
        }),
    }
}

impl TransferArgs {
    /// Resolve into a call. `live_balance` is only consulted for ERC20.
    pub fn into_call(self, live_balance: U256) -> TransferCall {
        match self {
            TransferArgs::Fungible => TransferCall::Fungible {
                amount: live_balance,
            },
            TransferArgs::NonFungible { token_id } => TransferCall::NonFungible { token_id },
            TransferArgs::MultiToken { token_id, amount } => {
                TransferCall::MultiToken { token_id, amount }
            }
        }
    }
}

fn parse_integer(field: &'static str, value: &str) -> TransferResult<U256> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TransferError::Parse {
            field,
            value: value.to_string(),
        });
    }
    U256::from_dec_str(trimmed).map_err(|_| TransferError::Parse {
        field,
        value: value.to_string(),
    })
}
