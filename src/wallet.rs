//! Wallet management module
//!
//! The source account is loaded from configured credentials, the destination
//! account is generated once per run. Signing secrets are kept out of `Debug`
//! output and logs.

use anyhow::{Context, Result};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{transaction::eip2718::TypedTransaction, Address, Signature};
use std::str::FromStr;
use std::sync::Arc;
use zeroize::Zeroizing;

use crate::rpc_manager::SignedTransaction;

/// An EVM account with its signing key
#[derive(Clone)]
pub struct Account {
    wallet: Arc<LocalWallet>,
}

impl Account {
    /// Load from a hex secret (with or without `0x`), checking it matches the
    /// expected address
    pub fn from_credentials(address: &str, private_key: &str) -> Result<Self> {
        let expected = Address::from_str(address.trim())
            .with_context(|| format!("Invalid source address: {}", address))?;

        let key = private_key.trim();
        let key = key.strip_prefix("0x").unwrap_or(key);
        let wallet = LocalWallet::from_str(key).context("Invalid private key")?;

        if wallet.address() != expected {
            anyhow::bail!(
                "Private key does not belong to {:?} (derives {:?})",
                expected,
                wallet.address()
            );
        }
        Ok(Self::from_wallet(wallet))
    }

    /// Generate a fresh account from the OS RNG
    pub fn generate() -> Self {
        Self::from_wallet(LocalWallet::new(&mut rand::thread_rng()))
    }

    pub fn from_wallet(wallet: LocalWallet) -> Self {
        Self {
            wallet: Arc::new(wallet),
        }
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Hex-encoded secret, `0x` prefixed. Only meant for the report artifact.
    pub fn secret_hex(&self) -> Zeroizing<String> {
        let bytes = Zeroizing::new(self.wallet.signer().to_bytes().to_vec());
        Zeroizing::new(format!("0x{}", hex::encode(bytes.as_slice())))
    }

    /// Sign a transaction envelope with this account's key
    pub fn sign(&self, tx: TypedTransaction) -> Result<SignedTransaction, ethers::signers::WalletError> {
        let signature: Signature = self.wallet.sign_transaction_sync(&tx)?;
        Ok(SignedTransaction { tx, signature })
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address())
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known development key (anvil account #0)
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn test_from_credentials_checks_address() {
        let account = Account::from_credentials(DEV_ADDRESS, DEV_KEY).unwrap();
        assert_eq!(account.address(), Address::from_str(DEV_ADDRESS).unwrap());

        let other = "0x0000000000000000000000000000000000000001";
        assert!(Account::from_credentials(other, DEV_KEY).is_err());
    }

    #[test]
    fn test_secret_round_trips_and_debug_redacts() {
        let account = Account::generate();
        let secret = account.secret_hex();
        let reloaded = Account::from_credentials(&format!("{:?}", account.address()), &secret).unwrap();
        assert_eq!(reloaded.address(), account.address());

        let debug = format!("{:?}", account);
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains(&secret[2..]));
    }

    #[test]
    fn test_generated_accounts_differ() {
        assert_ne!(Account::generate().address(), Account::generate().address());
    }
}
