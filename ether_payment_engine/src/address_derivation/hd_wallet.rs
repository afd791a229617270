//! Hierarchical deterministic address derivation.
//!
//! The wallet seed is computed from a mnemonic phrase (BIP-39), and a private key for each invoice is derived along
//! `m/44'/60'/0'/0/<invoice id>` (BIP-32 / BIP-44, the standard Ethereum account path). Any wallet that imports the same
//! mnemonic can therefore spend the funds received for an invoice.
use epg_common::{Address, Secret};
use ethers::signers::{coins_bip39::English, MnemonicBuilder, Signer, WalletError};
use log::*;

use super::{AddressDeriver, DerivationError};
use crate::invoice::InvoiceId;

const HARDENED: u64 = 0x8000_0000;

/// The path to the account key. The invoice id is appended as the final, non-hardened, index.
pub const DERIVATION_ROOT: &str = "m/44'/60'/0'/0";

pub struct HdWalletDeriver {
    phrase: Secret<String>,
}

impl std::fmt::Debug for HdWalletDeriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HdWalletDeriver({DERIVATION_ROOT}/*)")
    }
}

impl HdWalletDeriver {
    /// Creates a deriver from a BIP-39 mnemonic phrase in English, with an empty passphrase.
    ///
    /// Whitespace between words is normalised. Unknown words and bad checksums are rejected here, so a deriver that
    /// was created successfully can derive every id in range.
    pub fn from_mnemonic(mnemonic: Secret<String>) -> Result<Self, DerivationError> {
        let phrase = mnemonic.reveal().split_whitespace().collect::<Vec<_>>().join(" ");
        if phrase.is_empty() {
            return Err(DerivationError::InvalidMnemonic("The mnemonic is empty".to_string()));
        }
        let deriver = Self { phrase: Secret::new(phrase) };
        deriver.address_at(0).map_err(|e| DerivationError::InvalidMnemonic(e.to_string()))?;
        debug!("🔑️ Wallet for invoice addresses is ready");
        Ok(deriver)
    }

    fn address_at(&self, index: u64) -> Result<Address, WalletError> {
        let wallet = MnemonicBuilder::<English>::default()
            .phrase(self.phrase.reveal().as_str())
            .derivation_path(&format!("{DERIVATION_ROOT}/{index}"))?
            .build()?;
        Ok(wallet.address().into())
    }
}

impl AddressDeriver for HdWalletDeriver {
    fn derive_address(&self, id: InvoiceId) -> Result<Address, DerivationError> {
        if id.value() >= HARDENED {
            return Err(DerivationError::IdOutOfRange(id));
        }
        let address = self.address_at(id.value()).map_err(|e| DerivationError::KeyDerivation(e.to_string()))?;
        trace!("🔑️ Invoice {id} pays to {address}");
        Ok(address)
    }
}
