//! # Receiving addresses
//!
//! Every invoice gets its own receiving address, derived deterministically from the invoice id. A payment is matched
//! to an invoice purely by its destination address, so two invoices must never share one.
mod hd_wallet;

use epg_common::Address;
pub use hd_wallet::{HdWalletDeriver, DERIVATION_ROOT};
use thiserror::Error;

use crate::invoice::InvoiceId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DerivationError {
    #[error("The wallet mnemonic is invalid. {0}")]
    InvalidMnemonic(String),
    #[error("Invoice id {0} is out of range for address derivation")]
    IdOutOfRange(InvoiceId),
    #[error("Key derivation failed. {0}")]
    KeyDerivation(String),
}

/// Maps an invoice id to the address that pays it.
///
/// Implementations must be deterministic and injective: the same id always yields the same address, and distinct ids
/// yield distinct addresses.
pub trait AddressDeriver: Send + Sync + 'static {
    fn derive_address(&self, id: InvoiceId) -> Result<Address, DerivationError>;
}
