//! # Invoice ledger
//!
//! The ledger is the only shared mutable state in the engine. Every component reaches invoices through the
//! [`InvoiceLedger`] trait, so tests can hand each component an isolated instance.
//!
//! The ledger maintains two indices over the same invoice records, one keyed by [`InvoiceId`] and one keyed by receiving
//! [`Address`]. The address index is the hot path: it is consulted for every transaction observed on chain, and for
//! the vast majority of those the answer is [`LedgerError::AddressNotFound`]. Callers should treat that (and
//! [`LedgerError::InvoiceNotFound`]) as ordinary control flow, using [`LedgerError::is_not_found`].
mod memory;

use epg_common::{Address, Wei};
use thiserror::Error;

pub use memory::MemoryLedger;

use crate::invoice::{DepositEffect, Invoice, InvoiceId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Invoice {0} does not exist")]
    InvoiceNotFound(InvoiceId),
    #[error("No invoice is bound to address {0}")]
    AddressNotFound(Address),
    #[error("Address {address} is already bound to invoice {existing}")]
    AddressAlreadyBound { address: Address, existing: InvoiceId },
    #[error("Invoice {0} has moved on since this copy was taken. Price changes and rollbacks are not allowed")]
    StaleUpdate(InvoiceId),
    #[error("The ledger store is unusable after a panic in another thread. {0}")]
    StorePoisoned(String),
}

impl LedgerError {
    /// True for the "nothing here" kinds. These are expected outcomes, not failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::InvoiceNotFound(_) | Self::AddressNotFound(_))
    }
}

/// The result of applying a deposit: a snapshot of the invoice immediately after the deposit, and whether this
/// deposit was the one that marked it as paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deposit {
    pub invoice: Invoice,
    pub effect: DepositEffect,
}

/// Concurrency-safe storage for invoices.
///
/// All methods take `&self` and may be called from any number of tasks at once.
pub trait InvoiceLedger: Clone + Send + Sync + 'static {
    /// Issues a fresh identifier. Identifiers start at 1 and are strictly increasing; no value is ever issued twice.
    fn next_id(&self) -> InvoiceId;

    /// Inserts or replaces an invoice in both indices.
    ///
    /// Fails with [`LedgerError::AddressAlreadyBound`] if the address already belongs to a different invoice, and with
    /// [`LedgerError::StaleUpdate`] if a replacement would change the price, lower the balance or take a paid invoice
    /// back to pending.
    fn save(&self, invoice: Invoice) -> Result<(), LedgerError>;

    /// Returns a snapshot of the invoice with the given id.
    fn fetch_by_id(&self, id: InvoiceId) -> Result<Invoice, LedgerError>;

    /// Returns a snapshot of the invoice bound to the given address.
    fn fetch_by_address(&self, address: &Address) -> Result<Invoice, LedgerError>;

    /// Credits `amount` to the invoice bound to `address` and persists the result, as one atomic step with respect to
    /// every other deposit for the same invoice. Deposits for different invoices do not contend with each other.
    fn deposit_and_save(&self, address: &Address, amount: Wei) -> Result<Deposit, LedgerError>;
}
