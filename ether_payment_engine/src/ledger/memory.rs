use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
        Mutex,
        RwLock,
    },
};

use epg_common::{Address, Wei};
use log::*;

use super::{Deposit, InvoiceLedger, LedgerError};
use crate::invoice::{Invoice, InvoiceId};

/// Both indices point at the same record, so a deposit made through the address index is immediately visible through
/// the id index.
type Record = Arc<Mutex<Invoice>>;

/// An in-memory [`InvoiceLedger`]. The ledger lives as long as the process; nothing is written to disk.
///
/// Cloning is cheap and yields a handle to the same store.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    inner: Arc<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    last_id: AtomicU64,
    by_id: RwLock<HashMap<InvoiceId, Record>>,
    by_address: RwLock<HashMap<Address, Record>>,
}

fn poisoned<E: std::fmt::Display>(e: E) -> LedgerError {
    error!("📒️ Ledger lock poisoned: {e}");
    LedgerError::StorePoisoned(e.to_string())
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of invoices in the ledger.
    pub fn len(&self) -> usize {
        self.inner.by_id.read().map(|m| m.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record_for_id(&self, id: InvoiceId) -> Result<Option<Record>, LedgerError> {
        let index = self.inner.by_id.read().map_err(poisoned)?;
        Ok(index.get(&id).cloned())
    }

    fn record_for_address(&self, address: &Address) -> Result<Option<Record>, LedgerError> {
        let index = self.inner.by_address.read().map_err(poisoned)?;
        Ok(index.get(address).cloned())
    }
}

impl std::fmt::Debug for MemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MemoryLedger({} invoices)", self.len())
    }
}

/// Replacements may only move an invoice forward.
fn supersedes(update: &Invoice, current: &Invoice) -> bool {
    update.price() == current.price() &&
        update.balance() >= current.balance() &&
        (update.is_paid() || !current.is_paid())
}

impl InvoiceLedger for MemoryLedger {
    fn next_id(&self) -> InvoiceId {
        InvoiceId(self.inner.last_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn save(&self, invoice: Invoice) -> Result<(), LedgerError> {
        // Writers always take the id index first, then the address index.
        let mut by_id = self.inner.by_id.write().map_err(poisoned)?;
        let mut by_address = self.inner.by_address.write().map_err(poisoned)?;
        let id = invoice.id();
        let address = *invoice.address();
        if let Some(bound) = by_address.get(&address) {
            let existing = bound.lock().map_err(poisoned)?.id();
            if existing != id {
                return Err(LedgerError::AddressAlreadyBound { address, existing });
            }
        }
        match by_id.get(&id) {
            Some(record) => {
                let mut current = record.lock().map_err(poisoned)?;
                if !supersedes(&invoice, &current) {
                    warn!("📒️ Refusing to overwrite invoice {id} with an older copy");
                    return Err(LedgerError::StaleUpdate(id));
                }
                if current.address() != &address {
                    by_address.remove(current.address());
                    by_address.insert(address, Arc::clone(record));
                }
                *current = invoice;
                trace!("📒️ Invoice {id} updated");
            },
            None => {
                let record = Arc::new(Mutex::new(invoice));
                by_address.insert(address, Arc::clone(&record));
                by_id.insert(id, record);
                debug!("📒️ Invoice {id} saved with address {address}");
            },
        }
        Ok(())
    }

    fn fetch_by_id(&self, id: InvoiceId) -> Result<Invoice, LedgerError> {
        let record = self.record_for_id(id)?.ok_or(LedgerError::InvoiceNotFound(id))?;
        let invoice = record.lock().map_err(poisoned)?.clone();
        Ok(invoice)
    }

    fn fetch_by_address(&self, address: &Address) -> Result<Invoice, LedgerError> {
        let record = self.record_for_address(address)?.ok_or(LedgerError::AddressNotFound(*address))?;
        let invoice = record.lock().map_err(poisoned)?.clone();
        Ok(invoice)
    }

    fn deposit_and_save(&self, address: &Address, amount: Wei) -> Result<Deposit, LedgerError> {
        let record = self.record_for_address(address)?.ok_or(LedgerError::AddressNotFound(*address))?;
        let mut invoice = record.lock().map_err(poisoned)?;
        let effect = invoice.deposit(amount);
        Ok(Deposit { invoice: invoice.clone(), effect })
    }
}
