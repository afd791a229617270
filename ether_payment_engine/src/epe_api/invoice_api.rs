use std::fmt::Debug;

use epg_common::Wei;
use log::*;

use crate::{
    address_derivation::AddressDeriver,
    epe_api::errors::InvoiceApiError,
    invoice::{Invoice, InvoiceId},
    ledger::InvoiceLedger,
};

/// `InvoiceApi` is the primary API for issuing invoices and querying their payment status.
pub struct InvoiceApi<L, D> {
    ledger: L,
    deriver: D,
}

impl<L, D> Debug for InvoiceApi<L, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InvoiceApi")
    }
}

impl<L, D> InvoiceApi<L, D> {
    pub fn new(ledger: L, deriver: D) -> Self {
        Self { ledger, deriver }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }
}

impl<L, D> InvoiceApi<L, D>
where
    L: InvoiceLedger,
    D: AddressDeriver,
{
    /// Issues a new invoice for `price` wei.
    ///
    /// The invoice gets a fresh id and its own receiving address, and starts out `Pending` with a zero balance.
    pub fn create_invoice(&self, price: Wei) -> Result<InvoiceId, InvoiceApiError> {
        let id = self.ledger.next_id();
        let address = self.deriver.derive_address(id).map_err(|e| {
            error!("🧾️ Could not derive an address for invoice {id}. {e}");
            e
        })?;
        let invoice = Invoice::new(id, price, address);
        self.ledger.save(invoice)?;
        info!("🧾️ Invoice {id} created. Waiting for payment to {address}");
        Ok(id)
    }

    /// Fetches a snapshot of the invoice. The balance and status reflect every deposit applied so far.
    pub fn invoice_by_id(&self, id: InvoiceId) -> Result<Invoice, InvoiceApiError> {
        let invoice = self.ledger.fetch_by_id(id)?;
        trace!("🧾️ Invoice {id} fetched. Status: {}", invoice.status());
        Ok(invoice)
    }
}
