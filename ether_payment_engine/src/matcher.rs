//! # Deposit matcher
//!
//! Decides whether an observed transaction pays an invoice, and if so, credits it.
//!
//! A transaction is relevant only if its destination is an invoice's receiving address. Most transactions on chain are
//! not, so "no matching invoice" is the common, quiet outcome ([`MatchOutcome::Irrelevant`]) rather than an error.
//!
//! The read-modify-write of the invoice balance is delegated to [`InvoiceLedger::deposit_and_save`], which serialises
//! deposits per invoice. Two payments to the same invoice arriving in the same block are therefore both reflected in the
//! final balance, and the `Paid` transition is reported to exactly one of them.
use std::fmt::Debug;

use log::*;
use thiserror::Error;

use crate::{
    chain::Transaction,
    events::{EventProducers, InvoicePaidEvent},
    invoice::{DepositEffect, Invoice},
    ledger::{InvoiceLedger, LedgerError},
};

#[derive(Debug, Clone, Error)]
pub enum MatcherError {
    #[error("Could not look up the invoice for the transaction. {0}")]
    Lookup(LedgerError),
    #[error("Could not apply the deposit. {0}")]
    Deposit(LedgerError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The transaction does not pay any invoice. Nothing was changed.
    Irrelevant,
    /// The invoice was credited. Its status did not change.
    Credited(Invoice),
    /// The invoice was credited, and this deposit marked it as paid.
    Paid(Invoice),
}

#[derive(Clone)]
pub struct DepositMatcher<L> {
    ledger: L,
    producers: EventProducers,
}

impl<L> Debug for DepositMatcher<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DepositMatcher")
    }
}

impl<L> DepositMatcher<L> {
    pub fn new(ledger: L, producers: EventProducers) -> Self {
        Self { ledger, producers }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }
}

impl<L> DepositMatcher<L>
where L: InvoiceLedger
{
    /// Returns the invoice that `tx` would pay, without changing anything.
    ///
    /// Used to skip irrelevant transactions cheaply before doing anything expensive (like waiting for confirmation).
    pub fn match_invoice(&self, tx: &Transaction) -> Result<Option<Invoice>, MatcherError> {
        let Some(address) = tx.to else {
            return Ok(None);
        };
        match self.ledger.fetch_by_address(&address) {
            Ok(invoice) => Ok(Some(invoice)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(MatcherError::Lookup(e)),
        }
    }

    /// Applies `tx` to the invoice it pays, if any.
    pub async fn handle(&self, tx: &Transaction) -> Result<MatchOutcome, MatcherError> {
        let Some(address) = tx.to else {
            trace!("🧾️ [{}] creates a contract. Ignoring.", tx.hash);
            return Ok(MatchOutcome::Irrelevant);
        };
        let deposit = match self.ledger.deposit_and_save(&address, tx.value.clone()) {
            Ok(deposit) => deposit,
            Err(e) if e.is_not_found() => return Ok(MatchOutcome::Irrelevant),
            Err(e) => return Err(MatcherError::Deposit(e)),
        };
        let invoice = deposit.invoice;
        info!(
            "🧾️ [{}] credited {} wei to invoice {}. Balance is {} of {}",
            tx.hash,
            tx.value,
            invoice.id(),
            invoice.balance(),
            invoice.price()
        );
        match deposit.effect {
            DepositEffect::Credited => Ok(MatchOutcome::Credited(invoice)),
            DepositEffect::BecamePaid => {
                info!("🧾️ Invoice {} is paid", invoice.id());
                self.call_invoice_paid_hook(&invoice).await;
                Ok(MatchOutcome::Paid(invoice))
            },
        }
    }

    async fn call_invoice_paid_hook(&self, invoice: &Invoice) {
        for emitter in &self.producers.invoice_paid_producer {
            debug!("🧾️ Notifying invoice paid hook subscribers");
            emitter.publish_event(InvoicePaidEvent::new(invoice.clone())).await;
        }
    }
}
