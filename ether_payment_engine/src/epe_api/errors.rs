use thiserror::Error;

use crate::{address_derivation::DerivationError, invoice::InvoiceId, ledger::LedgerError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvoiceApiError {
    #[error("Invoice {0} does not exist")]
    NotFound(InvoiceId),
    #[error("Could not derive a receiving address. {0}")]
    Derivation(#[from] DerivationError),
    #[error("Ledger error: {0}")]
    Ledger(LedgerError),
}

impl From<LedgerError> for InvoiceApiError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InvoiceNotFound(id) => Self::NotFound(id),
            e => Self::Ledger(e),
        }
    }
}
