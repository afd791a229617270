use serde::{Deserialize, Serialize};

use crate::invoice::Invoice;

/// Published exactly once per invoice, by the deposit that moved it from `Pending` to `Paid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePaidEvent {
    pub invoice: Invoice,
}

impl InvoicePaidEvent {
    pub fn new(invoice: Invoice) -> Self {
        Self { invoice }
    }
}
