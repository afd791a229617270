use epg_common::Wei;
use ether_payment_engine::InvoiceId;
use serde::{Deserialize, Serialize};

/// The body of `POST /invoices`. The price is in wei, given either as a JSON integer or as a decimal string (for
/// amounts too large for a JSON number).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInvoiceRequest {
    pub price: Wei,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInvoiceResponse {
    pub id: InvoiceId,
}
