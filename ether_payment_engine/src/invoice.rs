use std::{fmt::Display, num::ParseIntError, str::FromStr};

use epg_common::{Address, Wei};
use serde::{Deserialize, Serialize};

//--------------------------------------     InvoiceId       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub u64);

impl Display for InvoiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InvoiceId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Self)
    }
}

impl From<u64> for InvoiceId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl InvoiceId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

//--------------------------------------   InvoiceStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    /// The invoice has been created, and the amount received so far is less than the price.
    #[default]
    Pending,
    /// The balance has reached the price at least once. This is a terminal state.
    Paid,
}

impl Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvoiceStatus::Pending => write!(f, "pending"),
            InvoiceStatus::Paid => write!(f, "paid"),
        }
    }
}

//--------------------------------------      Invoice        ---------------------------------------------------------
/// A payment request. `id`, `price` and `address` are fixed at creation; `balance` only ever grows, and `status` only
/// ever moves from `Pending` to `Paid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    id: InvoiceId,
    price: Wei,
    balance: Wei,
    address: Address,
    status: InvoiceStatus,
}

/// What a single call to [`Invoice::deposit`] did to the invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositEffect {
    /// The balance was credited. The status did not change (it was already `Paid`, or is still `Pending`).
    Credited,
    /// This deposit moved the invoice from `Pending` to `Paid`.
    BecamePaid,
}

impl Invoice {
    /// Creates a fresh, unpaid invoice with a zero balance.
    pub fn new(id: InvoiceId, price: Wei, address: Address) -> Self {
        Self { id, price, balance: Wei::zero(), address, status: InvoiceStatus::Pending }
    }

    pub fn id(&self) -> InvoiceId {
        self.id
    }

    pub fn price(&self) -> &Wei {
        &self.price
    }

    pub fn balance(&self) -> &Wei {
        &self.balance
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn is_paid(&self) -> bool {
        self.status == InvoiceStatus::Paid
    }

    /// Credits `amount` to the balance and latches the `Paid` status once the balance covers the price.
    ///
    /// The caller is responsible for serialising calls for the same invoice. The ledger does this with a per-invoice
    /// lock in [`crate::InvoiceLedger::deposit_and_save`].
    pub fn deposit(&mut self, amount: Wei) -> DepositEffect {
        self.balance += amount;
        if self.status == InvoiceStatus::Pending && self.balance >= self.price {
            self.status = InvoiceStatus::Paid;
            DepositEffect::BecamePaid
        } else {
            DepositEffect::Credited
        }
    }
}
