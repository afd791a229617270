//! # Ether payment engine public API
//!
//! The `epe_api` module exposes the programmatic API for the payment engine, for use by the HTTP layer (or any other
//! front end).
//!
//! * [`invoice_api`] creates invoices and reports on their progress.
//!
//! Payments are credited by the [`crate::IngestionPipeline`], not through this API.
//!
//! # API usage
//!
//! An API instance is created by supplying a ledger backend and an address deriver:
//!
//! ```rust,ignore
//! use ether_payment_engine::{HdWalletDeriver, InvoiceApi, MemoryLedger};
//! let ledger = MemoryLedger::new();
//! let deriver = HdWalletDeriver::from_mnemonic(mnemonic)?;
//! let api = InvoiceApi::new(ledger, deriver);
//! let id = api.create_invoice(Wei::from_ether(1))?;
//! let invoice = api.invoice_by_id(id)?;
//! ```
pub mod errors;
pub mod invoice_api;
