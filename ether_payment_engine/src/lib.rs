//! Ether Payment Engine
//!
//! The Ether Payment Engine lets a merchant accept Ether against invoices. Each invoice is assigned its own receiving
//! address; a payment to that address is credited to the invoice, and once the accrued balance reaches the price the
//! invoice is marked as paid. This library contains the core logic for the engine. It is node-agnostic.
//!
//! The library is divided into these main sections:
//! 1. The invoice ledger ([`mod@ledger`]). This is the only shared mutable state: a concurrency-safe store of invoices,
//!    indexed both by id and by receiving address. [`MemoryLedger`] is the in-memory backend.
//! 2. Payment ingestion. The [`IngestionPipeline`] subscribes to a [`ChainGateway`], and hands every transaction it
//!    sees to the [`DepositMatcher`], which credits the invoice it pays, if any. Depending on the [`CreditPolicy`],
//!    transactions are taken from new blocks, or from the pending pool and credited once the [`ConfirmationWaiter`]
//!    sees their receipt.
//! 3. The public API ([`mod@epe_api`]), used to create invoices and query their status.
//!
//! The engine also emits an event when an invoice becomes paid. A simple Actor framework is used so that you can
//! easily hook into these events and perform custom actions (see [`mod@events`]).
pub mod address_derivation;
pub mod chain;
pub mod confirmation;
pub mod epe_api;
pub mod events;
pub mod invoice;
pub mod ledger;
pub mod matcher;
pub mod pipeline;

pub use address_derivation::{AddressDeriver, DerivationError, HdWalletDeriver};
pub use chain::{ChainGateway, GatewayError, Subscription, SubscriptionKind};
pub use confirmation::{ConfirmationError, ConfirmationWaiter};
pub use epe_api::{errors::InvoiceApiError, invoice_api::InvoiceApi};
pub use invoice::{Invoice, InvoiceId, InvoiceStatus};
pub use ledger::{InvoiceLedger, LedgerError, MemoryLedger};
pub use matcher::{DepositMatcher, MatchOutcome, MatcherError};
pub use pipeline::{CreditPolicy, IngestionPipeline, PipelineConfig, PipelineError, PipelineStats};
