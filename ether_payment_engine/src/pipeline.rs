//! # Ingestion pipeline
//!
//! Bridges a chain subscription into concurrent [`DepositMatcher::handle`] calls.
//!
//! ```text
//!  ChainGateway::subscribe ──▶ intake loop ──spawn──▶ unit ──▶ DepositMatcher ──▶ InvoiceLedger
//!                                  │                   ▲
//!                                  │   (PendingThenConfirm only)
//!                                  └──────────── ConfirmationWaiter
//! ```
//!
//! Each unit of work (a new block, or a pending transaction) is handled in its own task, tracked by a
//! [`TaskTracker`]. The number of units in flight is capped by a semaphore, so a burst of transactions applies
//! backpressure to the intake loop instead of spawning without limit.
//!
//! Only transactions that pay an invoice have their receipts checked. Under both policies a payment is credited only if
//! its receipt reports success. Transactions in a block are already mined, so their receipts are fetched once rather
//! than waited for.
//!
//! Failure handling:
//! * A unit that fails is logged and counted. It never stops the pipeline.
//! * Failing to fetch a block or transaction is logged and skipped.
//! * A failure of the subscription itself is fatal and is returned from [`IngestionPipeline::run`].
//!
//! Shutdown: when the cancellation token fires, the intake loop stops, the subscription is closed, and `run` returns
//! only after every unit already spawned has finished.
use std::{
    fmt::Display,
    str::FromStr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use epg_common::TxHash;
use log::*;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    chain::{BlockHeader, ChainEvent, ChainGateway, GatewayError, SubscriptionKind, Transaction},
    confirmation::{ConfirmationWaiter, DEFAULT_RECEIPT_POLL_INTERVAL, DEFAULT_RECEIPT_TIMEOUT},
    events::EventProducers,
    ledger::InvoiceLedger,
    matcher::{DepositMatcher, MatchOutcome},
};

pub const DEFAULT_MAX_IN_FLIGHT: usize = 256;

//--------------------------------------   CreditPolicy    ---------------------------------------------------------
/// When a payment is credited to an invoice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CreditPolicy {
    /// Watch new blocks and credit the successful transactions they contain.
    #[default]
    ConfirmedOnly,
    /// Watch the pending pool, and credit a transaction once its receipt appears.
    PendingThenConfirm,
}

impl CreditPolicy {
    pub fn subscription_kind(&self) -> SubscriptionKind {
        match self {
            Self::ConfirmedOnly => SubscriptionKind::NewHeads,
            Self::PendingThenConfirm => SubscriptionKind::PendingTransactions,
        }
    }
}

impl Display for CreditPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfirmedOnly => write!(f, "confirmed"),
            Self::PendingThenConfirm => write!(f, "pending"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Unknown credit policy '{0}'. Use 'confirmed' or 'pending'.")]
pub struct UnknownCreditPolicy(String);

impl FromStr for CreditPolicy {
    type Err = UnknownCreditPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "confirmed" | "confirmed-only" | "blocks" => Ok(Self::ConfirmedOnly),
            "pending" | "pending+confirm" | "pending-then-confirm" => Ok(Self::PendingThenConfirm),
            _ => Err(UnknownCreditPolicy(s.to_string())),
        }
    }
}

//--------------------------------------   PipelineConfig   ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub policy: CreditPolicy,
    /// The maximum number of units of work handled at once.
    pub max_in_flight: usize,
    pub receipt_poll_interval: Duration,
    pub receipt_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            policy: CreditPolicy::default(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            receipt_poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
        }
    }
}

//--------------------------------------   PipelineError    ---------------------------------------------------------
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("Could not subscribe to chain events. {0}")]
    Subscribe(GatewayError),
    #[error("The chain event subscription failed. {0}")]
    SubscriptionFailed(GatewayError),
    #[error("The chain event subscription ended unexpectedly")]
    SubscriptionClosed,
}

//--------------------------------------   PipelineStats    ---------------------------------------------------------
/// Running totals, mostly for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Chain events received from the subscription.
    pub events: u64,
    /// Transactions examined.
    pub transactions: u64,
    /// Deposits credited to an invoice.
    pub credited: u64,
    /// Deposits that marked an invoice as paid.
    pub paid: u64,
    /// Units that failed while matching or crediting.
    pub failed: u64,
    /// Blocks or transactions that could not be fetched.
    pub fetch_failures: u64,
    /// Invoice payments skipped because no receipt appeared in time, or because they reverted.
    pub unconfirmed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    events: AtomicU64,
    transactions: AtomicU64,
    credited: AtomicU64,
    paid: AtomicU64,
    failed: AtomicU64,
    fetch_failures: AtomicU64,
    unconfirmed: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl Counters {
    fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            events: self.events.load(Ordering::Relaxed),
            transactions: self.transactions.load(Ordering::Relaxed),
            credited: self.credited.load(Ordering::Relaxed),
            paid: self.paid.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            unconfirmed: self.unconfirmed.load(Ordering::Relaxed),
        }
    }
}

//--------------------------------------  IngestionPipeline  ---------------------------------------------------------
struct Shared<L, G> {
    matcher: DepositMatcher<L>,
    gateway: G,
    waiter: ConfirmationWaiter<G>,
    counters: Counters,
}

pub struct IngestionPipeline<L, G> {
    shared: Arc<Shared<L, G>>,
    config: PipelineConfig,
}

impl<L, G> std::fmt::Debug for IngestionPipeline<L, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IngestionPipeline({:?})", self.config)
    }
}

impl<L, G> IngestionPipeline<L, G>
where
    L: InvoiceLedger,
    G: ChainGateway,
{
    pub fn new(ledger: L, gateway: G, producers: EventProducers, config: PipelineConfig) -> Self {
        let waiter = ConfirmationWaiter::new(gateway.clone())
            .with_poll_interval(config.receipt_poll_interval)
            .with_timeout(config.receipt_timeout);
        let matcher = DepositMatcher::new(ledger, producers);
        let shared = Shared { matcher, gateway, waiter, counters: Counters::default() };
        Self { shared: Arc::new(shared), config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stats(&self) -> PipelineStats {
        self.shared.counters.snapshot()
    }

    /// Runs the pipeline until `cancel` fires or the subscription fails.
    ///
    /// In both cases, every unit of work already started is allowed to finish before this returns.
    pub async fn run(&self, cancel: CancellationToken) -> Result<PipelineStats, PipelineError> {
        let policy = self.config.policy;
        let mut subscription = self
            .shared
            .gateway
            .subscribe(policy.subscription_kind(), cancel.child_token())
            .await
            .map_err(PipelineError::Subscribe)?;
        info!("⛓️ Ingestion started. Credit policy: {policy}. Max in flight: {}", self.config.max_in_flight);
        let tracker = TaskTracker::new();
        let permits = Arc::new(Semaphore::new(self.config.max_in_flight.max(1)));
        let result = loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ok(()),
                event = subscription.next() => event,
            };
            let event = match event {
                Some(Ok(event)) => event,
                Some(Err(e)) => break Err(PipelineError::SubscriptionFailed(e)),
                None if cancel.is_cancelled() => break Ok(()),
                None => break Err(PipelineError::SubscriptionClosed),
            };
            bump(&self.shared.counters.events);
            let Some(permit) = acquire(&permits, &cancel).await else {
                break Ok(());
            };
            let shared = Arc::clone(&self.shared);
            match event {
                ChainEvent::NewHead(header) => {
                    let units = tracker.clone();
                    let permits = Arc::clone(&permits);
                    tracker.spawn(async move {
                        handle_block(shared, header, permit, units, permits).await;
                    });
                },
                ChainEvent::PendingTransaction(hash) => {
                    let cancel = cancel.clone();
                    tracker.spawn(async move {
                        handle_pending_transaction(shared, hash, cancel).await;
                        drop(permit);
                    });
                },
            }
        };
        subscription.close();
        tracker.close();
        if let Err(e) = &result {
            error!("⛓️ Ingestion is stopping. {e}");
        }
        if !tracker.is_empty() {
            info!("⛓️ Waiting for {} units of work in flight to complete", tracker.len());
        }
        tracker.wait().await;
        let stats = self.stats();
        info!("⛓️ Ingestion stopped. {stats:?}");
        result.map(|_| stats)
    }
}

async fn acquire(permits: &Arc<Semaphore>, cancel: &CancellationToken) -> Option<OwnedSemaphorePermit> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        permit = Arc::clone(permits).acquire_owned() => permit.ok(),
    }
}

/// Fetches the block and hands each of its transactions to its own unit. The block's permit is released once the
/// fetch is done, and each transaction unit then takes a permit of its own.
async fn handle_block<L, G>(
    shared: Arc<Shared<L, G>>,
    header: BlockHeader,
    permit: OwnedSemaphorePermit,
    units: TaskTracker,
    permits: Arc<Semaphore>,
) where
    L: InvoiceLedger,
    G: ChainGateway,
{
    let fetched = shared.gateway.fetch_block(&header.hash).await;
    drop(permit);
    let block = match fetched {
        Ok(block) => block,
        Err(e) => {
            warn!("⛓️ Could not fetch block #{} ({}). {e}", header.number, header.hash);
            bump(&shared.counters.fetch_failures);
            return;
        },
    };
    trace!("⛓️ Block #{} has {} transactions", header.number, block.transactions.len());
    for tx in block.transactions {
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            error!("⛓️ The work queue was closed while block #{} was being dispatched", header.number);
            return;
        };
        let shared = Arc::clone(&shared);
        units.spawn(async move {
            handle_mined_transaction(&shared, tx).await;
            drop(permit);
        });
    }
}

async fn handle_mined_transaction<L, G>(shared: &Shared<L, G>, tx: Transaction)
where
    L: InvoiceLedger,
    G: ChainGateway,
{
    let hash = tx.hash;
    if !pays_an_invoice(shared, &tx) {
        return;
    }
    match shared.gateway.fetch_receipt(&hash).await {
        Ok(Some(receipt)) if receipt.success => credit(shared, tx).await,
        Ok(Some(receipt)) => skip_reverted(shared, &hash, receipt.block_number),
        Ok(None) => {
            warn!("⛓️ [{hash}] was in a block but has no receipt. Not crediting it.");
            bump(&shared.counters.transactions);
            bump(&shared.counters.unconfirmed);
        },
        Err(e) => {
            error!("⛓️ [{hash}] could not be confirmed. {e}");
            bump(&shared.counters.transactions);
            bump(&shared.counters.failed);
        },
    }
}

async fn handle_pending_transaction<L, G>(shared: Arc<Shared<L, G>>, hash: TxHash, cancel: CancellationToken)
where
    L: InvoiceLedger,
    G: ChainGateway,
{
    let tx = match shared.gateway.fetch_transaction(&hash).await {
        Ok(Some(tx)) => tx,
        Ok(None) => {
            debug!("⛓️ [{hash}] left the pending pool before it could be fetched");
            return;
        },
        Err(e) => {
            warn!("⛓️ [{hash}] could not be fetched. {e}");
            bump(&shared.counters.fetch_failures);
            return;
        },
    };
    if !pays_an_invoice(&shared, &tx) {
        return;
    }
    match shared.waiter.wait_for_receipt(&hash, &cancel).await {
        Ok(receipt) if receipt.success => credit(&shared, tx.in_block(receipt.block_number)).await,
        Ok(receipt) => skip_reverted(&shared, &hash, receipt.block_number),
        Err(e) if e.is_expected() => {
            debug!("⛓️ [{hash}] not credited. {e}");
            bump(&shared.counters.transactions);
            bump(&shared.counters.unconfirmed);
        },
        Err(e) => {
            error!("⛓️ [{hash}] could not be confirmed. {e}");
            bump(&shared.counters.transactions);
            bump(&shared.counters.failed);
        },
    }
}

/// Transactions that do not pay an invoice, or cannot be matched, are counted here and go no further.
fn pays_an_invoice<L, G>(shared: &Shared<L, G>, tx: &Transaction) -> bool
where L: InvoiceLedger {
    match shared.matcher.match_invoice(tx) {
        Ok(Some(invoice)) => {
            trace!("⛓️ [{}] pays invoice {}. Checking its receipt.", tx.hash, invoice.id());
            true
        },
        Ok(None) => {
            bump(&shared.counters.transactions);
            false
        },
        Err(e) => {
            error!("⛓️ [{}] could not be matched. {e}", tx.hash);
            bump(&shared.counters.transactions);
            bump(&shared.counters.failed);
            false
        },
    }
}

fn skip_reverted<L, G>(shared: &Shared<L, G>, hash: &TxHash, block_number: u64) {
    info!("⛓️ [{hash}] reverted in block #{block_number}. Not crediting it.");
    bump(&shared.counters.transactions);
    bump(&shared.counters.unconfirmed);
}

async fn credit<L, G>(shared: &Shared<L, G>, tx: Transaction)
where L: InvoiceLedger {
    bump(&shared.counters.transactions);
    match shared.matcher.handle(&tx).await {
        Ok(MatchOutcome::Irrelevant) => {},
        Ok(MatchOutcome::Credited(_)) => bump(&shared.counters.credited),
        Ok(MatchOutcome::Paid(_)) => {
            bump(&shared.counters.credited);
            bump(&shared.counters.paid);
        },
        Err(e) => {
            error!("⛓️ [{}] Failed to handle transaction. {e}", tx.hash);
            bump(&shared.counters.failed);
        },
    }
}
