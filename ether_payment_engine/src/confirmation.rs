//! # Confirmation waiter
//!
//! Polls the chain gateway for a transaction receipt until one appears, a deadline passes, or the caller gives up.
//!
//! ```text
//!               receipt found
//!  Submitted ───────────────────▶ Confirmed
//!      │
//!      │ deadline passed
//!      └────────────────────────▶ TimedOut
//! ```
//!
//! `TimedOut` (and `Cancelled`) are expected outcomes, not failures: the transaction may simply not have been mined yet,
//! and the caller should skip crediting it quietly. Only gateway errors are hard failures.
use std::time::Duration;

use epg_common::TxHash;
use log::*;
use thiserror::Error;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::chain::{ChainGateway, GatewayError, Receipt};

pub const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Shorter poll intervals, including zero, are raised to this.
pub const MIN_RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Error)]
pub enum ConfirmationError {
    #[error("No receipt appeared before the deadline")]
    TimedOut,
    #[error("Stopped waiting for a receipt because the engine is shutting down")]
    Cancelled,
    #[error("Could not fetch the receipt. {0}")]
    Gateway(#[from] GatewayError),
}

impl ConfirmationError {
    /// True for outcomes that should be skipped silently rather than reported.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::TimedOut | Self::Cancelled)
    }
}

#[derive(Debug, Clone)]
pub struct ConfirmationWaiter<G> {
    gateway: G,
    poll_interval: Duration,
    timeout: Duration,
}

impl<G> ConfirmationWaiter<G> {
    pub fn new(gateway: G) -> Self {
        Self { gateway, poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL, timeout: DEFAULT_RECEIPT_TIMEOUT }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(MIN_RECEIPT_POLL_INTERVAL);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl<G> ConfirmationWaiter<G>
where G: ChainGateway
{
    /// Waits for the receipt of `hash`. The first poll happens immediately.
    pub async fn wait_for_receipt(
        &self,
        hash: &TxHash,
        cancel: &CancellationToken,
    ) -> Result<Receipt, ConfirmationError> {
        let deadline = Instant::now() + self.timeout;
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        trace!("⏳️ [{hash}] waiting up to {}s for a receipt", self.timeout.as_secs());
        loop {
            let poll = async {
                ticker.tick().await;
                self.gateway.fetch_receipt(hash).await
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ConfirmationError::Cancelled),
                _ = sleep_until(deadline) => {
                    debug!("⏳️ [{hash}] no receipt after {}s", self.timeout.as_secs());
                    return Err(ConfirmationError::TimedOut);
                },
                receipt = poll => match receipt? {
                    Some(receipt) => {
                        debug!("⏳️ [{hash}] confirmed in block {}", receipt.block_number);
                        return Ok(receipt);
                    },
                    None => trace!("⏳️ [{hash}] not mined yet"),
                },
            }
        }
    }
}
