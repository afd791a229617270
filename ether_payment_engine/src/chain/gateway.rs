use std::future::Future;

use epg_common::{BlockHash, TxHash};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::types::{Block, ChainEvent, Receipt, Transaction};

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Could not reach the node. {0}")]
    Connection(String),
    #[error("The node returned an error. {0}")]
    Rpc(String),
    #[error("Could not decode the node response. {0}")]
    InvalidResponse(String),
    #[error("Block {0} does not exist")]
    BlockNotFound(BlockHash),
    #[error("The subscription failed. {0}")]
    Subscription(String),
}

/// Which chain activity to subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    /// Deliver [`ChainEvent::NewHead`] for every block produced.
    NewHeads,
    /// Deliver [`ChainEvent::PendingTransaction`] for every transaction entering the pending pool.
    PendingTransactions,
}

/// A stream of chain events.
///
/// An `Err` item means the upstream source has failed and will produce nothing further. Dropping the subscription,
/// or cancelling the token it was created with, terminates the producer.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::Receiver<Result<ChainEvent, GatewayError>>,
}

impl Subscription {
    pub fn new(receiver: mpsc::Receiver<Result<ChainEvent, GatewayError>>) -> Self {
        Self { receiver }
    }

    /// Returns the next event, or `None` once the producer has gone away.
    pub async fn next(&mut self) -> Option<Result<ChainEvent, GatewayError>> {
        self.receiver.recv().await
    }

    /// Stops the producer from sending anything further. Events already buffered are discarded.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

/// The blockchain node, as seen by the payment engine.
///
/// Implementations must be cheap to clone, since a clone is handed to every handling task.
pub trait ChainGateway: Clone + Send + Sync + 'static {
    /// Starts a subscription. The producer must stop when `cancel` fires.
    fn subscribe(
        &self,
        kind: SubscriptionKind,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<Subscription, GatewayError>> + Send;

    /// Fetches a block, including its full transaction list.
    fn fetch_block(&self, hash: &BlockHash) -> impl Future<Output = Result<Block, GatewayError>> + Send;

    /// Fetches a transaction by hash. `Ok(None)` if the node does not know about it (e.g. it was dropped from the
    /// pending pool).
    fn fetch_transaction(&self, hash: &TxHash) -> impl Future<Output = Result<Option<Transaction>, GatewayError>> + Send;

    /// Fetches the receipt for a transaction. `Ok(None)` if the transaction has not been included in a block yet.
    fn fetch_receipt(&self, hash: &TxHash) -> impl Future<Output = Result<Option<Receipt>, GatewayError>> + Send;
}
