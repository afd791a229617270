//! A scriptable, in-process [`ChainGateway`].
//!
//! Tests "mine" blocks, put transactions in the pending pool, publish receipts and inject failures, then announce
//! events to whichever pipeline is subscribed.
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use epg_common::{BlockHash, Hash32, TxHash};
use ether_payment_engine::{
    chain::{Block, BlockHeader, ChainEvent, Receipt, Transaction},
    ChainGateway,
    GatewayError,
    Subscription,
    SubscriptionKind,
};
use log::*;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

type Feed = mpsc::Sender<Result<ChainEvent, GatewayError>>;

#[derive(Clone, Default)]
pub struct SimulatedChain {
    inner: Arc<ChainState>,
}

#[derive(Default)]
struct ChainState {
    height: AtomicU64,
    blocks: Mutex<HashMap<BlockHash, Block>>,
    known: Mutex<HashMap<TxHash, Transaction>>,
    receipts: Mutex<HashMap<TxHash, Receipt>>,
    unfetchable_blocks: Mutex<HashSet<BlockHash>>,
    receipt_error: Mutex<Option<GatewayError>>,
    block_fetch_delay: Mutex<Duration>,
    feed: Mutex<Option<Feed>>,
    subscriptions: Mutex<Vec<SubscriptionKind>>,
    block_fetches: AtomicU64,
    receipt_polls: AtomicU64,
    polled: Mutex<HashSet<TxHash>>,
}

pub fn block_hash(number: u64) -> BlockHash {
    let mut bytes = [0xbb; 32];
    bytes[24..].copy_from_slice(&number.to_be_bytes());
    Hash32::new(bytes)
}

impl SimulatedChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Includes `transactions` in a new block with a successful receipt for each. Nothing is announced.
    pub fn mine_block(&self, transactions: Vec<Transaction>) -> BlockHeader {
        let number = self.inner.height.fetch_add(1, Ordering::SeqCst) + 1;
        let header = BlockHeader { hash: block_hash(number), number };
        let transactions = transactions.into_iter().map(|tx| tx.in_block(number)).collect::<Vec<_>>();
        {
            let mut receipts = self.inner.receipts.lock().unwrap();
            let mut known = self.inner.known.lock().unwrap();
            for tx in &transactions {
                receipts.insert(tx.hash, Receipt { transaction_hash: tx.hash, block_number: number, success: true });
                known.insert(tx.hash, tx.clone());
            }
        }
        self.inner.blocks.lock().unwrap().insert(header.hash, Block { header, transactions });
        header
    }

    /// Mines a block and announces it to the subscriber.
    pub async fn produce_block(&self, transactions: Vec<Transaction>) -> BlockHeader {
        let header = self.mine_block(transactions);
        self.announce_block(header).await;
        header
    }

    pub async fn announce_block(&self, header: BlockHeader) {
        self.emit(Ok(ChainEvent::NewHead(header))).await;
    }

    /// Marks an already mined transaction as reverted.
    pub fn revert(&self, hash: TxHash) {
        if let Some(receipt) = self.inner.receipts.lock().unwrap().get_mut(&hash) {
            receipt.success = false;
        }
    }

    /// Puts `tx` in the pending pool and announces it to the subscriber.
    pub async fn submit(&self, tx: Transaction) {
        let hash = tx.hash;
        self.inner.known.lock().unwrap().insert(hash, tx);
        self.emit(Ok(ChainEvent::PendingTransaction(hash))).await;
    }

    /// Announces a transaction the node has never heard of, as if it was dropped from the pool straight away.
    pub async fn announce_unknown(&self, hash: TxHash) {
        self.emit(Ok(ChainEvent::PendingTransaction(hash))).await;
    }

    /// Publishes a receipt for a submitted transaction.
    pub fn confirm(&self, hash: TxHash, success: bool) {
        let number = self.inner.height.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.receipts.lock().unwrap().insert(hash, Receipt { transaction_hash: hash, block_number: number, success });
    }

    pub fn make_block_unfetchable(&self, hash: BlockHash) {
        self.inner.unfetchable_blocks.lock().unwrap().insert(hash);
    }

    pub fn fail_receipts(&self, error: GatewayError) {
        *self.inner.receipt_error.lock().unwrap() = Some(error);
    }

    pub fn delay_block_fetches(&self, delay: Duration) {
        *self.inner.block_fetch_delay.lock().unwrap() = delay;
    }

    /// Reports a fatal error on the subscription.
    pub async fn fail_subscription(&self, error: GatewayError) {
        self.emit(Err(error)).await;
    }

    /// Closes the subscription from the producer side, as a crashed node would.
    pub fn end_subscription(&self) {
        self.inner.feed.lock().unwrap().take();
    }

    pub fn subscriptions(&self) -> Vec<SubscriptionKind> {
        self.inner.subscriptions.lock().unwrap().clone()
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner.feed.lock().unwrap().as_ref().is_some_and(|feed| !feed.is_closed())
    }

    pub fn block_fetches(&self) -> u64 {
        self.inner.block_fetches.load(Ordering::SeqCst)
    }

    pub fn receipt_polls(&self) -> u64 {
        self.inner.receipt_polls.load(Ordering::SeqCst)
    }

    /// The distinct transactions whose receipts have been asked for.
    pub fn polled_transactions(&self) -> usize {
        self.inner.polled.lock().unwrap().len()
    }

    async fn emit(&self, event: Result<ChainEvent, GatewayError>) {
        let feed = self.inner.feed.lock().unwrap().clone();
        match feed {
            Some(feed) => {
                if feed.send(event).await.is_err() {
                    warn!("🧪️ The subscriber has gone away");
                }
            },
            None => warn!("🧪️ Nobody is subscribed. Event dropped."),
        }
    }
}

impl ChainGateway for SimulatedChain {
    async fn subscribe(&self, kind: SubscriptionKind, cancel: CancellationToken) -> Result<Subscription, GatewayError> {
        let (sender, receiver) = mpsc::channel(1024);
        *self.inner.feed.lock().unwrap() = Some(sender);
        self.inner.subscriptions.lock().unwrap().push(kind);
        let chain = self.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            chain.end_subscription();
        });
        Ok(Subscription::new(receiver))
    }

    async fn fetch_block(&self, hash: &BlockHash) -> Result<Block, GatewayError> {
        self.inner.block_fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.inner.block_fetch_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.inner.unfetchable_blocks.lock().unwrap().contains(hash) {
            return Err(GatewayError::Connection("simulated outage".to_string()));
        }
        self.inner.blocks.lock().unwrap().get(hash).cloned().ok_or(GatewayError::BlockNotFound(*hash))
    }

    async fn fetch_transaction(&self, hash: &TxHash) -> Result<Option<Transaction>, GatewayError> {
        Ok(self.inner.known.lock().unwrap().get(hash).cloned())
    }

    async fn fetch_receipt(&self, hash: &TxHash) -> Result<Option<Receipt>, GatewayError> {
        self.inner.receipt_polls.fetch_add(1, Ordering::SeqCst);
        self.inner.polled.lock().unwrap().insert(*hash);
        if let Some(e) = self.inner.receipt_error.lock().unwrap().clone() {
            return Err(e);
        }
        Ok(self.inner.receipts.lock().unwrap().get(hash).cloned())
    }
}
