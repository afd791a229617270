//! A [`ChainGateway`] backed by an Ethereum node's HTTP JSON-RPC interface, through an `ethers` [`Provider`].
//!
//! Plain HTTP has no push notifications, so subscriptions are emulated by polling:
//! * New heads: `eth_blockNumber`, then `eth_getBlockByNumber` for every block since the last one reported.
//! * Pending transactions: a filter installed with `eth_newPendingTransactionFilter`, drained with
//!   `eth_getFilterChanges`.
//!
//! A failed poll is retried on the next tick. After `max_consecutive_failures` failed polls in a row, the node is
//! considered gone and the subscription reports a fatal error.
use std::{future::Future, time::Duration};

use epg_common::{BlockHash, TxHash};
use ether_payment_engine::{
    chain::{Block, BlockHeader, ChainEvent, Receipt, Transaction},
    ChainGateway,
    GatewayError,
    Subscription,
    SubscriptionKind,
};
use ethers::{
    providers::{FilterKind, Http, Middleware, Provider, ProviderError, RpcError},
    types::{Transaction as EthTransaction, TransactionReceipt, H256, U256, U64},
};
use log::*;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const SUBSCRIPTION_BUFFER: usize = 1_024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Clone, Debug)]
pub struct JsonRpcGateway {
    provider: Provider<Http>,
    rpc_url: String,
    poll_interval: Duration,
    max_consecutive_failures: u32,
}

fn gateway_error(e: ProviderError) -> GatewayError {
    if let Some(response) = e.as_error_response() {
        GatewayError::Rpc(format!("Code {}. {}", response.code, response.message))
    } else if e.as_serde_error().is_some() {
        GatewayError::InvalidResponse(e.to_string())
    } else {
        GatewayError::Connection(e.to_string())
    }
}

fn block_header(hash: Option<H256>, number: Option<U64>) -> Result<BlockHeader, GatewayError> {
    // Both are null for a pending block
    match (hash, number) {
        (Some(hash), Some(number)) => Ok(BlockHeader { hash: hash.into(), number: number.as_u64() }),
        _ => Err(GatewayError::InvalidResponse("The block has not been sealed".to_string())),
    }
}

fn transaction(tx: EthTransaction) -> Transaction {
    let result = Transaction::new(tx.hash.into(), tx.to.map(Into::into), tx.value.into());
    match tx.block_number {
        Some(number) => result.in_block(number.as_u64()),
        None => result,
    }
}

fn receipt(receipt: TransactionReceipt) -> Result<Receipt, GatewayError> {
    let block_number = receipt
        .block_number
        .ok_or_else(|| GatewayError::InvalidResponse("The receipt has no block number".to_string()))?;
    // `status` is absent before the Byzantium fork
    let success = receipt.status.map_or(true, |status| !status.is_zero());
    Ok(Receipt { transaction_hash: receipt.transaction_hash.into(), block_number: block_number.as_u64(), success })
}

impl JsonRpcGateway {
    pub fn new(rpc_url: &str, poll_interval: Duration, max_consecutive_failures: u32) -> Result<Self, GatewayError> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| GatewayError::Connection(format!("'{rpc_url}' is not a valid node URL. {e}")))?;
        Ok(Self {
            provider,
            rpc_url: rpc_url.to_string(),
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            max_consecutive_failures: max_consecutive_failures.max(1),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    async fn call<T, F>(&self, method: &str, request: F) -> Result<T, GatewayError>
    where F: Future<Output = Result<T, ProviderError>> {
        trace!("🔗️ >>> {method}");
        match tokio::time::timeout(REQUEST_TIMEOUT, request).await {
            Ok(result) => result.map_err(gateway_error),
            Err(_) => {
                let secs = REQUEST_TIMEOUT.as_secs();
                Err(GatewayError::Connection(format!("{method} timed out after {secs}s")))
            },
        }
    }

    pub async fn block_number(&self) -> Result<u64, GatewayError> {
        let number = self.call("eth_blockNumber", self.provider.get_block_number()).await?;
        Ok(number.as_u64())
    }

    async fn header_by_number(&self, number: u64) -> Result<Option<BlockHeader>, GatewayError> {
        let block = self.call("eth_getBlockByNumber", self.provider.get_block(number)).await?;
        block.map(|b| block_header(b.hash, b.number)).transpose()
    }

    async fn new_pending_filter(&self) -> Result<U256, GatewayError> {
        self.call("eth_newPendingTransactionFilter", self.provider.new_filter(FilterKind::PendingTransactions)).await
    }

    async fn filter_changes(&self, filter: U256) -> Result<Vec<H256>, GatewayError> {
        self.call("eth_getFilterChanges", self.provider.get_filter_changes(filter)).await
    }

    async fn uninstall_filter(&self, filter: U256) {
        if let Err(e) = self.call("eth_uninstallFilter", self.provider.uninstall_filter(filter)).await {
            debug!("🔗️ Could not remove pending transaction filter {filter:#x}. {e}");
        }
    }

    /// Reports every block after `last_reported`, in order, until the chain tip.
    async fn follow_heads(self, mut last_reported: u64, sender: Sender, cancel: CancellationToken) {
        let mut failures = FailureCount::new(self.max_consecutive_failures);
        info!("🔗️ Following new blocks from #{last_reported}");
        while self.wait_for_tick(&cancel, &sender).await {
            let tip = match self.block_number().await {
                Ok(tip) => tip,
                Err(e) => {
                    if !failures.record(e, &sender).await {
                        return;
                    }
                    continue;
                },
            };
            let mut poll_failed = false;
            for number in last_reported + 1..=tip {
                match self.header_by_number(number).await {
                    Ok(Some(header)) => {
                        trace!("🔗️ New block #{number}");
                        if sender.send(Ok(ChainEvent::NewHead(header))).await.is_err() {
                            return;
                        }
                        last_reported = number;
                    },
                    // The node load balancer may be lagging behind the tip it just reported
                    Ok(None) => break,
                    Err(e) => {
                        poll_failed = true;
                        if !failures.record(e, &sender).await {
                            return;
                        }
                        break;
                    },
                }
            }
            if !poll_failed {
                failures.reset();
            }
        }
        debug!("🔗️ Stopped following new blocks at #{last_reported}");
    }

    async fn follow_pending(self, filter: U256, sender: Sender, cancel: CancellationToken) {
        let mut failures = FailureCount::new(self.max_consecutive_failures);
        let mut filter = Some(filter);
        info!("🔗️ Following the pending transaction pool");
        while self.wait_for_tick(&cancel, &sender).await {
            let current = match filter.take() {
                Some(f) => f,
                None => match self.new_pending_filter().await {
                    Ok(f) => {
                        debug!("🔗️ Reinstalled pending transaction filter {f:#x}");
                        f
                    },
                    Err(e) => {
                        if !failures.record(e, &sender).await {
                            return;
                        }
                        continue;
                    },
                },
            };
            match self.filter_changes(current).await {
                Ok(hashes) => {
                    failures.reset();
                    for hash in hashes {
                        if sender.send(Ok(ChainEvent::PendingTransaction(hash.into()))).await.is_err() {
                            self.uninstall_filter(current).await;
                            return;
                        }
                    }
                    filter = Some(current);
                },
                // Filters expire on the node if they are not polled for a while, so install a new one next time
                Err(e) => {
                    if !failures.record(e, &sender).await {
                        return;
                    }
                },
            }
        }
        if let Some(f) = filter {
            self.uninstall_filter(f).await;
        }
        debug!("🔗️ Stopped following the pending transaction pool");
    }

    /// Waits for the next poll. Returns false if the subscription should end.
    async fn wait_for_tick(&self, cancel: &CancellationToken, sender: &Sender) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = sender.closed() => false,
            _ = tokio::time::sleep(self.poll_interval) => true,
        }
    }
}

type Sender = mpsc::Sender<Result<ChainEvent, GatewayError>>;

struct FailureCount {
    consecutive: u32,
    max: u32,
}

impl FailureCount {
    fn new(max: u32) -> Self {
        Self { consecutive: 0, max }
    }

    fn reset(&mut self) {
        self.consecutive = 0;
    }

    /// Returns false once the limit is reached, after reporting the failure to the subscriber.
    async fn record(&mut self, e: GatewayError, sender: &Sender) -> bool {
        self.consecutive += 1;
        if self.consecutive < self.max {
            warn!("🔗️ Chain poll failed ({} of {} allowed). {e}", self.consecutive, self.max);
            return true;
        }
        error!("🔗️ Chain poll failed {} times in a row. Giving up. {e}", self.consecutive);
        let message = format!("{} consecutive polls failed. Last error: {e}", self.consecutive);
        let _ = sender.send(Err(GatewayError::Subscription(message))).await;
        false
    }
}

impl ChainGateway for JsonRpcGateway {
    async fn subscribe(&self, kind: SubscriptionKind, cancel: CancellationToken) -> Result<Subscription, GatewayError> {
        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_BUFFER);
        match kind {
            SubscriptionKind::NewHeads => {
                let tip = self.block_number().await?;
                tokio::spawn(self.clone().follow_heads(tip, sender, cancel));
            },
            SubscriptionKind::PendingTransactions => {
                let filter = self.new_pending_filter().await?;
                tokio::spawn(self.clone().follow_pending(filter, sender, cancel));
            },
        }
        Ok(Subscription::new(receiver))
    }

    async fn fetch_block(&self, hash: &BlockHash) -> Result<Block, GatewayError> {
        let block = self.call("eth_getBlockByHash", self.provider.get_block_with_txs(H256::from(*hash))).await?;
        let block = block.ok_or(GatewayError::BlockNotFound(*hash))?;
        let header = block_header(block.hash, block.number)?;
        let transactions = block.transactions.into_iter().map(transaction).collect();
        Ok(Block { header, transactions })
    }

    async fn fetch_transaction(&self, hash: &TxHash) -> Result<Option<Transaction>, GatewayError> {
        let tx = self.call("eth_getTransactionByHash", self.provider.get_transaction(H256::from(*hash))).await?;
        Ok(tx.map(transaction))
    }

    async fn fetch_receipt(&self, hash: &TxHash) -> Result<Option<Receipt>, GatewayError> {
        let found =
            self.call("eth_getTransactionReceipt", self.provider.get_transaction_receipt(H256::from(*hash))).await?;
        found.map(receipt).transpose()
    }
}
