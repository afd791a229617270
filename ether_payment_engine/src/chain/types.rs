use epg_common::{Address, BlockHash, TxHash, Wei};
use serde::{Deserialize, Serialize};

/// The subset of a chain transaction that the payment engine cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: TxHash,
    /// The destination. `None` for contract-creation transactions.
    pub to: Option<Address>,
    pub value: Wei,
    /// The block this transaction was mined in, if any.
    pub block_number: Option<u64>,
}

impl Transaction {
    pub fn new(hash: TxHash, to: Option<Address>, value: Wei) -> Self {
        Self { hash, to, value, block_number: None }
    }

    pub fn in_block(mut self, block_number: u64) -> Self {
        self.block_number = Some(block_number);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub hash: BlockHash,
    pub number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

/// Evidence that a transaction has been included in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub transaction_hash: TxHash,
    pub block_number: u64,
    /// `false` if the transaction was included but reverted, in which case no value was transferred.
    pub success: bool,
}

/// A unit of work delivered by a chain subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    /// A new block was produced. Its transactions must be fetched separately.
    NewHead(BlockHeader),
    /// A transaction entered the pending pool.
    PendingTransaction(TxHash),
}
