//! The engine's view of the blockchain.
//!
//! The engine never talks to a node directly. Instead, it consumes a [`ChainGateway`], which delivers block and
//! pending-transaction notifications and answers transaction, block and receipt queries. The server crate provides a
//! JSON-RPC implementation.
mod gateway;
mod types;

pub use gateway::{ChainGateway, GatewayError, Subscription, SubscriptionKind};
pub use types::{Block, BlockHeader, ChainEvent, Receipt, Transaction};
