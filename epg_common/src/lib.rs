//! Value types shared by the Ether payment gateway crates.
//!
//! * [`Wei`] is an arbitrary-precision, non-negative amount in the smallest Ether unit.
//! * [`Address`] and [`Hash32`] (aliased as [`TxHash`] and [`BlockHash`]) wrap the `ethers` `H160` and `H256` types
//!   with the usual full `0x`-prefixed hex representation.
//! * [`Secret`] keeps sensitive configuration values out of log output.
mod address;
mod secret;
mod wei;

pub mod helpers;
pub mod op;

pub use address::{Address, BlockHash, Hash32, ParseHexError, TxHash};
pub use secret::Secret;
pub use wei::{Wei, WeiConversionError, WEI_PER_ETHER};
