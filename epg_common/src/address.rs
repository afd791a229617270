use std::{fmt, str::FromStr};

use ethers::types::{H160, H256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseHexError {
    #[error("Expected {expected} hex digits, but got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("Invalid hex string: {0}")]
    InvalidHex(String),
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], ParseHexError> {
    let digits = s.trim().trim_start_matches("0x").trim_start_matches("0X");
    if digits.len() != N * 2 {
        return Err(ParseHexError::InvalidLength { expected: N * 2, actual: digits.len() });
    }
    let mut bytes = [0u8; N];
    hex::decode_to_slice(digits, &mut bytes).map_err(|e| ParseHexError::InvalidHex(e.to_string()))?;
    Ok(bytes)
}

/// Wraps an `ethers` fixed-width hash so that it is displayed, parsed, and serialized as full `0x`-prefixed lowercase
/// hex. (`ethers` abbreviates hashes in `Display`.)
macro_rules! hex_bytes {
    ($(#[$meta:meta])* $name:ident, $inner:ident, $len:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name($inner);

        impl $name {
            pub const LEN: usize = $len;

            pub const fn new(bytes: [u8; $len]) -> Self {
                Self($inner(bytes))
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                self.0.as_fixed_bytes()
            }

            pub fn to_hex(&self) -> String {
                self.to_string()
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self::new(bytes)
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl From<$name> for $inner {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl FromStr for $name {
            type Err = ParseHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_fixed::<{ $len }>(s).map(Self::new)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.as_bytes()))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({self})", stringify!($name))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_bytes!(
    /// A 20-byte account address. Parsing is case-insensitive, so EIP-55 checksummed input is accepted, but the
    /// checksum itself is not verified.
    Address,
    H160,
    20
);

hex_bytes!(
    /// A 32-byte Keccak hash, used for transaction and block hashes.
    Hash32,
    H256,
    32
);

pub type TxHash = Hash32;
pub type BlockHash = Hash32;
