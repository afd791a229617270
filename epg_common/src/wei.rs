use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign},
    str::FromStr,
};

use ethers::types::U256;
use num_bigint::BigUint;
use num_traits::{Num, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;
use thiserror::Error;

use crate::op;

pub const WEI_PER_ETHER: u64 = 1_000_000_000_000_000_000;

//--------------------------------------        Wei         ---------------------------------------------------------
/// An amount of Ether, in wei. Amounts are unbounded and never negative, so additions cannot overflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Wei(BigUint);

op!(binary Wei, Add, add);
op!(inplace Wei, AddAssign, add_assign);

impl Sum for Wei {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl<'a> Sum<&'a Wei> for Wei {
    fn sum<I: Iterator<Item = &'a Wei>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, v| acc + v.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Value cannot be represented in wei: {0}")]
pub struct WeiConversionError(String);

impl From<u64> for Wei {
    fn from(value: u64) -> Self {
        Self(BigUint::from(value))
    }
}

impl From<u128> for Wei {
    fn from(value: u128) -> Self {
        Self(BigUint::from(value))
    }
}

impl From<BigUint> for Wei {
    fn from(value: BigUint) -> Self {
        Self(value)
    }
}

impl From<U256> for Wei {
    fn from(value: U256) -> Self {
        let mut bytes = [0u8; 32];
        value.to_big_endian(&mut bytes);
        Self(BigUint::from_bytes_be(&bytes))
    }
}

impl FromStr for Wei {
    type Err = WeiConversionError;

    /// Parses a plain decimal string, e.g. `"1000000000000000000"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(WeiConversionError(format!("'{s}' is not a decimal integer")));
        }
        BigUint::from_str_radix(s, 10).map(Self).map_err(|e| WeiConversionError(format!("'{s}': {e}")))
    }
}

impl Display for Wei {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Wei {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_ether(ether: u64) -> Self {
        Self(BigUint::from(ether) * BigUint::from(WEI_PER_ETHER))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn value(&self) -> &BigUint {
        &self.0
    }
}

// Wei is written as a bare JSON integer of any size. Clients that cannot read large JSON numbers may send a decimal
// string instead.
impl Serialize for Wei {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let number = RawValue::from_string(self.0.to_string()).map_err(serde::ser::Error::custom)?;
        number.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Wei {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        let json = raw.get();
        if json.starts_with('"') {
            let text = serde_json::from_str::<String>(json).map_err(serde::de::Error::custom)?;
            Wei::from_str(&text).map_err(serde::de::Error::custom)
        } else {
            Wei::from_str(json).map_err(serde::de::Error::custom)
        }
    }
}
