//! Big-number voting weight.
//!
//! Chain-side voting power is a big integer that exceeds what JSON numbers
//! can carry faithfully, and round tracking needs signed arithmetic (a
//! round's remaining weight goes negative once enough validators voted).
//! `Weight` is therefore a signed 128-bit integer that serializes as the
//! tagged object `{"type":"BigInt","value":"<decimal>"}` so values survive
//! round-trips through text serialization in durable storage.

use serde::de::Error as DeError;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub};
use std::str::FromStr;

/// A signed big-number voting weight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Weight(i128);

impl Weight {
    pub const ZERO: Self = Self(0);

    pub fn new(raw: i128) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> i128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl Add for Weight {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Weight {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Weight {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Weight {
    type Output = Self;
    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl Sum for Weight {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, w| acc.saturating_add(w))
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Weight {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i128>().map(Self)
    }
}

impl Serialize for Weight {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Weight", 2)?;
        s.serialize_field("type", "BigInt")?;
        s.serialize_field("value", &self.0.to_string())?;
        s.end()
    }
}

/// Accepted wire forms: the canonical tagged object, a bare JSON integer
/// (small values from the gateway), or a plain decimal string.
#[derive(Deserialize)]
#[serde(untagged)]
enum WeightRepr {
    Tagged {
        #[serde(rename = "type")]
        kind: String,
        value: String,
    },
    Int(i64),
    Str(String),
}

impl<'de> Deserialize<'de> for Weight {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match WeightRepr::deserialize(deserializer)? {
            WeightRepr::Tagged { kind, value } => {
                if kind != "BigInt" {
                    return Err(D::Error::custom(format!("unknown number tag: {kind}")));
                }
                value.parse().map(Weight).map_err(D::Error::custom)
            }
            WeightRepr::Int(n) => Ok(Weight(n as i128)),
            WeightRepr::Str(s) => s.parse().map(Weight).map_err(D::Error::custom),
        }
    }
}
