use crate::common::Timestamp;
use crate::error::{TsdbError, TsdbResult};
use crate::error_consts;
use get_size::GetSize;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Default, PartialEq, Deserialize, Serialize, Clone, Copy, GetSize, Hash)]
/// The policy to use when a duplicate sample is encountered
pub enum DuplicatePolicy {
    /// Block the sample and return an error
    #[default]
    Block,
    /// Keep the first sample
    KeepFirst,
    /// Keep the last (current) sample
    KeepLast,
    /// Keep the minimum value of the current and old sample
    Min,
    /// Keep the maximum value of the current and old sample
    Max,
    /// Sum the current and old sample
    Sum,
}

impl Display for DuplicatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl DuplicatePolicy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DuplicatePolicy::Block => "block",
            DuplicatePolicy::KeepFirst => "first",
            DuplicatePolicy::KeepLast => "last",
            DuplicatePolicy::Min => "min",
            DuplicatePolicy::Max => "max",
            DuplicatePolicy::Sum => "sum",
        }
    }

    /// Resolves a collision between the stored value `old` and the incoming
    /// value `new` at timestamp `ts`.
    ///
    /// Returns the value to keep, or `TsdbError::DuplicateSample` when the
    /// policy is `Block`. If exactly one side is NaN, the non-NaN value wins
    /// under every policy except `Block`.
    pub fn duplicate_value(self, ts: Timestamp, old: f64, new: f64) -> TsdbResult<f64> {
        use DuplicatePolicy::*;
        if (old.is_nan() || new.is_nan()) && self != Block {
            return Ok(if new.is_nan() { old } else { new });
        }
        match self {
            Block => Err(TsdbError::DuplicateSample(format!("{new} @ {ts}"))),
            KeepFirst => Ok(old),
            KeepLast => Ok(new),
            Min => Ok(old.min(new)),
            Max => Ok(old.max(new)),
            Sum => Ok(old + new),
        }
    }
}

fn get_policy_from_bytes(bytes: &[u8]) -> Option<DuplicatePolicy> {
    use DuplicatePolicy::*;
    hashify::tiny_map_ignore_case! {
        bytes,
        "block" => Block,
        "first"  => KeepFirst,
        "last"   => KeepLast,
        "min"    => Min,
        "max"    => Max,
        "sum"    => Sum,
    }
}

impl FromStr for DuplicatePolicy {
    type Err = TsdbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(policy) = get_policy_from_bytes(s.as_bytes()) {
            Ok(policy)
        } else {
            Err(TsdbError::InvalidConfiguration(
                error_consts::INVALID_DUPLICATE_POLICY.to_string(),
            ))
        }
    }
}

impl TryFrom<&[u8]> for DuplicatePolicy {
    type Error = TsdbError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        get_policy_from_bytes(bytes).ok_or_else(|| {
            TsdbError::InvalidConfiguration(error_consts::INVALID_DUPLICATE_POLICY.to_string())
        })
    }
}

impl TryFrom<&str> for DuplicatePolicy {
    type Error = TsdbError;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        DuplicatePolicy::from_str(s)
    }
}
