use core::mem::size_of;
use get_size::GetSize;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::hash::{Hash, Hasher};

/// Sample timestamp, in milliseconds since the epoch.
pub type Timestamp = u64;

pub const SAMPLE_SIZE: usize = size_of::<Sample>();

/// A single observation: a millisecond timestamp and an IEEE-754 double.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize, GetSize)]
pub struct Sample {
    pub timestamp: Timestamp,
    pub value: f64,
}

impl Sample {
    pub const fn new(timestamp: Timestamp, value: f64) -> Self {
        Self { timestamp, value }
    }
}

impl Display for Sample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @ {}", self.value, self.timestamp)
    }
}

impl Hash for Sample {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.timestamp.hash(state);
        self.value.to_bits().hash(state);
    }
}
