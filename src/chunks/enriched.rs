use crate::common::{Sample, Timestamp};

/// Caller-owned columnar scratch populated by range decode.
///
/// One instance is reused across many chunk calls to avoid per-call
/// allocation; `process_range` resets it and grows its columns as needed.
/// Reverse decodes fill from the tail of the columns and shift the window
/// start, so the exposed slices are always contiguous.
#[derive(Debug, Default)]
pub struct EnrichedChunk {
    timestamps: Vec<Timestamp>,
    values: Vec<f64>,
    start: usize,
    count: usize,
    reversed: bool,
}

impl EnrichedChunk {
    pub fn with_capacity(capacity: usize) -> Self {
        EnrichedChunk {
            timestamps: vec![0; capacity],
            values: vec![0.0; capacity],
            start: 0,
            count: 0,
            reversed: false,
        }
    }

    pub fn reset(&mut self) {
        self.start = 0;
        self.count = 0;
        self.reversed = false;
    }

    pub fn num_samples(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    pub fn timestamps(&self) -> &[Timestamp] {
        &self.timestamps[self.start..self.start + self.count]
    }

    pub fn values(&self) -> &[f64] {
        &self.values[self.start..self.start + self.count]
    }

    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        self.timestamps()
            .iter()
            .zip(self.values())
            .map(|(&timestamp, &value)| Sample { timestamp, value })
    }

    /// Ensures the columns can hold `capacity` samples.
    pub(crate) fn make_room(&mut self, capacity: usize) {
        if self.timestamps.len() < capacity {
            self.timestamps.resize(capacity, 0);
            self.values.resize(capacity, 0.0);
        }
    }

    /// Mutable column storage for the decoders.
    pub(crate) fn slots(&mut self) -> (&mut [Timestamp], &mut [f64]) {
        (&mut self.timestamps, &mut self.values)
    }

    pub(crate) fn set_forward(&mut self, count: usize) {
        self.start = 0;
        self.count = count;
        self.reversed = false;
    }

    pub(crate) fn set_reversed(&mut self, start: usize, count: usize) {
        self.start = start;
        self.count = count;
        self.reversed = true;
    }
}
