use crate::chunks::chunk::Chunk;
use crate::chunks::enriched::EnrichedChunk;
use crate::common::{Sample, Timestamp, SAMPLE_SIZE};
use crate::error::{TsdbError, TsdbResult};
use crate::error_consts;
use crate::policy::DuplicatePolicy;
use crate::serialization::{ByteSink, ByteSource};
use core::mem::size_of;
use get_size::GetSize;
use std::hash::Hash;

pub const MAX_UNCOMPRESSED_SAMPLES: usize = 256;

/// A chunk holding its samples as a flat ordered array.
#[derive(Clone, Debug, PartialEq)]
pub struct UncompressedChunk {
    pub max_size: usize,
    pub samples: Vec<Sample>,
    pub(crate) max_elements: usize,
}

impl Default for UncompressedChunk {
    fn default() -> Self {
        Self {
            samples: Vec::default(),
            max_size: MAX_UNCOMPRESSED_SAMPLES * SAMPLE_SIZE,
            max_elements: MAX_UNCOMPRESSED_SAMPLES,
        }
    }
}

impl GetSize for UncompressedChunk {
    fn get_heap_size(&self) -> usize {
        self.samples.capacity() * size_of::<Sample>()
    }
}

impl Hash for UncompressedChunk {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.max_size.hash(state);
        self.max_elements.hash(state);
        for sample in &self.samples {
            sample.hash(state);
        }
    }
}

impl UncompressedChunk {
    pub fn new(size: usize, samples: &[Sample]) -> Self {
        let max_elements = size / SAMPLE_SIZE;
        Self {
            samples: samples.to_vec(),
            max_size: size,
            max_elements,
        }
    }

    pub fn with_max_size(size: usize) -> Self {
        Self {
            max_size: size,
            max_elements: size / SAMPLE_SIZE,
            ..Default::default()
        }
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.max_elements
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn set_data(&mut self, samples: &[Sample]) -> TsdbResult<()> {
        self.samples = samples.to_vec();
        if self.samples.len() > self.max_elements {
            self.max_elements = self.samples.len();
            self.max_size = self.max_elements * SAMPLE_SIZE;
        }
        Ok(())
    }

    pub fn bytes_per_sample(&self) -> usize {
        SAMPLE_SIZE
    }

    pub fn memory_usage(&self) -> usize {
        size_of::<Self>() + self.get_heap_size()
    }

    pub fn iter(&self) -> impl Iterator<Item = Sample> + '_ {
        self.samples.iter().cloned()
    }

    pub fn range_iter(
        &self,
        start_ts: Timestamp,
        end_ts: Timestamp,
    ) -> impl Iterator<Item = Sample> + '_ {
        let bounds = self.get_index_bounds(start_ts, end_ts);
        let slice = match bounds {
            Some((start_idx, end_idx)) => &self.samples[start_idx..=end_idx],
            None => &[],
        };
        slice.iter().cloned()
    }

    fn handle_insert(&mut self, sample: Sample, policy: DuplicatePolicy) -> TsdbResult<isize> {
        let ts = sample.timestamp;

        let (idx, found) = self.get_sample_index(ts);
        if found {
            // update value in case timestamp exists
            let current = &mut self.samples[idx];
            current.value = policy.duplicate_value(ts, current.value, sample.value)?;
            return Ok(0);
        }
        if self.is_full() {
            self.grow_by_one_sample();
        }
        if idx < self.samples.len() {
            self.samples.insert(idx, sample);
        } else {
            self.samples.push(sample);
        }
        Ok(1)
    }

    // capacity may stretch by a single sample during upsert
    fn grow_by_one_sample(&mut self) {
        self.max_size += SAMPLE_SIZE;
        self.max_elements += 1;
    }

    fn get_sample_index(&self, ts: Timestamp) -> (usize, bool) {
        match self.samples.binary_search_by(|x| x.timestamp.cmp(&ts)) {
            Ok(pos) => (pos, true),
            Err(idx) => (idx, false),
        }
    }

    fn get_range_slice(&self, start_ts: Timestamp, end_ts: Timestamp) -> Vec<Sample> {
        if let Some((start_idx, end_idx)) = self.get_index_bounds(start_ts, end_ts) {
            self.samples[start_idx..=end_idx].to_vec()
        } else {
            vec![]
        }
    }

    /// Finds the start and end sample indices (inclusive) for a date range.
    ///
    /// Returns `None` if the series is empty or no sample falls inside
    /// `[start, end]`.
    fn get_index_bounds(&self, start: Timestamp, end: Timestamp) -> Option<(usize, usize)> {
        let len = self.samples.len();
        if len == 0 || end < start {
            return None;
        }
        let last_ts = self.samples[len - 1].timestamp;
        if end < self.samples[0].timestamp || start > last_ts {
            return None;
        }

        let (start_idx, _) = self.get_sample_index(start);
        if start_idx >= len {
            return None;
        }

        let (mut end_idx, found) = self.get_sample_index(end);
        if !found {
            // the insert position is one past the last sample <= end
            if end_idx == 0 {
                return None;
            }
            end_idx -= 1;
        }

        if self.samples[start_idx].timestamp > end {
            return None;
        }

        Some((start_idx, end_idx))
    }
}

impl Chunk for UncompressedChunk {
    fn first_timestamp(&self) -> Timestamp {
        if self.samples.is_empty() {
            return 0;
        }
        self.samples[0].timestamp
    }

    fn last_timestamp(&self) -> Timestamp {
        if self.samples.is_empty() {
            log::error!("{}", error_consts::EMPTY_CHUNK_LAST_TIMESTAMP);
            return 0;
        }
        self.samples[self.samples.len() - 1].timestamp
    }

    fn len(&self) -> usize {
        self.samples.len()
    }

    fn last_value(&self) -> f64 {
        if self.samples.is_empty() {
            log::error!("{}", error_consts::EMPTY_CHUNK_LAST_VALUE);
            return 0.0;
        }
        self.samples[self.samples.len() - 1].value
    }

    fn size(&self) -> usize {
        self.samples.len() * size_of::<Sample>()
    }

    fn max_size(&self) -> usize {
        self.max_size
    }

    fn remove_range(&mut self, start_ts: Timestamp, end_ts: Timestamp) -> TsdbResult<usize> {
        let count = self.samples.len();
        if let Some((start_idx, end_idx)) = self.get_index_bounds(start_ts, end_ts) {
            let _ = self.samples.drain(start_idx..=end_idx);
        };
        Ok(count - self.samples.len())
    }

    fn add_sample(&mut self, sample: &Sample) -> TsdbResult<()> {
        if self.is_full() {
            return Err(TsdbError::CapacityFull(self.max_elements));
        }
        debug_assert!(self
            .samples
            .last()
            .is_none_or(|last| last.timestamp < sample.timestamp));
        self.samples.push(*sample);
        Ok(())
    }

    fn get_range(&self, start: Timestamp, end: Timestamp) -> TsdbResult<Vec<Sample>> {
        let slice = self.get_range_slice(start, end);
        Ok(slice)
    }

    fn upsert_sample(&mut self, sample: Sample, dp_policy: DuplicatePolicy) -> TsdbResult<isize> {
        if self.is_empty() {
            if self.is_full() {
                self.grow_by_one_sample();
            }
            self.samples.push(sample);
            return Ok(1);
        }

        let last_ts = self.samples[self.samples.len() - 1].timestamp;
        if sample.timestamp > last_ts {
            if self.is_full() {
                self.grow_by_one_sample();
            }
            self.samples.push(sample);
            return Ok(1);
        }

        self.handle_insert(sample, dp_policy)
    }

    fn process_range(
        &self,
        start: Timestamp,
        end: Timestamp,
        out: &mut EnrichedChunk,
        reverse: bool,
    ) {
        out.reset();
        let Some((start_idx, end_idx)) = self.get_index_bounds(start, end) else {
            return;
        };

        let count = end_idx - start_idx + 1;
        out.make_room(count);
        let (timestamps, values) = out.slots();

        if reverse {
            for (i, sample) in self.samples[start_idx..=end_idx].iter().rev().enumerate() {
                timestamps[i] = sample.timestamp;
                values[i] = sample.value;
            }
            out.set_reversed(0, count);
        } else {
            for (i, sample) in self.samples[start_idx..=end_idx].iter().enumerate() {
                timestamps[i] = sample.timestamp;
                values[i] = sample.value;
            }
            out.set_forward(count);
        }
    }

    fn split(&mut self) -> TsdbResult<Self> {
        if self.samples.len() < 2 {
            let mut result = self.clone();
            result.samples.clear();
            return Ok(result);
        }

        // the first half keeps the extra sample when the count is odd
        let mid = self.samples.len() / 2;
        let keep = self.samples.len() - mid;
        let samples = std::mem::take(&mut self.samples);
        let (left, right) = samples.split_at(keep);
        self.samples = left.to_vec();

        Ok(Self {
            max_size: self.max_size,
            samples: right.to_vec(),
            max_elements: self.max_elements,
        })
    }

    /// Wire layout: `base_timestamp | num_samples | size | samples[size]`,
    /// the sample buffer zero-padded out to its full capacity.
    fn save<S: ByteSink>(&self, sink: &mut S) {
        sink.write_u64(self.first_timestamp());
        sink.write_u64(self.samples.len() as u64);
        sink.write_u64(self.max_size as u64);

        let mut raw = Vec::with_capacity(self.max_size);
        for Sample { timestamp, value } in self.samples.iter() {
            raw.extend_from_slice(&timestamp.to_ne_bytes());
            raw.extend_from_slice(&value.to_bits().to_ne_bytes());
        }
        raw.resize(self.max_size, 0);
        sink.write_bytes(&raw);
    }

    fn load<S: ByteSource>(source: &mut S) -> TsdbResult<Self> {
        let _base_timestamp = read_u64(source)?;
        let num_samples = read_u64(source)? as usize;
        let size = read_u64(source)? as usize;
        let raw = source.read_bytes().map_err(|_| TsdbError::ChunkDecoding)?;

        if raw.len() != size || num_samples * SAMPLE_SIZE > size {
            return Err(TsdbError::ChunkDecoding);
        }

        let mut samples = Vec::with_capacity(num_samples);
        for pair in raw[..num_samples * SAMPLE_SIZE].chunks_exact(SAMPLE_SIZE) {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&pair[..8]);
            let timestamp = Timestamp::from_ne_bytes(buf);
            buf.copy_from_slice(&pair[8..]);
            let value = f64::from_bits(u64::from_ne_bytes(buf));
            samples.push(Sample { timestamp, value });
        }

        Ok(UncompressedChunk {
            max_size: size,
            samples,
            max_elements: size / SAMPLE_SIZE,
        })
    }
}

fn read_u64<S: ByteSource>(source: &mut S) -> TsdbResult<u64> {
    source.read_u64().map_err(|_| TsdbError::ChunkDecoding)
}
