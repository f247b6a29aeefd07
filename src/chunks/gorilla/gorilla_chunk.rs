use super::bitstream::BitStream;
use super::dod::{dod_bit_length, write_dod};
use super::iterator::GorillaChunkIterator;
use super::xor::{write_xor, xor_bit_length};
use crate::chunks::chunk::Chunk;
use crate::chunks::enriched::EnrichedChunk;
use crate::common::{Sample, Timestamp, SAMPLE_SIZE};
use crate::config::DEFAULT_CHUNK_SIZE_BYTES;
use crate::error::{TsdbError, TsdbResult};
use crate::error_consts;
use crate::policy::DuplicatePolicy;
use crate::serialization::{ByteSink, ByteSource};
use get_size::GetSize;
use std::hash::{Hash, Hasher};
use std::mem::size_of;

/// Byte step used when a reconstruction target runs out of room.
pub(crate) const CHUNK_RESIZE_STEP: usize = 32;

/// Worst-case bit cost of a single encoded sample: a 32-bit delta-of-delta
/// bucket plus a full fresh-window value.
const MAX_SAMPLE_BITS: usize = (4 + 32) + (2 + 5 + 6 + 64);

/// A chunk of timeseries data compressed with delta-of-delta timestamps and
/// XOR-coded values. The first sample lives in the struct header; every
/// subsequent sample is appended to the bit stream.
#[derive(Debug, Clone, PartialEq, GetSize)]
pub struct GorillaChunk {
    stream: BitStream,
    count: usize,
    base_timestamp: Timestamp,
    base_value: f64,
    prev_timestamp: Timestamp,
    prev_timestamp_delta: i64,
    prev_value: f64,
    prev_leading: u8,
    prev_trailing: u8,
}

impl Default for GorillaChunk {
    fn default() -> Self {
        Self::with_max_size(DEFAULT_CHUNK_SIZE_BYTES)
    }
}

impl Hash for GorillaChunk {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.stream.hash(state);
        self.count.hash(state);
        self.base_timestamp.hash(state);
        self.base_value.to_bits().hash(state);
        self.prev_timestamp.hash(state);
        self.prev_timestamp_delta.hash(state);
        self.prev_value.to_bits().hash(state);
        self.prev_leading.hash(state);
        self.prev_trailing.hash(state);
    }
}

impl GorillaChunk {
    pub fn with_max_size(max_size: usize) -> Self {
        let max_size = if max_size % 8 != 0 {
            log::warn!("chunk size {max_size} isn't a multiple of 8");
            max_size.next_multiple_of(8)
        } else {
            max_size
        };
        GorillaChunk {
            stream: BitStream::with_capacity(max_size),
            count: 0,
            base_timestamp: 0,
            base_value: 0.0,
            prev_timestamp: 0,
            prev_timestamp_delta: 0,
            prev_value: 0.0,
            prev_leading: 32,
            prev_trailing: 32,
        }
    }

    pub fn is_full(&self) -> bool {
        self.stream.available_bits() < MAX_SAMPLE_BITS
    }

    pub fn clear(&mut self) {
        self.stream.clear();
        self.count = 0;
        self.base_timestamp = 0;
        self.base_value = 0.0;
        self.prev_timestamp = 0;
        self.prev_timestamp_delta = 0;
        self.prev_value = 0.0;
        self.prev_leading = 32;
        self.prev_trailing = 32;
    }

    /// Replaces the chunk contents with `samples`, growing as needed.
    pub fn set_data(&mut self, samples: &[Sample]) -> TsdbResult<()> {
        let mut target = GorillaChunk::with_max_size(self.stream.capacity_bytes());
        for sample in samples {
            ensure_add_sample(&mut target, sample)?;
        }
        *self = target;
        Ok(())
    }

    pub fn bytes_per_sample(&self) -> usize {
        if self.count == 0 {
            return SAMPLE_SIZE;
        }
        self.size().div_ceil(self.count)
    }

    pub fn memory_usage(&self) -> usize {
        size_of::<Self>() + self.get_heap_size()
    }

    pub fn iter(&self) -> GorillaChunkIterator<'_> {
        GorillaChunkIterator::new(self)
    }

    pub fn range_iter(
        &self,
        start_ts: Timestamp,
        end_ts: Timestamp,
    ) -> impl Iterator<Item = Sample> + '_ {
        self.iter()
            .skip_while(move |sample| sample.timestamp < start_ts)
            .take_while(move |sample| sample.timestamp <= end_ts)
    }

    pub(crate) fn stream(&self) -> &BitStream {
        &self.stream
    }

    pub(crate) fn base_sample(&self) -> Sample {
        Sample {
            timestamp: self.base_timestamp,
            value: self.base_value,
        }
    }

    pub(crate) fn base_timestamp(&self) -> Timestamp {
        self.base_timestamp
    }

    pub(crate) fn base_value(&self) -> f64 {
        self.base_value
    }

    pub(crate) fn prev_timestamp(&self) -> Timestamp {
        self.prev_timestamp
    }

    pub(crate) fn prev_timestamp_delta(&self) -> i64 {
        self.prev_timestamp_delta
    }

    pub(crate) fn prev_value(&self) -> f64 {
        self.prev_value
    }

    pub(crate) fn prev_leading(&self) -> u8 {
        self.prev_leading
    }

    pub(crate) fn prev_trailing(&self) -> u8 {
        self.prev_trailing
    }

    /// Shrinks the owned buffer to the encoded size, 8-byte aligned.
    pub(crate) fn trim(&mut self) {
        self.stream.trim();
    }

    pub(crate) fn from_parts(
        stream: BitStream,
        count: usize,
        base_timestamp: Timestamp,
        base_value: f64,
        prev_timestamp: Timestamp,
        prev_timestamp_delta: i64,
        prev_value: f64,
        prev_leading: u8,
        prev_trailing: u8,
    ) -> Self {
        GorillaChunk {
            stream,
            count,
            base_timestamp,
            base_value,
            prev_timestamp,
            prev_timestamp_delta,
            prev_value,
            prev_leading,
            prev_trailing,
        }
    }
}

/// Appends `sample` to `chunk`, growing the stream by [`CHUNK_RESIZE_STEP`]
/// and retrying once if the chunk is out of room. Only the reconstruction
/// paths (upsert/del-range/split/set_data) use this; the public `add_sample`
/// never grows.
pub(crate) fn ensure_add_sample(chunk: &mut GorillaChunk, sample: &Sample) -> TsdbResult<()> {
    match chunk.add_sample(sample) {
        Err(TsdbError::CapacityFull(_)) => {
            chunk.stream.grow(CHUNK_RESIZE_STEP);
            // one step always fits a single sample, so a second failure is a
            // delta-of-delta range error
            chunk.add_sample(sample)
        }
        other => other,
    }
}

impl Chunk for GorillaChunk {
    fn first_timestamp(&self) -> Timestamp {
        // an empty chunk can only be the initial chunk of a series
        if self.count == 0 {
            return 0;
        }
        self.base_timestamp
    }

    fn last_timestamp(&self) -> Timestamp {
        if self.count == 0 {
            log::error!("{}", error_consts::EMPTY_CHUNK_LAST_TIMESTAMP);
            return 0;
        }
        self.prev_timestamp
    }

    fn len(&self) -> usize {
        self.count
    }

    fn last_value(&self) -> f64 {
        if self.count == 0 {
            log::error!("{}", error_consts::EMPTY_CHUNK_LAST_VALUE);
            return 0.0;
        }
        self.prev_value
    }

    fn size(&self) -> usize {
        self.stream.used_bytes()
    }

    fn max_size(&self) -> usize {
        self.stream.capacity_bytes()
    }

    fn remove_range(&mut self, start_ts: Timestamp, end_ts: Timestamp) -> TsdbResult<usize> {
        if self.count == 0
            || end_ts < start_ts
            || self.base_timestamp > end_ts
            || self.prev_timestamp < start_ts
        {
            return Ok(0);
        }

        let mut target = GorillaChunk::with_max_size(self.stream.capacity_bytes());
        let mut deleted = 0usize;
        for sample in self.iter() {
            if sample.timestamp >= start_ts && sample.timestamp <= end_ts {
                deleted += 1;
                continue;
            }
            ensure_add_sample(&mut target, &sample)?;
        }
        *self = target;
        Ok(deleted)
    }

    fn add_sample(&mut self, sample: &Sample) -> TsdbResult<()> {
        let Sample { timestamp, value } = *sample;

        if self.count == 0 {
            self.base_timestamp = timestamp;
            self.base_value = value;
            self.prev_timestamp = timestamp;
            self.prev_timestamp_delta = 0;
            self.prev_value = value;
            self.count = 1;
            return Ok(());
        }

        if timestamp <= self.prev_timestamp {
            return Err(TsdbError::EncodingError(
                error_consts::SAMPLE_OUT_OF_ORDER.to_string(),
            ));
        }

        let delta = match i64::try_from(timestamp - self.prev_timestamp) {
            Ok(delta) => delta,
            // force a rollover rather than truncating the timestamp
            Err(_) => return Err(TsdbError::CapacityFull(self.max_size())),
        };
        let dod = delta - self.prev_timestamp_delta;
        let Some(timestamp_bits) = dod_bit_length(dod) else {
            return Err(TsdbError::CapacityFull(self.max_size()));
        };
        let value_bits = xor_bit_length(value, self.prev_value, self.prev_leading, self.prev_trailing);

        if (timestamp_bits + value_bits) as usize > self.stream.available_bits() {
            return Err(TsdbError::CapacityFull(self.max_size()));
        }

        write_dod(&mut self.stream, dod);
        let (leading, trailing) = write_xor(
            &mut self.stream,
            value,
            self.prev_value,
            self.prev_leading,
            self.prev_trailing,
        );

        self.prev_timestamp = timestamp;
        self.prev_timestamp_delta = delta;
        self.prev_value = value;
        self.prev_leading = leading;
        self.prev_trailing = trailing;
        self.count += 1;

        Ok(())
    }

    fn get_range(&self, start: Timestamp, end: Timestamp) -> TsdbResult<Vec<Sample>> {
        Ok(self.range_iter(start, end).collect())
    }

    fn upsert_sample(&mut self, sample: Sample, dp_policy: DuplicatePolicy) -> TsdbResult<isize> {
        let ts = sample.timestamp;
        let mut size_delta: isize = 0;

        let mut target = GorillaChunk::with_max_size(self.stream.capacity_bytes());
        let mut iter = self.iter().peekable();

        while let Some(existing) = iter.peek() {
            if existing.timestamp >= ts {
                break;
            }
            ensure_add_sample(&mut target, existing)?;
            iter.next();
        }

        let mut new_sample = sample;
        if let Some(existing) = iter.peek() {
            if existing.timestamp == ts {
                new_sample.value = dp_policy.duplicate_value(ts, existing.value, sample.value)?;
                iter.next();
                size_delta -= 1;
            }
        }

        ensure_add_sample(&mut target, &new_sample)?;
        size_delta += 1;

        for existing in iter {
            ensure_add_sample(&mut target, &existing)?;
        }

        *self = target;
        Ok(size_delta)
    }

    fn process_range(
        &self,
        start: Timestamp,
        end: Timestamp,
        out: &mut EnrichedChunk,
        reverse: bool,
    ) {
        out.reset();
        let num_samples = self.count;
        if num_samples == 0
            || end < start
            || self.base_timestamp > end
            || self.prev_timestamp < start
        {
            return;
        }
        out.make_room(num_samples);

        let mut iter = self.iter();
        // find the first sample at or past start
        let Some(first) = iter.by_ref().find(|sample| sample.timestamp >= start) else {
            return;
        };
        if first.timestamp > end {
            // samples exist below start and above end, but none in between
            return;
        }

        let (timestamps, values) = out.slots();
        if reverse {
            let mut w = num_samples - 1;
            timestamps[w] = first.timestamp;
            values[w] = first.value;
            for sample in iter {
                if sample.timestamp > end {
                    break;
                }
                w -= 1;
                timestamps[w] = sample.timestamp;
                values[w] = sample.value;
            }
            out.set_reversed(w, num_samples - w);
        } else {
            timestamps[0] = first.timestamp;
            values[0] = first.value;
            let mut n = 1;
            for sample in iter {
                if sample.timestamp > end {
                    break;
                }
                timestamps[n] = sample.timestamp;
                values[n] = sample.value;
                n += 1;
            }
            out.set_forward(n);
        }
    }

    fn split(&mut self) -> TsdbResult<Self> {
        let mid = self.count / 2;
        let keep = self.count - mid;
        let capacity = self.stream.capacity_bytes();

        let mut left = GorillaChunk::with_max_size(capacity);
        let mut right = GorillaChunk::with_max_size(capacity);
        for (i, sample) in self.iter().enumerate() {
            if i < keep {
                ensure_add_sample(&mut left, &sample)?;
            } else {
                ensure_add_sample(&mut right, &sample)?;
            }
        }

        left.trim();
        right.trim();
        *self = left;
        Ok(right)
    }

    fn save<S: ByteSink>(&self, sink: &mut S) {
        super::serialization::save_gorilla_chunk(self, sink);
    }

    fn load<S: ByteSource>(source: &mut S) -> TsdbResult<Self> {
        super::serialization::load_gorilla_chunk(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples_of(chunk: &GorillaChunk) -> Vec<Sample> {
        chunk.iter().collect()
    }

    fn populated_chunk(count: usize) -> GorillaChunk {
        let mut chunk = GorillaChunk::with_max_size(4096);
        for i in 0..count {
            let sample = Sample {
                timestamp: 1000 + (i as u64) * 100,
                value: (i as f64) * 0.25,
            };
            chunk.add_sample(&sample).unwrap();
        }
        chunk
    }

    #[test]
    fn test_append_and_iterate() {
        let samples = vec![
            Sample::new(100, 1.0),
            Sample::new(200, 1.5),
            Sample::new(305, -2.0),
            Sample::new(500, f64::MAX),
        ];
        let mut chunk = GorillaChunk::with_max_size(1024);
        for sample in &samples {
            chunk.add_sample(sample).unwrap();
        }

        assert_eq!(chunk.len(), 4);
        assert_eq!(chunk.first_timestamp(), 100);
        assert_eq!(chunk.last_timestamp(), 500);
        assert_eq!(chunk.last_value(), f64::MAX);
        assert_eq!(samples_of(&chunk), samples);
    }

    #[test]
    fn test_constant_interval_constant_value_bit_cost() {
        // dod == 0 and xor == 0 cost one bit each past the second sample
        let mut chunk = GorillaChunk::with_max_size(64);
        for i in 0..4 {
            chunk.add_sample(&Sample::new(100 + i * 100, 1.0)).unwrap();
        }
        // sample 2: dod=100 ('110' + 9 bits) + value repeat (1 bit)
        // samples 3,4: dod=0 (1 bit) + value repeat (1 bit) each
        assert_eq!(chunk.stream().bit_index(), 13 + 2 + 2);
        assert_eq!(samples_of(&chunk).len(), 4);
    }

    #[test]
    fn test_append_out_of_order() {
        let mut chunk = GorillaChunk::default();
        chunk.add_sample(&Sample::new(1000, 1.0)).unwrap();
        assert!(matches!(
            chunk.add_sample(&Sample::new(1000, 2.0)),
            Err(TsdbError::EncodingError(_))
        ));
        assert!(matches!(
            chunk.add_sample(&Sample::new(500, 2.0)),
            Err(TsdbError::EncodingError(_))
        ));
        assert_eq!(chunk.len(), 1);
    }

    #[test]
    fn test_append_full_chunk() {
        let mut chunk = GorillaChunk::with_max_size(8);
        chunk.add_sample(&Sample::new(1, 1.0)).unwrap();
        chunk.add_sample(&Sample::new(2, 1.0)).unwrap(); // 10 bits

        let mut ts = 3;
        loop {
            let before = chunk.clone();
            match chunk.add_sample(&Sample::new(ts, 1.0)) {
                Ok(()) => ts += 1,
                Err(TsdbError::CapacityFull(_)) => {
                    // a failed append must not mutate any state
                    assert_eq!(chunk, before);
                    break;
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert!(chunk.len() >= 2);
    }

    #[test]
    fn test_timestamp_delta_overflow_reports_full() {
        let mut chunk = GorillaChunk::default();
        chunk.add_sample(&Sample::new(0, 1.0)).unwrap();
        // first delta is also the first dod; beyond the 32-bit bucket
        let res = chunk.add_sample(&Sample::new(1 << 33, 1.0));
        assert!(matches!(res, Err(TsdbError::CapacityFull(_))));
        assert_eq!(chunk.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut chunk = populated_chunk(10);
        chunk.clear();
        assert!(chunk.is_empty());
        assert_eq!(chunk.first_timestamp(), 0);
        assert_eq!(chunk.stream().bit_index(), 0);
        chunk.add_sample(&Sample::new(5, 5.0)).unwrap();
        assert_eq!(samples_of(&chunk), vec![Sample::new(5, 5.0)]);
    }

    #[test]
    fn test_clone_independence() {
        let mut chunk = populated_chunk(20);
        let clone = chunk.clone();
        chunk.remove_range(0, u64::MAX).unwrap();
        assert!(chunk.is_empty());
        assert_eq!(clone.len(), 20);
        assert_eq!(samples_of(&clone).len(), 20);
    }

    #[test]
    fn test_upsert_at_head() {
        let mut chunk = GorillaChunk::default();
        chunk.add_sample(&Sample::new(200, 2.0)).unwrap();
        chunk.add_sample(&Sample::new(300, 3.0)).unwrap();

        let delta = chunk
            .upsert_sample(Sample::new(100, 1.0), DuplicatePolicy::Block)
            .unwrap();
        assert_eq!(delta, 1);
        assert_eq!(chunk.first_timestamp(), 100);
        assert_eq!(
            samples_of(&chunk),
            vec![
                Sample::new(100, 1.0),
                Sample::new(200, 2.0),
                Sample::new(300, 3.0),
            ]
        );
    }

    #[test]
    fn test_upsert_duplicate_policies() {
        let mut chunk = GorillaChunk::default();
        chunk.add_sample(&Sample::new(100, 1.0)).unwrap();
        chunk.add_sample(&Sample::new(200, 2.0)).unwrap();

        let delta = chunk
            .upsert_sample(Sample::new(200, 5.0), DuplicatePolicy::Max)
            .unwrap();
        assert_eq!(delta, 0);
        assert_eq!(
            samples_of(&chunk),
            vec![Sample::new(100, 1.0), Sample::new(200, 5.0)]
        );

        let delta = chunk
            .upsert_sample(Sample::new(200, 1.0), DuplicatePolicy::KeepFirst)
            .unwrap();
        assert_eq!(delta, 0);
        assert_eq!(chunk.last_value(), 5.0);
    }

    #[test]
    fn test_upsert_duplicate_blocked_leaves_chunk_untouched() {
        let mut chunk = GorillaChunk::default();
        chunk.add_sample(&Sample::new(500, 1.0)).unwrap();

        let before = chunk.clone();
        let res = chunk.upsert_sample(Sample::new(500, 2.0), DuplicatePolicy::Block);
        assert!(matches!(res, Err(TsdbError::DuplicateSample(_))));
        assert_eq!(chunk, before);
    }

    #[test]
    fn test_upsert_grows_past_capacity() {
        // a tiny chunk; upserts reconstruct and may grow the target
        let mut chunk = GorillaChunk::with_max_size(8);
        chunk.add_sample(&Sample::new(100, 1.0)).unwrap();
        for ts in [50u64, 75, 60, 99, 10] {
            chunk
                .upsert_sample(Sample::new(ts, ts as f64), DuplicatePolicy::Block)
                .unwrap();
        }
        assert_eq!(chunk.len(), 6);
        let decoded = samples_of(&chunk);
        let timestamps: Vec<u64> = decoded.iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![10, 50, 60, 75, 99, 100]);
    }

    #[test]
    fn test_remove_range() {
        let mut chunk = populated_chunk(10); // ts 1000, 1100 .. 1900
        let deleted = chunk.remove_range(1200, 1500).unwrap();
        assert_eq!(deleted, 4);
        assert_eq!(chunk.len(), 6);
        let timestamps: Vec<u64> = samples_of(&chunk).iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![1000, 1100, 1600, 1700, 1800, 1900]);

        // no overlap leaves the chunk alone
        let deleted = chunk.remove_range(0, 500).unwrap();
        assert_eq!(deleted, 0);
        assert_eq!(chunk.len(), 6);
    }

    #[test]
    fn test_remove_range_head_updates_base() {
        let mut chunk = populated_chunk(5); // ts 1000..1400
        let deleted = chunk.remove_range(0, 1100).unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(chunk.first_timestamp(), 1200);
    }

    #[test]
    fn test_remove_range_all() {
        let mut chunk = populated_chunk(5);
        let deleted = chunk.remove_range(0, u64::MAX).unwrap();
        assert_eq!(deleted, 5);
        assert!(chunk.is_empty());
    }

    #[test]
    fn test_split() {
        let mut chunk = populated_chunk(11);
        let all = samples_of(&chunk);

        let right = chunk.split().unwrap();
        assert_eq!(chunk.len(), 6);
        assert_eq!(right.len(), 5);
        assert_eq!(right.max_size() % 8, 0);

        let mut rejoined = samples_of(&chunk);
        rejoined.extend(samples_of(&right));
        assert_eq!(rejoined, all);
    }

    #[test]
    fn test_split_single_sample() {
        let mut chunk = populated_chunk(1);
        let right = chunk.split().unwrap();
        assert_eq!(chunk.len(), 1);
        assert!(right.is_empty());
    }

    #[test]
    fn test_set_data() {
        let samples: Vec<Sample> = (0..50)
            .map(|i| Sample::new(i * 10, (i as f64).sin()))
            .collect();
        let mut chunk = GorillaChunk::with_max_size(64);
        chunk.set_data(&samples).unwrap();
        assert_eq!(samples_of(&chunk), samples);
    }

    #[test]
    fn test_process_range_forward() {
        let chunk = populated_chunk(10); // ts 1000..1900
        let mut out = EnrichedChunk::with_capacity(10);

        chunk.process_range(1100, 1300, &mut out, false);
        assert_eq!(out.timestamps(), &[1100, 1200, 1300]);
        assert!(!out.is_reversed());

        // full range
        chunk.process_range(0, u64::MAX, &mut out, false);
        assert_eq!(out.num_samples(), 10);
        assert_eq!(out.timestamps()[0], 1000);
        assert_eq!(out.timestamps()[9], 1900);
    }

    #[test]
    fn test_process_range_reverse() {
        let chunk = populated_chunk(10);
        let mut out = EnrichedChunk::with_capacity(10);

        chunk.process_range(1100, 1300, &mut out, true);
        assert!(out.is_reversed());
        assert_eq!(out.timestamps(), &[1300, 1200, 1100]);
        assert_eq!(out.values(), &[0.75, 0.5, 0.25]);

        chunk.process_range(0, u64::MAX, &mut out, true);
        assert_eq!(out.num_samples(), 10);
        assert_eq!(out.timestamps()[0], 1900);
        assert_eq!(out.timestamps()[9], 1000);
    }

    #[test]
    fn test_process_range_empty_cases() {
        let chunk = populated_chunk(5); // 1000..1400
        let mut out = EnrichedChunk::with_capacity(8);

        // inverted range
        chunk.process_range(200, 100, &mut out, false);
        assert!(out.is_empty());
        // entirely before
        chunk.process_range(0, 900, &mut out, false);
        assert!(out.is_empty());
        // entirely after
        chunk.process_range(2000, 3000, &mut out, false);
        assert!(out.is_empty());
        // between two samples
        chunk.process_range(1010, 1090, &mut out, false);
        assert!(out.is_empty());

        let empty = GorillaChunk::default();
        empty.process_range(0, u64::MAX, &mut out, false);
        assert!(out.is_empty());
    }

    #[test]
    fn test_is_full_and_utilization() {
        let mut chunk = GorillaChunk::with_max_size(16);
        assert!(chunk.is_full()); // 128 bits can't fit a worst-case sample
        chunk.add_sample(&Sample::new(1, 1.0)).unwrap();

        let big = populated_chunk(100);
        assert!(!big.is_full());
        assert!(big.size() <= big.max_size());
    }
}
