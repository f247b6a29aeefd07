use crate::chunks::chunk::validate_chunk_size;
use crate::chunks::{Chunk, ChunkEncoding, EnrichedChunk, GorillaChunk, UncompressedChunk};
use crate::common::{Sample, Timestamp};
use crate::config::SPLIT_FACTOR;
use crate::error::{TsdbError, TsdbResult};
use crate::policy::DuplicatePolicy;
use crate::serialization::{ByteSink, ByteSource};
use core::mem::size_of;
use get_size::GetSize;
use std::cmp::Ordering;

/// A chunk of a single series, in either representation. All per-chunk
/// operations dispatch through this enum; the decode loops are monomorphised
/// in the variants.
#[derive(Debug, Clone, Hash, PartialEq, GetSize)]
pub enum TimeSeriesChunk {
    Uncompressed(UncompressedChunk),
    Gorilla(GorillaChunk),
}

impl TimeSeriesChunk {
    pub fn new(encoding: ChunkEncoding, chunk_size: usize) -> Self {
        use TimeSeriesChunk::*;
        debug_assert!(validate_chunk_size(chunk_size).is_ok());
        match encoding {
            ChunkEncoding::Uncompressed => {
                let chunk = UncompressedChunk::with_max_size(chunk_size);
                Uncompressed(chunk)
            }
            ChunkEncoding::Gorilla => {
                let chunk = GorillaChunk::with_max_size(chunk_size);
                Gorilla(chunk)
            }
        }
    }

    pub fn encoding(&self) -> ChunkEncoding {
        match self {
            TimeSeriesChunk::Uncompressed(_) => ChunkEncoding::Uncompressed,
            TimeSeriesChunk::Gorilla(_) => ChunkEncoding::Gorilla,
        }
    }

    pub fn is_full(&self) -> bool {
        use TimeSeriesChunk::*;
        match self {
            Uncompressed(chunk) => chunk.is_full(),
            Gorilla(chunk) => chunk.is_full(),
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        use TimeSeriesChunk::*;
        match self {
            Uncompressed(chunk) => chunk.bytes_per_sample(),
            Gorilla(chunk) => chunk.bytes_per_sample(),
        }
    }

    pub fn utilization(&self) -> f64 {
        let used = self.size();
        let total = self.max_size();
        used as f64 / total as f64
    }

    /// Get an estimate of the remaining capacity in number of samples
    pub fn estimate_remaining_sample_capacity(&self) -> usize {
        let used = self.size();
        let total = self.max_size();
        if used >= total {
            return 0;
        }
        let remaining = total - used;
        let bytes_per_sample = self.bytes_per_sample();
        if bytes_per_sample == 0 {
            return 0;
        }
        remaining / bytes_per_sample
    }

    pub fn clear(&mut self) {
        use TimeSeriesChunk::*;
        match self {
            Uncompressed(chunk) => chunk.clear(),
            Gorilla(chunk) => chunk.clear(),
        }
    }

    pub fn is_timestamp_in_range(&self, ts: Timestamp) -> bool {
        ts >= self.first_timestamp() && ts <= self.last_timestamp()
    }

    pub fn is_contained_by_range(&self, start_ts: Timestamp, end_ts: Timestamp) -> bool {
        self.first_timestamp() >= start_ts && self.last_timestamp() <= end_ts
    }

    pub fn overlaps(&self, start_time: Timestamp, end_time: Timestamp) -> bool {
        let first_time = self.first_timestamp();
        let last_time = self.last_timestamp();
        first_time <= end_time && last_time >= start_time
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = Sample> + '_> {
        use TimeSeriesChunk::*;
        match self {
            Uncompressed(chunk) => Box::new(chunk.iter()),
            Gorilla(chunk) => Box::new(chunk.iter()),
        }
    }

    pub fn range_iter(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> Box<dyn Iterator<Item = Sample> + '_> {
        use TimeSeriesChunk::*;
        match self {
            Uncompressed(chunk) => Box::new(chunk.range_iter(start, end)),
            Gorilla(chunk) => Box::new(chunk.range_iter(start, end)),
        }
    }

    pub fn set_data(&mut self, samples: &[Sample]) -> TsdbResult<()> {
        use TimeSeriesChunk::*;
        match self {
            Uncompressed(chunk) => chunk.set_data(samples),
            Gorilla(chunk) => chunk.set_data(samples),
        }
    }

    pub fn memory_usage(&self) -> usize {
        size_of::<Self>() + self.get_heap_size()
    }

    pub fn should_split(&self) -> bool {
        self.utilization() >= SPLIT_FACTOR
    }

    pub fn last_sample(&self) -> Option<Sample> {
        if self.is_empty() {
            None
        } else {
            Some(Sample {
                timestamp: self.last_timestamp(),
                value: self.last_value(),
            })
        }
    }
}

impl Chunk for TimeSeriesChunk {
    fn first_timestamp(&self) -> Timestamp {
        use TimeSeriesChunk::*;
        match self {
            Uncompressed(chunk) => chunk.first_timestamp(),
            Gorilla(chunk) => chunk.first_timestamp(),
        }
    }

    fn last_timestamp(&self) -> Timestamp {
        use TimeSeriesChunk::*;
        match self {
            Uncompressed(chunk) => chunk.last_timestamp(),
            Gorilla(chunk) => chunk.last_timestamp(),
        }
    }

    fn len(&self) -> usize {
        use TimeSeriesChunk::*;
        match self {
            Uncompressed(chunk) => chunk.len(),
            Gorilla(chunk) => chunk.len(),
        }
    }

    fn last_value(&self) -> f64 {
        use TimeSeriesChunk::*;
        match self {
            Uncompressed(chunk) => chunk.last_value(),
            Gorilla(chunk) => chunk.last_value(),
        }
    }

    fn size(&self) -> usize {
        use TimeSeriesChunk::*;
        match self {
            Uncompressed(chunk) => chunk.size(),
            Gorilla(chunk) => chunk.size(),
        }
    }

    fn max_size(&self) -> usize {
        use TimeSeriesChunk::*;
        match self {
            Uncompressed(chunk) => chunk.max_size(),
            Gorilla(chunk) => chunk.max_size(),
        }
    }

    fn remove_range(&mut self, start_ts: Timestamp, end_ts: Timestamp) -> TsdbResult<usize> {
        use TimeSeriesChunk::*;
        match self {
            Uncompressed(chunk) => chunk.remove_range(start_ts, end_ts),
            Gorilla(chunk) => chunk.remove_range(start_ts, end_ts),
        }
    }

    fn add_sample(&mut self, sample: &Sample) -> TsdbResult<()> {
        use TimeSeriesChunk::*;
        match self {
            Uncompressed(chunk) => chunk.add_sample(sample),
            Gorilla(chunk) => chunk.add_sample(sample),
        }
    }

    fn get_range(&self, start: Timestamp, end: Timestamp) -> TsdbResult<Vec<Sample>> {
        debug_assert!(start <= end);
        use TimeSeriesChunk::*;
        match self {
            Uncompressed(chunk) => chunk.get_range(start, end),
            Gorilla(chunk) => chunk.get_range(start, end),
        }
    }

    fn upsert_sample(&mut self, sample: Sample, dp_policy: DuplicatePolicy) -> TsdbResult<isize> {
        use TimeSeriesChunk::*;
        match self {
            Uncompressed(chunk) => chunk.upsert_sample(sample, dp_policy),
            Gorilla(chunk) => chunk.upsert_sample(sample, dp_policy),
        }
    }

    fn process_range(
        &self,
        start: Timestamp,
        end: Timestamp,
        out: &mut EnrichedChunk,
        reverse: bool,
    ) {
        use TimeSeriesChunk::*;
        match self {
            Uncompressed(chunk) => chunk.process_range(start, end, out, reverse),
            Gorilla(chunk) => chunk.process_range(start, end, out, reverse),
        }
    }

    fn split(&mut self) -> TsdbResult<Self> {
        use TimeSeriesChunk::*;
        match self {
            Uncompressed(chunk) => Ok(Uncompressed(chunk.split()?)),
            Gorilla(chunk) => Ok(Gorilla(chunk.split()?)),
        }
    }

    fn save<S: ByteSink>(&self, sink: &mut S) {
        use TimeSeriesChunk::*;
        sink.write_u64(self.encoding() as u64);
        match self {
            Uncompressed(chunk) => chunk.save(sink),
            Gorilla(chunk) => chunk.save(sink),
        }
    }

    fn load<S: ByteSource>(source: &mut S) -> TsdbResult<Self> {
        use TimeSeriesChunk::*;
        let tag = source.read_u64().map_err(|_| TsdbError::ChunkDecoding)?;
        let encoding =
            ChunkEncoding::try_from(u8::try_from(tag).map_err(|_| TsdbError::ChunkDecoding)?)?;
        let chunk = match encoding {
            ChunkEncoding::Uncompressed => Uncompressed(UncompressedChunk::load(source)?),
            ChunkEncoding::Gorilla => Gorilla(GorillaChunk::load(source)?),
        };
        Ok(chunk)
    }
}

impl PartialOrd for TimeSeriesChunk {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.first_timestamp().partial_cmp(&other.first_timestamp())
    }
}
