use crate::common::{Sample, Timestamp};
use crate::error::{TsdbError, TsdbResult};
use crate::error_consts;
use crate::policy::DuplicatePolicy;
use crate::serialization::{ByteSink, ByteSource};
use get_size::GetSize;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::EnrichedChunk;

pub const MIN_CHUNK_SIZE: usize = 48;
pub const MAX_CHUNK_SIZE: usize = 1048576;

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize, GetSize)]
#[non_exhaustive]
pub enum ChunkEncoding {
    Uncompressed = 1,
    #[default]
    Gorilla = 2,
}

impl ChunkEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            ChunkEncoding::Uncompressed => "uncompressed",
            ChunkEncoding::Gorilla => "gorilla",
        }
    }
}

impl Display for ChunkEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl TryFrom<u8> for ChunkEncoding {
    type Error = TsdbError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ChunkEncoding::Uncompressed),
            2 => Ok(ChunkEncoding::Gorilla),
            _ => Err(TsdbError::InvalidCompression(value.to_string())),
        }
    }
}

impl TryFrom<&str> for ChunkEncoding {
    type Error = TsdbError;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        if let Some(encoding) = parse_encoding(s) {
            return Ok(encoding);
        }
        Err(TsdbError::InvalidCompression(
            error_consts::INVALID_CHUNK_COMPRESSION.to_string(),
        ))
    }
}

impl TryFrom<String> for ChunkEncoding {
    type Error = TsdbError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        ChunkEncoding::try_from(&s[..])
    }
}

fn parse_encoding(encoding: &str) -> Option<ChunkEncoding> {
    hashify::tiny_map_ignore_case! {
        encoding.as_bytes(),
        "compressed" => ChunkEncoding::default(),
        "uncompressed" => ChunkEncoding::Uncompressed,
        "gorilla" => ChunkEncoding::Gorilla,
    }
}

/// The operation set shared by both chunk representations.
pub trait Chunk: Sized {
    fn first_timestamp(&self) -> Timestamp;
    fn last_timestamp(&self) -> Timestamp;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn last_value(&self) -> f64;
    /// Bytes of encoded sample data currently in use.
    fn size(&self) -> usize;
    /// Byte capacity of the owned sample buffer.
    fn max_size(&self) -> usize;
    /// Removes all samples with `start_ts <= timestamp <= end_ts`, returning
    /// the number removed.
    fn remove_range(&mut self, start_ts: Timestamp, end_ts: Timestamp) -> TsdbResult<usize>;
    fn add_sample(&mut self, sample: &Sample) -> TsdbResult<()>;
    fn get_range(&self, start: Timestamp, end: Timestamp) -> TsdbResult<Vec<Sample>>;

    /// Ordered insert. Returns the change in sample count; a timestamp
    /// collision is resolved through `dp_policy` and leaves the count
    /// unchanged, or fails with `TsdbError::DuplicateSample` when the policy
    /// rejects the incoming sample.
    fn upsert_sample(&mut self, sample: Sample, dp_policy: DuplicatePolicy) -> TsdbResult<isize>;

    /// Populates `out` with the samples in `[start, end]`, columnar, in
    /// forward or reverse order.
    fn process_range(
        &self,
        start: Timestamp,
        end: Timestamp,
        out: &mut EnrichedChunk,
        reverse: bool,
    );

    fn split(&mut self) -> TsdbResult<Self>;

    fn save<S: ByteSink>(&self, sink: &mut S);
    fn load<S: ByteSource>(source: &mut S) -> TsdbResult<Self>;
}

pub(crate) fn validate_chunk_size(chunk_size_bytes: usize) -> TsdbResult<()> {
    fn get_error_result() -> TsdbResult<()> {
        let msg = format!("ERR: CHUNK_SIZE value must be a multiple of 2 in the range [{MIN_CHUNK_SIZE} .. {MAX_CHUNK_SIZE}]");
        Err(TsdbError::InvalidConfiguration(msg))
    }

    if chunk_size_bytes < MIN_CHUNK_SIZE {
        return get_error_result();
    }

    if chunk_size_bytes > MAX_CHUNK_SIZE {
        return get_error_result();
    }

    if chunk_size_bytes % 2 != 0 {
        return get_error_result();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("uncompressed", ChunkEncoding::Uncompressed ; "uncompressed")]
    #[test_case("gorilla", ChunkEncoding::Gorilla ; "gorilla")]
    #[test_case("GORILLA", ChunkEncoding::Gorilla ; "case insensitive")]
    #[test_case("compressed", ChunkEncoding::Gorilla ; "compressed alias")]
    fn test_parse_encoding(input: &str, expected: ChunkEncoding) {
        assert_eq!(ChunkEncoding::try_from(input).unwrap(), expected);
    }

    #[test]
    fn test_parse_encoding_invalid() {
        assert!(ChunkEncoding::try_from("lz4").is_err());
        assert!(ChunkEncoding::try_from("").is_err());
    }

    #[test]
    fn test_encoding_tag_roundtrip() {
        for encoding in [ChunkEncoding::Uncompressed, ChunkEncoding::Gorilla] {
            assert_eq!(ChunkEncoding::try_from(encoding as u8).unwrap(), encoding);
        }
        assert!(ChunkEncoding::try_from(0u8).is_err());
    }

    #[test]
    fn test_validate_chunk_size() {
        assert!(validate_chunk_size(MIN_CHUNK_SIZE).is_ok());
        assert!(validate_chunk_size(MAX_CHUNK_SIZE).is_ok());
        assert!(validate_chunk_size(MIN_CHUNK_SIZE - 2).is_err());
        assert!(validate_chunk_size(MAX_CHUNK_SIZE + 2).is_err());
        assert!(validate_chunk_size(129).is_err());
    }
}
