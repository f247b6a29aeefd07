//! Per-shard chunk layer for a time-series store.
//!
//! Samples are packed into fixed-budget chunks in one of two
//! representations: a flat `(timestamp, value)` array, or a Gorilla-style
//! bit-packed chunk using delta-of-delta timestamps and XOR-coded values.
//! Both support in-place append, ordered upsert, range deletion, splitting,
//! forward/reverse columnar range decode, and byte-exact serialization for
//! snapshot and transport.

pub mod chunks;
pub mod common;
pub mod config;
pub mod error;
pub mod error_consts;
pub mod policy;
pub mod serialization;

pub use chunks::{
    Chunk, ChunkEncoding, EnrichedChunk, GorillaChunk, TimeSeriesChunk, UncompressedChunk,
};
pub use common::{Sample, Timestamp, SAMPLE_SIZE};
pub use error::{TsdbError, TsdbResult};
pub use policy::DuplicatePolicy;
