use super::bitstream::BitStream;
use super::gorilla_chunk::GorillaChunk;
use crate::chunks::chunk::Chunk;
use crate::common::Timestamp;
use crate::error::{TsdbError, TsdbResult};
use crate::serialization::{ByteSink, ByteSource};

/// Wire layout (all fields `u64`, floats and the signed delta bit-cast):
/// `size | count | idx | base_value | base_timestamp | prev_timestamp |
/// prev_timestamp_delta | prev_value | prev_leading | prev_trailing |
/// data[size]`.
pub(crate) fn save_gorilla_chunk<S: ByteSink>(chunk: &GorillaChunk, sink: &mut S) {
    let stream = chunk.stream();
    sink.write_u64(stream.capacity_bytes() as u64);
    sink.write_u64(chunk.len() as u64);
    sink.write_u64(stream.bit_index() as u64);
    sink.write_u64(chunk.base_value().to_bits());
    sink.write_u64(chunk.base_timestamp());
    sink.write_u64(chunk.prev_timestamp());
    sink.write_u64(chunk.prev_timestamp_delta() as u64);
    sink.write_u64(chunk.prev_value().to_bits());
    sink.write_u64(chunk.prev_leading() as u64);
    sink.write_u64(chunk.prev_trailing() as u64);
    sink.write_bytes(&stream.to_bytes());
}

pub(crate) fn load_gorilla_chunk<S: ByteSource>(source: &mut S) -> TsdbResult<GorillaChunk> {
    let size = read_u64(source)? as usize;
    let count = read_u64(source)? as usize;
    let idx = read_u64(source)? as usize;
    let base_value = f64::from_bits(read_u64(source)?);
    let base_timestamp: Timestamp = read_u64(source)?;
    let prev_timestamp: Timestamp = read_u64(source)?;
    let prev_timestamp_delta = read_u64(source)? as i64;
    let prev_value = f64::from_bits(read_u64(source)?);
    let prev_leading = read_u64(source)?;
    let prev_trailing = read_u64(source)?;
    let data = source.read_bytes().map_err(|_| TsdbError::ChunkDecoding)?;

    if data.len() != size
        || idx > size * 8
        || (count == 0 && idx != 0)
        || prev_leading > 64
        || prev_trailing > 64
    {
        return Err(TsdbError::ChunkDecoding);
    }
    let stream = BitStream::from_bytes(&data, idx)?;

    Ok(GorillaChunk::from_parts(
        stream,
        count,
        base_timestamp,
        base_value,
        prev_timestamp,
        prev_timestamp_delta,
        prev_value,
        prev_leading as u8,
        prev_trailing as u8,
    ))
}

fn read_u64<S: ByteSource>(source: &mut S) -> TsdbResult<u64> {
    source.read_u64().map_err(|_| TsdbError::ChunkDecoding)
}
