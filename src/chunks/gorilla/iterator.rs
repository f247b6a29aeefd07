use super::bitstream::BitStreamReader;
use super::dod::read_dod;
use super::gorilla_chunk::GorillaChunk;
use super::xor::read_xor;
use crate::chunks::chunk::Chunk;
use crate::common::{Sample, Timestamp};
use crate::error::TsdbResult;

/// Streaming decoder over a [`GorillaChunk`]. Yields exactly the chunk's
/// sample count; the first sample comes from the chunk header, the rest from
/// the bit stream.
pub struct GorillaChunkIterator<'a> {
    chunk: &'a GorillaChunk,
    reader: BitStreamReader<'a>,
    idx: usize,
    timestamp: Timestamp,
    timestamp_delta: i64,
    value: f64,
    leading: u8,
    trailing: u8,
}

impl<'a> GorillaChunkIterator<'a> {
    pub fn new(chunk: &'a GorillaChunk) -> Self {
        let base = chunk.base_sample();
        GorillaChunkIterator {
            chunk,
            reader: chunk.stream().reader(),
            idx: 0,
            timestamp: base.timestamp,
            timestamp_delta: 0,
            value: base.value,
            leading: 32,
            trailing: 32,
        }
    }

    fn read_next(&mut self) -> TsdbResult<Sample> {
        let dod = read_dod(&mut self.reader)?;
        let (value, leading, trailing) =
            read_xor(&mut self.reader, self.value, self.leading, self.trailing)?;

        let delta = self.timestamp_delta + dod;
        self.timestamp_delta = delta;
        self.timestamp = self.timestamp.wrapping_add(delta as u64);
        self.value = value;
        self.leading = leading;
        self.trailing = trailing;

        Ok(Sample {
            timestamp: self.timestamp,
            value: self.value,
        })
    }
}

impl Iterator for GorillaChunkIterator<'_> {
    type Item = Sample;

    fn next(&mut self) -> Option<Self::Item> {
        if self.idx >= self.chunk.len() {
            return None;
        }

        if self.idx == 0 {
            self.idx = 1;
            return Some(self.chunk.base_sample());
        }

        match self.read_next() {
            Ok(sample) => {
                self.idx += 1;
                Some(sample)
            }
            Err(_) => {
                // ran off the stream: the chunk is corrupt, stop decoding
                log::error!("gorilla chunk stream truncated at sample {}", self.idx);
                self.idx = self.chunk.len();
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.chunk.len() - self.idx;
        (0, Some(remaining))
    }
}
