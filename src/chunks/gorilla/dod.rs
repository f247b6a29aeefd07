//! Delta-of-delta timestamp coding.
//!
//! Each bucket is a prefix of `1` bits followed by a `0` (the widest bucket
//! drops the terminating `0`) and a fixed-width signed payload. The payload
//! ranges are asymmetric: an n-bit field carries [-2^(n-1)+1, 2^(n-1)], with
//! the raw value 2^(n-1) standing for the positive bound.

use super::bitstream::{BitStream, BitStreamReader};
use crate::error::TsdbResult;

const DOD_MAX: i64 = 1 << 31;
const DOD_MIN: i64 = -DOD_MAX + 1;

/// Bit cost of encoding `dod`, or `None` when it exceeds the 32-bit bucket
/// and the append must fail so the series rolls over to a fresh chunk.
pub(crate) fn dod_bit_length(dod: i64) -> Option<u32> {
    match dod {
        0 => Some(1),
        -63..=64 => Some(2 + 7),
        -255..=256 => Some(3 + 9),
        -2047..=2048 => Some(4 + 12),
        DOD_MIN..=DOD_MAX => Some(4 + 32),
        _ => None,
    }
}

/// Writes `dod` using the bucket chosen by [`dod_bit_length`]. The caller has
/// already verified the range and the stream capacity.
pub(crate) fn write_dod(stream: &mut BitStream, dod: i64) {
    match dod {
        0 => stream.write_bit(false),
        -63..=64 => {
            stream.write_bits(0b10, 2);
            stream.write_bits(dod as u64, 7);
        }
        -255..=256 => {
            stream.write_bits(0b110, 3);
            stream.write_bits(dod as u64, 9);
        }
        -2047..=2048 => {
            stream.write_bits(0b1110, 4);
            stream.write_bits(dod as u64, 12);
        }
        _ => {
            debug_assert!((DOD_MIN..=DOD_MAX).contains(&dod));
            stream.write_bits(0b1111, 4);
            stream.write_bits(dod as u64, 32);
        }
    }
}

pub(crate) fn read_dod(reader: &mut BitStreamReader<'_>) -> TsdbResult<i64> {
    let mut ones = 0;
    while ones < 4 && reader.read_bit()? {
        ones += 1;
    }
    let bits = match ones {
        0 => return Ok(0),
        1 => 7,
        2 => 9,
        3 => 12,
        _ => 32,
    };
    let raw = reader.read_bits(bits)?;
    Ok(decode_signed(raw, bits))
}

#[inline]
fn decode_signed(raw: u64, bits: u32) -> i64 {
    let half = 1u64 << (bits - 1);
    if raw > half {
        raw as i64 - (1i64 << bits)
    } else {
        raw as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUCKET_EDGES: [i64; 21] = [
        DOD_MIN,
        -2048,
        -2047,
        -256,
        -255,
        -64,
        -63,
        -1,
        0,
        1,
        63,
        64,
        65,
        255,
        256,
        257,
        2047,
        2048,
        2049,
        1 << 20,
        DOD_MAX,
    ];

    #[test]
    fn test_dod_roundtrip() {
        let mut stream = BitStream::with_capacity(512);
        for dod in BUCKET_EDGES {
            write_dod(&mut stream, dod);
        }

        let mut reader = stream.reader();
        for want in BUCKET_EDGES {
            assert_eq!(read_dod(&mut reader).unwrap(), want);
        }
    }

    #[test]
    fn test_dod_bit_length_matches_write() {
        for dod in BUCKET_EDGES {
            let mut stream = BitStream::with_capacity(64);
            write_dod(&mut stream, dod);
            assert_eq!(
                stream.bit_index() as u32,
                dod_bit_length(dod).unwrap(),
                "bit length mismatch for dod {dod}"
            );
        }
    }

    #[test]
    fn test_dod_out_of_range() {
        assert_eq!(dod_bit_length(DOD_MAX + 1), None);
        assert_eq!(dod_bit_length(DOD_MIN - 1), None);
        assert_eq!(dod_bit_length(i64::MAX), None);
        assert_eq!(dod_bit_length(i64::MIN), None);
    }
}
