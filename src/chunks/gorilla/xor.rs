//! XOR value coding with leading/trailing-zero windowing.
//!
//! Control bits: `0` repeats the previous value; `10` reuses the previous
//! window and carries its significant bits; `11` opens a fresh window with a
//! 5-bit leading-zero count (capped at 31) and a 6-bit significant-bit count
//! where 0 stands for 64.

use super::bitstream::{BitStream, BitStreamReader};
use crate::error::TsdbResult;

const MAX_LEADING: u8 = 31;

/// Bit cost of encoding `value` against `prev_value` with the current window.
pub(crate) fn xor_bit_length(
    value: f64,
    prev_value: f64,
    prev_leading: u8,
    prev_trailing: u8,
) -> u32 {
    let xor = value.to_bits() ^ prev_value.to_bits();
    if xor == 0 {
        return 1;
    }
    let leading = (xor.leading_zeros() as u8).min(MAX_LEADING);
    let trailing = xor.trailing_zeros() as u8;
    if prev_leading <= leading && prev_trailing <= trailing {
        2 + (64 - prev_leading - prev_trailing) as u32
    } else {
        2 + 5 + 6 + (64 - leading - trailing) as u32
    }
}

/// Writes `value` XORed against `prev_value`, returning the (possibly
/// updated) leading/trailing window. The caller has already reserved
/// capacity via [`xor_bit_length`].
pub(crate) fn write_xor(
    stream: &mut BitStream,
    value: f64,
    prev_value: f64,
    prev_leading: u8,
    prev_trailing: u8,
) -> (u8, u8) {
    let xor = value.to_bits() ^ prev_value.to_bits();

    if xor == 0 {
        stream.write_bit(false);
        return (prev_leading, prev_trailing);
    }
    stream.write_bit(true);

    let leading = (xor.leading_zeros() as u8).min(MAX_LEADING);
    let trailing = xor.trailing_zeros() as u8;

    if prev_leading <= leading && prev_trailing <= trailing {
        let significant = 64 - prev_leading - prev_trailing;
        stream.write_bit(false);
        stream.write_bits(xor >> prev_trailing, significant as u32);
        return (prev_leading, prev_trailing);
    }

    stream.write_bit(true);
    stream.write_bits(leading as u64, 5);
    let significant = 64 - leading - trailing;
    // 6-bit field; 64 wraps to 0, never ambiguous since xor != 0
    stream.write_bits((significant & 63) as u64, 6);
    stream.write_bits(xor >> trailing, significant as u32);

    (leading, trailing)
}

/// Reads a value encoded by [`write_xor`], returning the value and the new
/// leading/trailing window.
pub(crate) fn read_xor(
    reader: &mut BitStreamReader<'_>,
    prev_value: f64,
    prev_leading: u8,
    prev_trailing: u8,
) -> TsdbResult<(f64, u8, u8)> {
    if !reader.read_bit()? {
        return Ok((prev_value, prev_leading, prev_trailing));
    }

    let (leading, trailing, significant) = if reader.read_bit()? {
        let leading = reader.read_bits(5)? as u8;
        let mut significant = reader.read_bits(6)? as u8;
        if significant == 0 {
            significant = 64;
        }
        let trailing = 64u8.saturating_sub(leading).saturating_sub(significant);
        (leading, trailing, significant)
    } else {
        (
            prev_leading,
            prev_trailing,
            64u8.saturating_sub(prev_leading)
                .saturating_sub(prev_trailing),
        )
    };

    let bits = reader.read_bits(significant as u32)?;
    let value = f64::from_bits(prev_value.to_bits() ^ (bits << trailing));
    Ok((value, leading, trailing))
}
