/// Number of bits needed to address `len` color table entries.
///
/// GIF color tables always hold a power of two entries, at least 2, so this never returns less
/// than 1.
#[inline]
pub const fn table_bits(len: usize) -> u8 {
    let mut bits = 1;
    while (1usize << bits) < len {
        bits += 1;
    }
    bits
}

/// Number of entries a color table declared with `bits` holds on the wire.
#[inline]
pub const fn table_len(bits: u8) -> usize {
    1 << bits
}

/// The LZW minimum code size for a palette of `len` colors.
///
/// GIF reserves two codes (Clear and End-of-Information) above the palette range, so even a
/// two-color image uses a 2-bit minimum code size.
#[inline]
pub const fn min_code_size(len: usize) -> u8 {
    let bits = table_bits(len);
    if bits < 2 {
        2
    } else {
        bits
    }
}

/// Converts a delay in milliseconds to the hundredths of a second GIF stores, rounding to the
/// nearest value and saturating at `u16::MAX`.
#[inline]
pub const fn millis_to_centis(millis: u32) -> u16 {
    let centis = millis.saturating_add(5) / 10;
    if centis > u16::MAX as u32 {
        u16::MAX
    } else {
        centis as u16
    }
}

/// Sum of the absolute per-channel differences of two RGB colors.
#[inline]
pub const fn manhattan_distance([r1, g1, b1]: [u8; 3], [r2, g2, b2]: [u8; 3]) -> u32 {
    (r1.abs_diff(r2) as u32) + (g1.abs_diff(g2) as u32) + (b1.abs_diff(b2) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_bits_are_at_least_one() {
        assert_eq!(table_bits(0), 1);
        assert_eq!(table_bits(1), 1);
        assert_eq!(table_bits(2), 1);
        assert_eq!(table_bits(3), 2);
        assert_eq!(table_bits(17), 5);
        assert_eq!(table_bits(128), 7);
        assert_eq!(table_bits(129), 8);
        assert_eq!(table_bits(256), 8);
    }

    #[test]
    fn min_code_size_has_a_floor_of_two() {
        assert_eq!(min_code_size(1), 2);
        assert_eq!(min_code_size(2), 2);
        assert_eq!(min_code_size(4), 2);
        assert_eq!(min_code_size(5), 3);
        assert_eq!(min_code_size(256), 8);
    }

    #[test]
    fn millis_round_to_nearest_centisecond() {
        assert_eq!(millis_to_centis(0), 0);
        assert_eq!(millis_to_centis(100), 10);
        assert_eq!(millis_to_centis(104), 10);
        assert_eq!(millis_to_centis(105), 11);
        assert_eq!(millis_to_centis(u32::MAX / 2), u16::MAX);
    }

    #[test]
    fn manhattan() {
        assert_eq!(manhattan_distance([0, 0, 0], [255, 255, 255]), 765);
        assert_eq!(manhattan_distance([10, 20, 30], [13, 18, 30]), 5);
    }
}
