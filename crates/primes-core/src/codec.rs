//! Variable-width big-endian encoding of a single stored prime.
//!
//! Every value is written using its *minimal byte width*: the fewest bytes
//! that hold it without a leading zero byte. Width 1 covers `0..=255`, width
//! 2 covers `256..=65535`, and so on up to width 8 for the full `u64` range.
//! The encoder and the decoder must agree on this exactly, otherwise shard
//! boundaries misalign.

/// Largest width a shard can have. Eight bytes covers every `u64`.
pub const MAX_WIDTH: usize = 8;

/// Index of the highest set bit of `n`, or 0 when `n` is 0.
#[must_use]
pub const fn highest_bit(n: u64) -> u32 {
    if n == 0 { 0 } else { 63 - n.leading_zeros() }
}

/// Fewest bytes needed to represent `n`. Always in `1..=MAX_WIDTH`.
#[must_use]
pub const fn byte_width(n: u64) -> usize {
    (highest_bit(n) / 8 + 1) as usize
}

/// Append `value` to `out` as `byte_width(value)` big-endian bytes.
pub fn encode_into(value: u64, out: &mut Vec<u8>) {
    let width = byte_width(value);
    out.extend_from_slice(&value.to_be_bytes()[MAX_WIDTH - width..]);
}

/// Encode `value` into a fresh buffer of its minimal width.
#[must_use]
pub fn encode(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(byte_width(value));
    encode_into(value, &mut out);
    out
}

/// Decode up to eight big-endian bytes into a `u64`.
///
/// Callers slice shards into `width`-sized groups, so more than eight bytes
/// never reach this function; extra leading bytes would be shifted out.
#[must_use]
pub fn decode(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0_u64, |acc, &b| (acc << 8) | u64::from(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highest_bit_of_small_values() {
        assert_eq!(highest_bit(0), 0);
        assert_eq!(highest_bit(1), 0);
        assert_eq!(highest_bit(2), 1);
        assert_eq!(highest_bit(3), 1);
        assert_eq!(highest_bit(255), 7);
        assert_eq!(highest_bit(256), 8);
        assert_eq!(highest_bit(u64::MAX), 63);
    }

    #[test]
    fn width_boundaries() {
        assert_eq!(byte_width(2), 1);
        assert_eq!(byte_width(255), 1);
        assert_eq!(byte_width(256), 2);
        assert_eq!(byte_width(65_535), 2);
        assert_eq!(byte_width(65_536), 3);
        assert_eq!(byte_width(0xFFFF_FFFF), 4);
        assert_eq!(byte_width(0x1_0000_0000), 5);
        assert_eq!(byte_width(u64::MAX), 8);
    }

    #[test]
    fn encodes_minimal_big_endian_bytes() {
        assert_eq!(encode(255), vec![0xFF]);
        assert_eq!(encode(256), vec![0x01, 0x00]);
        assert_eq!(encode(65_535), vec![0xFF, 0xFF]);
        assert_eq!(encode(65_536), vec![0x01, 0x00, 0x00]);
        assert_eq!(encode(u64::MAX), vec![0xFF; 8]);
    }

    #[test]
    fn encode_into_appends_after_existing_bytes() {
        let mut out = vec![0xAA];
        encode_into(257, &mut out);
        encode_into(3, &mut out);
        assert_eq!(out, vec![0xAA, 0x01, 0x01, 0x03]);
    }

    #[test]
    fn decode_reads_big_endian() {
        assert_eq!(decode(&[0x01, 0x00]), 256);
        assert_eq!(decode(&[0x01, 0x00, 0x01]), 65_537);
        assert_eq!(decode(&[0xFF; 8]), u64::MAX);
        assert_eq!(decode(&[]), 0);
    }

    #[test]
    fn decode_inverts_encode_at_width_edges() {
        for value in [2, 251, 255, 256, 257, 65_521, 65_536, 16_777_259, u64::MAX - 58] {
            let bytes = encode(value);
            assert_eq!(bytes.len(), byte_width(value));
            assert_eq!(decode(&bytes), value);
        }
    }
}
