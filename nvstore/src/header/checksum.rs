//! 16-bit header checksum
//!
//! The firmware volume header carries a checksum chosen so that the header,
//! read as little-endian 16-bit words, sums to zero.

/// Wrapping sum of little-endian 16-bit words.
///
/// A trailing odd byte is ignored; header lengths are always even.
pub fn sum16(bytes: &[u8]) -> u16 {
    bytes
        .chunks_exact(2)
        .fold(0u16, |acc, word| acc.wrapping_add(u16::from_le_bytes([word[0], word[1]])))
}

/// Checksum value that makes `bytes` (with this value stored) sum to zero.
///
/// `bytes` must have the checksum field zeroed.
pub fn checksum16(bytes: &[u8]) -> u16 {
    0u16.wrapping_sub(sum16(bytes))
}
