//! Internet checksum (RFC 1071) helpers shared by every L4 header and the
//! SCION pseudo-header.

/// Folds a 32-bit accumulator down to 16 bits via end-around carry.
fn fold(mut sum: u32) -> u16 {
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    sum as u16
}

/// Sums `data` as big-endian 16-bit words, adding `seed` (e.g. a
/// pseudo-header or partially-accumulated sum) first. An odd trailing byte
/// is treated as if padded with a zero low byte, per RFC 1071.
pub fn internet_sum(seed: u32, data: &[u8]) -> u32 {
    let mut sum = seed;
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum += u32::from(chunk[0]) << 8 | u32::from(chunk[1]);
    }
    if let [last] = chunks.remainder() {
        sum += u32::from(*last) << 8;
    }
    sum
}

/// Computes the Internet checksum of `data` under the given `seed` (e.g. the
/// pseudo-header sum), ready to be written into the wire checksum field:
/// ones-complement sum with end-around carry, then bitwise negated.
pub fn internet_checksum(seed: u32, data: &[u8]) -> u16 {
    !fold(internet_sum(seed, data))
}

/// Verifies a checksum: the Internet checksum of the received bytes plus the
/// stored checksum value must fold to `0xFFFF`.
pub fn verify_internet_checksum(seed: u32, data: &[u8]) -> bool {
    fold(internet_sum(seed, data)) == 0xffff
}

/// The pseudo-header contribution of a single protocol-number byte, as a
/// big-endian 16-bit word (the low byte is zero).
pub fn proto_word(proto: u8) -> u16 {
    u16::from(proto) << 8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_of_empty_is_all_ones_negated() {
        assert_eq!(internet_checksum(0, &[]), 0xffff);
    }

    #[test]
    fn checksum_round_trips() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let sum = internet_checksum(0, data);
        // Append the checksum itself as the final two bytes (big endian) and
        // verify the running sum folds to 0xFFFF.
        let mut with_chksum = data.to_vec();
        with_chksum.push((sum >> 8) as u8);
        with_chksum.push((sum & 0xff) as u8);
        assert!(verify_internet_checksum(0, &with_chksum));
    }

    #[test]
    fn odd_length_is_padded() {
        let a = internet_checksum(0, b"abc");
        let b = internet_checksum(0, b"abc\0");
        assert_eq!(a, b);
    }
}
