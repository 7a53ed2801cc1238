//! The 64-bit mixing round shared by every non-cryptographic hash in this
//! crate: path digests (process-seeded) and flow-label contributions
//! (fixed-seeded, so independent peers on the same flow agree).

/// A single MurmurHash3-style 64-bit mixing round, applied to both halves
/// of a running 128-bit state.
pub(crate) fn mix(lo: &mut u64, hi: &mut u64, word: u64) {
    let k = word
        .wrapping_mul(0xff51_afd7_ed55_8ccd)
        .rotate_left(31)
        .wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    *lo ^= k;
    *lo = lo.rotate_left(27).wrapping_add(*hi).wrapping_mul(5).wrapping_add(0x52dc_e729);
    *hi ^= k.rotate_left(17);
    *hi = hi.rotate_left(31).wrapping_add(*lo).wrapping_mul(5).wrapping_add(0x3849_5ab5);
}
