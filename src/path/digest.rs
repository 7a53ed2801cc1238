//! `PathDigest`: a process-local, non-cryptographic fingerprint of a path's
//! sequence of interfaces, used as a cache key.

use crate::addr::IsdAsn;
use crate::hash::mix;
use std::sync::OnceLock;

/// Maximum number of `(ingress, egress)` pairs folded into a digest. Paths
/// longer than this still hash; the excess pairs are simply not included,
/// which only degrades cache-key quality for very long paths.
const MAX_COLLECTED_HOPS: usize = 64;

fn process_seed() -> u64 {
    static SEED: OnceLock<u64> = OnceLock::new();
    *SEED.get_or_init(rand::random)
}

/// A 128-bit digest of a path's source and its sequence of hop interface
/// pairs. Two paths from the same source with the same logical interface
/// sequence digest identically; digests are stable only within a process
/// (the seed is re-randomized on every process start), so this type is
/// never persisted or serialized across processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathDigest(u128);

impl PathDigest {
    /// Computes the digest of a path's source and its hop pairs, as
    /// returned by [`crate::path::RawPath::hops`].
    pub fn compute(source: IsdAsn, hops: impl IntoIterator<Item = (u16, u16)>) -> PathDigest {
        let seed = process_seed();
        let mut lo = seed ^ 0x9E37_79B9_7F4A_7C15;
        let mut hi = seed.rotate_left(32) ^ 0xC2B2_AE3D_27D4_EB4F;

        mix(&mut lo, &mut hi, source.0);
        for (i, (ingress, egress)) in hops.into_iter().take(MAX_COLLECTED_HOPS).enumerate() {
            let word = (u64::from(ingress) << 48) | (u64::from(egress) << 32) | (i as u64);
            mix(&mut lo, &mut hi, word);
        }
        PathDigest((u128::from(hi) << 64) | u128::from(lo))
    }

    /// The raw 128-bit value.
    pub fn value(self) -> u128 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::{Asn, Isd};

    #[test]
    fn same_source_and_hops_digest_equal() {
        let ia = IsdAsn::new(Isd(1), Asn(1));
        let hops = vec![(1u16, 2u16), (3, 4)];
        let a = PathDigest::compute(ia, hops.clone());
        let b = PathDigest::compute(ia, hops);
        assert_eq!(a, b);
    }

    #[test]
    fn different_hop_sequences_digest_differently() {
        let ia = IsdAsn::new(Isd(1), Asn(1));
        let a = PathDigest::compute(ia, vec![(1, 2), (3, 4)]);
        let b = PathDigest::compute(ia, vec![(3, 4), (1, 2)]);
        assert_ne!(a, b);
    }

    #[test]
    fn excess_hops_beyond_limit_still_hash() {
        let ia = IsdAsn::new(Isd(1), Asn(1));
        let long: Vec<(u16, u16)> = (0..100).map(|i| (i, i + 1)).collect();
        let d = PathDigest::compute(ia, long);
        assert_ne!(d.value(), 0);
    }
}
