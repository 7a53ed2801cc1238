//! Path representations: the wire-encoded [`RawPath`], its process-local
//! [`PathDigest`], and the heap-resident [`Path`] object tracked by the
//! path cache.

pub mod cache;
pub mod digest;
pub mod raw;

pub use cache::{PathCache, PathCacheOptions, SharedPathCache};
pub use digest::PathDigest;
pub use raw::{RawPath, MAX_RAW_PATH_LEN};

use crate::addr::Endpoint;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Per-hop telemetry attached to a path when requested with the
/// `HopMetadata` flag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HopMetadata {
    /// Human-readable AS names along the path, in path order.
    pub as_names: Vec<String>,
}

/// Per-link telemetry attached to a path when requested with the
/// `LinkMetadata` flag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkMetadata {
    /// Advertised link latency in microseconds, one entry per logical hop.
    pub latencies_us: Vec<u32>,
    /// Advertised link bandwidth in kbps, one entry per logical hop.
    pub bandwidths_kbps: Vec<u32>,
}

/// The known, stable set of per-path attributes, plus a typed extension
/// map for caller-defined data keyed by an arbitrary `u32`. Small and
/// stable attributes get a dedicated field instead of living in the map;
/// everything else goes through `extra`.
#[derive(Debug, Clone, Default)]
pub struct PathAttributes {
    /// The interface sequence, populated when requested with the
    /// `Interfaces` flag.
    pub interfaces: Option<Vec<(u16, u16)>>,
    /// Per-hop metadata, populated when requested with `HopMetadata`.
    pub hop_metadata: Option<HopMetadata>,
    /// Per-link metadata, populated when requested with `LinkMetadata`.
    pub link_metadata: Option<LinkMetadata>,
    /// Caller-defined attributes outside the known set.
    pub extra: HashMap<u32, Vec<u8>>,
}

/// A path together with the control-plane metadata needed to use it:
/// expiry, control-plane MTU, and the underlay endpoint of the first-hop
/// router. Shared by reference (wrap in `Arc`) since the same path may be
/// both cached and in flight in an outstanding send.
///
/// All state is immutable after construction except `broken` (an atomic
/// flag mutated concurrently by the SCMP handler chain) and `attributes`
/// (mutable only during construction, before the path is published to the
/// cache or to a sender).
#[derive(Debug)]
pub struct Path {
    raw: RawPath,
    expiry: Instant,
    mtu: u16,
    next_hop: Endpoint,
    attributes: PathAttributes,
    broken: AtomicBool,
}

impl Path {
    /// Builds a path. `expiry` and `next_hop` come from the daemon
    /// response that produced this path.
    pub fn new(raw: RawPath, expiry: Instant, mtu: u16, next_hop: Endpoint) -> Self {
        Path {
            raw,
            expiry,
            mtu,
            next_hop,
            attributes: PathAttributes::default(),
            broken: AtomicBool::new(false),
        }
    }

    /// The underlying wire path.
    pub fn raw(&self) -> &RawPath {
        &self.raw
    }

    /// The instant this path's control-plane state expires.
    pub fn expiry(&self) -> Instant {
        self.expiry
    }

    /// True iff `now` is at or past this path's expiry.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expiry
    }

    /// The control-plane MTU advertised for this path.
    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    /// The underlay endpoint of the first-hop router.
    pub fn next_hop(&self) -> &Endpoint {
        &self.next_hop
    }

    /// The path's attributes, as populated at construction time.
    pub fn attributes(&self) -> &PathAttributes {
        &self.attributes
    }

    /// Attributes, mutable. Callers must only use this before the path is
    /// published (shared into a cache or a sender); see the type's
    /// top-level documentation.
    pub fn attributes_mut(&mut self) -> &mut PathAttributes {
        &mut self.attributes
    }

    /// True if this path has been marked broken (by an SCMP handler
    /// reacting to a received error) since construction.
    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Relaxed)
    }

    /// Marks this path broken. Safe to call concurrently from any number
    /// of SCMP handlers.
    pub fn mark_broken(&self) {
        self.broken.store(true, Ordering::Relaxed);
    }

    /// This path's digest, computed from its source and hop sequence.
    pub fn digest(&self) -> PathDigest {
        PathDigest::compute(self.raw.src(), self.raw.hops())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::{Address, Asn, IPAddress, Isd, IsdAsn};
    use std::time::Duration;

    fn endpoint() -> Endpoint {
        Endpoint::new(
            Address::new(IsdAsn::new(Isd(1), Asn(1)), IPAddress::unspecified_v4()),
            31000,
        )
    }

    #[test]
    fn mark_broken_is_visible_immediately() {
        let ia = IsdAsn::new(Isd(1), Asn(1));
        let path = Path::new(
            RawPath::empty(ia),
            Instant::now() + Duration::from_secs(60),
            1500,
            endpoint(),
        );
        assert!(!path.is_broken());
        path.mark_broken();
        assert!(path.is_broken());
    }

    #[test]
    fn is_expired_reflects_expiry_instant() {
        let ia = IsdAsn::new(Isd(1), Asn(1));
        let path = Path::new(RawPath::empty(ia), Instant::now(), 1500, endpoint());
        assert!(path.is_expired(Instant::now() + Duration::from_millis(1)));
    }
}
