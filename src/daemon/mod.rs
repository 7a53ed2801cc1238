//! The daemon client boundary: the trait a concrete control-plane
//! transport implements so a [`crate::path::PathCache`] can be driven
//! from it without this crate depending on any particular transport.

use crate::addr::IsdAsn;
use crate::error::Result;
use crate::path::Path;

bitflags::bitflags! {
    /// Flags modifying a path request to the daemon.
    #[derive(Default)]
    pub struct PathReqFlags: u8 {
        /// Bypass any daemon-side cache and force a fresh control-plane lookup.
        const REFRESH = 0b0000_0001;
        /// Include paths that traverse hidden path infrastructure.
        const HIDDEN = 0b0000_0010;
        /// Populate each returned path's interface sequence.
        const INTERFACES = 0b0000_0100;
        /// Populate each returned path's per-hop AS-name metadata.
        const HOP_METADATA = 0b0000_1000;
        /// Populate each returned path's per-link latency/bandwidth metadata.
        const LINK_METADATA = 0b0001_0000;
    }
}

/// Control-plane facts about an AS, as returned by `as_info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsInfo {
    /// The AS's own ISD-ASN (echoed back for callers that queried by a
    /// wildcard/local shorthand).
    pub isd_asn: IsdAsn,
    /// The AS-wide MTU advertised for paths originating here.
    pub mtu: u16,
    /// Whether this AS is a core AS in its ISD.
    pub is_core: bool,
}

/// The kind of service a `service_uris` lookup resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceType {
    /// The control service (beaconing, path lookup).
    Control,
    /// The discovery service (topology and configuration distribution).
    Discovery,
}

/// An opaque DRKey. Contents are never inspected or validated by this
/// crate: they are handed to the caller (or to a MAC/AEAD primitive
/// outside this crate's scope) verbatim.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DrKey(pub [u8; 16]);

impl std::fmt::Debug for DrKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DrKey").field(&"<redacted>").finish()
    }
}

/// A Host-AS, AS-Host, or Host-Host DRKey derivation request. The exact
/// field set a concrete daemon needs depends on the derivation level;
/// this crate does not interpret any of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrKeyRequest {
    /// The protocol identifier the key is scoped to.
    pub protocol: u16,
    /// The local AS in the derivation.
    pub src_ia: IsdAsn,
    /// The remote AS in the derivation.
    pub dst_ia: IsdAsn,
    /// The host address in the derivation, for AS-Host and Host-Host
    /// requests. `None` for a plain Host-AS request.
    pub host: Option<crate::addr::IPAddress>,
}

/// The control-plane boundary this crate depends on. A concrete
/// implementation wraps whatever transport (gRPC, a local Unix socket,
/// an in-process stub for testing) speaks to the actual SCION daemon;
/// this trait only fixes the shape a [`crate::path::PathCache`] is
/// driven through.
///
/// Every method is synchronous; an async transport wraps its own runtime
/// around blocking calls into this trait (or blocks on its futures),
/// since the core never suspends (see the concurrency model).
pub trait DaemonClient {
    /// Requests paths from `src` to `dst`, honoring `flags`.
    fn paths(&self, src: IsdAsn, dst: IsdAsn, flags: PathReqFlags) -> Result<Vec<Path>>;
    /// Requests control-plane facts about an AS.
    fn as_info(&self, ia: IsdAsn) -> Result<AsInfo>;
    /// Requests the URIs advertising a given service type within an AS.
    fn service_uris(&self, ia: IsdAsn, svc: ServiceType) -> Result<Vec<String>>;
    /// Requests the end host's usable SCION port range, `(low, high)`
    /// inclusive.
    fn port_range(&self) -> Result<(u16, u16)>;
    /// Derives a Host-AS DRKey.
    fn drkey_host_as(&self, req: DrKeyRequest) -> Result<DrKey>;
    /// Derives an AS-Host DRKey.
    fn drkey_as_host(&self, req: DrKeyRequest) -> Result<DrKey>;
    /// Derives a Host-Host DRKey.
    fn drkey_host_host(&self, req: DrKeyRequest) -> Result<DrKey>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_req_flags_compose() {
        let flags = PathReqFlags::REFRESH | PathReqFlags::INTERFACES;
        assert!(flags.contains(PathReqFlags::REFRESH));
        assert!(flags.contains(PathReqFlags::INTERFACES));
        assert!(!flags.contains(PathReqFlags::HIDDEN));
    }

    #[test]
    fn drkey_debug_does_not_print_contents() {
        let key = DrKey([0xab; 16]);
        let rendered = format!("{:?}", key);
        assert!(!rendered.contains("171"));
        assert!(rendered.contains("redacted"));
    }

    struct StubDaemon;

    impl DaemonClient for StubDaemon {
        fn paths(&self, _src: IsdAsn, _dst: IsdAsn, _flags: PathReqFlags) -> Result<Vec<Path>> {
            Ok(Vec::new())
        }
        fn as_info(&self, ia: IsdAsn) -> Result<AsInfo> {
            Ok(AsInfo { isd_asn: ia, mtu: 1472, is_core: false })
        }
        fn service_uris(&self, _ia: IsdAsn, _svc: ServiceType) -> Result<Vec<String>> {
            Ok(vec!["10.0.0.1:31000".into()])
        }
        fn port_range(&self) -> Result<(u16, u16)> {
            Ok((30041, 32767))
        }
        fn drkey_host_as(&self, _req: DrKeyRequest) -> Result<DrKey> {
            Ok(DrKey([0; 16]))
        }
        fn drkey_as_host(&self, _req: DrKeyRequest) -> Result<DrKey> {
            Ok(DrKey([0; 16]))
        }
        fn drkey_host_host(&self, _req: DrKeyRequest) -> Result<DrKey> {
            Ok(DrKey([0; 16]))
        }
    }

    #[test]
    fn a_stub_transport_satisfies_the_trait() {
        use crate::addr::{Asn, Isd};
        let ia = IsdAsn::new(Isd(1), Asn(1));
        let stub = StubDaemon;
        assert_eq!(stub.as_info(ia).unwrap().isd_asn, ia);
        assert_eq!(stub.port_range().unwrap(), (30041, 32767));
    }
}
