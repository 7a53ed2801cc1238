//! Ties endpoint state, a path, and a header cache together into the two
//! operations the socket layer needs: building an outbound packet and
//! unpacking an inbound one.

use super::header_cache::HeaderCache;
use super::l4::L4;
use crate::addr::{Address, Endpoint, IPAddress, IsdAsn};
use crate::bitstream::{ReadStream, NPOS};
use crate::checksum;
use crate::error::{Error, Result};
use crate::ext::{self, Extension};
use crate::hdr::{proto, CommonHeader, PathType, ScmpMessage, UdpHeader};
use crate::path::RawPath;

/// Holds this socket's traffic class and the endpoints a flow is bound to.
#[derive(Debug, Clone)]
pub struct ScionPackager {
    tc: u8,
    local: Endpoint,
    remote: Endpoint,
}

/// The result of a successful [`ScionPackager::unpack`]: the sender's
/// endpoint and path, and a view of the application payload.
#[derive(Debug)]
pub struct ParsedPacket<'a> {
    pub from: Endpoint,
    pub path: RawPath,
    pub payload: &'a [u8],
}

fn unspecified_endpoint() -> Endpoint {
    Endpoint::new(Address::new(IsdAsn::UNSPECIFIED, IPAddress::unspecified_v4()), 0)
}

impl ScionPackager {
    /// Builds a packager with no endpoints bound yet.
    pub fn new(tc: u8) -> Self {
        ScionPackager {
            tc,
            local: unspecified_endpoint(),
            remote: unspecified_endpoint(),
        }
    }

    /// Binds the local endpoint. The host and port must be fully specified;
    /// the ISD-ASN may remain unspecified (resolved per-packet from the
    /// path, for multi-homed hosts).
    pub fn set_local_ep(&mut self, ep: Endpoint) -> Result<()> {
        if ep.host().is_unspecified() || ep.port() == 0 {
            return Err(Error::InvalidArgument(
                "local endpoint requires a specified host and port".into(),
            ));
        }
        self.local = ep;
        Ok(())
    }

    /// Binds the remote endpoint for this flow, if any.
    pub fn set_remote_ep(&mut self, ep: Endpoint) {
        self.remote = ep;
    }

    /// Builds a fresh header cache for `path`, with the given extensions,
    /// L4 kind, and payload, sending to `maybe_to` if given or else the
    /// bound remote endpoint.
    pub fn pack(
        &self,
        path: &RawPath,
        maybe_to: Option<&Endpoint>,
        hbh: &[&dyn Extension],
        e2e: &[&dyn Extension],
        l4: L4,
        payload: &[u8],
    ) -> Result<HeaderCache> {
        if self.local.host().is_unspecified() || self.local.port() == 0 {
            return Err(Error::NoLocalHostAddr);
        }

        let local_isd_asn = if self.local.isd_asn().is_unspecified() {
            path.first_as()
        } else {
            if path.path_type() != PathType::Empty && path.first_as() != self.local.isd_asn() {
                return Err(Error::InvalidArgument(
                    "path does not originate in the local AS".into(),
                ));
            }
            self.local.isd_asn()
        };

        let dst = match maybe_to {
            Some(to) => to.clone(),
            None => {
                if !self.remote.address().is_fully_specified() || self.remote.port() == 0 {
                    return Err(Error::InvalidArgument(
                        "no destination endpoint given or bound".into(),
                    ));
                }
                self.remote.clone()
            }
        };
        if !dst.address().is_fully_specified() || dst.port() == 0 {
            return Err(Error::InvalidArgument(
                "resolved destination is not fully specified".into(),
            ));
        }

        let local = Endpoint::new(Address::new(local_isd_asn, self.local.host().clone()), self.local.port());
        HeaderCache::build(self.tc, &local, &dst, path, hbh, e2e, l4, payload)
    }

    /// Refreshes an existing header cache with a new payload (and possibly
    /// a new L4 kind) on the same flow, without rebuilding the path or
    /// extensions.
    pub fn pack_update(&self, cache: &mut HeaderCache, l4: L4, payload: &[u8]) -> Result<()> {
        cache.update_payload(l4, payload)
    }

    /// Parses an inbound packet, checking it against this socket's bound
    /// endpoints. `hbh_registry`/`e2e_registry` receive any recognized
    /// extensions present. If the packet is SCMP, `scmp_cb` is invoked and
    /// this returns [`Error::ScmpReceived`] rather than a payload view.
    pub fn unpack<'a>(
        &self,
        bytes: &'a [u8],
        underlay_source: &IPAddress,
        hbh_registry: &mut [&mut dyn Extension],
        e2e_registry: &mut [&mut dyn Extension],
        verify_checksum: bool,
        mut scmp_cb: impl FnMut(&Address, &RawPath, &ScmpMessage, &[u8]),
    ) -> Result<ParsedPacket<'a>> {
        let mut rs = ReadStream::new(bytes);
        let common = CommonHeader::parse(&mut rs)?;

        if !self.local.address().matches(&common.dst) {
            return Err(Error::DstAddrMismatch);
        }
        if self.remote.address().is_fully_specified() && !self.remote.address().matches(&common.src) {
            return Err(Error::SrcAddrMismatch);
        }

        let hdr_total = usize::from(common.hdr_len) * 4;
        let common_size = common.size();
        if hdr_total < common_size {
            return Err(Error::InvalidPacket("hdr_len shorter than the common header".into()));
        }
        let path_size = hdr_total - common_size;
        let path_bytes = rs.lookahead(path_size)?;
        let path = RawPath::new(common.src.isd_asn(), common.dst.isd_asn(), common.path_type, path_bytes)?;
        rs.advance_bytes(path_size)?;

        if common.path_type == PathType::Empty && underlay_source != common.src.host() {
            return Err(Error::InvalidPacket(
                "AS-local packet arrived from an unexpected underlay source".into(),
            ));
        }

        let mut next_header = common.next_header;
        if next_header == proto::HBH_OPT {
            next_header = ext::parse(&mut rs, hbh_registry)?;
        }
        if next_header == proto::E2E_OPT {
            next_header = ext::parse(&mut rs, e2e_registry)?;
        }

        let addr_checksum = common.checksum();
        let l4_region = rs.lookahead(NPOS)?;

        if verify_checksum {
            let seed = addr_checksum.wrapping_add(u32::from(checksum::proto_word(next_header)));
            if !checksum::verify_internet_checksum(seed, l4_region) {
                return Err(Error::ChecksumError);
            }
        }

        match next_header {
            proto::UDP => {
                let hdr = UdpHeader::parse(&mut rs)?;
                let payload = rs.lookahead(NPOS)?;
                let from = Endpoint::new(common.src.clone(), hdr.src_port);
                Ok(ParsedPacket { from, path, payload })
            }
            proto::SCMP => {
                let msg = ScmpMessage::parse(&mut rs, l4_region.len())?;
                let trailing = rs.lookahead(NPOS)?;
                scmp_cb(&common.src, &path, &msg, trailing);
                Err(Error::ScmpReceived)
            }
            other => Err(Error::InvalidPacket(format!("unsupported L4 protocol {}", other))),
        }
    }
}

/// A no-op SCMP callback for callers that only care about detecting receipt
/// via [`Error::ScmpReceived`]. Logs the message at debug level.
pub fn log_only_scmp_callback(from: &Address, _path: &RawPath, msg: &ScmpMessage, _trailing: &[u8]) {
    tracing::debug!(%from, msg = ?msg, "received SCMP message");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::{Asn, Isd};
    use crate::hdr::UdpHeader;

    fn ep(isd: u16, asn: u64, octets: [u8; 4], port: u16) -> Endpoint {
        Endpoint::new(Address::new(IsdAsn::new(Isd(isd), Asn(asn)), IPAddress::V4(octets.into())), port)
    }

    #[test]
    fn udp_packet_round_trips_through_pack_and_unpack() {
        let local = ep(1, 1, [10, 0, 0, 1], 40000);
        let remote = ep(1, 2, [10, 0, 0, 2], 80);
        let ia = IsdAsn::new(Isd(1), Asn(1));
        let path = RawPath::empty(ia);

        let mut sender = ScionPackager::new(0);
        sender.set_local_ep(local.clone()).unwrap();
        let cache = sender
            .pack(&path, Some(&remote), &[], &[], L4::Udp(UdpHeader::default()), b"payload")
            .unwrap();

        let mut receiver = ScionPackager::new(0);
        receiver.set_local_ep(remote.clone()).unwrap();
        let underlay = local.host().clone();
        let parsed = receiver
            .unpack(cache.bytes(), &underlay, &mut [], &mut [], true, |_, _, _, _| {
                panic!("not an SCMP message");
            })
            .unwrap();

        assert_eq!(parsed.payload, b"payload");
        assert_eq!(parsed.from.port(), local.port());
        assert_eq!(parsed.from.address(), local.address());
    }

    #[test]
    fn unpack_rejects_a_packet_for_a_different_destination() {
        let local = ep(1, 1, [10, 0, 0, 1], 40000);
        let remote = ep(1, 2, [10, 0, 0, 2], 80);
        let other = ep(1, 3, [10, 0, 0, 3], 81);
        let ia = IsdAsn::new(Isd(1), Asn(1));
        let path = RawPath::empty(ia);

        let mut sender = ScionPackager::new(0);
        sender.set_local_ep(local.clone()).unwrap();
        let cache = sender
            .pack(&path, Some(&remote), &[], &[], L4::Udp(UdpHeader::default()), b"x")
            .unwrap();

        let mut receiver = ScionPackager::new(0);
        receiver.set_local_ep(other).unwrap();
        let underlay = local.host().clone();
        let err = receiver
            .unpack(cache.bytes(), &underlay, &mut [], &mut [], true, |_, _, _, _| {})
            .unwrap_err();
        assert_eq!(err, Error::DstAddrMismatch);
    }

    #[test]
    fn scmp_packet_invokes_callback_and_signals_receipt() {
        let local = ep(1, 1, [10, 0, 0, 1], 40000);
        let remote = ep(1, 2, [10, 0, 0, 2], 80);
        let ia = IsdAsn::new(Isd(1), Asn(1));
        let path = RawPath::empty(ia);

        let mut sender = ScionPackager::new(0);
        sender.set_local_ep(local.clone()).unwrap();
        let cache = sender
            .pack(
                &path,
                Some(&remote),
                &[],
                &[],
                L4::Scmp(ScmpMessage::DstUnreach, 0),
                &[],
            )
            .unwrap();

        let mut receiver = ScionPackager::new(0);
        receiver.set_local_ep(remote).unwrap();
        let underlay = local.host().clone();
        let mut invoked = false;
        let err = receiver
            .unpack(cache.bytes(), &underlay, &mut [], &mut [], true, |_, _, msg, _| {
                invoked = true;
                assert_eq!(*msg, ScmpMessage::DstUnreach);
            })
            .unwrap_err();
        assert_eq!(err, Error::ScmpReceived);
        assert!(invoked);
    }

    #[test]
    fn pack_fails_without_a_bound_local_endpoint() {
        let remote = ep(1, 2, [10, 0, 0, 2], 80);
        let ia = IsdAsn::new(Isd(1), Asn(1));
        let path = RawPath::empty(ia);
        let packager = ScionPackager::new(0);
        let err = packager
            .pack(&path, Some(&remote), &[], &[], L4::Udp(UdpHeader::default()), b"x")
            .unwrap_err();
        assert_eq!(err, Error::NoLocalHostAddr);
    }
}
