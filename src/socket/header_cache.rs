//! Builds and caches the full header block for a flow, and refreshes it
//! cheaply when only the payload (or the L4 message) changes.

use super::flowlabel::fixed_hash;
use super::l4::L4;
use crate::addr::Endpoint;
use crate::bitstream::WriteStream;
use crate::error::{Error, Result};
use crate::ext::{self, Extension};
use crate::hdr::{proto, CommonHeader};
use crate::path::RawPath;

/// An owned, reusable header block for one flow: the SCION common and
/// address headers, the path, any HBH/E2E extensions, the L4 header, and
/// the payload, all concatenated into one buffer.
///
/// `build` assembles the whole thing from scratch. `update_payload`
/// overwrites only the length fields and the L4 header region in place,
/// leaving the path and extension bytes untouched, for the common case of
/// sending a new payload on an already-built flow.
#[derive(Debug, Clone)]
pub struct HeaderCache {
    buf: Vec<u8>,
    /// Offset of whichever next-header byte must be rewritten when the L4
    /// protocol changes: the common header's `next_header` field if no
    /// extensions are present, otherwise the last extension header's
    /// `next_header` field.
    nh_patch_offset: usize,
    l4_offset: usize,
    l4_size: usize,
    payload_len: usize,
    /// Saved SCION address-header checksum contribution, reused by
    /// `update_payload` so it need not be recomputed from the addresses.
    addr_checksum: u32,
}

impl HeaderCache {
    /// Builds a header block for `local -> remote` over `path`, with the
    /// given hop-by-hop/end-to-end extensions, L4 kind, and payload.
    pub fn build(
        tc: u8,
        local: &Endpoint,
        remote: &Endpoint,
        path: &RawPath,
        hbh: &[&dyn Extension],
        e2e: &[&dyn Extension],
        mut l4: L4,
        payload: &[u8],
    ) -> Result<HeaderCache> {
        if !matches!(l4, L4::Scmp(..)) {
            l4.set_ports(local.port(), remote.port());
        }

        let common_skeleton = CommonHeader {
            qos: tc,
            flow_label: 0,
            next_header: 0,
            hdr_len: 0,
            payload_len: 0,
            path_type: path.path_type(),
            dst: remote.address().clone(),
            src: local.address().clone(),
        };
        let common_size = common_skeleton.size();
        let path_bytes = path.bytes();
        let hbh_size = if hbh.is_empty() { 0 } else { ext::compute_size(hbh) };
        let e2e_size = if e2e.is_empty() { 0 } else { ext::compute_size(e2e) };

        let addr_checksum = common_skeleton.checksum();
        l4.set_payload(addr_checksum, payload)?;
        let l4_size = l4.size();

        // Wire order is COMMON -> PATH -> [HBH] -> [E2E] -> L4 -> payload.
        // HBH, if present, must be the header immediately following the
        // path (routers only inspect HBH); E2E follows HBH if both are
        // present.
        let (outer_next_header, hbh_next_header, e2e_next_header) = if !hbh.is_empty() {
            let after_hbh = if !e2e.is_empty() { proto::E2E_OPT } else { l4.proto() };
            (proto::HBH_OPT, after_hbh, l4.proto())
        } else if !e2e.is_empty() {
            (proto::E2E_OPT, 0, l4.proto())
        } else {
            (l4.proto(), 0, 0)
        };

        if usize::from(u8::MAX) * 4 < common_size + path_bytes.len() {
            return Err(Error::PacketTooBig);
        }
        let hdr_len = ((common_size + path_bytes.len()) / 4) as u8;
        let plen = hbh_size + e2e_size + l4_size + payload.len();
        if plen > u16::from(u16::MAX) as usize {
            return Err(Error::PacketTooBig);
        }

        let flow_label = (fixed_hash(u64::from(common_skeleton.dst.checksum()))
            ^ fixed_hash(u64::from(common_skeleton.src.checksum()))
            ^ l4.flow_contribution())
            & 0x000f_ffff;

        let common = CommonHeader {
            flow_label,
            next_header: outer_next_header,
            hdr_len,
            payload_len: plen as u16,
            ..common_skeleton
        };

        let total = common_size + path_bytes.len() + hbh_size + e2e_size + l4_size + payload.len();
        let mut buf = vec![0u8; total];
        let mut nh_patch_offset = 4; // common header's next_header byte
        let l4_offset;
        {
            let mut ws = WriteStream::new(&mut buf);
            common.serialize(&mut ws).map_err(Error::from)?;
            ws.write_bytes(path_bytes).map_err(Error::from)?;
            if !hbh.is_empty() {
                nh_patch_offset = ws.pos().0;
                ext::serialize(hbh_next_header, hbh, &mut ws).map_err(Error::from)?;
            }
            if !e2e.is_empty() {
                nh_patch_offset = ws.pos().0;
                ext::serialize(e2e_next_header, e2e, &mut ws).map_err(Error::from)?;
            }
            l4_offset = ws.pos().0;
            l4.serialize(&mut ws).map_err(Error::from)?;
            ws.write_bytes(payload).map_err(Error::from)?;
        }

        Ok(HeaderCache {
            buf,
            nh_patch_offset,
            l4_offset,
            l4_size,
            payload_len: payload.len(),
            addr_checksum,
        })
    }

    /// The fully serialized packet bytes (common header through payload).
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// The payload region of the current buffer.
    pub fn payload(&self) -> &[u8] {
        &self.buf[self.l4_offset + self.l4_size..]
    }

    /// Refreshes this cache for a new payload (and possibly a new L4
    /// header) on the same flow: recomputes only the L4 length/checksum
    /// and the total payload length, and overwrites the L4 header region
    /// and length fields in place. The path and any extensions are left
    /// untouched.
    pub fn update_payload(&mut self, mut new_l4: L4, new_payload: &[u8]) -> Result<()> {
        new_l4.set_payload(self.addr_checksum, new_payload)?;
        let new_l4_size = new_l4.size();

        let old_total = self.l4_offset + self.l4_size + self.payload_len;
        let new_total = self.l4_offset + new_l4_size + new_payload.len();
        let old_plen = u16::from_be_bytes([self.buf[6], self.buf[7]]) as usize;
        let new_plen = old_plen - (old_total - self.l4_offset) + (new_total - self.l4_offset);
        if new_plen > usize::from(u16::MAX) {
            return Err(Error::PacketTooBig);
        }

        self.buf.truncate(self.l4_offset);
        self.buf.resize(new_total, 0);
        {
            let mut ws = WriteStream::new(&mut self.buf[self.l4_offset..]);
            new_l4.serialize(&mut ws).map_err(Error::from)?;
            ws.write_bytes(new_payload).map_err(Error::from)?;
        }

        self.buf[self.nh_patch_offset] = new_l4.proto();
        self.buf[6..8].copy_from_slice(&(new_plen as u16).to_be_bytes());

        self.l4_size = new_l4_size;
        self.payload_len = new_payload.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::{Address, Asn, Isd, IsdAsn};
    use crate::hdr::UdpHeader;

    fn ep(isd: u16, asn: u64, octets: [u8; 4], port: u16) -> Endpoint {
        Endpoint::new(
            Address::new(IsdAsn::new(Isd(isd), Asn(asn)), crate::addr::IPAddress::V4(octets.into())),
            port,
        )
    }

    #[test]
    fn build_produces_a_header_whose_common_header_parses_back() {
        let local = ep(1, 1, [10, 0, 0, 1], 40000);
        let remote = ep(1, 2, [10, 0, 0, 2], 80);
        let path = RawPath::empty(IsdAsn::new(Isd(1), Asn(1)));
        let l4 = L4::Udp(UdpHeader::default());
        let cache = HeaderCache::build(0, &local, &remote, &path, &[], &[], l4, b"hello").unwrap();

        let mut rs = crate::bitstream::ReadStream::new(cache.bytes());
        let common = CommonHeader::parse(&mut rs).unwrap();
        assert_eq!(common.next_header, proto::UDP);
        assert_eq!(&common.src, local.address());
        assert_eq!(&common.dst, remote.address());
        assert_eq!(cache.payload(), b"hello");
    }

    #[test]
    fn update_payload_changes_length_without_touching_the_path() {
        let local = ep(1, 1, [10, 0, 0, 1], 40000);
        let remote = ep(1, 2, [10, 0, 0, 2], 80);
        let path = RawPath::empty(IsdAsn::new(Isd(1), Asn(1)));
        let mut cache = HeaderCache::build(
            0,
            &local,
            &remote,
            &path,
            &[],
            &[],
            L4::Udp(UdpHeader::default()),
            b"hi",
        )
        .unwrap();
        let prefix_before = cache.bytes()[..cache.l4_offset].to_vec();

        cache
            .update_payload(L4::Udp(UdpHeader::default()), b"a longer payload")
            .unwrap();

        assert_eq!(cache.payload(), b"a longer payload");
        assert_eq!(&cache.bytes()[..cache.l4_offset], &prefix_before[..]);
    }
}
