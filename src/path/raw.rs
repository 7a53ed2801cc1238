//! `RawPath`: a stack-resident, opaque-by-default SCION path buffer.

use crate::addr::IsdAsn;
use crate::bitstream::{ReadStream, WriteStream};
use crate::error::{Error, Result};
use crate::hdr::path_fields::{HopField, InfoField, InfoFlags, PathMeta, HOP_FIELD_SIZE, INFO_FIELD_SIZE, PATH_META_SIZE};
use crate::hdr::PathType;

/// Maximum path length in bytes: the 1020-byte SCION header ceiling minus
/// the 36-byte minimum common+address header.
pub const MAX_RAW_PATH_LEN: usize = 984;

/// A SCION path in its wire-encoded form: the path type plus an opaque
/// byte buffer, stored inline (no heap allocation).
#[derive(Debug, Clone, Copy)]
pub struct RawPath {
    src: IsdAsn,
    dst: IsdAsn,
    path_type: PathType,
    buf: [u8; MAX_RAW_PATH_LEN],
    len: usize,
}

impl RawPath {
    /// Builds a raw path from its endpoints, type, and wire bytes.
    pub fn new(src: IsdAsn, dst: IsdAsn, path_type: PathType, bytes: &[u8]) -> Result<Self> {
        if bytes.len() > MAX_RAW_PATH_LEN {
            return Err(Error::PacketTooBig);
        }
        let mut buf = [0u8; MAX_RAW_PATH_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(RawPath {
            src,
            dst,
            path_type,
            buf,
            len: bytes.len(),
        })
    }

    /// Builds an empty (AS-internal) path between two endpoints in the
    /// same AS.
    pub fn empty(ia: IsdAsn) -> Self {
        RawPath {
            src: ia,
            dst: ia,
            path_type: PathType::Empty,
            buf: [0u8; MAX_RAW_PATH_LEN],
            len: 0,
        }
    }

    /// The source ISD-ASN.
    pub fn src(&self) -> IsdAsn {
        self.src
    }

    /// The AS this path originates from, as seen by the packager when
    /// resolving a flow's source address. Equal to [`RawPath::src`].
    pub fn first_as(&self) -> IsdAsn {
        self.src
    }

    /// The destination ISD-ASN.
    pub fn dst(&self) -> IsdAsn {
        self.dst
    }

    /// The path type.
    pub fn path_type(&self) -> PathType {
        self.path_type
    }

    /// The wire-encoded path bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Reverses this path in place so it carries traffic in the opposite
    /// direction. A no-op for [`PathType::Empty`]; returns
    /// [`Error::NotImplemented`] for path types this crate does not decode
    /// (EPIC, COLIBRI, one-hop).
    pub fn reverse_in_place(&mut self) -> Result<()> {
        match self.path_type {
            PathType::Empty => Ok(()),
            PathType::Scion => {
                let mut decoded = DecodedPath::parse(self.bytes())?;
                decoded.reverse();
                let bytes = decoded.bytes_len();
                if bytes > MAX_RAW_PATH_LEN {
                    return Err(Error::LogicError("reversed path grew".into()));
                }
                let mut buf = [0u8; MAX_RAW_PATH_LEN];
                {
                    let mut ws = WriteStream::new(&mut buf[..bytes]);
                    decoded.serialize(&mut ws)?;
                }
                self.buf = buf;
                self.len = bytes;
                std::mem::swap(&mut self.src, &mut self.dst);
                Ok(())
            }
            other => Err(Error::NotImplemented(format!(
                "reverse_in_place for path type {:?}",
                other
            ))),
        }
    }

    /// Decodes this path's logical `(ingress, egress)` hop pairs in path
    /// direction. Only meaningful for [`PathType::Scion`]; returns an
    /// empty sequence for any other path type.
    pub fn hops(&self) -> Vec<(u16, u16)> {
        if self.path_type != PathType::Scion {
            return Vec::new();
        }
        match DecodedPath::parse(self.bytes()) {
            Ok(decoded) => decoded.hops(),
            Err(_) => Vec::new(),
        }
    }
}

impl PartialEq for RawPath {
    fn eq(&self, other: &Self) -> bool {
        self.src == other.src
            && self.dst == other.dst
            && self.path_type == other.path_type
            && self.bytes() == other.bytes()
    }
}

impl Eq for RawPath {}

struct Segment {
    start: usize,
    end: usize,
    cons_dir: bool,
    peering: bool,
}

/// A decoded SCION path: meta header, info fields, and hop fields. Used
/// internally by [`RawPath::reverse_in_place`] and [`RawPath::hops`].
struct DecodedPath {
    meta: PathMeta,
    infos: Vec<InfoField>,
    hop_fields: Vec<HopField>,
}

impl DecodedPath {
    fn parse(bytes: &[u8]) -> Result<Self> {
        let mut rs = ReadStream::new(bytes);
        let meta = PathMeta::parse(&mut rs)?;
        let num_inf = meta.num_segments();
        if !(1..=3).contains(&num_inf) {
            return Err(Error::InvalidPacket("bad segment count".into()));
        }
        let num_hop = meta.total_hops();
        if !(2..=64).contains(&num_hop) {
            return Err(Error::InvalidPacket("bad hop count".into()));
        }
        let expected =
            PATH_META_SIZE + num_inf * INFO_FIELD_SIZE + num_hop * HOP_FIELD_SIZE;
        if bytes.len() != expected {
            return Err(Error::InvalidPacket("path length mismatch".into()));
        }

        let mut infos = Vec::with_capacity(num_inf);
        for _ in 0..num_inf {
            infos.push(InfoField::parse(&mut rs)?);
        }
        let mut hop_fields = Vec::with_capacity(num_hop);
        for _ in 0..num_hop {
            hop_fields.push(HopField::parse(&mut rs)?);
        }
        Ok(DecodedPath {
            meta,
            infos,
            hop_fields,
        })
    }

    fn bytes_len(&self) -> usize {
        PATH_META_SIZE + self.infos.len() * INFO_FIELD_SIZE + self.hop_fields.len() * HOP_FIELD_SIZE
    }

    fn serialize(&self, ws: &mut WriteStream) -> Result<()> {
        self.meta.serialize(ws).map_err(Error::from)?;
        for info in &self.infos {
            info.serialize(ws).map_err(Error::from)?;
        }
        for hop in &self.hop_fields {
            hop.serialize(ws).map_err(Error::from)?;
        }
        Ok(())
    }

    /// Implements the reversal algorithm: reverse info fields and flip
    /// their ConsDir bit, reverse hop fields, and recompute the meta
    /// cursor and segment lengths.
    fn reverse(&mut self) {
        self.infos.reverse();
        for info in &mut self.infos {
            info.flags.toggle(InfoFlags::CONS_DIR);
        }
        self.hop_fields.reverse();

        let num_inf = self.infos.len() as u8;
        let num_hop = self.hop_fields.len() as u8;
        self.meta.curr_inf = num_inf - self.meta.curr_inf - 1;
        self.meta.curr_hf = num_hop - self.meta.curr_hf - 1;
        match self.infos.len() {
            2 => self.meta.seg_len.swap(0, 1),
            3 => self.meta.seg_len.swap(0, 2),
            _ => {}
        }
    }

    fn segments(&self) -> Vec<Segment> {
        let mut segments = Vec::with_capacity(self.infos.len());
        let mut start = 0usize;
        for (i, len) in self.meta.seg_len.iter().enumerate() {
            if *len == 0 {
                continue;
            }
            let info = &self.infos[segments.len().min(self.infos.len().saturating_sub(1))];
            let _ = i;
            let end = start + usize::from(*len);
            segments.push(Segment {
                start,
                end,
                cons_dir: info.flags.contains(InfoFlags::CONS_DIR),
                peering: info.flags.contains(InfoFlags::PEER),
            });
            start = end;
        }
        segments
    }

    /// Produces logical `(ingress, egress)` pairs. At a non-peering
    /// segment boundary, the last hop field of segment N and the first
    /// hop field of segment N+1 are consumed together as a single logical
    /// hop. At a boundary touching a peering segment, only the first such
    /// boundary is merged this way; later ones are not (each hop field
    /// stays its own logical hop).
    fn hops(&self) -> Vec<(u16, u16)> {
        let segments = self.segments();
        if segments.is_empty() {
            return Vec::new();
        }
        let mut merges = vec![false; segments.len().saturating_sub(1)];
        let mut peering_boundary_used = false;
        for (i, m) in merges.iter_mut().enumerate() {
            let touches_peering = segments[i].peering || segments[i + 1].peering;
            if touches_peering {
                *m = !peering_boundary_used;
                peering_boundary_used = true;
            } else {
                *m = true;
            }
        }

        let mut pairs = Vec::new();
        let mut skip_next_first = false;
        for (seg_idx, seg) in segments.iter().enumerate() {
            for hf_idx in seg.start..seg.end {
                if hf_idx == seg.start && skip_next_first {
                    skip_next_first = false;
                    continue;
                }
                let hf = match self.hop_fields.get(hf_idx) {
                    Some(hf) => hf,
                    None => return pairs,
                };
                let (ingress, egress) = hop_pair(hf, seg.cons_dir);
                let is_last = hf_idx + 1 == seg.end;
                if is_last && seg_idx + 1 < segments.len() && merges[seg_idx] {
                    let next_seg = &segments[seg_idx + 1];
                    match self.hop_fields.get(next_seg.start) {
                        Some(next_hf) => {
                            let (_, next_egress) = hop_pair(next_hf, next_seg.cons_dir);
                            pairs.push((ingress, next_egress));
                            skip_next_first = true;
                        }
                        None => {
                            pairs.push((ingress, egress));
                            return pairs;
                        }
                    }
                    continue;
                }
                pairs.push((ingress, egress));
            }
        }
        pairs
    }
}

fn hop_pair(hf: &HopField, cons_dir: bool) -> (u16, u16) {
    if cons_dir {
        (hf.cons_ingress, hf.cons_egress)
    } else {
        (hf.cons_egress, hf.cons_ingress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::{Asn, Isd};
    use crate::hdr::path_fields::HopFlags;

    fn build_path(seg_len: [u8; 3], cons_dirs: &[bool]) -> Vec<u8> {
        let num_inf = cons_dirs.len();
        let num_hop: usize = seg_len.iter().map(|&l| usize::from(l)).sum();
        let meta = PathMeta {
            curr_inf: 0,
            curr_hf: 0,
            seg_len,
        };
        let size = PATH_META_SIZE + num_inf * INFO_FIELD_SIZE + num_hop * HOP_FIELD_SIZE;
        let mut buf = vec![0u8; size];
        let mut ws = WriteStream::new(&mut buf);
        meta.serialize(&mut ws).unwrap();
        for &cd in cons_dirs {
            let flags = if cd { InfoFlags::CONS_DIR } else { InfoFlags::empty() };
            InfoField {
                flags,
                seg_id: 0,
                timestamp: 0,
            }
            .serialize(&mut ws)
            .unwrap();
        }
        for i in 0..num_hop {
            HopField {
                flags: HopFlags::empty(),
                exp_time: 63,
                cons_ingress: (i as u16) * 2 + 1,
                cons_egress: (i as u16) * 2 + 2,
                mac: [0; 6],
            }
            .serialize(&mut ws)
            .unwrap();
        }
        buf
    }

    #[test]
    fn reverse_is_involution_for_empty_path() {
        let ia = IsdAsn::new(Isd(1), Asn(1));
        let mut p = RawPath::empty(ia);
        let before = p;
        p.reverse_in_place().unwrap();
        assert_eq!(p, before);
    }

    #[test]
    fn s4_three_segment_reversal_recomputes_meta() {
        let bytes = build_path([3, 2, 4], &[true, true, true]);
        let src = IsdAsn::new(Isd(1), Asn(1));
        let dst = IsdAsn::new(Isd(1), Asn(2));
        let mut p = RawPath::new(src, dst, PathType::Scion, &bytes).unwrap();
        p.reverse_in_place().unwrap();
        assert_eq!(p.src(), dst);
        assert_eq!(p.dst(), src);

        let decoded = DecodedPath::parse(p.bytes()).unwrap();
        assert_eq!(decoded.meta.seg_len, [4, 2, 3]);
        assert_eq!(decoded.meta.curr_inf, 2);
        assert_eq!(decoded.meta.curr_hf, 8);
        for info in &decoded.infos {
            assert!(!info.flags.contains(InfoFlags::CONS_DIR));
        }
    }

    #[test]
    fn reverse_twice_is_identity() {
        let bytes = build_path([2, 0, 0], &[true]);
        let src = IsdAsn::new(Isd(1), Asn(1));
        let dst = IsdAsn::new(Isd(1), Asn(2));
        let mut p = RawPath::new(src, dst, PathType::Scion, &bytes).unwrap();
        let original = p;
        p.reverse_in_place().unwrap();
        p.reverse_in_place().unwrap();
        assert_eq!(p, original);
    }

    #[test]
    fn hops_merges_non_peering_boundary() {
        let bytes = build_path([2, 2, 0], &[true, true]);
        let src = IsdAsn::new(Isd(1), Asn(1));
        let dst = IsdAsn::new(Isd(1), Asn(2));
        let p = RawPath::new(src, dst, PathType::Scion, &bytes).unwrap();
        // 4 raw hop fields, one non-peering boundary merge -> 3 logical hops.
        assert_eq!(p.hops().len(), 3);
    }

    #[test]
    fn malformed_path_yields_empty_hops_not_panic() {
        let src = IsdAsn::new(Isd(1), Asn(1));
        let dst = IsdAsn::new(Isd(1), Asn(2));
        let p = RawPath::new(src, dst, PathType::Scion, &[0u8; 4]).unwrap();
        assert!(p.hops().is_empty());
    }
}
