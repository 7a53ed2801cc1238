//! The fixed-size fields that make up a SCION path: the path meta header,
//! info fields, and hop fields.

use crate::bitstream::{ReadStream, StreamResult, WriteStream};
use crate::error::Error;

/// Size of a serialized [`PathMeta`] in bytes.
pub const PATH_META_SIZE: usize = 4;
/// Size of a serialized [`InfoField`] in bytes.
pub const INFO_FIELD_SIZE: usize = 8;
/// Size of a serialized [`HopField`] in bytes.
pub const HOP_FIELD_SIZE: usize = 12;

/// The 4-byte path meta header: cursor positions plus the length (in hop
/// fields) of each of up to three path segments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathMeta {
    /// Index of the currently active info field (0..=2).
    pub curr_inf: u8,
    /// Index of the currently active hop field.
    pub curr_hf: u8,
    /// Hop-field count of each of up to three segments; zero entries past
    /// the first mean the segment is absent.
    pub seg_len: [u8; 3],
}

impl PathMeta {
    /// Total number of hop fields across all present segments.
    pub fn total_hops(&self) -> usize {
        self.seg_len.iter().map(|&l| usize::from(l)).sum()
    }

    /// Number of segments actually present (nonzero length).
    pub fn num_segments(&self) -> usize {
        self.seg_len.iter().filter(|&&l| l != 0).count()
    }

    pub fn serialize(&self, ws: &mut WriteStream) -> StreamResult<()> {
        ws.write_bits(u64::from(self.curr_inf & 0x3), 2)?;
        ws.write_bits(u64::from(self.curr_hf & 0x3f), 6)?;
        ws.write_bits(0, 6)?; // reserved
        for len in &self.seg_len {
            ws.write_bits(u64::from(len & 0x3f), 6)?;
        }
        Ok(())
    }

    pub fn parse(rs: &mut ReadStream) -> Result<PathMeta, Error> {
        let curr_inf = rs.read_bits(2).map_err(Error::from)? as u8;
        let curr_hf = rs.read_bits(6).map_err(Error::from)? as u8;
        rs.advance_bits(6).map_err(Error::from)?; // reserved
        let mut seg_len = [0u8; 3];
        for slot in &mut seg_len {
            *slot = rs.read_bits(6).map_err(Error::from)? as u8;
        }
        Ok(PathMeta {
            curr_inf,
            curr_hf,
            seg_len,
        })
    }
}

bitflags::bitflags! {
    /// Flags carried in an [`InfoField`].
    #[derive(Default)]
    pub struct InfoFlags: u8 {
        /// The segment is traversed in construction direction.
        const CONS_DIR = 0b0000_0001;
        /// The segment is a peering segment.
        const PEER = 0b0000_0010;
    }
}

/// An 8-byte info field: one per path segment, carrying the segment's
/// direction flags, its random ID, and its creation timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InfoField {
    pub flags: InfoFlags,
    pub seg_id: u16,
    pub timestamp: u32,
}

impl InfoField {
    pub fn serialize(&self, ws: &mut WriteStream) -> StreamResult<()> {
        ws.write_u8(self.flags.bits())?;
        ws.write_u8(0)?; // reserved
        ws.write_u16(self.seg_id)?;
        ws.write_u32(self.timestamp)?;
        Ok(())
    }

    pub fn parse(rs: &mut ReadStream) -> Result<InfoField, Error> {
        let flags = InfoFlags::from_bits_truncate(rs.read_u8().map_err(Error::from)?);
        rs.advance_bytes(1).map_err(Error::from)?;
        let seg_id = rs.read_u16().map_err(Error::from)?;
        let timestamp = rs.read_u32().map_err(Error::from)?;
        Ok(InfoField {
            flags,
            seg_id,
            timestamp,
        })
    }
}

bitflags::bitflags! {
    /// Flags carried in a [`HopField`].
    #[derive(Default)]
    pub struct HopFlags: u8 {
        /// The ingress interface of this hop may be used to cross to a
        /// peering link.
        const CONS_INGRESS_PEER = 0b0000_0001;
        /// The egress interface of this hop may be used to cross to a
        /// peering link.
        const CONS_EGRESS_PEER = 0b0000_0010;
    }
}

/// A 12-byte hop field: one per AS traversed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HopField {
    pub flags: HopFlags,
    /// Hop expiration time, relative to the segment's info field timestamp.
    pub exp_time: u8,
    pub cons_ingress: u16,
    pub cons_egress: u16,
    /// 6-byte MAC authenticating this hop field.
    pub mac: [u8; 6],
}

impl HopField {
    pub fn serialize(&self, ws: &mut WriteStream) -> StreamResult<()> {
        ws.write_u8(self.flags.bits())?;
        ws.write_u8(self.exp_time)?;
        ws.write_u16(self.cons_ingress)?;
        ws.write_u16(self.cons_egress)?;
        ws.write_bytes(&self.mac)?;
        Ok(())
    }

    pub fn parse(rs: &mut ReadStream) -> Result<HopField, Error> {
        let flags = HopFlags::from_bits_truncate(rs.read_u8().map_err(Error::from)?);
        let exp_time = rs.read_u8().map_err(Error::from)?;
        let cons_ingress = rs.read_u16().map_err(Error::from)?;
        let cons_egress = rs.read_u16().map_err(Error::from)?;
        let mut mac = [0u8; 6];
        rs.read_bytes(&mut mac).map_err(Error::from)?;
        Ok(HopField {
            flags,
            exp_time,
            cons_ingress,
            cons_egress,
            mac,
        })
    }
}
