//! The SCION common header and address header.

use crate::addr::{Address, IPAddress, IsdAsn};
use crate::bitstream::{ReadStream, StreamResult, WriteStream};
use crate::error::Error;
use std::convert::TryFrom;

/// Minimum size of the common+address header with two IPv4 hosts, in bytes.
pub const MIN_SIZE: usize = 36;

/// The type of path carried by a SCION packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathType {
    /// No path; used for AS-internal communication.
    Empty,
    /// The standard SCION path.
    Scion,
    /// A one-hop path used during beaconing.
    OneHop,
    /// An EPIC path (round-trips as opaque bytes; not decoded).
    Epic,
    /// A COLIBRI path (round-trips as opaque bytes; not decoded).
    Colibri,
}

impl PathType {
    fn from_u8(v: u8) -> Result<Self, Error> {
        match v {
            0 => Ok(PathType::Empty),
            1 => Ok(PathType::Scion),
            2 => Ok(PathType::OneHop),
            3 => Ok(PathType::Epic),
            4 => Ok(PathType::Colibri),
            other => Err(Error::InvalidPacket(format!("unknown path type {}", other))),
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            PathType::Empty => 0,
            PathType::Scion => 1,
            PathType::OneHop => 2,
            PathType::Epic => 3,
            PathType::Colibri => 4,
        }
    }
}

/// The 4-bit host address type/length nibble used for each of the source
/// and destination host fields: a 2-bit type (0 = IP) and a 2-bit length
/// code where the actual address length is `(code + 1) * 4` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAddrType {
    /// A 4-byte IPv4 address.
    V4,
    /// A 16-byte IPv6 address.
    V6,
}

impl HostAddrType {
    fn from_nibble(n: u8) -> Result<Self, Error> {
        match n {
            0b0000 => Ok(HostAddrType::V4),
            0b0011 => Ok(HostAddrType::V6),
            other => Err(Error::InvalidPacket(format!(
                "unsupported host address type 0x{:x}",
                other
            ))),
        }
    }

    fn as_nibble(self) -> u8 {
        match self {
            HostAddrType::V4 => 0b0000,
            HostAddrType::V6 => 0b0011,
        }
    }

    fn size(self) -> usize {
        match self {
            HostAddrType::V4 => 4,
            HostAddrType::V6 => 16,
        }
    }

    fn of(addr: &IPAddress) -> Self {
        match addr {
            IPAddress::V4(_) => HostAddrType::V4,
            IPAddress::V6(..) => HostAddrType::V6,
        }
    }
}

/// The SCION common header plus the fixed-format address header
/// (everything up to, but not including, the path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonHeader {
    /// Traffic class / QoS field.
    pub qos: u8,
    /// 20-bit flow label.
    pub flow_label: u32,
    /// Next-header protocol number (may be rewritten to HBH/E2E opt by the
    /// extension engine).
    pub next_header: u8,
    /// Total header length in 4-byte units (common+addr+path+extensions).
    pub hdr_len: u8,
    /// Payload length in bytes (extensions + L4 + payload).
    pub payload_len: u16,
    /// The path type carried by this packet.
    pub path_type: PathType,
    /// Destination SCION address.
    pub dst: Address,
    /// Source SCION address.
    pub src: Address,
}

impl CommonHeader {
    /// Total serialized size of this header in bytes (addresses included,
    /// path excluded).
    pub fn size(&self) -> usize {
        28 + HostAddrType::of(self.dst.host()).size() + HostAddrType::of(self.src.host()).size()
    }

    /// Checksum contribution: the sum of both addresses' word sums.
    pub fn checksum(&self) -> u32 {
        self.dst.checksum().wrapping_add(self.src.checksum())
    }

    /// Serializes this header.
    pub fn serialize(&self, ws: &mut WriteStream) -> StreamResult<()> {
        ws.write_bits(0, 4)?; // version
        ws.write_bits(u64::from(self.qos), 8)?;
        ws.write_bits(u64::from(self.flow_label & 0xf_ffff), 20)?;

        ws.write_u8(self.next_header)?;
        ws.write_u8(self.hdr_len)?;
        ws.write_u16(self.payload_len)?;

        ws.write_u8(self.path_type.as_u8())?;
        let dt = HostAddrType::of(self.dst.host());
        let st = HostAddrType::of(self.src.host());
        let type_byte = (dt.as_nibble() << 4) | st.as_nibble();
        ws.write_u8(type_byte)?;
        ws.write_u16(0)?; // reserved

        ws.write_u64(self.dst.isd_asn().0)?;
        ws.write_u64(self.src.isd_asn().0)?;

        write_host(ws, self.dst.host())?;
        write_host(ws, self.src.host())?;
        Ok(())
    }

    /// Parses a common+address header.
    pub fn parse(rs: &mut ReadStream) -> Result<CommonHeader, Error> {
        let version = rs.read_bits(4).map_err(Error::from)?;
        if version != 0 {
            return Err(Error::InvalidPacket(format!(
                "unsupported SCION version {}",
                version
            )));
        }
        let qos = rs.read_bits(8).map_err(Error::from)? as u8;
        let flow_label = rs.read_bits(20).map_err(Error::from)? as u32;

        let next_header = rs.read_u8().map_err(Error::from)?;
        let hdr_len = rs.read_u8().map_err(Error::from)?;
        if usize::from(hdr_len) * 4 < MIN_SIZE {
            return Err(Error::InvalidPacket("header length too small".into()));
        }
        let payload_len = rs.read_u16().map_err(Error::from)?;

        let path_type = PathType::from_u8(rs.read_u8().map_err(Error::from)?)?;
        let type_byte = rs.read_u8().map_err(Error::from)?;
        let dt = HostAddrType::from_nibble((type_byte >> 4) & 0x3)?;
        let st = HostAddrType::from_nibble(type_byte & 0x3)?;
        let reserved = rs.read_u16().map_err(Error::from)?;
        if reserved != 0 {
            return Err(Error::InvalidPacket("non-zero reserved bits".into()));
        }

        let dst_ia = IsdAsn(rs.read_u64().map_err(Error::from)?);
        let src_ia = IsdAsn(rs.read_u64().map_err(Error::from)?);
        let dst_host = read_host(rs, dt)?;
        let src_host = read_host(rs, st)?;

        Ok(CommonHeader {
            qos,
            flow_label,
            next_header,
            hdr_len,
            payload_len,
            path_type,
            dst: Address::new(dst_ia, dst_host),
            src: Address::new(src_ia, src_host),
        })
    }
}

fn write_host(ws: &mut WriteStream, host: &IPAddress) -> StreamResult<()> {
    match host {
        IPAddress::V4(a) => ws.write_bytes(&a.octets()),
        IPAddress::V6(a, _) => ws.write_bytes(&a.octets()),
    }
}

fn read_host(rs: &mut ReadStream, ty: HostAddrType) -> Result<IPAddress, Error> {
    match ty {
        HostAddrType::V4 => {
            let mut b = [0u8; 4];
            rs.read_bytes(&mut b).map_err(Error::from)?;
            Ok(IPAddress::V4(b.into()))
        }
        HostAddrType::V6 => {
            let mut b = [0u8; 16];
            rs.read_bytes(&mut b).map_err(Error::from)?;
            Ok(IPAddress::V6(b.into(), None))
        }
    }
}

impl TryFrom<u8> for PathType {
    type Error = Error;
    fn try_from(v: u8) -> Result<Self, Error> {
        PathType::from_u8(v)
    }
}

impl From<PathType> for u8 {
    fn from(v: PathType) -> u8 {
        v.as_u8()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::{Asn, Isd};

    fn addr(isd: u16, asn: u64, host: IPAddress) -> Address {
        Address::new(IsdAsn::new(Isd(isd), Asn(asn)), host)
    }

    #[test]
    fn round_trips_with_mixed_host_families() {
        let hdr = CommonHeader {
            qos: 7,
            flow_label: 0x12345,
            next_header: crate::hdr::proto::UDP,
            hdr_len: 9,
            payload_len: 16,
            path_type: PathType::Empty,
            dst: addr(1, 1, IPAddress::V4([10, 0, 0, 1].into())),
            src: addr(1, 2, IPAddress::unspecified_v6()),
        };
        let mut buf = vec![0u8; hdr.size()];
        {
            let mut ws = WriteStream::new(&mut buf);
            hdr.serialize(&mut ws).unwrap();
        }
        let mut rs = ReadStream::new(&buf);
        let parsed = CommonHeader::parse(&mut rs).unwrap();
        assert_eq!(parsed, hdr);
    }

    #[test]
    fn rejects_header_length_below_minimum() {
        let mut buf = vec![0u8; 8];
        buf[4] = crate::hdr::proto::UDP;
        buf[5] = 1; // hdr_len = 1 -> 4 bytes, below MIN_SIZE
        let mut rs = ReadStream::new(&buf);
        assert!(CommonHeader::parse(&mut rs).is_err());
    }
}
