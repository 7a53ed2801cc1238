//! The SCION/UDP shim header: a byte-for-byte analogue of UDP-over-IP,
//! checksummed against the SCION address header instead of an IP
//! pseudo-header.

use crate::bitstream::{ReadStream, StreamResult, WriteStream};
use crate::checksum;
use crate::error::Error;

/// Size of a serialized [`UdpHeader`] in bytes.
pub const SIZE: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UdpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    /// Total length of this header plus the payload, in bytes.
    pub length: u16,
    pub checksum: u16,
}

impl UdpHeader {
    pub fn serialize(&self, ws: &mut WriteStream) -> StreamResult<()> {
        ws.write_u16(self.src_port)?;
        ws.write_u16(self.dst_port)?;
        ws.write_u16(self.length)?;
        ws.write_u16(self.checksum)?;
        Ok(())
    }

    pub fn parse(rs: &mut ReadStream) -> Result<UdpHeader, Error> {
        let src_port = rs.read_u16().map_err(Error::from)?;
        let dst_port = rs.read_u16().map_err(Error::from)?;
        let length = rs.read_u16().map_err(Error::from)?;
        let checksum = rs.read_u16().map_err(Error::from)?;
        Ok(UdpHeader {
            src_port,
            dst_port,
            length,
            checksum,
        })
    }

    /// Updates `length` for a new payload and recomputes the checksum over
    /// the address-header pseudo-sum plus this header and payload.
    pub fn set_payload(&mut self, addr_checksum: u32, payload: &[u8]) {
        self.length = (SIZE + payload.len()) as u16;
        self.checksum = 0;
        let mut sum = addr_checksum;
        sum = sum.wrapping_add(u32::from(checksum::proto_word(crate::hdr::proto::UDP)));
        sum = sum.wrapping_add(u32::from(self.src_port));
        sum = sum.wrapping_add(u32::from(self.dst_port));
        sum = sum.wrapping_add(u32::from(self.length));
        self.checksum = checksum::internet_checksum(sum, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let hdr = UdpHeader {
            src_port: 40000,
            dst_port: 80,
            length: 16,
            checksum: 0x1234,
        };
        let mut buf = [0u8; SIZE];
        {
            let mut ws = WriteStream::new(&mut buf);
            hdr.serialize(&mut ws).unwrap();
        }
        let mut rs = ReadStream::new(&buf);
        assert_eq!(UdpHeader::parse(&mut rs).unwrap(), hdr);
    }

    #[test]
    fn set_payload_updates_length_and_checksum() {
        let mut hdr = UdpHeader {
            src_port: 1,
            dst_port: 2,
            length: 0,
            checksum: 0,
        };
        hdr.set_payload(0, b"hello");
        assert_eq!(hdr.length, SIZE as u16 + 5);
        assert_ne!(hdr.checksum, 0);
    }
}
