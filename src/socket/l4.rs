//! The layer-4 envelope carried after the path and extensions: ordinary
//! UDP traffic, or an SCMP message.

use super::flowlabel::fixed_hash;
use crate::bitstream::{StreamResult, WriteStream};
use crate::checksum;
use crate::error::Error;
use crate::hdr::{proto, ScmpMessage, UdpHeader};

/// A layer-4 header plus, for SCMP, its checksum (SCMP carries no mutable
/// length field the way UDP does, so the checksum is tracked alongside the
/// message rather than inside it).
#[derive(Debug, Clone)]
pub enum L4 {
    /// Ordinary application traffic.
    Udp(UdpHeader),
    /// A control message, paired with its already-computed checksum.
    Scmp(ScmpMessage, u16),
}

impl L4 {
    /// The next-header protocol number this variant occupies.
    pub fn proto(&self) -> u8 {
        match self {
            L4::Udp(_) => proto::UDP,
            L4::Scmp(..) => proto::SCMP,
        }
    }

    /// Serialized size of the header alone (excluding payload).
    pub fn size(&self) -> usize {
        match self {
            L4::Udp(_) => crate::hdr::udp::SIZE,
            L4::Scmp(msg, _) => msg.size(),
        }
    }

    /// Sets the UDP source/destination ports. A no-op for SCMP, which has
    /// no port fields.
    pub fn set_ports(&mut self, src_port: u16, dst_port: u16) {
        if let L4::Udp(h) = self {
            h.src_port = src_port;
            h.dst_port = dst_port;
        }
    }

    /// Recomputes the header's length/checksum fields for a new payload,
    /// given the SCION address-header checksum contribution.
    pub fn set_payload(&mut self, addr_checksum: u32, payload: &[u8]) -> Result<(), Error> {
        match self {
            L4::Udp(h) => {
                h.set_payload(addr_checksum, payload);
                Ok(())
            }
            L4::Scmp(msg, checksum) => {
                let mut buf = vec![0u8; msg.size()];
                {
                    let mut ws = WriteStream::new(&mut buf);
                    msg.serialize(&mut ws).map_err(Error::from)?;
                }
                let seed = addr_checksum.wrapping_add(u32::from(checksum::proto_word(proto::SCMP)));
                let header_sum = checksum::internet_sum(seed, &buf);
                *checksum = checksum::internet_checksum(header_sum, payload);
                Ok(())
            }
        }
    }

    /// This header's contribution to the flow label, hashed under the
    /// fixed (not process-seeded) seed so it is stable across restarts of
    /// peers sharing a flow.
    pub fn flow_contribution(&self) -> u32 {
        match self {
            L4::Udp(h) => fixed_hash(
                (u64::from(self.proto()) << 16) | (u64::from(h.src_port) << 8) | u64::from(h.dst_port),
            ),
            L4::Scmp(..) => fixed_hash(u64::from(self.proto())),
        }
    }

    /// Serializes the header, including its already-computed checksum.
    pub fn serialize(&self, ws: &mut WriteStream) -> StreamResult<()> {
        match self {
            L4::Udp(h) => h.serialize(ws),
            L4::Scmp(msg, checksum) => msg.serialize_with_checksum(*checksum, ws),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hdr::ScmpMessage;

    #[test]
    fn udp_set_payload_fills_ports_length_and_checksum() {
        let mut l4 = L4::Udp(UdpHeader::default());
        l4.set_ports(40000, 80);
        l4.set_payload(0, b"hello").unwrap();
        match &l4 {
            L4::Udp(h) => {
                assert_eq!(h.src_port, 40000);
                assert_eq!(h.dst_port, 80);
                assert_eq!(h.length, crate::hdr::udp::SIZE as u16 + 5);
                assert_ne!(h.checksum, 0);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn scmp_set_ports_is_a_no_op() {
        let mut l4 = L4::Scmp(ScmpMessage::DstUnreach, 0);
        l4.set_ports(1, 2);
        assert_eq!(l4.proto(), proto::SCMP);
    }

    #[test]
    fn scmp_set_payload_computes_a_nonzero_checksum() {
        let mut l4 = L4::Scmp(ScmpMessage::DstUnreach, 0);
        l4.set_payload(0, &[]).unwrap();
        match &l4 {
            L4::Scmp(_, checksum) => assert_ne!(*checksum, 0),
            _ => unreachable!(),
        }
    }

    #[test]
    fn udp_and_scmp_flow_contributions_differ() {
        let mut udp = L4::Udp(UdpHeader::default());
        udp.set_ports(1, 2);
        let scmp = L4::Scmp(ScmpMessage::DstUnreach, 0);
        assert_ne!(udp.flow_contribution(), scmp.flow_contribution());
    }
}
