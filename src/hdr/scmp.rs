//! SCION Control Message Protocol: the 4-byte fixed header plus the nine
//! message body variants this crate understands.

use crate::addr::IsdAsn;
use crate::bitstream::{ReadStream, StreamResult, WriteStream};
use crate::error::Error;

/// Size of the fixed SCMP header, in bytes.
pub const HEADER_SIZE: usize = 4;

/// SCMP message type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScmpType {
    DstUnreach = 1,
    PacketTooBig = 2,
    ParamProblem = 4,
    ExtIfDown = 5,
    IntConnDown = 6,
    EchoRequest = 128,
    EchoReply = 129,
    TraceRouteRequest = 130,
    TraceRouteReply = 131,
    /// Anything this crate does not interpret.
    Unknown(u8),
}

impl ScmpType {
    pub fn from_u8(v: u8) -> ScmpType {
        match v {
            1 => ScmpType::DstUnreach,
            2 => ScmpType::PacketTooBig,
            4 => ScmpType::ParamProblem,
            5 => ScmpType::ExtIfDown,
            6 => ScmpType::IntConnDown,
            128 => ScmpType::EchoRequest,
            129 => ScmpType::EchoReply,
            130 => ScmpType::TraceRouteRequest,
            131 => ScmpType::TraceRouteReply,
            other => ScmpType::Unknown(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            ScmpType::DstUnreach => 1,
            ScmpType::PacketTooBig => 2,
            ScmpType::ParamProblem => 4,
            ScmpType::ExtIfDown => 5,
            ScmpType::IntConnDown => 6,
            ScmpType::EchoRequest => 128,
            ScmpType::EchoReply => 129,
            ScmpType::TraceRouteRequest => 130,
            ScmpType::TraceRouteReply => 131,
            ScmpType::Unknown(v) => v,
        }
    }

    /// SCMP error messages use type codes below 128; informational
    /// messages use 128 and above.
    pub fn is_error(self) -> bool {
        self.as_u8() < 128
    }
}

/// The 4-byte fixed SCMP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScmpHeader {
    pub msg_type: u8,
    pub code: u8,
    pub checksum: u16,
}

impl ScmpHeader {
    pub fn serialize(&self, ws: &mut WriteStream) -> StreamResult<()> {
        ws.write_u8(self.msg_type)?;
        ws.write_u8(self.code)?;
        ws.write_u16(self.checksum)?;
        Ok(())
    }

    pub fn parse(rs: &mut ReadStream) -> Result<ScmpHeader, Error> {
        let msg_type = rs.read_u8().map_err(Error::from)?;
        let code = rs.read_u8().map_err(Error::from)?;
        let checksum = rs.read_u16().map_err(Error::from)?;
        Ok(ScmpHeader {
            msg_type,
            code,
            checksum,
        })
    }
}

/// A fully decoded SCMP message: header plus the variant-specific body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScmpMessage {
    UnknownError {
        msg_type: u8,
        code: u8,
        body: Vec<u8>,
    },
    DstUnreach,
    PacketTooBig {
        mtu: u16,
    },
    ParamProblem {
        pointer: u16,
    },
    ExtIfDown {
        sender: IsdAsn,
        iface: u16,
    },
    IntConnDown {
        sender: IsdAsn,
        ingress: u16,
        egress: u16,
    },
    EchoRequest {
        id: u16,
        seq: u16,
        payload: Vec<u8>,
    },
    EchoReply {
        id: u16,
        seq: u16,
        payload: Vec<u8>,
    },
    TraceRequest {
        id: u16,
        seq: u16,
        isd_asn: IsdAsn,
        iface: u16,
    },
    TraceReply {
        id: u16,
        seq: u16,
        isd_asn: IsdAsn,
        iface: u16,
    },
}

impl ScmpMessage {
    pub fn scmp_type(&self) -> ScmpType {
        match self {
            ScmpMessage::UnknownError { msg_type, .. } => ScmpType::from_u8(*msg_type),
            ScmpMessage::DstUnreach => ScmpType::DstUnreach,
            ScmpMessage::PacketTooBig { .. } => ScmpType::PacketTooBig,
            ScmpMessage::ParamProblem { .. } => ScmpType::ParamProblem,
            ScmpMessage::ExtIfDown { .. } => ScmpType::ExtIfDown,
            ScmpMessage::IntConnDown { .. } => ScmpType::IntConnDown,
            ScmpMessage::EchoRequest { .. } => ScmpType::EchoRequest,
            ScmpMessage::EchoReply { .. } => ScmpType::EchoReply,
            ScmpMessage::TraceRequest { .. } => ScmpType::TraceRouteRequest,
            ScmpMessage::TraceReply { .. } => ScmpType::TraceRouteReply,
        }
    }

    /// Size of the variant body alone, excluding the 4-byte fixed header.
    pub fn body_size(&self) -> usize {
        match self {
            ScmpMessage::UnknownError { body, .. } => body.len(),
            ScmpMessage::DstUnreach => 4,
            ScmpMessage::PacketTooBig { .. } => 4,
            ScmpMessage::ParamProblem { .. } => 4,
            // sender(8) + iface(2), padded to a 16-byte AS-interface body.
            ScmpMessage::ExtIfDown { .. } => 16,
            // sender(8) + ingress(2) + egress(2), padded to 24 bytes.
            ScmpMessage::IntConnDown { .. } => 24,
            ScmpMessage::EchoRequest { payload, .. } | ScmpMessage::EchoReply { payload, .. } => {
                4 + payload.len()
            }
            // id(2) + seq(2) + isd_asn(8) + iface(2), padded to 20 bytes.
            ScmpMessage::TraceRequest { .. } | ScmpMessage::TraceReply { .. } => 20,
        }
    }

    pub fn size(&self) -> usize {
        HEADER_SIZE + self.body_size()
    }

    pub fn code(&self) -> u8 {
        match self {
            ScmpMessage::UnknownError { code, .. } => *code,
            _ => 0,
        }
    }

    /// Serializes this message with the header's checksum field left at 0,
    /// the placeholder value used while computing a checksum over the
    /// message's own bytes.
    pub fn serialize(&self, ws: &mut WriteStream) -> StreamResult<()> {
        self.serialize_with_checksum(0, ws)
    }

    /// Serializes this message with an already-computed checksum value.
    pub fn serialize_with_checksum(&self, checksum: u16, ws: &mut WriteStream) -> StreamResult<()> {
        ScmpHeader {
            msg_type: self.scmp_type().as_u8(),
            code: self.code(),
            checksum,
        }
        .serialize(ws)?;
        match self {
            ScmpMessage::UnknownError { body, .. } => ws.write_bytes(body)?,
            ScmpMessage::DstUnreach => ws.write_u32(0)?,
            ScmpMessage::PacketTooBig { mtu } => {
                ws.write_u16(0)?;
                ws.write_u16(*mtu)?;
            }
            ScmpMessage::ParamProblem { pointer } => {
                ws.write_u16(*pointer)?;
                ws.write_u16(0)?;
            }
            ScmpMessage::ExtIfDown { sender, iface } => {
                ws.write_u64(sender.0)?;
                ws.write_u16(*iface)?;
                ws.write_bytes(&[0u8; 6])?;
            }
            ScmpMessage::IntConnDown {
                sender,
                ingress,
                egress,
            } => {
                ws.write_u64(sender.0)?;
                ws.write_u16(*ingress)?;
                ws.write_u16(*egress)?;
                ws.write_bytes(&[0u8; 12])?;
            }
            ScmpMessage::EchoRequest { id, seq, payload }
            | ScmpMessage::EchoReply { id, seq, payload } => {
                ws.write_u16(*id)?;
                ws.write_u16(*seq)?;
                ws.write_bytes(payload)?;
            }
            ScmpMessage::TraceRequest {
                id,
                seq,
                isd_asn,
                iface,
            }
            | ScmpMessage::TraceReply {
                id,
                seq,
                isd_asn,
                iface,
            } => {
                ws.write_u16(*id)?;
                ws.write_u16(*seq)?;
                ws.write_u64(isd_asn.0)?;
                ws.write_u16(*iface)?;
                ws.write_bytes(&[0u8; 4])?;
            }
        }
        Ok(())
    }

    /// Parses a full SCMP message given the length of the buffer from the
    /// header onward (used to size the echo payload).
    pub fn parse(rs: &mut ReadStream, total_len: usize) -> Result<ScmpMessage, Error> {
        let header = ScmpHeader::parse(rs)?;
        let ty = ScmpType::from_u8(header.msg_type);
        let body_len = total_len
            .checked_sub(HEADER_SIZE)
            .ok_or_else(|| Error::InvalidPacket("SCMP message shorter than header".into()))?;
        let msg = match ty {
            ScmpType::DstUnreach => {
                rs.advance_bytes(4).map_err(Error::from)?;
                ScmpMessage::DstUnreach
            }
            ScmpType::PacketTooBig => {
                rs.advance_bytes(2).map_err(Error::from)?;
                let mtu = rs.read_u16().map_err(Error::from)?;
                ScmpMessage::PacketTooBig { mtu }
            }
            ScmpType::ParamProblem => {
                let pointer = rs.read_u16().map_err(Error::from)?;
                rs.advance_bytes(2).map_err(Error::from)?;
                ScmpMessage::ParamProblem { pointer }
            }
            ScmpType::ExtIfDown => {
                let sender = IsdAsn(rs.read_u64().map_err(Error::from)?);
                let iface = rs.read_u16().map_err(Error::from)?;
                rs.advance_bytes(6).map_err(Error::from)?;
                ScmpMessage::ExtIfDown { sender, iface }
            }
            ScmpType::IntConnDown => {
                let sender = IsdAsn(rs.read_u64().map_err(Error::from)?);
                let ingress = rs.read_u16().map_err(Error::from)?;
                let egress = rs.read_u16().map_err(Error::from)?;
                rs.advance_bytes(12).map_err(Error::from)?;
                ScmpMessage::IntConnDown {
                    sender,
                    ingress,
                    egress,
                }
            }
            ScmpType::EchoRequest | ScmpType::EchoReply => {
                let id = rs.read_u16().map_err(Error::from)?;
                let seq = rs.read_u16().map_err(Error::from)?;
                let mut payload = vec![0u8; body_len.saturating_sub(4)];
                rs.read_bytes(&mut payload).map_err(Error::from)?;
                if matches!(ty, ScmpType::EchoRequest) {
                    ScmpMessage::EchoRequest { id, seq, payload }
                } else {
                    ScmpMessage::EchoReply { id, seq, payload }
                }
            }
            ScmpType::TraceRouteRequest | ScmpType::TraceRouteReply => {
                let id = rs.read_u16().map_err(Error::from)?;
                let seq = rs.read_u16().map_err(Error::from)?;
                let isd_asn = IsdAsn(rs.read_u64().map_err(Error::from)?);
                let iface = rs.read_u16().map_err(Error::from)?;
                rs.advance_bytes(4).map_err(Error::from)?;
                if matches!(ty, ScmpType::TraceRouteRequest) {
                    ScmpMessage::TraceRequest {
                        id,
                        seq,
                        isd_asn,
                        iface,
                    }
                } else {
                    ScmpMessage::TraceReply {
                        id,
                        seq,
                        isd_asn,
                        iface,
                    }
                }
            }
            ScmpType::Unknown(_) if ty.is_error() => {
                let mut body = vec![0u8; body_len];
                rs.read_bytes(&mut body).map_err(Error::from)?;
                ScmpMessage::UnknownError {
                    msg_type: header.msg_type,
                    code: header.code,
                    body,
                }
            }
            ScmpType::Unknown(_) => {
                return Err(Error::InvalidPacket(format!(
                    "unknown informational SCMP type {}",
                    header.msg_type
                )))
            }
        };
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::{Asn, Isd};

    #[test]
    fn echo_request_round_trips_with_payload() {
        let msg = ScmpMessage::EchoRequest {
            id: 7,
            seq: 1,
            payload: vec![1, 2, 3, 4, 5],
        };
        let mut buf = vec![0u8; msg.size()];
        {
            let mut ws = WriteStream::new(&mut buf);
            msg.serialize(&mut ws).unwrap();
        }
        let mut rs = ReadStream::new(&buf);
        let parsed = ScmpMessage::parse(&mut rs, buf.len()).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn ext_if_down_round_trips() {
        let msg = ScmpMessage::ExtIfDown {
            sender: IsdAsn::new(Isd(1), Asn(0xff00_0000_0001)),
            iface: 42,
        };
        let mut buf = vec![0u8; msg.size()];
        {
            let mut ws = WriteStream::new(&mut buf);
            msg.serialize(&mut ws).unwrap();
        }
        let mut rs = ReadStream::new(&buf);
        assert_eq!(ScmpMessage::parse(&mut rs, buf.len()).unwrap(), msg);
    }

    #[test]
    fn scmp_type_classifies_errors_vs_informational() {
        assert!(ScmpType::DstUnreach.is_error());
        assert!(!ScmpType::EchoRequest.is_error());
    }

    #[test]
    fn unknown_error_type_surfaces_as_unknown_error() {
        let mut buf = vec![0u8; HEADER_SIZE + 4];
        {
            let mut ws = WriteStream::new(&mut buf);
            ScmpHeader { msg_type: 3, code: 0, checksum: 0 }.serialize(&mut ws).unwrap();
            ws.write_u32(0).unwrap();
        }
        let mut rs = ReadStream::new(&buf);
        let msg = ScmpMessage::parse(&mut rs, buf.len()).unwrap();
        assert_eq!(
            msg,
            ScmpMessage::UnknownError { msg_type: 3, code: 0, body: vec![0u8; 4] }
        );
    }

    #[test]
    fn unknown_informational_type_is_dropped() {
        let mut buf = vec![0u8; HEADER_SIZE + 4];
        {
            let mut ws = WriteStream::new(&mut buf);
            ScmpHeader { msg_type: 132, code: 0, checksum: 0 }.serialize(&mut ws).unwrap();
            ws.write_u32(0).unwrap();
        }
        let mut rs = ReadStream::new(&buf);
        let err = ScmpMessage::parse(&mut rs, buf.len()).unwrap_err();
        assert!(matches!(err, Error::InvalidPacket(_)));
    }
}
