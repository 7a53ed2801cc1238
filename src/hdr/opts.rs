//! Hop-by-hop and end-to-end option header envelopes, and the option TLVs
//! that do not belong to the extension engine (padding, SPAO).

use crate::bitstream::{ReadStream, StreamResult, WriteStream};
use crate::error::Error;

/// The wire type byte of an option TLV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptType {
    Pad1,
    PadN,
    Spao,
    IdInt,
    IdIntEntry,
    /// Any type this crate does not interpret.
    Unknown(u8),
}

impl OptType {
    pub fn from_u8(v: u8) -> OptType {
        match v {
            0 => OptType::Pad1,
            1 => OptType::PadN,
            2 => OptType::Spao,
            253 => OptType::IdInt,
            254 => OptType::IdIntEntry,
            other => OptType::Unknown(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            OptType::Pad1 => 0,
            OptType::PadN => 1,
            OptType::Spao => 2,
            OptType::IdInt => 253,
            OptType::IdIntEntry => 254,
            OptType::Unknown(v) => v,
        }
    }
}

/// Minimum `dataLen` of a [`Spao`]: spi(4) + algorithm(1) + reserved(1) +
/// timestamp(6).
pub const SPAO_MIN_DATA_LEN: usize = 12;
/// Maximum authenticator length this crate will emit or accept.
pub const SPAO_MAX_AUTH_LEN: usize = 36;

/// The SCION Packet Authenticator Option. Transported, not validated: the
/// authenticator bytes pass through verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spao {
    pub spi: u32,
    pub algorithm: u8,
    /// 48-bit timestamp.
    pub timestamp: u64,
    pub authenticator: Vec<u8>,
}

impl Spao {
    pub fn data_len(&self) -> usize {
        SPAO_MIN_DATA_LEN + self.authenticator.len()
    }

    pub fn serialize(&self, ws: &mut WriteStream) -> StreamResult<()> {
        ws.write_u32(self.spi)?;
        ws.write_u8(self.algorithm)?;
        ws.write_u8(0)?; // reserved
        ws.write_bits(self.timestamp & 0xffff_ffff_ffff, 48)?;
        ws.write_bytes(&self.authenticator)?;
        Ok(())
    }

    pub fn parse(rs: &mut ReadStream, data_len: usize) -> Result<Spao, Error> {
        if data_len < SPAO_MIN_DATA_LEN {
            return Err(Error::InvalidPacket("SPAO dataLen too small".into()));
        }
        let auth_len = data_len - SPAO_MIN_DATA_LEN;
        if auth_len > SPAO_MAX_AUTH_LEN {
            return Err(Error::InvalidPacket("SPAO authenticator too long".into()));
        }
        let spi = rs.read_u32().map_err(Error::from)?;
        let algorithm = rs.read_u8().map_err(Error::from)?;
        rs.advance_bytes(1).map_err(Error::from)?;
        let timestamp = rs.read_bits(48).map_err(Error::from)?;
        let mut authenticator = vec![0u8; auth_len];
        rs.read_bytes(&mut authenticator).map_err(Error::from)?;
        Ok(Spao {
            spi,
            algorithm,
            timestamp,
            authenticator,
        })
    }
}

/// A parsed option TLV. Extension-owned types (ID-INT) are captured as
/// raw payload bytes; the extension engine re-parses them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SciOpt {
    Pad1,
    PadN(usize),
    Spao(Spao),
    Raw { opt_type: u8, data: Vec<u8> },
}

impl SciOpt {
    pub fn opt_type(&self) -> OptType {
        match self {
            SciOpt::Pad1 => OptType::Pad1,
            SciOpt::PadN(_) => OptType::PadN,
            SciOpt::Spao(_) => OptType::Spao,
            SciOpt::Raw { opt_type, .. } => OptType::from_u8(*opt_type),
        }
    }

    /// Serialized size including the type byte and, if present, the
    /// length byte.
    pub fn size(&self) -> usize {
        match self {
            SciOpt::Pad1 => 1,
            SciOpt::PadN(len) => 2 + len,
            SciOpt::Spao(s) => 2 + s.data_len(),
            SciOpt::Raw { data, .. } => 2 + data.len(),
        }
    }

    pub fn serialize(&self, ws: &mut WriteStream) -> StreamResult<()> {
        match self {
            SciOpt::Pad1 => ws.write_u8(OptType::Pad1.as_u8()),
            SciOpt::PadN(len) => {
                ws.write_u8(OptType::PadN.as_u8())?;
                ws.write_u8(*len as u8)?;
                for _ in 0..*len {
                    ws.write_u8(0)?;
                }
                Ok(())
            }
            SciOpt::Spao(s) => {
                ws.write_u8(OptType::Spao.as_u8())?;
                ws.write_u8(s.data_len() as u8)?;
                s.serialize(ws)
            }
            SciOpt::Raw { opt_type, data } => {
                ws.write_u8(*opt_type)?;
                ws.write_u8(data.len() as u8)?;
                ws.write_bytes(data)
            }
        }
    }
}

/// The hop-by-hop or end-to-end options header: a byte-aligned sequence
/// of option TLVs, padded to a 4-byte boundary.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OptsHeader {
    pub next_header: u8,
    pub options: Vec<SciOpt>,
}

impl OptsHeader {
    /// Total serialized size in bytes, including the 2-byte fixed prefix
    /// and padding to a 4-byte boundary.
    pub fn size(&self) -> usize {
        let body: usize = self.options.iter().map(SciOpt::size).sum();
        let unpadded = 2 + body;
        (unpadded + 3) & !3
    }

    pub fn serialize(&self, ws: &mut WriteStream) -> StreamResult<()> {
        let total = self.size();
        ws.write_u8(self.next_header)?;
        ws.write_u8((total / 4) as u8)?;
        for opt in &self.options {
            opt.serialize(ws)?;
        }
        let body: usize = self.options.iter().map(SciOpt::size).sum();
        let pad = total - 2 - body;
        for _ in 0..pad {
            ws.write_u8(0)?;
        }
        Ok(())
    }

    pub fn parse(rs: &mut ReadStream) -> Result<OptsHeader, Error> {
        let next_header = rs.read_u8().map_err(Error::from)?;
        let hdr_len = rs.read_u8().map_err(Error::from)?;
        let total = usize::from(hdr_len) * 4;
        if total < 2 {
            return Err(Error::InvalidPacket("options header too small".into()));
        }
        let mut remaining = total - 2;
        let mut options = Vec::new();
        while remaining > 0 {
            let opt_type = rs.read_u8().map_err(Error::from)?;
            remaining -= 1;
            if opt_type == OptType::Pad1.as_u8() {
                options.push(SciOpt::Pad1);
                continue;
            }
            let data_len = usize::from(rs.read_u8().map_err(Error::from)?);
            remaining -= 1;
            if data_len > remaining {
                return Err(Error::InvalidPacket("option dataLen overruns header".into()));
            }
            match OptType::from_u8(opt_type) {
                OptType::PadN => {
                    rs.advance_bytes(data_len).map_err(Error::from)?;
                    options.push(SciOpt::PadN(data_len));
                }
                OptType::Spao => {
                    options.push(SciOpt::Spao(Spao::parse(rs, data_len)?));
                }
                _ => {
                    let mut data = vec![0u8; data_len];
                    rs.read_bytes(&mut data).map_err(Error::from)?;
                    options.push(SciOpt::Raw { opt_type, data });
                }
            }
            remaining -= data_len;
        }
        Ok(OptsHeader {
            next_header,
            options,
        })
    }
}
