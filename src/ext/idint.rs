//! The ID-INT in-band telemetry extension: a main option describing what
//! to collect, followed by a stack of per-hop entries.

use super::{ExtCategory, Extension};
use crate::bitstream::{ReadStream, StreamResult, WriteStream};
use crate::error::{Error, Result};
use crate::hdr::opts::OptType;

/// The verifier address carried in the main option, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifierAddrType {
    /// No verifier address is carried.
    None,
    /// A 4-byte IPv4 verifier address follows.
    Ipv4,
    /// A 16-byte IPv6 verifier address follows.
    Ipv6,
}

impl VerifierAddrType {
    fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(VerifierAddrType::None),
            1 => Ok(VerifierAddrType::Ipv4),
            2 => Ok(VerifierAddrType::Ipv6),
            other => Err(Error::InvalidPacket(format!(
                "unknown ID-INT verifier address type {}",
                other
            ))),
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            VerifierAddrType::None => 0,
            VerifierAddrType::Ipv4 => 1,
            VerifierAddrType::Ipv6 => 2,
        }
    }

    fn addr_len(self) -> usize {
        match self {
            VerifierAddrType::None => 0,
            VerifierAddrType::Ipv4 => 4,
            VerifierAddrType::Ipv6 => 16,
        }
    }
}

/// One per-hop telemetry entry in an ID-INT stack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdIntEntry {
    /// True if `metadata` is encrypted, in which case a 12-byte nonce
    /// precedes it.
    pub encrypted: bool,
    /// The hop number this entry reports on.
    pub hop_number: u8,
    /// Four 2-bit metadata-length codes, each in `[0, 4]`, counting
    /// 4-byte metadata words.
    pub ml: [u8; 4],
    /// Present only when `encrypted`.
    pub nonce: Option<[u8; 12]>,
    /// Raw metadata words, sized by `ml`.
    pub metadata: Vec<u8>,
    /// 4-byte MAC authenticating this entry.
    pub mac: [u8; 4],
}

impl IdIntEntry {
    fn metadata_len(&self) -> usize {
        self.ml.iter().map(|&m| usize::from(m) * 4).sum()
    }

    /// Serialized size of this entry.
    pub fn size(&self) -> usize {
        let nonce_len = if self.encrypted { 12 } else { 0 };
        2 + nonce_len + self.metadata_len() + 4
    }

    fn serialize(&self, ws: &mut WriteStream) -> StreamResult<()> {
        let mut flags = 0u8;
        if self.encrypted {
            flags |= 0b1000_0000;
        }
        ws.write_u8(flags)?;
        ws.write_u8(self.hop_number)?;
        let packed = self.ml[0] << 6 | self.ml[1] << 4 | self.ml[2] << 2 | self.ml[3];
        ws.write_u8(packed)?;
        if let Some(nonce) = &self.nonce {
            ws.write_bytes(nonce)?;
        }
        ws.write_bytes(&self.metadata)?;
        ws.write_bytes(&self.mac)?;
        Ok(())
    }

    fn parse(rs: &mut ReadStream) -> Result<IdIntEntry> {
        let flags = rs.read_u8().map_err(Error::from)?;
        let encrypted = flags & 0b1000_0000 != 0;
        let hop_number = rs.read_u8().map_err(Error::from)?;
        let packed = rs.read_u8().map_err(Error::from)?;
        let ml = [
            (packed >> 6) & 0x3,
            (packed >> 4) & 0x3,
            (packed >> 2) & 0x3,
            packed & 0x3,
        ];
        for &m in &ml {
            if m > 4 {
                return Err(Error::InvalidPacket("ID-INT ml code out of range".into()));
            }
        }
        let nonce = if encrypted {
            let mut n = [0u8; 12];
            rs.read_bytes(&mut n).map_err(Error::from)?;
            Some(n)
        } else {
            None
        };
        let metadata_len: usize = ml.iter().map(|&m| usize::from(m) * 4).sum();
        let mut metadata = vec![0u8; metadata_len];
        rs.read_bytes(&mut metadata).map_err(Error::from)?;
        let mut mac = [0u8; 4];
        rs.read_bytes(&mut mac).map_err(Error::from)?;
        Ok(IdIntEntry {
            encrypted,
            hop_number,
            ml,
            nonce,
            metadata,
            mac,
        })
    }
}

/// The ID-INT main option: what telemetry to collect and, once in
/// flight, the accumulated per-hop entry stack.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdIntOpt {
    pub version: u8,
    pub aggregation_mode: u8,
    pub verifier_addr_type: Option<VerifierAddrType>,
    pub traffic_class: u8,
    pub delay_hops: u8,
    /// Per-hop bitmap of which telemetry instructions to collect.
    pub instruction_bitmap: u16,
    pub aggregation_functions: [u8; 4],
    pub instruction_selectors: [u8; 4],
    pub source_timestamp: u32,
    pub source_port: u16,
    pub verifier_addr: Vec<u8>,
    pub entries: Vec<IdIntEntry>,
    valid: bool,
}

impl IdIntOpt {
    fn fixed_body_len(&self) -> usize {
        // version+flags, aggregation mode, verifier type, stack length,
        // traffic class, delay hops, bitmap(2), 4 agg fns, 4 instr
        // selectors, timestamp(4), port(2).
        1 + 1 + 1 + 1 + 1 + 1 + 2 + 4 + 4 + 4 + 2
    }

    fn addr_len(&self) -> usize {
        self.verifier_addr_type.map_or(0, VerifierAddrType::addr_len)
    }

    fn entries_len(&self) -> usize {
        self.entries.iter().map(IdIntEntry::size).sum()
    }
}

impl Extension for IdIntOpt {
    fn category(&self) -> ExtCategory {
        ExtCategory::Hbh
    }

    fn opt_type(&self) -> OptType {
        OptType::IdInt
    }

    fn alignment(&self) -> (usize, usize) {
        (4, 2)
    }

    fn own_size(&self) -> usize {
        2 + self.fixed_body_len() + self.addr_len() + self.entries_len()
    }

    fn serialize_body(&self, ws: &mut WriteStream) -> StreamResult<()> {
        let data_len = self.fixed_body_len() + self.addr_len() + self.entries_len();
        ws.write_u8(OptType::IdInt.as_u8())?;
        ws.write_u8(data_len as u8)?;
        ws.write_u8(self.version)?;
        ws.write_u8(self.aggregation_mode)?;
        ws.write_u8(
            self.verifier_addr_type
                .map_or(VerifierAddrType::None.as_u8(), VerifierAddrType::as_u8),
        )?;
        ws.write_u8(self.entries.len() as u8)?;
        ws.write_u8(self.traffic_class)?;
        ws.write_u8(self.delay_hops)?;
        ws.write_u16(self.instruction_bitmap)?;
        for f in &self.aggregation_functions {
            ws.write_u8(*f)?;
        }
        for s in &self.instruction_selectors {
            ws.write_u8(*s)?;
        }
        ws.write_u32(self.source_timestamp)?;
        ws.write_u16(self.source_port)?;
        ws.write_bytes(&self.verifier_addr)?;
        for entry in &self.entries {
            entry.serialize(ws)?;
        }
        Ok(())
    }

    fn parse_body(&mut self, rs: &mut ReadStream, data_len: usize) -> Result<()> {
        let start = rs.pos();
        self.version = rs.read_u8().map_err(Error::from)?;
        self.aggregation_mode = rs.read_u8().map_err(Error::from)?;
        let vtype = VerifierAddrType::from_u8(rs.read_u8().map_err(Error::from)?)?;
        let stack_len = rs.read_u8().map_err(Error::from)?;
        self.traffic_class = rs.read_u8().map_err(Error::from)?;
        self.delay_hops = rs.read_u8().map_err(Error::from)?;
        self.instruction_bitmap = rs.read_u16().map_err(Error::from)?;
        for f in &mut self.aggregation_functions {
            *f = rs.read_u8().map_err(Error::from)?;
        }
        for s in &mut self.instruction_selectors {
            *s = rs.read_u8().map_err(Error::from)?;
        }
        self.source_timestamp = rs.read_u32().map_err(Error::from)?;
        self.source_port = rs.read_u16().map_err(Error::from)?;
        let addr_len = vtype.addr_len();
        let mut verifier_addr = vec![0u8; addr_len];
        rs.read_bytes(&mut verifier_addr).map_err(Error::from)?;
        self.verifier_addr_type = Some(vtype);
        self.verifier_addr = verifier_addr;

        let consumed = self.fixed_body_len() + addr_len;
        if consumed > data_len {
            return Err(Error::InvalidPacket("ID-INT option shorter than header".into()));
        }
        let mut remaining = data_len - consumed;
        let mut entries = Vec::with_capacity(usize::from(stack_len));
        while entries.len() < usize::from(stack_len) && remaining > 0 {
            // Tolerate padding options interleaved between entries.
            if let Ok(marker) = rs.lookahead(1) {
                if marker[0] == OptType::Pad1.as_u8() {
                    rs.advance_bytes(1).map_err(Error::from)?;
                    remaining -= 1;
                    continue;
                }
                if marker[0] == OptType::PadN.as_u8() && remaining >= 2 {
                    rs.advance_bytes(1).map_err(Error::from)?;
                    let len = usize::from(rs.read_u8().map_err(Error::from)?);
                    if 2 + len > remaining {
                        return Err(Error::InvalidPacket(
                            "PadN inside ID-INT entry stack overruns sub-stream".into(),
                        ));
                    }
                    rs.advance_bytes(len).map_err(Error::from)?;
                    remaining -= 2 + len;
                    continue;
                }
            }
            let entry = IdIntEntry::parse(rs)?;
            let consumed = entry.size();
            if consumed > remaining {
                return Err(Error::InvalidPacket("ID-INT entry overruns sub-stream".into()));
            }
            remaining -= consumed;
            entries.push(entry);
        }
        self.entries = entries;
        let _ = start;
        self.valid = true;
        Ok(())
    }

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn set_valid(&mut self) {
        self.valid = true;
    }

    fn set_invalid(&mut self) {
        self.valid = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> IdIntOpt {
        IdIntOpt {
            version: 1,
            aggregation_mode: 0,
            verifier_addr_type: Some(VerifierAddrType::Ipv4),
            traffic_class: 0,
            delay_hops: 0,
            instruction_bitmap: 0b1010,
            aggregation_functions: [0, 1, 2, 3],
            instruction_selectors: [1, 0, 0, 0],
            source_timestamp: 0x1020_3040,
            source_port: 8080,
            verifier_addr: vec![10, 0, 0, 1],
            entries: vec![IdIntEntry {
                encrypted: false,
                hop_number: 2,
                ml: [1, 0, 2, 0],
                nonce: None,
                metadata: vec![0u8; 12], // (1+0+2+0) * 4
                mac: [9, 9, 9, 9],
            }],
            valid: true,
        }
    }

    #[test]
    fn round_trips_with_entry_stack() {
        let opt = sample();
        let size = opt.own_size();
        let mut buf = vec![0u8; size];
        {
            let mut ws = WriteStream::new(&mut buf);
            opt.serialize_body(&mut ws).unwrap();
        }
        let mut rs = ReadStream::new(&buf);
        let _ = rs.read_u8().unwrap(); // type
        let data_len = usize::from(rs.read_u8().unwrap());
        let mut parsed = IdIntOpt::default();
        parsed.parse_body(&mut rs, data_len).unwrap();
        assert_eq!(parsed.entries, opt.entries);
        assert_eq!(parsed.source_port, opt.source_port);
        assert!(parsed.is_valid());
    }

    #[test]
    fn entries_with_no_metadata_round_trip() {
        let entry = IdIntEntry {
            encrypted: true,
            hop_number: 5,
            ml: [0, 0, 0, 0],
            nonce: Some([7u8; 12]),
            metadata: Vec::new(),
            mac: [1, 2, 3, 4],
        };
        let mut buf = vec![0u8; entry.size()];
        {
            let mut ws = WriteStream::new(&mut buf);
            entry.serialize(&mut ws).unwrap();
        }
        let mut rs = ReadStream::new(&buf);
        let parsed = IdIntEntry::parse(&mut rs).unwrap();
        assert_eq!(parsed, entry);
    }
}
