//! The extension engine: alignment-aware sizing, emission, and parsing of
//! hop-by-hop and end-to-end option TLV streams.

pub mod idint;

pub use idint::{IdIntEntry, IdIntOpt};

use crate::bitstream::{ReadStream, StreamResult, WriteStream};
use crate::error::{Error, Result};
use crate::hdr::opts::OptType;

/// Which options area an extension belongs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtCategory {
    /// The hop-by-hop options header, processed by every router on path.
    Hbh,
    /// The end-to-end options header, processed only by the endpoints.
    E2e,
}

/// A hop-by-hop or end-to-end extension: something that occupies one
/// option TLV (or, for ID-INT, a main option plus an entry sub-stream)
/// within an options header.
///
/// `is_valid`/`set_valid`/`set_invalid` track two independent things
/// depending on direction: on the parse path, `set_valid` marks "this
/// extension's data reflects something actually present in the packet";
/// on the emit path, the caller calls `set_valid` to mean "emit this
/// extension". The two flows never interact within a single call.
pub trait Extension: std::fmt::Debug {
    /// Which options area this extension belongs in.
    fn category(&self) -> ExtCategory;
    /// This extension's option type.
    fn opt_type(&self) -> OptType;
    /// Required alignment as `(multiple, remainder)`: the extension's TLV
    /// must start at a byte offset (from the start of the options area)
    /// congruent to `remainder` modulo `multiple`.
    fn alignment(&self) -> (usize, usize) {
        (1, 0)
    }
    /// Size of this extension's own TLV (type + length + data, and for
    /// ID-INT, its entry sub-stream), excluding any padding before it.
    fn own_size(&self) -> usize;
    /// Serializes this extension's TLV, starting at a byte-aligned
    /// position that already satisfies `alignment()`.
    fn serialize_body(&self, ws: &mut WriteStream) -> StreamResult<()>;
    /// Parses this extension's body given its `dataLen` (the type byte
    /// has already been consumed; for non-length-prefixed Pad1 this is
    /// never called). Marks the extension valid on success.
    fn parse_body(&mut self, rs: &mut ReadStream, data_len: usize) -> Result<()>;
    /// True if this extension's data reflects the packet (parse path) or
    /// the caller wants it emitted (emit path).
    fn is_valid(&self) -> bool;
    /// See [`Extension::is_valid`].
    fn set_valid(&mut self);
    /// See [`Extension::is_valid`].
    fn set_invalid(&mut self);
}

fn pad_to(pos: usize, multiple: usize, remainder: usize) -> usize {
    if multiple <= 1 {
        return 0;
    }
    let r = remainder % multiple;
    let cur = pos % multiple;
    if cur <= r {
        r - cur
    } else {
        multiple - cur + r
    }
}

/// Computes the total serialized size of an options header carrying
/// `exts` in order, including the 2-byte fixed prefix and padding to a
/// 4-byte boundary.
pub fn compute_size(exts: &[&dyn Extension]) -> usize {
    let mut pos = 0usize;
    for ext in exts {
        let (m, r) = ext.alignment();
        pos += pad_to(pos, m, r);
        pos += ext.own_size();
    }
    (2 + pos + 3) & !3
}

fn write_padding(ws: &mut WriteStream, mut pad: usize) -> StreamResult<()> {
    while pad > 0 {
        if pad == 1 {
            ws.write_u8(OptType::Pad1.as_u8())?;
            pad = 0;
        } else {
            let dlen = (pad - 2).min(255);
            ws.write_u8(OptType::PadN.as_u8())?;
            ws.write_u8(dlen as u8)?;
            for _ in 0..dlen {
                ws.write_u8(0)?;
            }
            pad -= 2 + dlen;
        }
    }
    Ok(())
}

/// Emits a full options header (next-header byte, length byte, then each
/// extension in order with inserted Pad1/PadN, then final padding to a
/// 4-byte boundary).
pub fn serialize(next_header: u8, exts: &[&dyn Extension], ws: &mut WriteStream) -> StreamResult<()> {
    let total = compute_size(exts);
    ws.write_u8(next_header)?;
    ws.write_u8((total / 4) as u8)?;
    let mut pos = 0usize;
    for ext in exts {
        let (m, r) = ext.alignment();
        let pad = pad_to(pos, m, r);
        write_padding(ws, pad)?;
        pos += pad;
        ext.serialize_body(ws)?;
        pos += ext.own_size();
    }
    write_padding(ws, total - 2 - pos)?;
    Ok(())
}

/// Parses an options header, dispatching recognized option types to the
/// matching extension in `registry` (marking it valid) and skipping
/// anything else. All extensions in `registry` are marked invalid first.
/// Returns the header's `next_header` byte.
pub fn parse(rs: &mut ReadStream, registry: &mut [&mut dyn Extension]) -> Result<u8> {
    for ext in registry.iter_mut() {
        ext.set_invalid();
    }
    let next_header = rs.read_u8().map_err(Error::from)?;
    let hdr_len = rs.read_u8().map_err(Error::from)?;
    let total = usize::from(hdr_len) * 4;
    if total < 2 {
        return Err(Error::InvalidPacket("options header too small".into()));
    }
    let mut remaining = total - 2;
    while remaining > 0 {
        let opt_type = rs.read_u8().map_err(Error::from)?;
        remaining -= 1;
        if opt_type == OptType::Pad1.as_u8() {
            continue;
        }
        let data_len = usize::from(rs.read_u8().map_err(Error::from)?);
        remaining -= 1;
        if data_len > remaining {
            return Err(Error::InvalidPacket("option dataLen overruns header".into()));
        }
        let ty = OptType::from_u8(opt_type);
        let mut dispatched = false;
        for ext in registry.iter_mut() {
            if ext.opt_type().as_u8() == ty.as_u8() {
                ext.parse_body(rs, data_len)?;
                ext.set_valid();
                dispatched = true;
                break;
            }
        }
        if !dispatched {
            rs.advance_bytes(data_len).map_err(Error::from)?;
        }
        remaining -= data_len;
    }
    Ok(next_header)
}

/// Adapts [`crate::hdr::opts::Spao`] to the extension engine so it can be
/// mixed with ID-INT (or any other registered extension) in a single
/// options header instead of requiring a separate pass over
/// [`crate::hdr::opts::OptsHeader`].
#[derive(Debug, Clone)]
pub struct SpaoExtension {
    /// The wrapped SPAO payload.
    pub spao: crate::hdr::opts::Spao,
    valid: bool,
}

impl SpaoExtension {
    /// Wraps a SPAO payload for emission.
    pub fn new(spao: crate::hdr::opts::Spao) -> Self {
        SpaoExtension { spao, valid: true }
    }
}

impl Extension for SpaoExtension {
    fn category(&self) -> ExtCategory {
        ExtCategory::E2e
    }

    fn opt_type(&self) -> OptType {
        OptType::Spao
    }

    fn own_size(&self) -> usize {
        2 + self.spao.data_len()
    }

    fn serialize_body(&self, ws: &mut WriteStream) -> StreamResult<()> {
        ws.write_u8(OptType::Spao.as_u8())?;
        ws.write_u8(self.spao.data_len() as u8)?;
        self.spao.serialize(ws)
    }

    fn parse_body(&mut self, rs: &mut ReadStream, data_len: usize) -> Result<()> {
        self.spao = crate::hdr::opts::Spao::parse(rs, data_len)?;
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

    #[derive(Debug)]
    struct FixedExt {
        opt_type: OptType,
        align: (usize, usize),
        data: Vec<u8>,
        valid: bool,
    }

    impl Extension for FixedExt {
        fn category(&self) -> ExtCategory {
            ExtCategory::Hbh
        }
        fn opt_type(&self) -> OptType {
            self.opt_type
        }
        fn alignment(&self) -> (usize, usize) {
            self.align
        }
        fn own_size(&self) -> usize {
            2 + self.data.len()
        }
        fn serialize_body(&self, ws: &mut WriteStream) -> StreamResult<()> {
            ws.write_u8(self.opt_type.as_u8())?;
            ws.write_u8(self.data.len() as u8)?;
            ws.write_bytes(&self.data)
        }
        fn parse_body(&mut self, rs: &mut ReadStream, data_len: usize) -> Result<()> {
            let mut data = vec![0u8; data_len];
            rs.read_bytes(&mut data).map_err(Error::from)?;
            self.data = data;
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

    #[test]
    fn round_trips_one_extension_with_alignment_padding() {
        let ext = FixedExt {
            opt_type: OptType::Spao,
            align: (4, 2),
            data: vec![1, 2, 3],
            valid: true,
        };
        let exts: Vec<&dyn Extension> = vec![&ext];
        let size = compute_size(&exts);
        let mut buf = vec![0u8; size];
        {
            let mut ws = WriteStream::new(&mut buf);
            serialize(crate::hdr::proto::UDP, &exts, &mut ws).unwrap();
        }
        assert_eq!(size % 4, 0);

        let mut parsed = FixedExt {
            opt_type: OptType::Spao,
            align: (4, 2),
            data: Vec::new(),
            valid: false,
        };
        let mut rs = ReadStream::new(&buf);
        let mut registry: Vec<&mut dyn Extension> = vec![&mut parsed];
        let next_header = parse(&mut rs, &mut registry).unwrap();
        assert_eq!(next_header, crate::hdr::proto::UDP);
        assert!(parsed.is_valid());
        assert_eq!(parsed.data, vec![1, 2, 3]);
    }

    #[test]
    fn spao_extension_round_trips_through_the_engine() {
        let ext = SpaoExtension::new(crate::hdr::opts::Spao {
            spi: 7,
            algorithm: 1,
            timestamp: 0x0102_0304_0506,
            authenticator: vec![0xab; 8],
        });
        let exts: Vec<&dyn Extension> = vec![&ext];
        let size = compute_size(&exts);
        let mut buf = vec![0u8; size];
        {
            let mut ws = WriteStream::new(&mut buf);
            serialize(crate::hdr::proto::UDP, &exts, &mut ws).unwrap();
        }

        let mut parsed = SpaoExtension::new(crate::hdr::opts::Spao {
            spi: 0,
            algorithm: 0,
            timestamp: 0,
            authenticator: Vec::new(),
        });
        parsed.valid = false;
        let mut rs = ReadStream::new(&buf);
        let mut registry: Vec<&mut dyn Extension> = vec![&mut parsed];
        parse(&mut rs, &mut registry).unwrap();
        assert!(parsed.is_valid());
        assert_eq!(parsed.spao, ext.spao);
    }
}
