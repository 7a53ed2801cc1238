//! ISD, ASN, and the packed ISD-ASN identifier.

use crate::error::Error;
use std::fmt;
use std::str::FromStr;

/// A 16-bit Isolation Domain identifier. Zero denotes "unspecified".
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Isd(pub u16);

impl Isd {
    /// The unspecified ISD.
    pub const UNSPECIFIED: Isd = Isd(0);

    /// True if this is the unspecified ISD.
    pub fn is_unspecified(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Isd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Isd {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        s.parse::<u16>()
            .map(Isd)
            .map_err(|_| Error::SyntaxError(format!("invalid ISD: {}", s)))
    }
}

/// A 48-bit Autonomous System Number. Zero denotes "unspecified".
///
/// Two textual forms round-trip: a decimal integer for values that fit in a
/// `u32` (the historical "BGP form"), or three colon-separated groups of
/// 1-4 lowercase hex digits for everything else.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Asn(pub u64);

impl Asn {
    /// The unspecified ASN.
    pub const UNSPECIFIED: Asn = Asn(0);
    const MASK: u64 = 0x0000_ffff_ffff_ffff;

    /// True if this is the unspecified ASN.
    pub fn is_unspecified(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Asn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 <= u64::from(u32::MAX) {
            write!(f, "{}", self.0)
        } else {
            let hi = (self.0 >> 32) & 0xffff;
            let mid = (self.0 >> 16) & 0xffff;
            let lo = self.0 & 0xffff;
            write!(f, "{:x}:{:x}:{:x}", hi, mid, lo)
        }
    }
}

impl FromStr for Asn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        if s.is_empty() {
            return Err(Error::SyntaxError("empty ASN".into()));
        }
        if s.bytes().all(|b| b.is_ascii_digit()) {
            let v: u64 = s
                .parse()
                .map_err(|_| Error::SyntaxError(format!("invalid ASN: {}", s)))?;
            if v > u64::from(u32::MAX) {
                return Err(Error::SyntaxError(format!(
                    "decimal ASN out of range: {}",
                    s
                )));
            }
            return Ok(Asn(v));
        }

        let groups: Vec<&str> = s.split(':').collect();
        if groups.len() != 3 {
            return Err(Error::SyntaxError(format!("invalid ASN: {}", s)));
        }
        let mut value: u64 = 0;
        for g in &groups {
            if g.is_empty() || g.len() > 4 || !g.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(Error::SyntaxError(format!("invalid ASN: {}", s)));
            }
            let part = u64::from_str_radix(g, 16)
                .map_err(|_| Error::SyntaxError(format!("invalid ASN: {}", s)))?;
            value = (value << 16) | part;
        }
        Ok(Asn(value & Asn::MASK))
    }
}

/// Packed 64-bit ISD-ASN identifier: the top 16 bits are the ISD, the
/// bottom 48 the ASN.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IsdAsn(pub u64);

impl IsdAsn {
    /// The unspecified ISD-ASN.
    pub const UNSPECIFIED: IsdAsn = IsdAsn(0);

    /// Builds an ISD-ASN from its two parts.
    pub fn new(isd: Isd, asn: Asn) -> Self {
        IsdAsn((u64::from(isd.0) << 48) | (asn.0 & 0x0000_ffff_ffff_ffff))
    }

    /// The ISD part.
    pub fn isd(self) -> Isd {
        Isd((self.0 >> 48) as u16)
    }

    /// The ASN part.
    pub fn asn(self) -> Asn {
        Asn(self.0 & 0x0000_ffff_ffff_ffff)
    }

    /// True iff either half is zero.
    pub fn is_unspecified(self) -> bool {
        self.isd().is_unspecified() || self.asn().is_unspecified()
    }

    /// True iff `self` is unspecified or equals `other`. Used to implement
    /// wildcard matching of a bound local address against received packets.
    pub fn matches(self, other: IsdAsn) -> bool {
        self.is_unspecified() || self == other
    }

    /// Sum of the two 32-bit halves of the packed value, for Internet
    /// checksum folding by higher layers.
    pub fn checksum(self) -> u32 {
        let hi = (self.0 >> 32) as u32;
        let lo = self.0 as u32;
        hi.wrapping_add(lo)
    }
}

impl fmt::Display for IsdAsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.isd(), self.asn())
    }
}

impl FromStr for IsdAsn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let dash = s
            .find('-')
            .ok_or_else(|| Error::SyntaxError(format!("invalid ISD-ASN: {}", s)))?;
        let isd: Isd = s[..dash].parse()?;
        let asn: Asn = s[dash + 1..].parse()?;
        Ok(IsdAsn::new(isd, asn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_isd_asn_parse_format() {
        let ia: IsdAsn = "1-ff00:0:1".parse().unwrap();
        assert_eq!(ia, IsdAsn::new(Isd(1), Asn(0xff00_0000_0001)));
        assert_eq!(ia.to_string(), "1-ff00:0:1");
    }

    #[test]
    fn s1_missing_dash_is_syntax_error() {
        let err = "1024".parse::<IsdAsn>().unwrap_err();
        assert_eq!(err.code_name(), "SyntaxError");
    }

    #[test]
    fn decimal_asn_round_trips() {
        let a: Asn = "64512".parse().unwrap();
        assert_eq!(a.to_string(), "64512");
    }

    #[test]
    fn matches_is_wildcard_on_unspecified() {
        let any = IsdAsn::UNSPECIFIED;
        let concrete = IsdAsn::new(Isd(1), Asn(1));
        assert!(any.matches(concrete));
        assert!(concrete.matches(concrete));
        assert!(!concrete.matches(IsdAsn::new(Isd(2), Asn(1))));
    }
}
