//! SCION address: an ISD-ASN paired with a host address.

use super::ip::IPAddress;
use super::isd_asn::IsdAsn;
use crate::error::Error;
use std::fmt;
use std::str::FromStr;

/// A SCION address: `(IsdAsn, host address)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    isd_asn: IsdAsn,
    host: IPAddress,
}

impl Address {
    /// Builds an address from its parts.
    pub fn new(isd_asn: IsdAsn, host: IPAddress) -> Self {
        Address { isd_asn, host }
    }

    /// The ISD-ASN part.
    pub fn isd_asn(&self) -> IsdAsn {
        self.isd_asn
    }

    /// The host address part.
    pub fn host(&self) -> &IPAddress {
        &self.host
    }

    /// True iff both the ISD-ASN and the host are fully specified.
    pub fn is_fully_specified(&self) -> bool {
        !self.isd_asn.is_unspecified() && !self.host.is_unspecified()
    }

    /// Componentwise wildcard match: the ISD-ASN and the host must each
    /// match (see [`IsdAsn::matches`] / [`IPAddress::matches`]).
    pub fn matches(&self, other: &Address) -> bool {
        self.isd_asn.matches(other.isd_asn) && self.host.matches(&other.host)
    }

    /// Sum of the ISD-ASN's and the host's checksum contributions.
    pub fn checksum(&self) -> u32 {
        self.isd_asn.checksum().wrapping_add(self.host.checksum())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.isd_asn, self.host)
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let comma = s
            .find(',')
            .ok_or_else(|| Error::SyntaxError(format!("invalid SCION address: {}", s)))?;
        let isd_asn: IsdAsn = s[..comma].parse()?;
        let host: IPAddress = s[comma + 1..].parse()?;
        Ok(Address { isd_asn, host })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::isd_asn::{Asn, Isd};

    #[test]
    fn parse_format_round_trip() {
        let a: Address = "1-ff00:0:1,127.0.0.1".parse().unwrap();
        assert_eq!(a.isd_asn(), IsdAsn::new(Isd(1), Asn(0xff00_0000_0001)));
        assert_eq!(a.to_string(), "1-ff00:0:1,127.0.0.1");
    }
}
