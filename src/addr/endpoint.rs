//! SCION endpoint: a SCION address paired with a port.

use super::address::Address;
use super::ip::IPAddress;
use super::isd_asn::IsdAsn;
use crate::error::Error;
use std::fmt;
use std::str::FromStr;

/// A SCION endpoint: `(IsdAsn, host address, port)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    address: Address,
    port: u16,
}

impl Endpoint {
    /// Builds an endpoint from an address and a port.
    pub fn new(address: Address, port: u16) -> Self {
        Endpoint { address, port }
    }

    /// The address part.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The ISD-ASN part of the address.
    pub fn isd_asn(&self) -> IsdAsn {
        self.address.isd_asn()
    }

    /// The host address part.
    pub fn host(&self) -> &IPAddress {
        self.address.host()
    }

    /// The port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// True iff the address is fully specified and the port is nonzero.
    pub fn is_fully_specified(&self) -> bool {
        self.address.is_fully_specified() && self.port != 0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.address.host() {
            IPAddress::V6(..) => write!(f, "[{}]:{}", self.address, self.port),
            IPAddress::V4(_) => write!(f, "{}:{}", self.address, self.port),
        }
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        if let Some(rest) = s.strip_prefix('[') {
            let close = rest
                .find(']')
                .ok_or_else(|| Error::SyntaxError(format!("unterminated bracket: {}", s)))?;
            let inner = &rest[..close];
            let after = &rest[close + 1..];
            let address: Address = inner.parse()?;
            let port = match after.strip_prefix(':') {
                Some(p) if !p.is_empty() => p
                    .parse()
                    .map_err(|_| Error::SyntaxError(format!("invalid port: {}", s)))?,
                Some(_) => 0,
                None if after.is_empty() => 0,
                None => return Err(Error::SyntaxError(format!("invalid endpoint: {}", s))),
            };
            return Ok(Endpoint { address, port });
        }

        let colon = s
            .rfind(':')
            .ok_or_else(|| Error::SyntaxError(format!("invalid endpoint: {}", s)))?;
        let address: Address = s[..colon].parse()?;
        if matches!(address.host(), IPAddress::V6(..)) {
            return Err(Error::SyntaxError(format!(
                "IPv6 endpoint requires brackets: {}",
                s
            )));
        }
        let port: u16 = s[colon + 1..]
            .parse()
            .map_err(|_| Error::SyntaxError(format!("invalid port: {}", s)))?;
        Ok(Endpoint { address, port })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s3_ipv6_endpoint_round_trips() {
        let e: Endpoint = "[1-ff00:0:1,::1]:12345".parse().unwrap();
        assert_eq!(e.to_string(), "[1-ff00:0:1,::1]:12345");
        assert_eq!(e.port(), 12345);
    }

    #[test]
    fn ipv4_endpoint_round_trips() {
        let e: Endpoint = "1-ff00:0:1,127.0.0.1:80".parse().unwrap();
        assert_eq!(e.to_string(), "1-ff00:0:1,127.0.0.1:80");
    }

    #[test]
    fn ipv6_without_brackets_is_rejected() {
        assert!("1-ff00:0:1,::1:80".parse::<Endpoint>().is_err());
    }

    #[test]
    fn bracket_form_with_omitted_port_defaults_to_zero() {
        let e: Endpoint = "[1-ff00:0:1,::1]".parse().unwrap();
        assert_eq!(e.port(), 0);
    }
}
