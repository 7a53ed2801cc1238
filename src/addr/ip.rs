//! Generic IP address: the host part of a SCION address or endpoint.

use crate::error::Error;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// An IPv4 or IPv6 address, with an optional IPv6 zone identifier.
///
/// An IPv4-mapped IPv6 address (`::ffff:a.b.c.d`) is distinct from the
/// corresponding plain `IPv4`; use [`IPAddress::map4in6`] / `unmap4in6` to
/// convert explicitly between the two.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IPAddress {
    /// An IPv4 host address.
    V4(Ipv4Addr),
    /// An IPv6 host address, with an optional zone (scope) identifier.
    V6(Ipv6Addr, Option<String>),
}

/// Formatting modifiers for [`IPAddress`] `Display`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FormatOpts {
    /// Disable `::` zero-run compression even where RFC 5952 would use it.
    pub always_long: bool,
    /// Print hex digits upper-case instead of the RFC 5952 default lower-case.
    pub upper_case: bool,
}

impl IPAddress {
    /// The unspecified IPv4 address, `0.0.0.0`.
    pub fn unspecified_v4() -> Self {
        IPAddress::V4(Ipv4Addr::UNSPECIFIED)
    }

    /// The unspecified IPv6 address, `::`.
    pub fn unspecified_v6() -> Self {
        IPAddress::V6(Ipv6Addr::UNSPECIFIED, None)
    }

    /// True if this is the all-zero address of its family (the zone, if
    /// any, does not affect this).
    pub fn is_unspecified(&self) -> bool {
        match self {
            IPAddress::V4(a) => *a == Ipv4Addr::UNSPECIFIED,
            IPAddress::V6(a, _) => *a == Ipv6Addr::UNSPECIFIED,
        }
    }

    /// Wildcard-aware comparison: an unspecified address matches anything
    /// of the same family; otherwise addresses (and IPv6 zones) must be
    /// equal.
    pub fn matches(&self, other: &IPAddress) -> bool {
        if self.is_unspecified() {
            return matches!(
                (self, other),
                (IPAddress::V4(_), IPAddress::V4(_)) | (IPAddress::V6(..), IPAddress::V6(..))
            );
        }
        self == other
    }

    /// Converts an IPv4 address to its IPv4-mapped IPv6 form
    /// (`::ffff:a.b.c.d`). A no-op for an already-IPv6 address.
    pub fn map4in6(&self) -> IPAddress {
        match self {
            IPAddress::V4(a) => IPAddress::V6(a.to_ipv6_mapped(), None),
            v6 => v6.clone(),
        }
    }

    /// Converts an IPv4-mapped IPv6 address back to plain IPv4. Returns a
    /// clone unchanged if this is not an IPv4-mapped address.
    pub fn unmap4in6(&self) -> IPAddress {
        match self {
            IPAddress::V6(a, _) => match a.to_ipv4_mapped() {
                Some(v4) => IPAddress::V4(v4),
                None => self.clone(),
            },
            v4 => v4.clone(),
        }
    }

    /// Sum of this address's 16-bit big-endian words, contributing to an
    /// Internet checksum computed by a higher layer.
    pub fn checksum(&self) -> u32 {
        match self {
            IPAddress::V4(a) => {
                let o = a.octets();
                let w0 = u32::from(o[0]) << 8 | u32::from(o[1]);
                let w1 = u32::from(o[2]) << 8 | u32::from(o[3]);
                w0 + w1
            }
            IPAddress::V6(a, _) => a.segments().iter().map(|&s| u32::from(s)).sum(),
        }
    }

    /// Serialized size in bytes (4 for IPv4, 16 for IPv6).
    pub fn size(&self) -> usize {
        match self {
            IPAddress::V4(_) => 4,
            IPAddress::V6(..) => 16,
        }
    }

    /// Formats this address following RFC 5952, with the given modifiers.
    pub fn format(&self, opts: FormatOpts) -> String {
        match self {
            IPAddress::V4(a) => a.to_string(),
            IPAddress::V6(a, zone) => {
                let text = format_ipv6_rfc5952(a, opts);
                match zone {
                    Some(z) => format!("{}%{}", text, z),
                    None => text,
                }
            }
        }
    }
}

impl fmt::Display for IPAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(FormatOpts::default()))
    }
}

/// Formats an IPv6 address per RFC 5952: the longest run of two or more
/// all-zero groups is compressed to `::`; ties are broken by the leftmost
/// run.
fn format_ipv6_rfc5952(addr: &Ipv6Addr, opts: FormatOpts) -> String {
    let segs = addr.segments();

    if opts.always_long {
        return segs
            .iter()
            .map(|s| hex_group(*s, opts.upper_case))
            .collect::<Vec<_>>()
            .join(":");
    }

    // Find the longest run of zero groups (length >= 2), leftmost on ties.
    let mut best: Option<(usize, usize)> = None; // (start, len)
    let mut run_start = None;
    for i in 0..=8 {
        let is_zero = i < 8 && segs[i] == 0;
        if is_zero {
            if run_start.is_none() {
                run_start = Some(i);
            }
        } else if let Some(start) = run_start.take() {
            let len = i - start;
            if len >= 2 && best.map_or(true, |(_, blen)| len > blen) {
                best = Some((start, len));
            }
        }
    }

    match best {
        None => segs
            .iter()
            .map(|s| hex_group(*s, opts.upper_case))
            .collect::<Vec<_>>()
            .join(":"),
        Some((start, len)) => {
            let head: Vec<String> = segs[..start]
                .iter()
                .map(|s| hex_group(*s, opts.upper_case))
                .collect();
            let tail: Vec<String> = segs[start + len..]
                .iter()
                .map(|s| hex_group(*s, opts.upper_case))
                .collect();
            format!("{}::{}", head.join(":"), tail.join(":"))
        }
    }
}

fn hex_group(v: u16, upper: bool) -> String {
    if upper {
        format!("{:X}", v)
    } else {
        format!("{:x}", v)
    }
}

impl FromStr for IPAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        if let Some((addr, zone)) = s.split_once('%') {
            let a: Ipv6Addr = addr
                .parse()
                .map_err(|_| Error::SyntaxError(format!("invalid IPv6 address: {}", s)))?;
            if zone.is_empty() {
                return Err(Error::RequiresZone);
            }
            return Ok(IPAddress::V6(a, Some(zone.to_string())));
        }
        if let Ok(a) = s.parse::<Ipv4Addr>() {
            return Ok(IPAddress::V4(a));
        }
        if let Ok(a) = s.parse::<Ipv6Addr>() {
            return Ok(IPAddress::V6(a, None));
        }
        Err(Error::SyntaxError(format!("invalid IP address: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s2_longest_run_compressed() {
        let a = Ipv6Addr::from(0xfd00_0000_0000_1111_0000_0000_0000_ffffu128);
        let addr = IPAddress::V6(a, None);
        assert_eq!(addr.format(FormatOpts::default()), "fd00:0:0:1111::ffff");
    }

    #[test]
    fn s2_leftmost_run_wins_on_tie() {
        let a = Ipv6Addr::from(0xfd00_0000_0000_1111_2222_0000_0000_ffffu128);
        let addr = IPAddress::V6(a, None);
        assert_eq!(
            addr.format(FormatOpts::default()),
            "fd00::1111:2222:0:0:ffff"
        );
    }

    #[test]
    fn map_and_unmap_round_trip() {
        let v4 = IPAddress::V4(Ipv4Addr::new(192, 0, 2, 1));
        let mapped = v4.map4in6();
        assert_ne!(mapped, v4);
        assert_eq!(mapped.unmap4in6(), v4);
    }

    #[test]
    fn zone_requires_nonempty_suffix() {
        assert_eq!(
            "fe80::1%".parse::<IPAddress>().unwrap_err().code_name(),
            "RequiresZone"
        );
    }

    #[test]
    fn different_zones_are_distinct() {
        let a: IPAddress = "fe80::1%eth0".parse().unwrap();
        let b: IPAddress = "fe80::1%eth1".parse().unwrap();
        assert_ne!(a, b);
    }
}
