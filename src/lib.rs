#![deny(missing_docs)]

//! `scion-proto` provides the packet-plane building blocks for the SCION
//! inter-domain network architecture: wire codecs for the SCION header
//! family, path representations and a path cache, the hop-by-hop/end-to-end
//! extension engine, and a socket layer tying them together.
//!
//! # Examples
//!
//! ## Building and parsing a loopback packet
//! ```
//! use scion_proto::addr::{Address, Endpoint, IPAddress, Isd, Asn, IsdAsn};
//! use scion_proto::hdr::UdpHeader;
//! use scion_proto::path::RawPath;
//! use scion_proto::socket::{L4, ScionPackager};
//! use std::net::Ipv4Addr;
//!
//! let ia = IsdAsn::new(Isd(1), Asn(0xff00_0000_0001));
//! let local = Endpoint::new(Address::new(ia, IPAddress::V4(Ipv4Addr::new(127, 0, 0, 1))), 40000);
//! let remote = Endpoint::new(Address::new(ia, IPAddress::V4(Ipv4Addr::new(127, 0, 0, 1))), 80);
//! let path = RawPath::empty(ia);
//!
//! let mut packager = ScionPackager::new(0);
//! packager.set_local_ep(local).unwrap();
//! let cache = packager
//!     .pack(&path, Some(&remote), &[], &[], L4::Udp(UdpHeader::default()), b"hello")
//!     .unwrap();
//! assert!(!cache.bytes().is_empty());
//! ```

/// Stable error taxonomy shared by every fallible operation in this crate.
pub mod error;

/// Internet checksum helpers shared by every L4 header and the SCION
/// pseudo-header.
pub mod checksum;

/// Unified bit-level reader/writer used by every wire structure.
pub mod bitstream;

/// ISD/ASN identifiers, generic IP addresses, SCION addresses, and endpoints.
pub mod addr;

/// Wire structures for the SCION header family.
pub mod hdr;

/// Path representations: raw wire paths, path digests, and the heap
/// `Path` object tracked by the path cache.
pub mod path;

/// The hop-by-hop/end-to-end extension engine and the ID-INT telemetry
/// extension.
pub mod ext;

/// Header caching, packet assembly/parsing, and the SCMP handler chain
/// driving the socket layer.
pub mod socket;

/// The control-plane boundary: the `DaemonClient` trait that drives the
/// path cache, independent of any concrete transport.
pub mod daemon;

// Shared non-cryptographic mixing round used by path digests and flow labels.
pub(crate) mod hash;
