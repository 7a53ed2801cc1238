//! Wire structures for the SCION header family: common+address header, path
//! fields, HBH/E2E option envelopes, SCMP, and UDP.

pub mod opts;
pub mod path_fields;
pub mod scion;
pub mod scmp;
pub mod udp;

pub use opts::{OptType, OptsHeader, SciOpt, Spao};
pub use path_fields::{HopField, InfoField, PathMeta};
pub use scion::{CommonHeader, HostAddrType, PathType};
pub use scmp::{ScmpHeader, ScmpMessage, ScmpType};
pub use udp::UdpHeader;

/// Protocol/next-header numbers used on the wire.
pub mod proto {
    /// UDP.
    pub const UDP: u8 = 17;
    /// Hop-by-hop options header.
    pub const HBH_OPT: u8 = 200;
    /// End-to-end options header.
    pub const E2E_OPT: u8 = 201;
    /// SCION Control Message Protocol.
    pub const SCMP: u8 = 202;
}
