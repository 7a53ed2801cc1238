//! ISD/ASN identifiers, generic IP addresses, SCION addresses, and endpoints.

pub mod address;
pub mod endpoint;
pub mod ip;
pub mod isd_asn;

pub use address::Address;
pub use endpoint::Endpoint;
pub use ip::{FormatOpts, IPAddress};
pub use isd_asn::{Asn, Isd, IsdAsn};
