//! Stable error taxonomy shared by every fallible operation in this crate.
//!
//! Every public operation returns `Result<T, Error>`. The variant set is
//! intentionally small and stable so callers can pattern-match on it across
//! crate versions instead of matching on message text.

use std::fmt;

/// A stable, matchable error code.
///
/// Parsing failures never panic; they are reported through this type. Most
/// variants carry no payload because the taxonomy is meant to be pattern
/// matched, not inspected for detail - use `tracing` output (enabled at
/// `debug` level on the parse paths) to get a human-readable diagnosis.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The operation was cancelled (maps to the host's `ECANCELED`).
    #[error("operation cancelled")]
    Cancelled,
    /// A result is not yet available; the caller should retry later.
    #[error("operation pending")]
    Pending,
    /// An SCMP message was received and handled instead of ordinary payload.
    /// This is a signal value, not a fault - callers must check for it
    /// explicitly when they care about the distinction.
    #[error("SCMP message received")]
    ScmpReceived,
    /// An invariant internal to this crate was violated.
    #[error("internal logic error: {0}")]
    LogicError(String),
    /// The requested operation is recognized but not implemented.
    #[error("not implemented: {0}")]
    NotImplemented(String),
    /// An argument failed precondition checks.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Textual input did not match the expected grammar.
    #[error("syntax error: {0}")]
    SyntaxError(String),
    /// The destination buffer was too small to hold the result.
    #[error("buffer too small")]
    BufferTooSmall,
    /// The packet to be built would exceed the maximum SCION packet size.
    #[error("packet too big")]
    PacketTooBig,
    /// An IPv6 link-local address was given without a required zone id.
    #[error("address requires a zone identifier")]
    RequiresZone,
    /// `pack` was called before a fully-specified local host and port were bound.
    #[error("no local host address bound")]
    NoLocalHostAddr,
    /// A received packet failed structural validation.
    #[error("invalid packet: {0}")]
    InvalidPacket(String),
    /// A received packet's L4 checksum did not verify.
    #[error("checksum error")]
    ChecksumError,
    /// A received packet's destination address did not match the local endpoint.
    #[error("destination address mismatch")]
    DstAddrMismatch,
    /// A received packet's source address did not match the bound remote endpoint.
    #[error("source address mismatch")]
    SrcAddrMismatch,
}

impl Error {
    /// Returns the stable textual name of this error's variant, for logging
    /// or cross-language interop where the `Display` message is too verbose.
    pub fn code_name(&self) -> &'static str {
        match self {
            Error::Cancelled => "Cancelled",
            Error::Pending => "Pending",
            Error::ScmpReceived => "ScmpReceived",
            Error::LogicError(_) => "LogicError",
            Error::NotImplemented(_) => "NotImplemented",
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::SyntaxError(_) => "SyntaxError",
            Error::BufferTooSmall => "BufferTooSmall",
            Error::PacketTooBig => "PacketTooBig",
            Error::RequiresZone => "RequiresZone",
            Error::NoLocalHostAddr => "NoLocalHostAddr",
            Error::InvalidPacket(_) => "InvalidPacket",
            Error::ChecksumError => "ChecksumError",
            Error::DstAddrMismatch => "DstAddrMismatch",
            Error::SrcAddrMismatch => "SrcAddrMismatch",
        }
    }
}

/// A condition-level classification of an error, used to match this crate's
/// errors against host OS error codes the way `std::error_code` categories do
/// in the reference implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCondition {
    /// The operation was cancelled.
    Cancelled,
    /// The operation would block and should be retried.
    WouldBlock,
}

/// Classify a host I/O error the way the reference implementation's
/// `ErrorCondition::equivalent` does: `ECANCELED` maps to `Cancelled`,
/// `EAGAIN`/`EWOULDBLOCK` map to `WouldBlock`. Returns `None` for anything
/// else, since most `io::Error`s have no corresponding SCION-level condition.
pub fn classify_io_error(err: &std::io::Error) -> Option<ErrorCondition> {
    use std::io::ErrorKind::*;
    match err.kind() {
        Interrupted => Some(ErrorCondition::Cancelled),
        WouldBlock => Some(ErrorCondition::WouldBlock),
        _ => None,
    }
}

impl fmt::Display for ErrorCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCondition::Cancelled => write!(f, "cancelled"),
            ErrorCondition::WouldBlock => write!(f, "would block"),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_names_are_stable() {
        assert_eq!(Error::ChecksumError.code_name(), "ChecksumError");
        assert_eq!(Error::InvalidPacket("x".into()).code_name(), "InvalidPacket");
    }

    #[test]
    fn classifies_would_block() {
        let err = std::io::Error::from(std::io::ErrorKind::WouldBlock);
        assert_eq!(classify_io_error(&err), Some(ErrorCondition::WouldBlock));
    }
}
