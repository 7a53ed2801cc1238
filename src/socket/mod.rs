//! The socket layer: L4 envelopes, flow-label hashing, the per-flow header
//! cache, and the packager that ties endpoint state to both.

pub mod flowlabel;
pub mod header_cache;
pub mod l4;
pub mod packager;
pub mod scmp_handler;

pub use flowlabel::fixed_hash;
pub use header_cache::HeaderCache;
pub use l4::L4;
pub use packager::{log_only_scmp_callback, ParsedPacket, ScionPackager};
pub use scmp_handler::{ScmpHandler, ScmpHandlerChain};
