//! Byte-level HTTP/1.1 glue consumed by the engine core.
//!
//! # Data Flow
//! ```text
//! writer loop → request.rs  (head + body serialization → socket)
//! socket      → response.rs (head parse, body framing, full drain)
//! response    → options.rs  (Connection header semantics)
//! ```
//!
//! # Design Decisions
//! - Response parsing keeps leftover bytes in a retained buffer so
//!   back-to-back pipelined responses never lose stream position
//! - Bodies are always drained fully before a response is delivered

pub mod options;
pub mod request;
pub mod response;

pub use options::ConnectionOptions;
pub use request::write_request;
pub use response::read_response;
