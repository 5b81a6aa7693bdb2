//! Wire protocol for Cascade.
//!
//! Defines the binary command envelope that heads every response frame, the
//! framed request codec, and the layered lookup-response format. Header
//! fields travel big-endian; byte-order conversion is this crate's job,
//! raw socket I/O is not.
//!
//! Decoding is explicit and bounds-checked at every layer. A too-short
//! buffer produces a typed error, never a read past the end.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod lookup;
pub mod message;

pub use codec::{CascadeCodec, FRAME_VERSION};
pub use envelope::{CommandEnvelope, DataEntry, IoHeader, ENVELOPE_SIZE, IO_HEADER_SIZE};
pub use error::{ProtoError, ProtoResult};
pub use lookup::{FileInfo, LookupResult};
pub use message::{Request, Script, ScriptKind, StatSnapshot, MAX_MESSAGE_SIZE};
