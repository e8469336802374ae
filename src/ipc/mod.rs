//! Inter-process request/reply protocol.
//!
//! # Data Flow
//! ```text
//! Front end                                   Worker
//!   RequestEnvelope { id, method, url, ... }
//!     → channel.rs (JSON line) ── stdin ──▶  channel.rs
//!                                              → handler
//!   channel.rs  ◀── stdout ── (JSON line) ←  ReplyEnvelope { id, data | errorCode }
//!     → demultiplex by id
//! ```
//!
//! # Design Decisions
//! - One JSON document per line; no length prefix needed
//! - Every envelope carries a request id; replies are matched by id, never
//!   by arrival order
//! - Transport-agnostic: anything AsyncRead/AsyncWrite works (child pipes,
//!   in-memory duplex)

pub mod channel;
pub mod envelope;

pub use channel::{spawn_writer, ChannelError, MessageReader, MessageSender};
pub use envelope::{
    correlation_id, BodyEncoding, EnvelopeError, HeaderFields, ReplyEnvelope, ReplyOutcome,
    RequestEnvelope, RequestId, RequestType, X_REQUEST_ID,
};
