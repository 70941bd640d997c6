//! Wire protocol for the gateway connection.
//!
//! Every frame on the socket is a JSON text frame carrying one [`Envelope`]:
//! an integer opcode plus an optional opaque payload. The codec here is
//! purely structural; payload interpretation belongs to the session (for
//! control opcodes) and to the caller (for dispatch events).

pub mod close;
pub mod envelope;
pub mod types;

pub use close::{BAD_ROUTE, CloseCodeInfo, classify};
pub use envelope::{Envelope, OpCode};
pub use types::{ServiceEvent, ServicePayload};
