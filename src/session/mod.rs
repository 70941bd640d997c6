//! Session lifecycle management.
//!
//! One background task per client owns the transport handle and every piece
//! of mutable session state. Socket frames, caller commands, and timer
//! firings are all serialized through that task's event loop, so state
//! transitions never race.

mod liveness;
mod task;

pub(crate) use task::{Command, SessionTask};

/// Lifecycle state of the gateway session.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection has been requested yet.
    Idle,
    /// A transport connection is being established.
    Connecting,
    /// The transport is open; Hello was received and Identify sent.
    Authenticating,
    /// The session-init event arrived; service payloads may be sent.
    Connected,
    /// The connection failed. The session reconnects on its own for
    /// recoverable failures and waits for an explicit `connect()` after
    /// fatal ones.
    Errored,
}

impl SessionState {
    /// Check whether service payloads can currently be sent.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Event type the gateway dispatches once the session is fully established.
pub(crate) const SESSION_INIT_EVENT: &str = "INIT";
