use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;

use crate::session::SessionState;

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Error related to sending while the session is not connected
    NotConnected,
    /// Error related to invalid input given to the client
    Validation,
    /// Error related to encoding or decoding wire envelopes
    Protocol,
    /// Error related to the underlying WebSocket transport
    Transport,
    /// The background session task has terminated
    SessionGone,
}

#[derive(Debug)]
pub struct Error {
    kind: Kind,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    backtrace: Backtrace,
}

impl Error {
    pub fn with_source<S: StdError + Send + Sync + 'static>(kind: Kind, source: S) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
            backtrace: Backtrace::capture(),
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    pub fn inner(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        let e = self.source.as_deref()?;
        e.downcast_ref::<E>()
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Validation {
            reason: message.into(),
        }
        .into()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) => write!(f, "{:?}: {}", self.kind, src),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/// A service payload was submitted while the session was not in the
/// [`SessionState::Connected`] state. The payload was not sent and the
/// session is unaffected.
#[non_exhaustive]
#[derive(Debug, Clone, Copy)]
pub struct NotConnected {
    /// The state the session was in when the send was attempted.
    pub state: SessionState,
}

impl fmt::Display for NotConnected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot send a service payload while the session is {:?}",
            self.state
        )
    }
}

impl StdError for NotConnected {}

impl From<NotConnected> for Error {
    fn from(err: NotConnected) -> Self {
        Error::with_source(Kind::NotConnected, err)
    }
}

#[non_exhaustive]
#[derive(Debug)]
pub struct Validation {
    pub reason: String,
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid: {}", self.reason)
    }
}

impl StdError for Validation {}

impl From<Validation> for Error {
    fn from(err: Validation) -> Self {
        Error::with_source(Kind::Validation, err)
    }
}

/// The background session task is no longer running, so commands can no
/// longer be delivered to it.
#[non_exhaustive]
#[derive(Debug, Clone, Copy)]
pub struct SessionGone;

impl fmt::Display for SessionGone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "the session task has terminated")
    }
}

impl StdError for SessionGone {}

impl From<SessionGone> for Error {
    fn from(err: SessionGone) -> Self {
        Error::with_source(Kind::SessionGone, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::with_source(Kind::Protocol, e)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::with_source(Kind::Transport, e)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::with_source(Kind::Validation, e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_connected_display_names_the_state() {
        let err = NotConnected {
            state: SessionState::Authenticating,
        };

        assert_eq!(
            err.to_string(),
            "cannot send a service payload while the session is Authenticating"
        );
    }

    #[test]
    fn not_connected_into_error_keeps_kind_and_state() {
        let error: Error = NotConnected {
            state: SessionState::Idle,
        }
        .into();

        assert_eq!(error.kind(), Kind::NotConnected);
        let inner = error.downcast_ref::<NotConnected>().unwrap();
        assert_eq!(inner.state, SessionState::Idle);
    }

    #[test]
    fn validation_carries_reason() {
        let error = Error::validation("endpoint is not a URL");
        assert_eq!(error.kind(), Kind::Validation);
        assert!(error.to_string().contains("endpoint is not a URL"));
    }
}
