/// Secret string types that redact values in debug output for security.
pub use secrecy::{ExposeSecret, SecretString};

use crate::protocol::types::Identify;

/// Credentials presented to the gateway during the Identify step of the
/// handshake. Immutable for the lifetime of a [`crate::Client`].
///
/// The token is optional; projects with public channels can identify with
/// the project id alone.
#[derive(Clone, Debug)]
pub struct AuthParameters {
    project_id: String,
    token: Option<SecretString>,
}

impl AuthParameters {
    #[must_use]
    pub fn new<S: Into<String>>(project_id: S, token: Option<String>) -> Self {
        Self {
            project_id: project_id.into(),
            token: token.map(SecretString::from),
        }
    }

    /// Returns the project identifier.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Returns the token, if one was supplied.
    #[must_use]
    pub fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    pub(crate) fn identify(&self) -> Identify {
        Identify {
            project_id: self.project_id.clone(),
            token: self.token.as_ref().map(|t| t.expose_secret().to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_the_token() {
        let auth = AuthParameters::new("project_0", Some("leap_token_abc".to_owned()));
        let debug = format!("{auth:?}");

        assert!(debug.contains("project_0"));
        assert!(!debug.contains("leap_token_abc"));
    }

    #[test]
    fn identify_exposes_the_token_on_the_wire() {
        let auth = AuthParameters::new("project_0", Some("leap_token_abc".to_owned()));
        let identify = auth.identify();

        assert_eq!(identify.project_id, "project_0");
        assert_eq!(identify.token.as_deref(), Some("leap_token_abc"));
    }

    #[test]
    fn identify_omits_an_absent_token() {
        let auth = AuthParameters::new("project_0", None);
        let json = serde_json::to_value(auth.identify()).unwrap();

        assert_eq!(json, serde_json::json!({ "project_id": "project_0" }));
    }
}
