use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::Result;

/// Integer discriminator selecting the semantic type of an [`Envelope`].
#[non_exhaustive]
#[derive(Serialize_repr, Deserialize_repr, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// Server to client: an application event forwarded from the service.
    Dispatch = 0,
    /// Server to client: handshake opener carrying `heartbeat_interval`.
    Hello = 1,
    /// Client to server: authentication with project id and optional token.
    Identify = 2,
    /// Bidirectional liveness beat with an optional tag.
    Heartbeat = 3,
    /// Server to client: acknowledgment of a heartbeat.
    HeartbeatAck = 4,
    /// Catch-all for opcodes this client does not recognize.
    #[serde(other)]
    Unknown = 255,
}

/// The two-field wire unit carrying one protocol message.
#[non_exhaustive]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Envelope {
    pub op: OpCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<Value>,
}

impl Envelope {
    #[must_use]
    pub fn new(op: OpCode, d: Option<Value>) -> Self {
        Self { op, d }
    }

    /// Build an envelope from a typed control payload.
    pub fn control<T: Serialize>(op: OpCode, payload: &T) -> Result<Self> {
        Ok(Self {
            op,
            d: Some(serde_json::to_value(payload)?),
        })
    }

    /// Encode into the text-frame representation.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a raw text frame.
    ///
    /// Fails if the frame is not a JSON object with an integer `op` field.
    /// An unrecognized opcode is not an error; it decodes to
    /// [`OpCode::Unknown`] so the session can drop it with a diagnostic.
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Deserialize the payload into a typed control message.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(
            self.d.clone().unwrap_or(Value::Null),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn round_trip_preserves_structure() {
        let envelope = Envelope::new(OpCode::Heartbeat, Some(json!({ "tag": "x" })));

        let decoded = Envelope::decode(&envelope.encode().unwrap()).unwrap();

        assert_eq!(decoded, envelope);
    }

    #[test]
    fn encode_omits_absent_payload() {
        let envelope = Envelope::new(OpCode::Heartbeat, None);

        assert_eq!(envelope.encode().unwrap(), r#"{"op":3}"#);
    }

    #[test]
    fn decode_rejects_missing_opcode() {
        assert!(Envelope::decode(r#"{"d":{"tag":"x"}}"#).is_err());
    }

    #[test]
    fn decode_rejects_non_json_frame() {
        assert!(Envelope::decode("not json").is_err());
    }

    #[test]
    fn decode_tolerates_unrecognized_opcode() {
        let envelope = Envelope::decode(r#"{"op":99,"d":null}"#).unwrap();

        assert_eq!(envelope.op, OpCode::Unknown);
    }

    #[test]
    fn payload_of_empty_envelope_fills_optional_fields() {
        use crate::protocol::types::Heartbeat;

        let envelope = Envelope::decode(r#"{"op":3}"#).unwrap();
        let beat: Heartbeat = envelope.payload().unwrap();

        assert_eq!(beat.tag, None);
    }
}
