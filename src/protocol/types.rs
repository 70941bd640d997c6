use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server to client. Opens the handshake and sets the heartbeat cadence.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct Hello {
    /// Heartbeat cadence in milliseconds.
    pub heartbeat_interval: u64,
}

/// Client to server. Authenticates the session after Hello.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct Identify {
    pub project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Bidirectional liveness beat.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Heartbeat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// Server to client. Acknowledges a heartbeat.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct HeartbeatAck {
    #[serde(default)]
    pub tag: Option<String>,
    /// Round-trip latency in milliseconds, as measured by the gateway.
    #[serde(default)]
    pub latency: Option<u64>,
}

/// The wire form of a dispatch payload, used in both directions as the `d`
/// field of a Dispatch envelope.
#[non_exhaustive]
#[derive(Serialize, Deserialize, Debug, Clone, Builder, PartialEq)]
pub struct ServicePayload {
    /// Channel the event belongs to, if any.
    #[serde(rename = "c")]
    #[builder(into)]
    pub channel_id: Option<String>,
    /// Unicast delivery marker. Optional on the wire; omitted when absent.
    #[serde(rename = "u", default, skip_serializing_if = "Option::is_none")]
    pub unicast: Option<bool>,
    /// Event type string, e.g. `SUBSCRIBE` or `MESSAGE`.
    #[serde(rename = "e")]
    #[builder(into)]
    pub event_type: String,
    /// Opaque event data, passed through verbatim.
    #[serde(rename = "d")]
    pub data: Option<Value>,
}

/// Friendly view of an inbound [`ServicePayload`], handed to the caller.
/// Routing flags such as the unicast marker stay on the wire form.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceEvent {
    pub channel_id: Option<String>,
    pub event_type: String,
    pub data: Option<Value>,
}

impl From<ServicePayload> for ServiceEvent {
    fn from(payload: ServicePayload) -> Self {
        Self {
            channel_id: payload.channel_id,
            event_type: payload.event_type,
            data: payload.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn service_payload_uses_short_field_names() {
        let payload = ServicePayload::builder()
            .channel_id("abc123")
            .event_type("SUBSCRIBE")
            .build();

        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(
            json,
            json!({ "c": "abc123", "e": "SUBSCRIBE", "d": null })
        );
    }

    #[test]
    fn inbound_payload_decodes_with_null_channel() {
        let payload: ServicePayload =
            serde_json::from_value(json!({ "c": null, "e": "INIT", "d": { "ok": true } })).unwrap();
        let event = ServiceEvent::from(payload);

        assert_eq!(event.channel_id, None);
        assert_eq!(event.event_type, "INIT");
        assert_eq!(event.data, Some(json!({ "ok": true })));
    }

    #[test]
    fn unicast_flag_survives_the_wire_form() {
        let payload: ServicePayload =
            serde_json::from_value(json!({ "c": "abc123", "u": true, "e": "MESSAGE", "d": null }))
                .unwrap();
        assert_eq!(payload.unicast, Some(true));

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["u"], true);

        let event = ServiceEvent::from(payload);
        assert_eq!(event.event_type, "MESSAGE");
    }

    #[test]
    fn hello_requires_the_interval() {
        assert!(serde_json::from_value::<Hello>(json!({})).is_err());

        let hello: Hello =
            serde_json::from_value(json!({ "heartbeat_interval": 30000 })).unwrap();
        assert_eq!(hello.heartbeat_interval, 30000);
    }

    #[test]
    fn heartbeat_ack_fields_are_optional() {
        let ack: HeartbeatAck = serde_json::from_value(json!({})).unwrap();
        assert_eq!(ack, HeartbeatAck::default());

        let ack: HeartbeatAck =
            serde_json::from_value(json!({ "tag": "x", "latency": 12 })).unwrap();
        assert_eq!(ack.tag.as_deref(), Some("x"));
        assert_eq!(ack.latency, Some(12));
    }
}
