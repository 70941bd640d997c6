use std::time::Duration;

use bon::Builder;

/// The default production gateway endpoint.
pub const DEFAULT_ENDPOINT: &str = "wss://edge.edgelink.dev/ws";

const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(5000);
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(750);
const DEFAULT_CONNECT_THROTTLE: Duration = Duration::from_secs(1);

/// Configuration for [`crate::Client`] behavior.
///
/// The heartbeat cadence itself is not configured here; it is supplied by
/// the gateway in the Hello message at handshake time.
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct Config {
    /// The gateway endpoint to dial. The session rewrites this when the
    /// gateway issues a redirect close.
    #[builder(into, default = DEFAULT_ENDPOINT.to_owned())]
    pub endpoint: String,
    /// How long to wait for an acknowledgment after a scheduled heartbeat
    /// before sending the optimistic probe.
    #[builder(default = DEFAULT_ACK_TIMEOUT)]
    pub ack_timeout: Duration,
    /// How long to wait after the optimistic probe before declaring the
    /// connection dead.
    #[builder(default = DEFAULT_PROBE_TIMEOUT)]
    pub probe_timeout: Duration,
    /// Minimum spacing between actual connection attempts. Connect requests
    /// arriving faster than this are coalesced, never queued.
    #[builder(default = DEFAULT_CONNECT_THROTTLE)]
    pub connect_throttle: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timings() {
        let config = Config::default();

        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.ack_timeout, Duration::from_millis(5000));
        assert_eq!(config.probe_timeout, Duration::from_millis(750));
        assert_eq!(config.connect_throttle, Duration::from_secs(1));
    }

    #[test]
    fn builder_overrides_endpoint() {
        let config = Config::builder().endpoint("ws://localhost:4001/ws").build();

        assert_eq!(config.endpoint, "ws://localhost:4001/ws");
        assert_eq!(config.ack_timeout, Duration::from_millis(5000));
    }
}
