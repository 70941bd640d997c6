//! Connect to a gateway, subscribe to a channel, and print what it sends.
//!
//! Expects a gateway at `EDGELINK_ENDPOINT` (defaults to the production
//! endpoint) and reads credentials from `EDGELINK_PROJECT_ID` and
//! `EDGELINK_TOKEN`.
//!
//! Run with tracing enabled:
//! ```sh
//! RUST_LOG=debug cargo run --example subscribe
//! ```

use std::env;
use std::time::Duration;

use edgelink::{AuthParameters, Client, Config, ServicePayload};
use tokio::time::timeout;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let project_id = env::var("EDGELINK_PROJECT_ID").unwrap_or_else(|_| "project_0".to_owned());
    let token = env::var("EDGELINK_TOKEN").ok();
    let auth = AuthParameters::new(project_id, token);

    let client = match env::var("EDGELINK_ENDPOINT") {
        Ok(endpoint) => Client::with_config(auth, Config::builder().endpoint(endpoint).build())?,
        Err(_) => Client::new(auth)?,
    };

    let mut events = client.events();
    let mut states = client.state_updates();
    client.connect();

    states.wait_for(|s| s.is_connected()).await?;
    info!(state = ?client.state(), "session established");

    client.send_service_payload(
        ServicePayload::builder()
            .channel_id("abc123")
            .event_type("SUBSCRIBE")
            .build(),
    )?;

    let mut count = 0;
    while let Ok(event) = timeout(Duration::from_secs(30), events.recv()).await {
        match event {
            Ok(event) => {
                info!(
                    event_type = %event.event_type,
                    channel = ?event.channel_id,
                    data = ?event.data
                );
                count += 1;
                if count >= 10 {
                    break;
                }
            }
            Err(e) => warn!(error = %e, "event stream interrupted"),
        }
    }
    info!(received = count);

    Ok(())
}
