use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use url::Url;

use crate::auth::AuthParameters;
use crate::config::Config;
use crate::error::{self, Error};
use crate::protocol::{ServiceEvent, ServicePayload};
use crate::session::{Command, SessionState, SessionTask};

/// Outbound events the client buffers per subscriber before lagging.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Handle to a gateway session.
///
/// Creating a client spawns one background task that owns the connection and
/// drives the protocol; the handle itself is a set of channels into that
/// task. Cloning is cheap and every clone addresses the same session. The
/// session shuts down when the last clone is dropped.
///
/// ```rust,no_run
/// use edgelink::{AuthParameters, Client};
///
/// # async fn run() -> edgelink::Result<()> {
/// let client = Client::new(AuthParameters::new("project_0", None))?;
/// client.connect();
///
/// let mut events = client.events();
/// while let Ok(event) = events.recv().await {
///     println!("{} {:?}", event.event_type, event.data);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    auth: AuthParameters,
    command_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<SessionState>,
    events_tx: broadcast::Sender<ServiceEvent>,
}

impl Client {
    /// Create a client against the default production endpoint.
    pub fn new(auth: AuthParameters) -> crate::Result<Self> {
        Self::with_config(auth, Config::default())
    }

    /// Create a client with explicit configuration.
    ///
    /// Validates the endpoint URL up front; a malformed endpoint is a
    /// caller bug, not something reconnect can heal.
    pub fn with_config(auth: AuthParameters, config: Config) -> crate::Result<Self> {
        Url::parse(&config.endpoint)?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let task = SessionTask::new(
            auth.clone(),
            config,
            command_rx,
            state_tx,
            events_tx.clone(),
        );
        tokio::spawn(task.run());

        Ok(Self {
            inner: Arc::new(ClientInner {
                auth,
                command_tx,
                state_rx,
                events_tx,
            }),
        })
    }

    /// Ask the session to connect.
    ///
    /// Fire and forget: progress is reported through
    /// [`state_updates`](Self::state_updates). Calling this while a
    /// connection exists or is being established is a no-op, and requests
    /// arriving faster than the connect throttle are coalesced into one
    /// attempt.
    pub fn connect(&self) {
        // Ignore a closed channel; the task only exits when every handle is
        // gone, and then there is nobody left to observe the request.
        drop(self.inner.command_tx.send(Command::Connect));
    }

    /// Send a service payload over the established session.
    ///
    /// The payload travels as a Dispatch envelope. Fails immediately unless
    /// the session is [`SessionState::Connected`].
    pub fn send_service_payload(&self, payload: ServicePayload) -> crate::Result<()> {
        let state = *self.inner.state_rx.borrow();
        if !state.is_connected() {
            return Err(error::NotConnected { state }.into());
        }
        self.inner
            .command_tx
            .send(Command::Send(payload))
            .map_err(|_| Error::from(error::SessionGone))
    }

    /// The current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.inner.state_rx.borrow()
    }

    /// Watch session state transitions.
    #[must_use]
    pub fn state_updates(&self) -> watch::Receiver<SessionState> {
        self.inner.state_rx.clone()
    }

    /// Subscribe to service events dispatched by the gateway.
    ///
    /// Each call returns an independent receiver that sees every event from
    /// the moment of subscription. A receiver that falls more than
    /// `1024` events behind starts reporting lag.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<ServiceEvent> {
        self.inner.events_tx.subscribe()
    }

    /// The credentials this client identifies with.
    #[must_use]
    pub fn auth(&self) -> &AuthParameters {
        &self.inner.auth
    }
}
