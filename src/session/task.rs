use std::time::Duration;

use futures::stream::SplitSink;
use futures::{SinkExt as _, StreamExt as _};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, sleep_until};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::liveness::{Liveness, Verdict};
use super::{SESSION_INIT_EVENT, SessionState};
use crate::auth::AuthParameters;
use crate::config::Config;
use crate::protocol::types::{Heartbeat, HeartbeatAck, Hello};
use crate::protocol::{Envelope, OpCode, ServiceEvent, ServicePayload, close};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Requests from [`crate::Client`] to the session task.
pub(crate) enum Command {
    /// Open a connection if none exists. No-op while a handle is live.
    Connect,
    /// Put a service payload on the wire as a Dispatch envelope.
    Send(ServicePayload),
}

/// How the current connection ended.
enum Outcome {
    /// Recoverable failure: dial again without caller intervention.
    Retry,
    /// Fatal failure: stay Errored until the caller asks to connect again.
    Halt,
    /// All client handles dropped: tear down and exit.
    Shutdown,
}

/// The single-writer owner of all session state.
///
/// Runs as one spawned task per client. Socket frames, caller commands, and
/// heartbeat timers are serialized through its event loop, so no transition
/// can race another.
pub(crate) struct SessionTask {
    config: Config,
    auth: AuthParameters,
    /// Currently targeted endpoint. Rewritten when the gateway redirects.
    endpoint: String,
    command_rx: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<SessionState>,
    events_tx: broadcast::Sender<ServiceEvent>,
    /// When the last dial started, for the connect throttle.
    last_dial: Option<Instant>,
}

impl SessionTask {
    pub(crate) fn new(
        auth: AuthParameters,
        config: Config,
        command_rx: mpsc::UnboundedReceiver<Command>,
        state_tx: watch::Sender<SessionState>,
        events_tx: broadcast::Sender<ServiceEvent>,
    ) -> Self {
        let endpoint = config.endpoint.clone();
        Self {
            config,
            auth,
            endpoint,
            command_rx,
            state_tx,
            events_tx,
            last_dial: None,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            // Idle (or parked after a fatal close): wait for connect().
            match self.command_rx.recv().await {
                Some(Command::Connect) => {}
                Some(Command::Send(payload)) => {
                    tracing::debug!(
                        event_type = %payload.event_type,
                        "dropping service payload sent while disconnected"
                    );
                    continue;
                }
                None => return,
            }

            match self.run_connection_cycle().await {
                Outcome::Shutdown => {
                    self.set_state(SessionState::Idle);
                    return;
                }
                Outcome::Halt => {
                    tracing::warn!("session parked after fatal close; call connect() to retry");
                }
                // Recoverable failures redial inside the cycle and never
                // surface here.
                Outcome::Retry => {}
            }
        }
    }

    /// Dial and drive connections until the session shuts down or hits a
    /// fatal close. Recoverable failures loop here, throttled.
    ///
    /// The throttle wait and the dial itself both race the command channel,
    /// so dropping the last client handle tears the task down even while
    /// the gateway is unreachable.
    async fn run_connection_cycle(&mut self) -> Outcome {
        loop {
            if let Some(outcome) = self.throttle_dial().await {
                return outcome;
            }
            self.set_state(SessionState::Connecting);
            tracing::debug!(endpoint = %self.endpoint, "opening gateway connection");

            let endpoint = self.endpoint.clone();
            let dialed = tokio::select! {
                dialed = connect_async(endpoint.as_str()) => dialed,
                () = self.drain_commands() => return Outcome::Shutdown,
            };

            match dialed {
                Ok((stream, _response)) => match self.drive(stream).await {
                    Outcome::Retry => self.set_state(SessionState::Errored),
                    Outcome::Halt => {
                        self.set_state(SessionState::Errored);
                        return Outcome::Halt;
                    }
                    Outcome::Shutdown => return Outcome::Shutdown,
                },
                Err(e) => {
                    tracing::warn!(endpoint = %self.endpoint, error = %e, "unable to reach gateway");
                    self.set_state(SessionState::Errored);
                }
            }
        }
    }

    /// Drive one live connection to completion.
    ///
    /// The heartbeat schedule and liveness tracker are locals here: when the
    /// connection ends, every timer and the last-ack timestamp die with the
    /// stack frame. Nothing can leak into the next connection attempt.
    async fn drive(&mut self, stream: WsStream) -> Outcome {
        let (mut write, mut read) = stream.split();
        let mut schedule: Option<Interval> = None;
        let mut liveness = Liveness::new(self.config.ack_timeout, self.config.probe_timeout);

        loop {
            let deadline = liveness.deadline();

            tokio::select! {
                frame = read.next() => {
                    let handled = self
                        .handle_frame(frame, &mut write, &mut schedule, &mut liveness)
                        .await;
                    if let Some(outcome) = handled {
                        return outcome;
                    }
                }

                command = self.command_rx.recv() => match command {
                    Some(Command::Connect) => {
                        tracing::debug!("connect ignored; a gateway connection already exists");
                    }
                    Some(Command::Send(payload)) => {
                        if self.state_tx.borrow().is_connected() {
                            let envelope = Envelope::control(OpCode::Dispatch, &payload);
                            if let Some(outcome) = self.send(&mut write, envelope).await {
                                return outcome;
                            }
                        } else {
                            tracing::debug!(
                                event_type = %payload.event_type,
                                "dropping service payload sent while not connected"
                            );
                        }
                    }
                    None => {
                        drop(write.close().await);
                        return Outcome::Shutdown;
                    }
                },

                _ = next_beat(&mut schedule) => {
                    if liveness.probe_outstanding() {
                        tracing::trace!("scheduled heartbeat suppressed while probe is in flight");
                    } else {
                        liveness.begin_cycle(Instant::now());
                        let beat = Ok(Envelope::new(OpCode::Heartbeat, None));
                        if let Some(outcome) = self.send(&mut write, beat).await {
                            return outcome;
                        }
                    }
                }

                () = sleep_until(deadline.unwrap_or_else(far_future)), if deadline.is_some() => {
                    match liveness.on_deadline(Instant::now()) {
                        Verdict::Alive => {}
                        Verdict::Probe => {
                            tracing::debug!("heartbeat ack overdue; sending optimistic probe");
                            let probe = Ok(Envelope::new(OpCode::Heartbeat, None));
                            if let Some(outcome) = self.send(&mut write, probe).await {
                                return outcome;
                            }
                        }
                        Verdict::Dead => {
                            tracing::warn!(
                                "gateway stopped acknowledging heartbeats; forcing reconnect"
                            );
                            drop(write.close().await);
                            return Outcome::Retry;
                        }
                    }
                }
            }
        }
    }

    /// Process one transport notification.
    async fn handle_frame(
        &mut self,
        frame: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>,
        write: &mut WsSink,
        schedule: &mut Option<Interval>,
        liveness: &mut Liveness,
    ) -> Option<Outcome> {
        match frame {
            Some(Ok(Message::Text(text))) => {
                tracing::trace!(frame = %text, "received gateway frame");
                match Envelope::decode(text.as_str()) {
                    Ok(envelope) => {
                        self.handle_envelope(envelope, write, schedule, liveness)
                            .await
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping malformed envelope");
                        None
                    }
                }
            }
            // Binary frames and transport-level pings are not part of the
            // gateway protocol.
            Some(Ok(Message::Close(frame))) => Some(self.classify_close(frame)),
            Some(Ok(_)) => None,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "gateway socket error");
                Some(Outcome::Retry)
            }
            None => {
                tracing::warn!("gateway socket ended without a close frame");
                Some(Outcome::Retry)
            }
        }
    }

    /// Dispatch one decoded envelope by opcode.
    async fn handle_envelope(
        &mut self,
        envelope: Envelope,
        write: &mut WsSink,
        schedule: &mut Option<Interval>,
        liveness: &mut Liveness,
    ) -> Option<Outcome> {
        match envelope.op {
            OpCode::Hello => {
                if *self.state_tx.borrow() != SessionState::Connecting {
                    tracing::debug!("ignoring hello outside the handshake");
                    return None;
                }
                let hello: Hello = match envelope.payload() {
                    Ok(hello) => hello,
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping hello with an invalid payload");
                        return None;
                    }
                };
                // interval_at panics on a zero period.
                let period = Duration::from_millis(hello.heartbeat_interval.max(1));
                let mut beat = interval_at(Instant::now() + period, period);
                beat.set_missed_tick_behavior(MissedTickBehavior::Delay);
                *schedule = Some(beat);

                tracing::debug!(
                    interval_ms = hello.heartbeat_interval,
                    "handshake opened; identifying"
                );
                self.set_state(SessionState::Authenticating);
                let identify = Envelope::control(OpCode::Identify, &self.auth.identify());
                self.send(write, identify).await
            }
            OpCode::Heartbeat => {
                // Server-initiated beat: echo the tag straight back.
                let beat: Heartbeat = envelope.payload().unwrap_or_default();
                let echo = Envelope::control(OpCode::Heartbeat, &beat);
                self.send(write, echo).await
            }
            OpCode::HeartbeatAck => {
                let ack: HeartbeatAck = envelope.payload().unwrap_or_default();
                tracing::trace!(tag = ?ack.tag, latency_ms = ?ack.latency, "heartbeat acknowledged");
                liveness.record_ack(Instant::now());
                None
            }
            OpCode::Dispatch => {
                match envelope.payload::<ServicePayload>() {
                    Ok(payload) => {
                        let event = ServiceEvent::from(payload);
                        if event.event_type == SESSION_INIT_EVENT
                            && *self.state_tx.borrow() == SessionState::Authenticating
                        {
                            self.set_state(SessionState::Connected);
                        }
                        // No subscribers is fine; events are fire-and-forget.
                        drop(self.events_tx.send(event));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping dispatch with an invalid payload");
                    }
                }
                None
            }
            OpCode::Identify | OpCode::Unknown => {
                tracing::debug!(op = ?envelope.op, "ignoring unexpected opcode from gateway");
                None
            }
        }
    }

    /// Classify a close frame and decide the reconnect policy.
    fn classify_close(&mut self, frame: Option<CloseFrame>) -> Outcome {
        let Some(frame) = frame else {
            tracing::warn!("gateway closed the connection without a code");
            return Outcome::Retry;
        };

        let code = u16::from(frame.code);
        let reason = frame.reason.as_str();
        let info = close::classify(code);
        tracing::warn!(code, reason, description = info.description, "gateway closed the connection");

        if code == close::BAD_ROUTE {
            // The reason field carries the replacement endpoint.
            match Url::parse(reason) {
                Ok(_) => {
                    tracing::debug!(endpoint = reason, "following gateway redirect");
                    self.endpoint = reason.to_owned();
                }
                Err(e) => {
                    tracing::warn!(error = %e, reason, "ignoring redirect with an invalid endpoint");
                }
            }
            return Outcome::Retry;
        }

        if info.recoverable {
            Outcome::Retry
        } else {
            Outcome::Halt
        }
    }

    /// Encode and write one envelope. Encoding failures are logged and
    /// swallowed; write failures end the connection.
    async fn send(
        &mut self,
        write: &mut WsSink,
        envelope: crate::Result<Envelope>,
    ) -> Option<Outcome> {
        let envelope = match envelope {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "unable to encode outbound payload");
                return None;
            }
        };
        let text = match envelope.encode() {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "unable to encode outbound envelope");
                return None;
            }
        };

        tracing::trace!(frame = %text, "sending gateway frame");
        if let Err(e) = write.send(Message::Text(text.into())).await {
            tracing::warn!(error = %e, "failed to write to gateway socket");
            return Some(Outcome::Retry);
        }
        None
    }

    /// Enforce the minimum spacing between connection attempts. Returns
    /// `Some(Outcome::Shutdown)` if the last client handle goes away while
    /// the wait is in progress.
    async fn throttle_dial(&mut self) -> Option<Outcome> {
        if let Some(last) = self.last_dial {
            let next_allowed = last + self.config.connect_throttle;
            if next_allowed > Instant::now() {
                tracing::debug!("throttling connection attempt");
                tokio::select! {
                    () = sleep_until(next_allowed) => {}
                    () = self.drain_commands() => return Some(Outcome::Shutdown),
                }
            }
        }
        self.last_dial = Some(Instant::now());
        None
    }

    /// Absorb commands that arrive while no connection exists. Connects
    /// coalesce into the dial already in progress and sends are dropped.
    /// Resolves only when every client handle has been dropped.
    async fn drain_commands(&mut self) {
        loop {
            match self.command_rx.recv().await {
                Some(Command::Connect) => {
                    tracing::debug!("connect coalesced; a dial is already in progress");
                }
                Some(Command::Send(payload)) => {
                    tracing::debug!(
                        event_type = %payload.event_type,
                        "dropping service payload sent while disconnected"
                    );
                }
                None => return,
            }
        }
    }

    fn set_state(&self, next: SessionState) {
        self.state_tx.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            tracing::debug!(from = ?*state, to = ?next, "session state change");
            *state = next;
            true
        });
    }
}

/// Tick the heartbeat schedule, or park forever while none exists.
async fn next_beat(schedule: &mut Option<Interval>) -> Instant {
    match schedule.as_mut() {
        Some(interval) => interval.tick().await,
        None => std::future::pending().await,
    }
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(3600)
}
