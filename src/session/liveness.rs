use std::time::Duration;

use tokio::time::Instant;

/// Two-phase liveness tracker for the heartbeat protocol.
///
/// A scheduled heartbeat opens a primary window of `ack_timeout`. If no
/// acknowledgment lands inside it, one out-of-schedule probe is sent and a
/// shorter `probe_timeout` window opens. Missing that one too means the
/// connection is dead.
///
/// The tracker holds no timers itself; the session loop asks for the next
/// [`deadline`](Self::deadline) and reports back when it fires. Dropping the
/// tracker on disconnect discards the last-ack timestamp and every pending
/// window, which is what resets the monitor between connections.
pub(crate) struct Liveness {
    ack_timeout: Duration,
    probe_timeout: Duration,
    last_ack: Option<Instant>,
    phase: Phase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No beat awaiting acknowledgment.
    Idle,
    /// A scheduled beat was sent; primary window open.
    Primary { sent: Instant },
    /// The optimistic probe was sent; final window open.
    Probe { sent: Instant },
}

/// Outcome of a deadline check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    /// An acknowledgment landed in the window; the cycle resets silently.
    Alive,
    /// The primary window expired; the caller must send the probe now.
    Probe,
    /// The probe window expired too; the connection is dead.
    Dead,
}

impl Liveness {
    pub(crate) fn new(ack_timeout: Duration, probe_timeout: Duration) -> Self {
        Self {
            ack_timeout,
            probe_timeout,
            last_ack: None,
            phase: Phase::Idle,
        }
    }

    /// Record a heartbeat acknowledgment. Resolution happens lazily at the
    /// next deadline check.
    pub(crate) fn record_ack(&mut self, at: Instant) {
        self.last_ack = Some(at);
    }

    /// Open the primary window for a scheduled beat.
    ///
    /// If an earlier beat is already awaiting acknowledgment its window is
    /// kept, so detection time stays anchored at the first unacknowledged
    /// send even when the schedule interval is shorter than the window.
    pub(crate) fn begin_cycle(&mut self, sent: Instant) {
        if self.phase == Phase::Idle {
            self.phase = Phase::Primary { sent };
        }
    }

    /// Whether the optimistic probe is currently in flight. Scheduled beats
    /// are suppressed while it is; its deadline decides the connection's
    /// fate.
    pub(crate) fn probe_outstanding(&self) -> bool {
        matches!(self.phase, Phase::Probe { .. })
    }

    /// The instant at which the open window expires, if one is open.
    pub(crate) fn deadline(&self) -> Option<Instant> {
        match self.phase {
            Phase::Idle => None,
            Phase::Primary { sent } => Some(sent + self.ack_timeout),
            Phase::Probe { sent } => Some(sent + self.probe_timeout),
        }
    }

    /// Resolve the open window. On [`Verdict::Probe`] the tracker has moved
    /// to the probe phase with `now` as its send time; the caller must put
    /// the probe heartbeat on the wire.
    pub(crate) fn on_deadline(&mut self, now: Instant) -> Verdict {
        match self.phase {
            Phase::Idle => Verdict::Alive,
            Phase::Primary { sent } => {
                if self.acked_since(sent) {
                    self.phase = Phase::Idle;
                    Verdict::Alive
                } else {
                    self.phase = Phase::Probe { sent: now };
                    Verdict::Probe
                }
            }
            Phase::Probe { sent } => {
                self.phase = Phase::Idle;
                if self.acked_since(sent) {
                    Verdict::Alive
                } else {
                    Verdict::Dead
                }
            }
        }
    }

    fn acked_since(&self, sent: Instant) -> bool {
        self.last_ack.is_some_and(|ack| ack >= sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACK: Duration = Duration::from_millis(5000);
    const PROBE: Duration = Duration::from_millis(750);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn ack_in_window_resolves_silently() {
        let t0 = Instant::now();
        let mut liveness = Liveness::new(ACK, PROBE);

        liveness.begin_cycle(t0);
        assert_eq!(liveness.deadline(), Some(t0 + ACK));

        liveness.record_ack(t0 + ms(200));
        assert_eq!(liveness.on_deadline(t0 + ACK), Verdict::Alive);
        assert_eq!(liveness.deadline(), None);
    }

    #[test]
    fn missed_window_triggers_exactly_one_probe() {
        let t0 = Instant::now();
        let mut liveness = Liveness::new(ACK, PROBE);

        liveness.begin_cycle(t0);
        assert_eq!(liveness.on_deadline(t0 + ACK), Verdict::Probe);

        // Probe window runs from the probe send, not the original beat.
        assert_eq!(liveness.deadline(), Some(t0 + ACK + PROBE));
        assert_eq!(liveness.on_deadline(t0 + ACK + PROBE), Verdict::Dead);
    }

    #[test]
    fn ack_during_probe_window_saves_the_connection() {
        let t0 = Instant::now();
        let mut liveness = Liveness::new(ACK, PROBE);

        liveness.begin_cycle(t0);
        assert_eq!(liveness.on_deadline(t0 + ACK), Verdict::Probe);

        liveness.record_ack(t0 + ACK + ms(100));
        assert_eq!(liveness.on_deadline(t0 + ACK + PROBE), Verdict::Alive);
        assert_eq!(liveness.deadline(), None);
    }

    #[test]
    fn stale_ack_does_not_count() {
        let t0 = Instant::now();
        let mut liveness = Liveness::new(ACK, PROBE);

        // Ack from a previous cycle, before this beat was sent.
        liveness.record_ack(t0);
        liveness.begin_cycle(t0 + ms(10));

        assert_eq!(liveness.on_deadline(t0 + ms(10) + ACK), Verdict::Probe);
    }

    #[test]
    fn window_stays_anchored_at_first_unacked_beat() {
        let t0 = Instant::now();
        let mut liveness = Liveness::new(ACK, PROBE);

        liveness.begin_cycle(t0);
        // A faster-than-window schedule keeps beating; the open window must
        // not slide or a silent server would never be detected.
        liveness.begin_cycle(t0 + ms(1000));
        liveness.begin_cycle(t0 + ms(2000));

        assert_eq!(liveness.deadline(), Some(t0 + ACK));
    }

    #[test]
    fn probe_suppresses_scheduled_beats() {
        let t0 = Instant::now();
        let mut liveness = Liveness::new(ACK, PROBE);

        liveness.begin_cycle(t0);
        assert!(!liveness.probe_outstanding());

        liveness.on_deadline(t0 + ACK);
        assert!(liveness.probe_outstanding());
    }
}
