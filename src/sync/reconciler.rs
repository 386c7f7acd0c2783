use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::clock::Millis;
use crate::config::SyncConfig;
use crate::grid::{Fingerprint, Snapshot};

/// Why a remote candidate was left un-applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Inside the suppression window opened by a save or an earlier rejection
    Suppressed,
    /// Too soon after our own save completed
    EchoGrace,
    /// Content matches a save we sent (completed or still in flight)
    OwnWrite,
    /// Not newer than the last write we know about
    Stale,
    /// Loses implausibly many filled cells
    Destructive { local: usize, remote: usize },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Suppressed => write!(f, "inside suppression window"),
            Rejection::EchoGrace => write!(f, "within echo grace period"),
            Rejection::OwnWrite => write!(f, "matches our own save"),
            Rejection::Stale => write!(f, "stale timestamp"),
            Rejection::Destructive { local, remote } => {
                write!(f, "destructive: {} filled cells locally, {} remotely", local, remote)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Apply,
    Reject(Rejection),
}

/// Per-document sync bookkeeping. All times are milliseconds since the epoch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    /// Server timestamp of the newest successful save
    pub last_local_save: Millis,
    /// Local time at which that save completed
    pub last_local_save_at: Millis,
    pub last_applied_remote: Millis,
    pub suppress_until: Millis,
    pub last_saved_fingerprint: Option<Fingerprint>,
}

/// Arbitrates between local saves and remote candidates for the open document
#[derive(Debug)]
pub struct Reconciler {
    config: SyncConfig,
    state: SyncState,
    /// Fingerprints of saves sent but not yet acknowledged, by save sequence number
    in_flight: HashMap<u64, Fingerprint>,
    next_seq: u64,
    /// Sequence number of the save whose fingerprint is in `last_saved_fingerprint`
    recorded_seq: Option<u64>,
}

impl Reconciler {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            state: SyncState::default(),
            in_flight: HashMap::new(),
            next_seq: 0,
            recorded_seq: None,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &SyncState {
        &self.state
    }

    /// Forget everything about the previous document. Saves still in flight for it keep
    /// their sequence numbers but will not be recorded.
    pub fn reset(&mut self) {
        self.state = SyncState::default();
        self.in_flight.clear();
        self.recorded_seq = None;
    }

    /// Baseline for a freshly loaded document
    pub fn seed_loaded(&mut self, server_timestamp: Millis, fingerprint: Fingerprint) {
        self.state.last_applied_remote = server_timestamp;
        self.state.last_saved_fingerprint = Some(fingerprint);
    }

    fn extend_suppression(&mut self, until: Millis) {
        self.state.suppress_until = self.state.suppress_until.max(until);
    }

    /// Register an outgoing save. Immediate saves open the suppression window before the
    /// round-trip, since they are the ones most likely to race an incoming echo.
    pub fn begin_save(&mut self, fingerprint: Fingerprint, proactive: bool, now: Millis) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.in_flight.insert(seq, fingerprint);
        if proactive {
            self.extend_suppression(now + self.config.suppression_margin_ms);
        }
        seq
    }

    /// Record a completed save. Completions may arrive out of order; an older save never
    /// replaces the fingerprint of a newer one.
    pub fn complete_save(&mut self, seq: u64, server_timestamp: Millis, now: Millis) {
        let Some(fingerprint) = self.in_flight.remove(&seq) else {
            debug!(seq, "save completion for a previous document ignored");
            return;
        };

        self.state.last_local_save = self.state.last_local_save.max(server_timestamp);
        self.state.last_local_save_at = self.state.last_local_save_at.max(now);
        if self.recorded_seq.map_or(true, |recorded| seq > recorded) {
            self.state.last_saved_fingerprint = Some(fingerprint);
            self.recorded_seq = Some(seq);
        }
        self.extend_suppression(now + self.config.suppression_margin_ms);
    }

    pub fn fail_save(&mut self, seq: u64) {
        self.in_flight.remove(&seq);
    }

    #[cfg(test)]
    pub fn saves_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Decide whether a remote candidate may replace the local grid.
    /// `local_filled` is the filled-cell count of the grid as it is now.
    pub fn evaluate(
        &mut self,
        candidate: &Snapshot,
        candidate_ts: Millis,
        local_filled: usize,
        now: Millis,
    ) -> Verdict {
        let verdict = self.judge(candidate, candidate_ts, local_filled, now);
        match verdict {
            Verdict::Apply => {}
            Verdict::Reject(reason @ Rejection::Destructive { .. }) => {
                warn!(%reason, candidate_ts, "rejected remote snapshot");
                self.extend_suppression(now + self.config.suppression_margin_ms);
            }
            Verdict::Reject(reason) => {
                debug!(%reason, candidate_ts, "rejected remote snapshot");
            }
        }
        verdict
    }

    fn judge(&self, candidate: &Snapshot, candidate_ts: Millis, local_filled: usize, now: Millis) -> Verdict {
        let state = &self.state;

        if now < state.suppress_until {
            return Verdict::Reject(Rejection::Suppressed);
        }
        if state.last_local_save_at > 0
            && now.saturating_sub(state.last_local_save_at) < self.config.echo_grace_ms
        {
            return Verdict::Reject(Rejection::EchoGrace);
        }

        let fingerprint = candidate.fingerprint();
        if state.last_saved_fingerprint == Some(fingerprint)
            || self.in_flight.values().any(|f| *f == fingerprint)
        {
            return Verdict::Reject(Rejection::OwnWrite);
        }

        let newest_known = state.last_local_save.max(state.last_applied_remote);
        if candidate_ts <= newest_known + self.config.stale_margin_ms {
            return Verdict::Reject(Rejection::Stale);
        }

        let remote = candidate.filled_cell_count();
        if local_filled > 0
            && (remote == 0 || remote + self.config.destructive_tolerance < local_filled)
        {
            return Verdict::Reject(Rejection::Destructive { local: local_filled, remote });
        }

        Verdict::Apply
    }

    /// Note that a candidate was applied
    pub fn record_applied(&mut self, candidate_ts: Millis, fingerprint: Fingerprint) {
        self.state.last_applied_remote = self.state.last_applied_remote.max(candidate_ts);
        // The grid now equals this content; a repeat delivery is not news
        self.state.last_saved_fingerprint = Some(fingerprint);
    }
}
