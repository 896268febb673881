use crate::clock::Clock;
use crate::machine::{Phase, SessionTimerMachine, TimerSettings};
use crate::plan::SessionProgress;
use crate::registry::Session;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Exactly enough state to land back in the active phase after a full
/// process restart. For Preparation the anchor is the countdown deadline;
/// for every other non-idle phase it is the instant the phase began.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub session_id: String,
    pub phase: Phase,
    pub phase_anchor: Option<DateTime<Utc>>,
    pub last_execution_ms: i64,
    pub set_acknowledged: bool,
    pub progress: SessionProgress,
}

impl TimerSnapshot {
    pub fn capture(session_id: &str, machine: &SessionTimerMachine) -> Self {
        Self {
            session_id: session_id.to_string(),
            phase: machine.phase(),
            phase_anchor: machine.phase_anchor(),
            last_execution_ms: machine.last_execution_ms(),
            set_acknowledged: machine.set_acknowledged(),
            progress: machine.progress(),
        }
    }
}

/// Single-record store for the snapshot, namespaced away from the data
/// collections. Last write wins; at most one session is ever active.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join("timer_state.json"),
        }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn save(&self, snapshot: &TimerSnapshot) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(snapshot).unwrap_or_default();
        fs::write(&self.path, data)
    }

    /// Returns the stored snapshot only when it parses and belongs to
    /// `session_id`. Anything else (missing file, garbage, a record left
    /// behind by a different session) reads as absent.
    pub fn load(&self, session_id: &str) -> Option<TimerSnapshot> {
        let bytes = fs::read(&self.path).ok()?;
        let snapshot: TimerSnapshot = serde_json::from_slice(&bytes).ok()?;
        if snapshot.session_id != session_id {
            return None;
        }
        Some(snapshot)
    }

    /// Idempotent; clearing an absent record is fine.
    pub fn clear(&self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Rebuild the machine from a stored snapshot, or fresh from the session's
/// recorded measurements when there is nothing usable to resume.
pub fn resume_machine(
    settings: TimerSettings,
    session: &Session,
    stored: Option<TimerSnapshot>,
    clock: Arc<dyn Clock>,
) -> SessionTimerMachine {
    let shape = session.shape();
    let fresh = |clock: Arc<dyn Clock>| {
        SessionTimerMachine::restore(
            settings,
            shape.clone(),
            clock,
            Phase::Idle,
            None,
            0,
            false,
            session.derive_progress(),
        )
    };

    let Some(snapshot) = stored else {
        return fresh(clock);
    };

    match (snapshot.phase, snapshot.phase_anchor) {
        (Phase::Preparation, Some(deadline)) => {
            let (phase, acknowledged) = if deadline <= clock.now() {
                // The countdown ran out while we were gone: fast-forward
                // into Execution with the anchor backdated to the deadline
                // so no tension time is lost.
                (Phase::Execution, false)
            } else {
                (Phase::Preparation, false)
            };
            SessionTimerMachine::restore(
                settings,
                shape.clone(),
                clock,
                phase,
                Some(deadline),
                snapshot.last_execution_ms,
                acknowledged,
                snapshot.progress,
            )
        }
        (Phase::Execution, Some(anchor)) => SessionTimerMachine::restore(
            settings,
            shape.clone(),
            clock,
            Phase::Execution,
            Some(anchor),
            snapshot.last_execution_ms,
            false,
            snapshot.progress,
        ),
        (Phase::Rest | Phase::Transition, Some(anchor)) => SessionTimerMachine::restore(
            settings,
            shape.clone(),
            clock,
            snapshot.phase,
            Some(anchor),
            snapshot.last_execution_ms,
            snapshot.set_acknowledged,
            snapshot.progress,
        ),
        // Idle records and anchor-less non-idle records both fall open to
        // a fresh start derived from the session itself.
        _ => fresh(clock),
    }
}
