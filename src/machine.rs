use crate::clock::Clock;
use crate::plan::{PlanShape, SessionProgress};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One mutually-exclusive stage of the per-set timer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Preparation,
    Execution,
    Rest,
    Transition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSettings {
    pub countdown_secs: u32,
    pub rest_target_secs: u32,
    pub transition_target_secs: u32,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            countdown_secs: 5,
            rest_target_secs: 90,
            transition_target_secs: 180,
        }
    }
}

/// Side-effect requests emitted by the machine; the driver maps them onto
/// the feedback sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    CountdownTone,
    CompletionTone,
    OverdueBuzz,
}

/// What a single tick produced.
#[derive(Debug, Default)]
pub struct TickUpdate {
    pub cues: Vec<Cue>,
    pub entered_execution: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum TimerError {
    NotIdle,
    NotExecuting,
    NotResting,
    NotAcknowledged,
    InvalidAdvance,
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerError::NotIdle => write!(f, "a set is already in progress"),
            TimerError::NotExecuting => write!(f, "no set is being executed"),
            TimerError::NotResting => write!(f, "not in a rest window"),
            TimerError::NotAcknowledged => write!(f, "current set has not been registered"),
            TimerError::InvalidAdvance => write!(f, "nothing to advance to"),
        }
    }
}

impl std::error::Error for TimerError {}

#[derive(Debug, PartialEq, Eq)]
pub enum RegisterOutcome {
    Recorded {
        rest_ms: i64,
        moved_to_transition: bool,
    },
    /// The current rest window was already registered; the call is a no-op.
    AlreadyRecorded,
}

#[derive(Debug, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Re-armed into Preparation for the next set of the same exercise.
    NextSet,
    /// Crossed into the next exercise; the machine is Idle until begin_set.
    NextExercise,
    /// The last set of the last exercise is registered; the workout is done.
    WorkoutComplete,
}

/// Drives phase transitions for one workout session. All elapsed and
/// remaining values are recomputed from wall-clock anchors on every tick;
/// suspension of the host process shifts nothing.
///
/// The Preparation anchor is a deadline (the instant Execution begins), not
/// a start time, so remaining countdown after an arbitrary gap is simply
/// `anchor - now`, and an expired deadline fast-forwards into Execution with
/// the anchor backdated to the deadline itself.
pub struct SessionTimerMachine {
    settings: TimerSettings,
    shape: PlanShape,
    clock: Arc<dyn Clock>,
    phase: Phase,
    phase_anchor: Option<DateTime<Utc>>,
    progress: SessionProgress,
    last_execution_ms: i64,
    set_acknowledged: bool,
    // Edge-trigger guards, both reset on the relevant phase entry.
    countdown_last_whole: Option<i64>,
    overdue_buzzed: bool,
}

impl fmt::Debug for SessionTimerMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTimerMachine")
            .field("phase", &self.phase)
            .field("phase_anchor", &self.phase_anchor)
            .field("progress", &self.progress)
            .field("set_acknowledged", &self.set_acknowledged)
            .finish()
    }
}

impl SessionTimerMachine {
    pub fn new(settings: TimerSettings, shape: PlanShape, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            shape,
            clock,
            phase: Phase::Idle,
            phase_anchor: None,
            progress: SessionProgress::default(),
            last_execution_ms: 0,
            set_acknowledged: false,
            countdown_last_whole: None,
            overdue_buzzed: false,
        }
    }

    /// Reconstruct a machine mid-phase. Used by the resume path only; the
    /// caller is responsible for having applied the resume rules to the
    /// stored phase and anchor first.
    pub fn restore(
        settings: TimerSettings,
        shape: PlanShape,
        clock: Arc<dyn Clock>,
        phase: Phase,
        phase_anchor: Option<DateTime<Utc>>,
        last_execution_ms: i64,
        set_acknowledged: bool,
        progress: SessionProgress,
    ) -> Self {
        Self {
            settings,
            shape,
            clock,
            phase,
            phase_anchor,
            progress,
            last_execution_ms,
            set_acknowledged,
            countdown_last_whole: None,
            overdue_buzzed: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn phase_anchor(&self) -> Option<DateTime<Utc>> {
        self.phase_anchor
    }

    pub fn progress(&self) -> SessionProgress {
        self.progress
    }

    pub fn set_acknowledged(&self) -> bool {
        self.set_acknowledged
    }

    pub fn last_execution_ms(&self) -> i64 {
        self.last_execution_ms
    }

    pub fn settings(&self) -> TimerSettings {
        self.settings
    }

    /// Remaining countdown in Preparation, clamped at zero.
    pub fn countdown_remaining_ms(&self) -> Option<i64> {
        match (self.phase, self.phase_anchor) {
            (Phase::Preparation, Some(deadline)) => {
                Some((deadline - self.clock.now()).num_milliseconds().max(0))
            }
            _ => None,
        }
    }

    /// Time since the current phase anchor (Execution, Rest or Transition).
    pub fn elapsed_ms(&self) -> Option<i64> {
        match (self.phase, self.phase_anchor) {
            (Phase::Execution | Phase::Rest | Phase::Transition, Some(anchor)) => {
                Some((self.clock.now() - anchor).num_milliseconds().max(0))
            }
            _ => None,
        }
    }

    /// Target duration of the current rest or transition window.
    pub fn target_ms(&self) -> Option<i64> {
        match self.phase {
            Phase::Rest => Some(i64::from(self.settings.rest_target_secs) * 1000),
            Phase::Transition => Some(i64::from(self.settings.transition_target_secs) * 1000),
            _ => None,
        }
    }

    /// Arm the countdown for the set the cursor points at.
    pub fn begin_set(&mut self) -> Result<(), TimerError> {
        if self.phase != Phase::Idle {
            return Err(TimerError::NotIdle);
        }
        let now = self.clock.now();
        self.enter_preparation(now + Duration::seconds(i64::from(self.settings.countdown_secs)));
        Ok(())
    }

    /// Periodic recomputation. Emits countdown tones on whole-second
    /// boundaries, crosses into Execution when the deadline arrives, and
    /// buzzes once per rest/transition instance when the target elapses.
    pub fn tick(&mut self) -> TickUpdate {
        let mut update = TickUpdate::default();
        let now = self.clock.now();
        match (self.phase, self.phase_anchor) {
            (Phase::Preparation, Some(deadline)) => {
                let remaining = (deadline - now).num_milliseconds();
                if remaining <= 0 {
                    // The anchor stays on the deadline so measured tension
                    // time never loses the gap between deadline and tick.
                    self.phase = Phase::Execution;
                    self.phase_anchor = Some(deadline);
                    update.cues.push(Cue::CompletionTone);
                    update.entered_execution = true;
                } else {
                    let whole = (remaining + 999) / 1000;
                    if whole < i64::from(self.settings.countdown_secs)
                        && self.countdown_last_whole != Some(whole)
                    {
                        self.countdown_last_whole = Some(whole);
                        update.cues.push(Cue::CountdownTone);
                    }
                }
            }
            (Phase::Rest | Phase::Transition, Some(anchor)) => {
                let target = self.target_ms().unwrap_or(i64::MAX);
                let elapsed = (now - anchor).num_milliseconds();
                if elapsed >= target && !self.overdue_buzzed {
                    self.overdue_buzzed = true;
                    update.cues.push(Cue::OverdueBuzz);
                }
            }
            _ => {}
        }
        update
    }

    /// User ends the set; measured tension time is `now - anchor`.
    pub fn end_set(&mut self) -> Result<i64, TimerError> {
        if self.phase != Phase::Execution {
            return Err(TimerError::NotExecuting);
        }
        let now = self.clock.now();
        let anchor = self.phase_anchor.unwrap_or(now);
        let execution_ms = (now - anchor).num_milliseconds().max(0);
        self.last_execution_ms = execution_ms;
        self.phase = Phase::Rest;
        self.phase_anchor = Some(now);
        self.set_acknowledged = false;
        self.overdue_buzzed = false;
        Ok(execution_ms)
    }

    /// Acknowledge the current rest window's measurement. Idempotent: a
    /// second call within the same window is a no-op. When this was the
    /// exercise's last set and more exercises remain, the window continues
    /// as a Transition without re-anchoring.
    pub fn register_measurement(&mut self) -> Result<RegisterOutcome, TimerError> {
        if self.phase != Phase::Rest {
            return Err(TimerError::NotResting);
        }
        if self.set_acknowledged {
            return Ok(RegisterOutcome::AlreadyRecorded);
        }
        let now = self.clock.now();
        let anchor = self.phase_anchor.unwrap_or(now);
        let rest_ms = (now - anchor).num_milliseconds().max(0);
        self.set_acknowledged = true;

        let moved = self.progress.is_last_set(&self.shape) && !self.progress.is_final(&self.shape);
        if moved {
            self.phase = Phase::Transition;
            self.overdue_buzzed = false;
        }
        Ok(RegisterOutcome::Recorded {
            rest_ms,
            moved_to_transition: moved,
        })
    }

    /// Move past an acknowledged rest or transition window.
    pub fn advance(&mut self) -> Result<AdvanceOutcome, TimerError> {
        match self.phase {
            Phase::Rest => {
                if !self.set_acknowledged {
                    return Err(TimerError::NotAcknowledged);
                }
                if self.progress.is_final(&self.shape) {
                    self.reset_to_idle();
                    return Ok(AdvanceOutcome::WorkoutComplete);
                }
                if self.progress.is_last_set(&self.shape) {
                    // Registration normally moved us to Transition already;
                    // treat a stray rest-advance across the bound the same.
                    self.progress.advance_exercise(&self.shape);
                    self.reset_to_idle();
                    return Ok(AdvanceOutcome::NextExercise);
                }
                self.progress.advance(&self.shape);
                let now = self.clock.now();
                self.enter_preparation(
                    now + Duration::seconds(i64::from(self.settings.countdown_secs)),
                );
                Ok(AdvanceOutcome::NextSet)
            }
            Phase::Transition => {
                self.progress.advance_exercise(&self.shape);
                self.reset_to_idle();
                Ok(AdvanceOutcome::NextExercise)
            }
            _ => Err(TimerError::InvalidAdvance),
        }
    }

    /// Valid from any state; returns to a clean no-active-set condition.
    pub fn cancel(&mut self) {
        self.reset_to_idle();
        self.progress = SessionProgress::default();
        self.last_execution_ms = 0;
    }

    fn enter_preparation(&mut self, deadline: DateTime<Utc>) {
        self.phase = Phase::Preparation;
        self.phase_anchor = Some(deadline);
        self.set_acknowledged = false;
        self.countdown_last_whole = None;
        self.overdue_buzzed = false;
    }

    fn reset_to_idle(&mut self) {
        self.phase = Phase::Idle;
        self.phase_anchor = None;
        self.set_acknowledged = false;
        self.countdown_last_whole = None;
        self.overdue_buzzed = false;
    }
}
