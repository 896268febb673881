use crate::clock::Clock;
use crate::config::Config;
use crate::export::append_history_csv;
use crate::feedback::FeedbackSink;
use crate::machine::{AdvanceOutcome, Cue, Phase, RegisterOutcome, SessionTimerMachine, TimerError};
use crate::plan::WorkoutTemplate;
use crate::registry::{EntryError, Session, SetDraft, SetMeasurement};
use crate::snapshot::{resume_machine, SnapshotStore, TimerSnapshot};
use crate::store::{generate_id, Store, StoreResult};
use crate::wake_lock::WakeLockManager;
use chrono::Duration;
use std::path::PathBuf;
use std::sync::Arc;

/// Vibration pattern for the "target duration elapsed" nudge.
const OVERDUE_PATTERN: [u64; 3] = [300, 150, 300];

/// Owns one workout session end to end: the state machine, the session
/// aggregate, the snapshot record and the environment collaborators. It is
/// constructed when a workout starts (or resumes) and torn down on finish
/// or cancel; nothing about it is global.
///
/// Persistence writes and feedback calls never block or fail a phase
/// transition; their errors are swallowed at the call site.
pub struct SessionDriver {
    machine: SessionTimerMachine,
    session: Session,
    template_name: String,
    store: Store,
    snapshots: SnapshotStore,
    feedback: Box<dyn FeedbackSink>,
    wake_lock: WakeLockManager,
    clock: Arc<dyn Clock>,
    history_csv: Option<PathBuf>,
    workout_complete: bool,
    cancelled: bool,
}

impl SessionDriver {
    /// Resume the single active session if one exists, otherwise create a
    /// fresh session from `template`.
    pub fn start(
        store: Store,
        template: &WorkoutTemplate,
        config: &Config,
        clock: Arc<dyn Clock>,
        feedback: Box<dyn FeedbackSink>,
    ) -> StoreResult<Self> {
        let snapshots = SnapshotStore::in_dir(store.base_dir());

        let (session, template_name) = match store.active_session()? {
            Some(existing) => {
                let name = store
                    .template(&existing.template_id)?
                    .map(|t| t.name)
                    .unwrap_or_else(|| template.name.clone());
                (existing, name)
            }
            None => {
                let exercises = store.load_exercises()?;
                let session = Session::from_template(
                    generate_id("session"),
                    template,
                    |id| {
                        exercises
                            .iter()
                            .find(|e| e.id == id)
                            .map(|e| e.name.clone())
                            .unwrap_or_else(|| id.to_string())
                    },
                    clock.now(),
                );
                store.save_session(session.clone())?;
                (session, template.name.clone())
            }
        };

        let stored = snapshots.load(&session.id);
        let machine = resume_machine(config.timer_settings(), &session, stored, clock.clone());

        let mut driver = Self {
            machine,
            session,
            template_name,
            store,
            snapshots,
            feedback,
            wake_lock: WakeLockManager::new(),
            clock,
            history_csv: None,
            workout_complete: false,
            cancelled: false,
        };
        driver.wake_lock.acquire();
        Ok(driver)
    }

    pub fn with_history_csv(mut self, path: Option<PathBuf>) -> Self {
        self.history_csv = path;
        self
    }

    pub fn machine(&self) -> &SessionTimerMachine {
        &self.machine
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    pub fn is_workout_complete(&self) -> bool {
        self.workout_complete
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Trailing measurement of the exercise the cursor points at, for
    /// pre-filling the entry form.
    pub fn prior_measurement(&self) -> Option<&SetMeasurement> {
        self.session
            .last_measurement_for(self.machine.progress().exercise_index)
    }

    pub fn current_exercise_name(&self) -> &str {
        self.session
            .slots
            .get(self.machine.progress().exercise_index)
            .map(|slot| slot.exercise_name.as_str())
            .unwrap_or("")
    }

    /// One step of the periodic driver: recompute, deliver cues, persist
    /// when a transition happened.
    pub fn tick(&mut self) {
        let update = self.machine.tick();
        for cue in &update.cues {
            match cue {
                Cue::CountdownTone => self.feedback.play_countdown_tone(),
                Cue::CompletionTone => self.feedback.play_completion_tone(),
                Cue::OverdueBuzz => self.feedback.vibrate(&OVERDUE_PATTERN),
            }
        }
        if update.entered_execution {
            self.persist_snapshot();
        }
    }

    pub fn begin_set(&mut self) -> Result<(), TimerError> {
        self.machine.begin_set()?;
        self.persist_snapshot();
        Ok(())
    }

    pub fn end_set(&mut self) -> Result<i64, TimerError> {
        let execution_ms = self.machine.end_set()?;
        self.persist_snapshot();
        Ok(execution_ms)
    }

    /// Validate the draft and record it against the current rest window.
    /// Invalid-transition requests (wrong phase, already registered) are
    /// no-ops; only draft validation surfaces an error to the caller.
    pub fn register(&mut self, draft: &SetDraft) -> Result<(), EntryError> {
        let validated = draft.validate()?;
        let outcome = match self.machine.register_measurement() {
            Ok(outcome) => outcome,
            Err(_) => return Ok(()),
        };
        if let RegisterOutcome::Recorded { rest_ms, .. } = outcome {
            let progress = self.machine.progress();
            let execution_ms = self.machine.last_execution_ms();
            let now = self.clock.now();
            let started_at = now - Duration::milliseconds(rest_ms + execution_ms);
            let measurement = SetMeasurement {
                set_number: progress.set_index as u32 + 1,
                weight_kg: validated.weight_kg,
                reps: validated.reps,
                rpe: validated.rpe,
                technical_failure: validated.technical_failure,
                execution_ms,
                rest_ms,
                started_at,
                ended_at: started_at + Duration::milliseconds(execution_ms),
            };
            self.session
                .append_measurement(progress.exercise_index, measurement);
            let _ = self.store.save_session(self.session.clone());
            self.persist_snapshot();
        }
        Ok(())
    }

    pub fn advance(&mut self) -> Option<AdvanceOutcome> {
        match self.machine.advance() {
            Ok(AdvanceOutcome::WorkoutComplete) => {
                self.finish();
                Some(AdvanceOutcome::WorkoutComplete)
            }
            Ok(outcome) => {
                self.persist_snapshot();
                Some(outcome)
            }
            Err(_) => None,
        }
    }

    /// Discard the in-progress session entirely: no measurement survives,
    /// the snapshot record is removed and the wake lock released.
    pub fn cancel(&mut self) {
        self.machine.cancel();
        let _ = self.store.delete_session(&self.session.id);
        self.snapshots.clear();
        self.wake_lock.release();
        self.cancelled = true;
    }

    pub fn on_focus_gained(&mut self) {
        if !self.workout_complete && !self.cancelled {
            self.wake_lock.reacquire_if_needed();
        }
    }

    fn finish(&mut self) {
        self.session.completed = true;
        self.session.ended_at = Some(self.clock.now());
        let _ = self.store.save_session(self.session.clone());
        self.snapshots.clear();
        self.wake_lock.release();
        if let Some(path) = &self.history_csv {
            let _ = append_history_csv(path, &self.session, &self.template_name);
        }
        self.workout_complete = true;
    }

    fn persist_snapshot(&self) {
        if self.machine.phase() == Phase::Idle {
            // An idle machine holds nothing worth resuming; the session
            // itself carries the progress.
            self.snapshots.clear();
            return;
        }
        let snapshot = TimerSnapshot::capture(&self.session.id, &self.machine);
        let _ = self.snapshots.save(&snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::feedback::{CueKind, RecordingFeedback};
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn setup(dir: &std::path::Path) -> (Store, WorkoutTemplate, ManualClock) {
        let store = Store::open(dir).unwrap();
        store.seed_defaults().unwrap();
        let template = store.template("full-body-a").unwrap().unwrap();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap());
        (store, template, clock)
    }

    fn driver(store: Store, template: &WorkoutTemplate, clock: &ManualClock) -> SessionDriver {
        SessionDriver::start(
            store,
            template,
            &Config::default(),
            Arc::new(clock.clone()),
            Box::new(RecordingFeedback::new()),
        )
        .unwrap()
    }

    fn run_one_set(driver: &mut SessionDriver, clock: &ManualClock) {
        if driver.machine().phase() == Phase::Idle {
            driver.begin_set().unwrap();
        }
        clock.advance_ms(5000);
        driver.tick();
        clock.advance_ms(25_000);
        driver.end_set().unwrap();
        clock.advance_ms(60_000);
        driver
            .register(&SetDraft {
                weight: "60".into(),
                reps: "8".into(),
                rpe: "8".into(),
                technical_failure: false,
            })
            .unwrap();
    }

    #[test]
    fn starting_creates_and_persists_a_session() {
        let dir = tempdir().unwrap();
        let (store, template, clock) = setup(dir.path());
        let driver = driver(store.clone(), &template, &clock);

        assert_eq!(driver.session().slots.len(), 3);
        let active = store.active_session().unwrap().unwrap();
        assert_eq!(active.id, driver.session().id);
    }

    #[test]
    fn registered_set_lands_in_the_session_with_timestamps() {
        let dir = tempdir().unwrap();
        let (store, template, clock) = setup(dir.path());
        let mut driver = driver(store.clone(), &template, &clock);

        run_one_set(&mut driver, &clock);

        let stored = store.active_session().unwrap().unwrap();
        let m = stored.last_measurement_for(0).unwrap();
        assert_eq!(m.set_number, 1);
        assert_eq!(m.execution_ms, 25_000);
        assert_eq!(m.rest_ms, 60_000);
        assert_eq!(
            m.ended_at - m.started_at,
            Duration::milliseconds(25_000)
        );
    }

    #[test]
    fn quitting_mid_phase_resumes_exactly_there() {
        let dir = tempdir().unwrap();
        let (store, template, clock) = setup(dir.path());
        let mut d = driver(store.clone(), &template, &clock);

        d.begin_set().unwrap();
        clock.advance_ms(5000);
        d.tick();
        clock.advance_ms(10_000);
        drop(d);

        // Process restart: a new driver picks up the same session in
        // Execution with the tension clock still running.
        clock.advance_ms(120_000);
        let resumed = driver(store, &template, &clock);
        assert_eq!(resumed.machine().phase(), Phase::Execution);
        assert_eq!(resumed.machine().elapsed_ms(), Some(130_000));
    }

    #[test]
    fn cancel_discards_session_and_snapshot() {
        let dir = tempdir().unwrap();
        let (store, template, clock) = setup(dir.path());
        let mut d = driver(store.clone(), &template, &clock);

        d.begin_set().unwrap();
        clock.advance_ms(5000);
        d.tick();
        assert_eq!(d.machine().phase(), Phase::Execution);

        d.cancel();
        assert!(d.is_cancelled());
        assert!(store.active_session().unwrap().is_none());
        assert!(SnapshotStore::in_dir(store.base_dir())
            .load(d.session().id.as_str())
            .is_none());
    }

    #[test]
    fn full_plan_finishes_the_session_once() {
        let dir = tempdir().unwrap();
        let history = dir.path().join("history.csv");
        let (store, template, clock) = setup(dir.path());
        let mut d =
            driver(store.clone(), &template, &clock).with_history_csv(Some(history.clone()));

        // full-body-a is 3 exercises x 3 sets.
        let mut completions = 0;
        loop {
            run_one_set(&mut d, &clock);
            match d.advance().unwrap() {
                AdvanceOutcome::WorkoutComplete => {
                    completions += 1;
                    break;
                }
                AdvanceOutcome::NextExercise => {}
                AdvanceOutcome::NextSet => {}
            }
        }

        assert_eq!(completions, 1);
        assert!(d.is_workout_complete());
        let finished = store.session(d.session().id.as_str()).unwrap().unwrap();
        assert!(finished.completed);
        assert!(finished.ended_at.is_some());
        assert_eq!(finished.total_sets_recorded(), 9);
        assert!(store.active_session().unwrap().is_none());
        // 9 data rows + header in the CSV log.
        let csv = std::fs::read_to_string(history).unwrap();
        assert_eq!(csv.lines().count(), 10);
    }

    /// Sink that shares its cue log with the test body.
    struct SharedSink(std::sync::Arc<std::sync::Mutex<Vec<CueKind>>>);

    impl crate::feedback::FeedbackSink for SharedSink {
        fn play_countdown_tone(&mut self) {
            self.0.lock().unwrap().push(CueKind::CountdownTone);
        }
        fn play_completion_tone(&mut self) {
            self.0.lock().unwrap().push(CueKind::CompletionTone);
        }
        fn vibrate(&mut self, _pattern: &[u64]) {
            self.0.lock().unwrap().push(CueKind::Vibration);
        }
    }

    #[test]
    fn cues_are_routed_to_the_feedback_sink() {
        let dir = tempdir().unwrap();
        let (store, template, clock) = setup(dir.path());
        let cues = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut d = SessionDriver::start(
            store,
            &template,
            &Config::default(),
            Arc::new(clock.clone()),
            Box::new(SharedSink(cues.clone())),
        )
        .unwrap();

        d.begin_set().unwrap();
        for _ in 0..50 {
            clock.advance_ms(100);
            d.tick();
        }

        // 4 countdown tones then the completion tone at the deadline.
        let seen = cues.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                CueKind::CountdownTone,
                CueKind::CountdownTone,
                CueKind::CountdownTone,
                CueKind::CountdownTone,
                CueKind::CompletionTone,
            ]
        );
    }

    #[test]
    fn invalid_requests_do_not_disturb_the_session() {
        let dir = tempdir().unwrap();
        let (store, template, clock) = setup(dir.path());
        let mut d = driver(store.clone(), &template, &clock);

        assert!(d.end_set().is_err());
        assert!(d.advance().is_none());
        // Registering outside Rest is a silent no-op.
        d.register(&SetDraft {
            weight: "60".into(),
            reps: "8".into(),
            rpe: String::new(),
            technical_failure: false,
        })
        .unwrap();
        assert_eq!(d.session().total_sets_recorded(), 0);
        assert_eq!(d.machine().phase(), Phase::Idle);
    }
}
