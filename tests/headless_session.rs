use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tempfile::tempdir;

use hevi::clock::ManualClock;
use hevi::config::Config;
use hevi::feedback::RecordingFeedback;
use hevi::machine::{AdvanceOutcome, Phase};
use hevi::plan::WorkoutTemplate;
use hevi::registry::SetDraft;
use hevi::session::SessionDriver;
use hevi::snapshot::SnapshotStore;
use hevi::store::Store;

// Headless integration without a TTY: the driver, store and snapshot file
// are exercised exactly as the TUI wires them, with a manual clock.

fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap())
}

fn open_store(dir: &std::path::Path) -> (Store, WorkoutTemplate) {
    let store = Store::open(dir).expect("open store");
    store.seed_defaults().expect("seed defaults");
    let template = store
        .template("full-body-a")
        .expect("load template")
        .expect("template seeded");
    (store, template)
}

fn start(store: &Store, template: &WorkoutTemplate, clock: &ManualClock) -> SessionDriver {
    SessionDriver::start(
        store.clone(),
        template,
        &Config::default(),
        Arc::new(clock.clone()),
        Box::new(RecordingFeedback::new()),
    )
    .expect("start driver")
}

fn draft() -> SetDraft {
    SetDraft {
        weight: "60".into(),
        reps: "8".into(),
        rpe: "7".into(),
        technical_failure: false,
    }
}

/// Tick the driver at the app cadence for the given span.
fn run_for(driver: &mut SessionDriver, clock: &ManualClock, ms: i64) {
    let mut t = 0;
    while t < ms {
        t += 100;
        clock.advance_ms(100);
        driver.tick();
    }
}

#[test]
fn workout_flow_completes_a_full_template() {
    let dir = tempdir().unwrap();
    let clock = clock();
    let (store, template) = open_store(dir.path());
    let mut driver = start(&store, &template, &clock);

    let mut completions = 0;
    let mut boundaries = 0;
    loop {
        if driver.machine().phase() == Phase::Idle {
            driver.begin_set().unwrap();
        }
        run_for(&mut driver, &clock, 5000);
        assert_eq!(driver.machine().phase(), Phase::Execution);
        run_for(&mut driver, &clock, 30_000);
        driver.end_set().unwrap();
        run_for(&mut driver, &clock, 60_000);
        driver.register(&draft()).unwrap();
        boundaries += 1;
        match driver.advance().expect("advance after registration") {
            AdvanceOutcome::WorkoutComplete => {
                completions += 1;
                break;
            }
            _ => continue,
        }
    }

    // full-body-a prescribes 3 exercises x 3 sets.
    assert_eq!(boundaries, 9);
    assert_eq!(completions, 1);
    assert!(driver.is_workout_complete());

    let finished = store
        .session(driver.session().id.as_str())
        .unwrap()
        .expect("session persisted");
    assert!(finished.completed);
    assert_eq!(finished.total_sets_recorded(), 9);
    assert!(store.active_session().unwrap().is_none());
}

#[test]
fn restart_mid_countdown_fast_forwards_into_execution() {
    let dir = tempdir().unwrap();
    let clock = clock();
    let (store, template) = open_store(dir.path());

    let mut driver = start(&store, &template, &clock);
    driver.begin_set().unwrap();
    run_for(&mut driver, &clock, 2000);
    assert_eq!(driver.machine().phase(), Phase::Preparation);
    let session_id = driver.session().id.clone();
    drop(driver);

    // The device slept well past the deadline. On relaunch the machine is
    // already executing, with the missed portion counted as tension time.
    clock.advance_ms(60_000);
    let resumed = start(&store, &template, &clock);
    assert_eq!(resumed.session().id, session_id);
    assert_eq!(resumed.machine().phase(), Phase::Execution);
    // 2s of countdown had passed at shutdown; the deadline was 3s later.
    assert_eq!(resumed.machine().elapsed_ms(), Some(57_000));
}

#[test]
fn restart_mid_rest_keeps_acknowledgement_state() {
    let dir = tempdir().unwrap();
    let clock = clock();
    let (store, template) = open_store(dir.path());

    let mut driver = start(&store, &template, &clock);
    driver.begin_set().unwrap();
    run_for(&mut driver, &clock, 5000);
    run_for(&mut driver, &clock, 20_000);
    driver.end_set().unwrap();
    run_for(&mut driver, &clock, 10_000);
    driver.register(&draft()).unwrap();
    drop(driver);

    clock.advance_ms(30_000);
    let resumed = start(&store, &template, &clock);
    assert_eq!(resumed.machine().phase(), Phase::Rest);
    assert!(resumed.machine().set_acknowledged());
    assert_eq!(resumed.machine().last_execution_ms(), 20_000);
    assert_eq!(resumed.machine().elapsed_ms(), Some(40_000));
    // The registered set survived the restart.
    assert_eq!(resumed.session().total_sets_recorded(), 1);
}

#[test]
fn register_twice_keeps_a_single_measurement() {
    let dir = tempdir().unwrap();
    let clock = clock();
    let (store, template) = open_store(dir.path());
    let mut driver = start(&store, &template, &clock);

    driver.begin_set().unwrap();
    run_for(&mut driver, &clock, 5000);
    run_for(&mut driver, &clock, 25_000);
    driver.end_set().unwrap();
    run_for(&mut driver, &clock, 30_000);

    driver.register(&draft()).unwrap();
    driver.register(&draft()).unwrap();

    assert_eq!(driver.session().total_sets_recorded(), 1);
    let stored = store.active_session().unwrap().unwrap();
    assert_eq!(stored.total_sets_recorded(), 1);
}

#[test]
fn cancel_mid_execution_leaves_no_trace() {
    let dir = tempdir().unwrap();
    let clock = clock();
    let (store, template) = open_store(dir.path());
    let mut driver = start(&store, &template, &clock);

    driver.begin_set().unwrap();
    run_for(&mut driver, &clock, 5000);
    assert_eq!(driver.machine().phase(), Phase::Execution);
    let session_id = driver.session().id.clone();

    driver.cancel();

    assert!(store.active_session().unwrap().is_none());
    assert!(SnapshotStore::in_dir(store.base_dir())
        .load(&session_id)
        .is_none());

    // A subsequent launch starts a brand new session at Idle.
    let fresh = start(&store, &template, &clock);
    assert_ne!(fresh.session().id, session_id);
    assert_eq!(fresh.machine().phase(), Phase::Idle);
}

#[test]
fn countdown_and_completion_cues_reach_the_sink_through_the_driver() {
    // Reuses the driver-level wiring rather than the machine directly, so
    // a cue dropped anywhere in between would show up here.
    let dir = tempdir().unwrap();
    let clock = clock();
    let (store, template) = open_store(dir.path());

    let cues = Arc::new(std::sync::Mutex::new(Vec::new()));

    struct Probe(Arc<std::sync::Mutex<Vec<&'static str>>>);
    impl hevi::feedback::FeedbackSink for Probe {
        fn play_countdown_tone(&mut self) {
            self.0.lock().unwrap().push("countdown");
        }
        fn play_completion_tone(&mut self) {
            self.0.lock().unwrap().push("completion");
        }
        fn vibrate(&mut self, _pattern: &[u64]) {
            self.0.lock().unwrap().push("buzz");
        }
    }

    let mut driver = SessionDriver::start(
        store,
        &template,
        &Config::default(),
        Arc::new(clock.clone()),
        Box::new(Probe(cues.clone())),
    )
    .unwrap();

    driver.begin_set().unwrap();
    run_for(&mut driver, &clock, 5000);
    run_for(&mut driver, &clock, 10_000);
    driver.end_set().unwrap();
    // Cross the 90s rest target to pick up the overdue buzz.
    run_for(&mut driver, &clock, 95_000);

    let seen = cues.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            "countdown",
            "countdown",
            "countdown",
            "countdown",
            "completion",
            "buzz"
        ]
    );
}
