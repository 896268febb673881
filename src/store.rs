use crate::plan::{Exercise, MuscleGroup, PlannedExercise, WorkoutTemplate};
use crate::registry::Session;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug)]
pub enum StoreError {
    Io(io::Error),
    Serde(serde_json::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(err) => write!(f, "I/O error: {err}"),
            StoreError::Serde(err) => write!(f, "Serialization error: {err}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<io::Error> for StoreError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

pub fn generate_id(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("{prefix}-{nanos}-{}", std::process::id())
}

/// JSON-file store for the four data collections. Each collection is one
/// file holding a vector of records addressed by string id; saves are
/// replace-or-push by id.
#[derive(Debug, Clone)]
pub struct Store {
    base_dir: PathBuf,
    muscle_groups_path: PathBuf,
    exercises_path: PathBuf,
    templates_path: PathBuf,
    sessions_path: PathBuf,
}

impl Store {
    pub fn open(base_dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        let store = Self {
            muscle_groups_path: base_dir.join("muscle_groups.json"),
            exercises_path: base_dir.join("exercises.json"),
            templates_path: base_dir.join("templates.json"),
            sessions_path: base_dir.join("sessions.json"),
            base_dir,
        };
        Ok(store)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn load_muscle_groups(&self) -> StoreResult<Vec<MuscleGroup>> {
        self.load_vec(&self.muscle_groups_path)
    }

    pub fn load_exercises(&self) -> StoreResult<Vec<Exercise>> {
        self.load_vec(&self.exercises_path)
    }

    pub fn load_templates(&self) -> StoreResult<Vec<WorkoutTemplate>> {
        self.load_vec(&self.templates_path)
    }

    pub fn load_sessions(&self) -> StoreResult<Vec<Session>> {
        self.load_vec(&self.sessions_path)
    }

    pub fn save_muscle_group(&self, group: MuscleGroup) -> StoreResult<()> {
        self.upsert(&self.muscle_groups_path, group, |g: &MuscleGroup| {
            g.id.clone()
        })
    }

    pub fn save_exercise(&self, exercise: Exercise) -> StoreResult<()> {
        self.upsert(&self.exercises_path, exercise, |e: &Exercise| e.id.clone())
    }

    pub fn save_template(&self, template: WorkoutTemplate) -> StoreResult<()> {
        self.upsert(&self.templates_path, template, |t: &WorkoutTemplate| {
            t.id.clone()
        })
    }

    pub fn save_session(&self, session: Session) -> StoreResult<()> {
        self.upsert(&self.sessions_path, session, |s: &Session| s.id.clone())
    }

    pub fn template(&self, id: &str) -> StoreResult<Option<WorkoutTemplate>> {
        Ok(self.load_templates()?.into_iter().find(|t| t.id == id))
    }

    pub fn muscle_group(&self, id: &str) -> StoreResult<Option<MuscleGroup>> {
        Ok(self.load_muscle_groups()?.into_iter().find(|g| g.id == id))
    }

    pub fn exercise(&self, id: &str) -> StoreResult<Option<Exercise>> {
        Ok(self.load_exercises()?.into_iter().find(|e| e.id == id))
    }

    pub fn session(&self, id: &str) -> StoreResult<Option<Session>> {
        Ok(self.load_sessions()?.into_iter().find(|s| s.id == id))
    }

    pub fn delete_template(&self, id: &str) -> StoreResult<bool> {
        self.delete_by_id::<WorkoutTemplate>(&self.templates_path, id, |t| t.id.clone())
    }

    pub fn delete_exercise(&self, id: &str) -> StoreResult<bool> {
        self.delete_by_id::<Exercise>(&self.exercises_path, id, |e| e.id.clone())
    }

    pub fn delete_muscle_group(&self, id: &str) -> StoreResult<bool> {
        self.delete_by_id::<MuscleGroup>(&self.muscle_groups_path, id, |g| g.id.clone())
    }

    pub fn delete_session(&self, id: &str) -> StoreResult<bool> {
        self.delete_by_id::<Session>(&self.sessions_path, id, |s| s.id.clone())
    }

    /// The single incomplete session, if one exists. The storage layer
    /// guarantees at most one; readers take the first.
    pub fn active_session(&self) -> StoreResult<Option<Session>> {
        Ok(self
            .load_sessions()?
            .into_iter()
            .find(|session| !session.completed))
    }

    pub fn completed_sessions(&self) -> StoreResult<Vec<Session>> {
        Ok(self
            .load_sessions()?
            .into_iter()
            .filter(|session| session.completed)
            .collect())
    }

    /// Seed a small default catalog on first run so the app is usable
    /// before any editing happens.
    pub fn seed_defaults(&self) -> StoreResult<()> {
        if !self.load_templates()?.is_empty() {
            return Ok(());
        }

        let groups = [
            ("chest", "Chest"),
            ("back", "Back"),
            ("legs", "Legs"),
            ("shoulders", "Shoulders"),
        ];
        for (id, name) in groups {
            self.save_muscle_group(MuscleGroup {
                id: id.into(),
                name: name.into(),
            })?;
        }

        let exercises = [
            ("bench-press", "Bench Press", "chest"),
            ("barbell-row", "Barbell Row", "back"),
            ("squat", "Squat", "legs"),
            ("overhead-press", "Overhead Press", "shoulders"),
            ("romanian-deadlift", "Romanian Deadlift", "legs"),
        ];
        for (id, name, group) in exercises {
            self.save_exercise(Exercise {
                id: id.into(),
                name: name.into(),
                muscle_group_id: group.into(),
            })?;
        }

        self.save_template(WorkoutTemplate {
            id: "full-body-a".into(),
            name: "Full Body A".into(),
            exercises: vec![
                PlannedExercise {
                    exercise_id: "squat".into(),
                    sets: 3,
                },
                PlannedExercise {
                    exercise_id: "bench-press".into(),
                    sets: 3,
                },
                PlannedExercise {
                    exercise_id: "barbell-row".into(),
                    sets: 3,
                },
            ],
        })?;
        self.save_template(WorkoutTemplate {
            id: "full-body-b".into(),
            name: "Full Body B".into(),
            exercises: vec![
                PlannedExercise {
                    exercise_id: "romanian-deadlift".into(),
                    sets: 3,
                },
                PlannedExercise {
                    exercise_id: "overhead-press".into(),
                    sets: 3,
                },
                PlannedExercise {
                    exercise_id: "barbell-row".into(),
                    sets: 2,
                },
            ],
        })?;
        Ok(())
    }

    fn load_vec<T: DeserializeOwned>(&self, path: &Path) -> StoreResult<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        let records = serde_json::from_str(&contents)?;
        Ok(records)
    }

    fn save_vec<T: Serialize>(&self, path: &Path, records: &[T]) -> StoreResult<()> {
        let data = serde_json::to_vec_pretty(records)?;
        fs::write(path, data)?;
        Ok(())
    }

    fn upsert<T: Serialize + DeserializeOwned>(
        &self,
        path: &Path,
        record: T,
        id_of: impl Fn(&T) -> String,
    ) -> StoreResult<()> {
        let mut records: Vec<T> = self.load_vec(path)?;
        let id = id_of(&record);
        if let Some(existing) = records.iter_mut().find(|item| id_of(item) == id) {
            *existing = record;
        } else {
            records.push(record);
        }
        self.save_vec(path, &records)
    }

    fn delete_by_id<T: Serialize + DeserializeOwned>(
        &self,
        path: &Path,
        id: &str,
        id_of: impl Fn(&T) -> String,
    ) -> StoreResult<bool> {
        let mut records: Vec<T> = self.load_vec(path)?;
        let before = records.len();
        records.retain(|item| id_of(item) != id);
        let removed = records.len() != before;
        if removed {
            self.save_vec(path, &records)?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn store() -> (Store, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (store, dir)
    }

    #[test]
    fn empty_store_loads_empty_collections() {
        let (store, _dir) = store();
        assert!(store.load_templates().unwrap().is_empty());
        assert!(store.load_sessions().unwrap().is_empty());
        assert!(store.active_session().unwrap().is_none());
    }

    #[test]
    fn seed_defaults_is_idempotent() {
        let (store, _dir) = store();
        store.seed_defaults().unwrap();
        let templates = store.load_templates().unwrap();
        assert_eq!(templates.len(), 2);

        store.seed_defaults().unwrap();
        assert_eq!(store.load_templates().unwrap().len(), 2);
        assert_eq!(store.load_exercises().unwrap().len(), 5);
    }

    #[test]
    fn upsert_replaces_by_id() {
        let (store, _dir) = store();
        store
            .save_exercise(Exercise {
                id: "bench".into(),
                name: "Bench".into(),
                muscle_group_id: "chest".into(),
            })
            .unwrap();
        store
            .save_exercise(Exercise {
                id: "bench".into(),
                name: "Bench Press".into(),
                muscle_group_id: "chest".into(),
            })
            .unwrap();

        let exercises = store.load_exercises().unwrap();
        assert_eq!(exercises.len(), 1);
        assert_eq!(exercises[0].name, "Bench Press");
    }

    #[test]
    fn delete_by_id_reports_removal() {
        let (store, _dir) = store();
        store.seed_defaults().unwrap();
        assert!(store.delete_template("full-body-a").unwrap());
        assert!(!store.delete_template("full-body-a").unwrap());
        assert_eq!(store.load_templates().unwrap().len(), 1);
    }

    #[test]
    fn active_session_query_skips_completed() {
        let (store, _dir) = store();
        store.seed_defaults().unwrap();
        let template = store.template("full-body-a").unwrap().unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();

        let mut done = Session::from_template("s-done".into(), &template, |id| id.into(), t0);
        done.completed = true;
        done.ended_at = Some(t0 + chrono::Duration::hours(1));
        store.save_session(done).unwrap();

        assert!(store.active_session().unwrap().is_none());

        let open = Session::from_template("s-open".into(), &template, |id| id.into(), t0);
        store.save_session(open).unwrap();

        let active = store.active_session().unwrap().unwrap();
        assert_eq!(active.id, "s-open");
        assert_eq!(store.completed_sessions().unwrap().len(), 1);
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = generate_id("session");
        std::thread::sleep(std::time::Duration::from_millis(1));
        let b = generate_id("session");
        assert_ne!(a, b);
        assert!(a.starts_with("session-"));
    }
}
