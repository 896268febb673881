use crate::registry::Session;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io;
use std::path::Path;

/// External analysis format for a finished session. Field names are part of
/// the interface; durations are whole seconds rounded from the stored
/// millisecond values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionExport {
    pub workout: String,
    pub date: String,
    pub duration_minutes: i64,
    pub exercises: Vec<ExerciseExport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExerciseExport {
    pub name: String,
    pub sets: Vec<SetExport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetExport {
    pub weight_kg: f64,
    pub reps: u32,
    pub rpe: Option<f64>,
    pub tut_seconds: i64,
    pub rest_seconds: i64,
    pub technical_failure: bool,
}

fn round_to_seconds(ms: i64) -> i64 {
    (ms + 500) / 1000
}

pub fn export_session(session: &Session, workout_name: &str) -> SessionExport {
    let ended = session.ended_at.unwrap_or(session.started_at);
    let duration_ms = (ended - session.started_at).num_milliseconds().max(0);

    SessionExport {
        workout: workout_name.to_string(),
        date: session.started_at.format("%Y-%m-%d").to_string(),
        duration_minutes: (duration_ms + 30_000) / 60_000,
        exercises: session
            .slots
            .iter()
            .map(|slot| ExerciseExport {
                name: slot.exercise_name.clone(),
                sets: slot
                    .measurements
                    .iter()
                    .map(|m| SetExport {
                        weight_kg: m.weight_kg,
                        reps: m.reps,
                        rpe: m.rpe,
                        tut_seconds: round_to_seconds(m.execution_ms),
                        rest_seconds: round_to_seconds(m.rest_ms),
                        technical_failure: m.technical_failure,
                    })
                    .collect(),
            })
            .collect(),
    }
}

/// Append one row per set of a finished session to the CSV history log,
/// emitting the header when the file is created.
pub fn append_history_csv(
    path: &Path,
    session: &Session,
    workout_name: &str,
) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let needs_header = !path.exists();
    let file = OpenOptions::new().append(true).create(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    if needs_header {
        writer.write_record([
            "date",
            "workout",
            "exercise",
            "set",
            "weight_kg",
            "reps",
            "rpe",
            "tut_seconds",
            "rest_seconds",
            "technical_failure",
        ])?;
    }

    let date = session.started_at.format("%Y-%m-%d").to_string();
    for slot in &session.slots {
        for m in &slot.measurements {
            writer.write_record([
                date.clone(),
                workout_name.to_string(),
                slot.exercise_name.clone(),
                m.set_number.to_string(),
                format!("{}", m.weight_kg),
                m.reps.to_string(),
                m.rpe.map(|r| format!("{r}")).unwrap_or_default(),
                round_to_seconds(m.execution_ms).to_string(),
                round_to_seconds(m.rest_ms).to_string(),
                m.technical_failure.to_string(),
            ])?;
        }
    }
    writer.flush()
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutSummary {
    pub template_id: String,
    pub sessions: usize,
    pub total_sets: usize,
    pub total_volume_kg: f64,
}

/// Per-template totals over completed sessions, newest-agnostic.
pub fn history_summary(sessions: &[Session]) -> Vec<WorkoutSummary> {
    sessions
        .iter()
        .filter(|s| s.completed)
        .into_group_map_by(|s| s.template_id.clone())
        .into_iter()
        .map(|(template_id, group)| {
            let total_sets = group.iter().map(|s| s.total_sets_recorded()).sum();
            let total_volume_kg = group
                .iter()
                .flat_map(|s| s.slots.iter())
                .flat_map(|slot| slot.measurements.iter())
                .map(|m| m.weight_kg * f64::from(m.reps))
                .sum();
            WorkoutSummary {
                template_id,
                sessions: group.len(),
                total_sets,
                total_volume_kg,
            }
        })
        .sorted_by(|a, b| a.template_id.cmp(&b.template_id))
        .collect()
}
