use crate::plan::{PlanShape, SessionProgress, WorkoutTemplate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One completed set. Immutable once appended to its slot; corrections are
/// out of scope, there is no update or delete path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SetMeasurement {
    pub set_number: u32,
    pub weight_kg: f64,
    pub reps: u32,
    pub rpe: Option<f64>,
    pub technical_failure: bool,
    pub execution_ms: i64,
    pub rest_ms: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

/// Per-exercise container within a session holding its ordered measurements.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseSlot {
    pub exercise_id: String,
    pub exercise_name: String,
    pub target_sets: u32,
    pub measurements: Vec<SetMeasurement>,
}

impl ExerciseSlot {
    /// Trailing measurement, used to pre-fill the next set's prior performance.
    pub fn last_measurement(&self) -> Option<&SetMeasurement> {
        self.measurements.last()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub template_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub slots: Vec<ExerciseSlot>,
    pub completed: bool,
}

impl Session {
    pub fn from_template(
        id: String,
        template: &WorkoutTemplate,
        exercise_name: impl Fn(&str) -> String,
        started_at: DateTime<Utc>,
    ) -> Self {
        let slots = template
            .exercises
            .iter()
            .map(|planned| ExerciseSlot {
                exercise_id: planned.exercise_id.clone(),
                exercise_name: exercise_name(&planned.exercise_id),
                target_sets: planned.sets,
                measurements: Vec::new(),
            })
            .collect();
        Self {
            id,
            template_id: template.id.clone(),
            started_at,
            ended_at: None,
            slots,
            completed: false,
        }
    }

    pub fn shape(&self) -> PlanShape {
        PlanShape::new(self.slots.iter().map(|s| s.target_sets).collect())
    }

    /// Append is the only mutator of a slot's measurement list.
    pub fn append_measurement(&mut self, exercise_index: usize, measurement: SetMeasurement) {
        if let Some(slot) = self.slots.get_mut(exercise_index) {
            slot.measurements.push(measurement);
        }
    }

    pub fn last_measurement_for(&self, exercise_index: usize) -> Option<&SetMeasurement> {
        self.slots
            .get(exercise_index)
            .and_then(ExerciseSlot::last_measurement)
    }

    pub fn total_sets_recorded(&self) -> usize {
        self.slots.iter().map(|s| s.measurements.len()).sum()
    }

    /// Cursor position derived from recorded measurements: the first slot
    /// whose count is below its target. A fully measured plan parks the
    /// cursor at the final slot.
    pub fn derive_progress(&self) -> SessionProgress {
        for (i, slot) in self.slots.iter().enumerate() {
            if (slot.measurements.len() as u32) < slot.target_sets {
                return SessionProgress::new(i, slot.measurements.len());
            }
        }
        let last = self.slots.len().saturating_sub(1);
        let set = self
            .slots
            .last()
            .map(|s| (s.target_sets as usize).saturating_sub(1))
            .unwrap_or(0);
        SessionProgress::new(last, set)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    Weight(String),
    Reps(String),
    Rpe(String),
}

impl std::fmt::Display for EntryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryError::Weight(raw) => write!(f, "invalid weight: {raw:?}"),
            EntryError::Reps(raw) => write!(f, "invalid reps: {raw:?}"),
            EntryError::Rpe(raw) => write!(f, "invalid RPE: {raw:?}"),
        }
    }
}

impl std::error::Error for EntryError {}

/// Free-text entry form state. Values stay strings while the user edits;
/// nothing reaches a `SetMeasurement` until `validate` passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetDraft {
    pub weight: String,
    pub reps: String,
    pub rpe: String,
    pub technical_failure: bool,
}

impl SetDraft {
    pub fn prefill(measurement: &SetMeasurement) -> Self {
        Self {
            weight: format_weight(measurement.weight_kg),
            reps: measurement.reps.to_string(),
            rpe: measurement.rpe.map(format_weight).unwrap_or_default(),
            technical_failure: false,
        }
    }

    pub fn validate(&self) -> Result<ValidatedSet, EntryError> {
        let weight = parse_weight(&self.weight)?;
        let reps = parse_reps(&self.reps)?;
        let rpe = parse_rpe(&self.rpe)?;
        Ok(ValidatedSet {
            weight_kg: weight,
            reps,
            rpe,
            technical_failure: self.technical_failure,
        })
    }
}

/// Strictly numeric set data, the only thing allowed into a measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatedSet {
    pub weight_kg: f64,
    pub reps: u32,
    pub rpe: Option<f64>,
    pub technical_failure: bool,
}

fn format_weight(value: f64) -> String {
    if (value - value.round()).abs() < f64::EPSILON {
        format!("{}", value.round() as i64)
    } else {
        format!("{value:.1}")
    }
}

fn parse_weight(raw: &str) -> Result<f64, EntryError> {
    let cleaned = raw.trim().replace(',', ".");
    let value: f64 = cleaned
        .parse()
        .map_err(|_| EntryError::Weight(raw.to_string()))?;
    if !value.is_finite() || value < 0.0 {
        return Err(EntryError::Weight(raw.to_string()));
    }
    Ok(value)
}

fn parse_reps(raw: &str) -> Result<u32, EntryError> {
    let value: u32 = raw
        .trim()
        .parse()
        .map_err(|_| EntryError::Reps(raw.to_string()))?;
    if value == 0 {
        return Err(EntryError::Reps(raw.to_string()));
    }
    Ok(value)
}

fn parse_rpe(raw: &str) -> Result<Option<f64>, EntryError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value: f64 = trimmed
        .replace(',', ".")
        .parse()
        .map_err(|_| EntryError::Rpe(raw.to_string()))?;
    if !(1.0..=10.0).contains(&value) {
        return Err(EntryError::Rpe(raw.to_string()));
    }
    Ok(Some(value))
}
