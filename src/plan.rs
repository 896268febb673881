use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MuscleGroup {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub muscle_group_id: String,
}

/// One exercise prescription within a template: which exercise, how many sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedExercise {
    pub exercise_id: String,
    pub sets: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutTemplate {
    pub id: String,
    pub name: String,
    pub exercises: Vec<PlannedExercise>,
}

impl WorkoutTemplate {
    pub fn shape(&self) -> PlanShape {
        PlanShape {
            sets: self.exercises.iter().map(|p| p.sets).collect(),
        }
    }
}

/// The set counts of a plan, which is all the machine needs to know about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanShape {
    pub sets: Vec<u32>,
}

impl PlanShape {
    pub fn new(sets: Vec<u32>) -> Self {
        Self { sets }
    }

    pub fn exercise_count(&self) -> usize {
        self.sets.len()
    }

    pub fn sets_for(&self, exercise_index: usize) -> u32 {
        self.sets.get(exercise_index).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty() || self.sets.iter().all(|&s| s == 0)
    }
}

/// Cursor over the plan: which exercise, which set. Monotone within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionProgress {
    pub exercise_index: usize,
    pub set_index: usize,
}

impl SessionProgress {
    pub fn new(exercise_index: usize, set_index: usize) -> Self {
        Self {
            exercise_index,
            set_index,
        }
    }

    /// True when the cursor sits on the last set of its exercise.
    pub fn is_last_set(&self, shape: &PlanShape) -> bool {
        self.set_index + 1 >= shape.sets_for(self.exercise_index) as usize
    }

    /// True when the cursor sits on the last set of the last exercise.
    pub fn is_final(&self, shape: &PlanShape) -> bool {
        self.exercise_index + 1 >= shape.exercise_count() && self.is_last_set(shape)
    }

    /// Move to the next set, crossing into the next exercise when the set
    /// bound is reached. Saturates at the final slot of the plan.
    pub fn advance(&mut self, shape: &PlanShape) {
        if self.is_final(shape) {
            return;
        }
        if self.is_last_set(shape) {
            self.exercise_index += 1;
            self.set_index = 0;
        } else {
            self.set_index += 1;
        }
    }

    /// Move to the first set of the next exercise. Saturates at the plan end.
    pub fn advance_exercise(&mut self, shape: &PlanShape) {
        if self.exercise_index + 1 < shape.exercise_count() {
            self.exercise_index += 1;
            self.set_index = 0;
        }
    }
}
