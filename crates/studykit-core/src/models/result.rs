use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ScheduledActivity, SchemaReference, TrackedItemSelection};

/// One answer inside a step result, resolved to a closed variant once at the
/// runner boundary so downstream code never re-inspects payload shapes.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum AnswerValue {
    Choices(Vec<String>),
    Scale(Option<i64>),
    TrackedSelection(Vec<TrackedItemSelection>),
    File { path: String },
    Empty,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub identifier: String,
    pub answer: AnswerValue,
}

impl AnswerRecord {
    pub fn new(identifier: impl Into<String>, answer: AnswerValue) -> Self {
        Self {
            identifier: identifier.into(),
            answer,
        }
    }
}

/// The result of one presented step. The identifier is the raw runner-side
/// string and may carry a sub-task namespace prefix inside combined runs.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub identifier: String,
    #[serde(default)]
    pub answers: Vec<AnswerRecord>,
}

impl StepResult {
    pub fn new(identifier: impl Into<String>, answers: Vec<AnswerRecord>) -> Self {
        Self {
            identifier: identifier.into(),
            answers,
        }
    }

    pub fn empty(identifier: impl Into<String>) -> Self {
        Self::new(identifier, Vec::new())
    }

    pub fn has_answers(&self) -> bool {
        !self.answers.is_empty()
    }

    pub fn answer(&self, identifier: &str) -> Option<&AnswerRecord> {
        self.answers.iter().find(|a| a.identifier == identifier)
    }
}

/// The flat, ordered step-result stream one task run produces.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatTaskResult {
    pub task_identifier: String,
    pub task_run: Uuid,
    pub step_results: Vec<StepResult>,
}

impl FlatTaskResult {
    pub fn new(task_identifier: impl Into<String>, step_results: Vec<StepResult>) -> Self {
        Self {
            task_identifier: task_identifier.into(),
            task_run: Uuid::new_v4(),
            step_results,
        }
    }

    pub fn step_result(&self, identifier: &str) -> Option<&StepResult> {
        self.step_results.iter().find(|s| s.identifier == identifier)
    }
}

/// One schema-scoped slice of a completed run, ready for independent upload.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityResultBundle {
    pub schema: SchemaReference,
    pub schedule: ScheduledActivity,
    pub step_results: Vec<StepResult>,
}

impl ActivityResultBundle {
    pub fn step_result(&self, identifier: &str) -> Option<&StepResult> {
        self.step_results.iter().find(|s| s.identifier == identifier)
    }
}
