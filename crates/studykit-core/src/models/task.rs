use serde::{Deserialize, Serialize};

use crate::models::Step;

/// Schema identifier plus the revision results are uploaded against.
/// Resolved once per run from the registry, never recomputed per result.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaReference {
    pub identifier: String,
    pub revision: u32,
}

impl SchemaReference {
    pub fn new(identifier: impl Into<String>, revision: u32) -> Self {
        Self {
            identifier: identifier.into(),
            revision,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TaskStructure {
    /// A single-schema task with a declared step sequence.
    Simple {
        steps: Vec<Step>,
        #[serde(default)]
        combines_tracked_data: bool,
    },
    /// A task assembled from named sub-tasks, run as one step sequence.
    Combined { subtasks: Vec<String> },
    /// A task whose steps come entirely from the tracked-data plan.
    Tracking,
}

/// Static metadata for one task type. Immutable once resolved.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReference {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_identifier: Option<String>,
    pub structure: TaskStructure,
}

impl TaskReference {
    /// The schema this task's own results map to; tasks without an explicit
    /// mapping upload under their own identifier.
    pub fn effective_schema_identifier(&self) -> &str {
        self.schema_identifier.as_deref().unwrap_or(&self.identifier)
    }

    pub fn is_combined(&self) -> bool {
        matches!(self.structure, TaskStructure::Combined { .. })
    }
}

/// The runnable step sequence handed to the external task runner.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityTask {
    pub identifier: String,
    pub steps: Vec<Step>,
}
