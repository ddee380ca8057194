use serde::{Deserialize, Serialize};

/// One tracked item the participant has selected, e.g. a medication and the
/// number of times per day it is taken.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedItemSelection {
    pub item: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
}

impl TrackedItemSelection {
    pub fn new(item: impl Into<String>, quantity: Option<i64>) -> Self {
        Self {
            item: item.into(),
            quantity,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackedStepKind {
    Selection,
    Frequency,
    Context,
}

/// Which schemas a tracked step's result is replicated into.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackedStepScope {
    /// Belongs to the tracking schema alone and counts as owned content.
    TrackingOnly,
    /// Copied into every schema bundle emitted for the run.
    AllSchemas,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackedStepVisibility {
    /// Presented only while no selection has ever been recorded.
    InitialSelection,
    /// Presented only when the recorded selection is non-empty.
    WhenSelectionNonEmpty,
    /// Presented on every run.
    EveryRun,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackedStepInsertion {
    Start,
    End,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedStepTemplate {
    pub identifier: String,
    pub kind: TrackedStepKind,
    pub scope: TrackedStepScope,
    pub visibility: TrackedStepVisibility,
}

impl TrackedStepTemplate {
    pub fn new(
        identifier: impl Into<String>,
        kind: TrackedStepKind,
        scope: TrackedStepScope,
        visibility: TrackedStepVisibility,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            kind,
            scope,
            visibility,
        }
    }
}
