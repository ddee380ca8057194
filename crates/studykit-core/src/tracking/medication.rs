use crate::models::{
    TrackedStepInsertion, TrackedStepKind, TrackedStepScope, TrackedStepTemplate,
    TrackedStepVisibility,
};
use crate::tracking::TrackedDataPlan;

pub const MEDICATION_TRACKER_SCHEMA: &str = "Medication Tracker";

pub const MEDICATION_SELECTION_STEP: &str = "medicationSelection";
pub const MEDICATION_FREQUENCY_STEP: &str = "medicationFrequency";
pub const MOMENT_IN_DAY_STEP: &str = "momentInDay";
pub const MEDICATION_ACTIVITY_TIMING_STEP: &str = "medicationActivityTiming";
pub const MEDICATION_TRACK_EACH_STEP: &str = "medicationTrackEach";

/// The default medication-tracking plan.
///
/// Selection and frequency answers belong to the medication schema alone;
/// the timing/context answers are replicated into every schema bundle a run
/// produces, so each uploaded activity carries its medication context.
pub fn medication_tracking_plan() -> TrackedDataPlan {
    TrackedDataPlan {
        schema_identifier: MEDICATION_TRACKER_SCHEMA.to_string(),
        insertion: TrackedStepInsertion::Start,
        steps: vec![
            TrackedStepTemplate::new(
                MEDICATION_SELECTION_STEP,
                TrackedStepKind::Selection,
                TrackedStepScope::TrackingOnly,
                TrackedStepVisibility::InitialSelection,
            ),
            // Presented alongside the selection pass; the runner skips it
            // when the participant selects nothing.
            TrackedStepTemplate::new(
                MEDICATION_FREQUENCY_STEP,
                TrackedStepKind::Frequency,
                TrackedStepScope::TrackingOnly,
                TrackedStepVisibility::InitialSelection,
            ),
            TrackedStepTemplate::new(
                MOMENT_IN_DAY_STEP,
                TrackedStepKind::Context,
                TrackedStepScope::AllSchemas,
                TrackedStepVisibility::EveryRun,
            ),
            TrackedStepTemplate::new(
                MEDICATION_ACTIVITY_TIMING_STEP,
                TrackedStepKind::Context,
                TrackedStepScope::AllSchemas,
                TrackedStepVisibility::EveryRun,
            ),
            TrackedStepTemplate::new(
                MEDICATION_TRACK_EACH_STEP,
                TrackedStepKind::Context,
                TrackedStepScope::AllSchemas,
                TrackedStepVisibility::EveryRun,
            ),
        ],
    }
}
