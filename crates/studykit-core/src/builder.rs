use crate::models::{
    ActivityTask, CoreError, CoreErrorKind, CoreResult, ScheduledActivity, Step, TaskReference,
    TaskStructure, TrackedStepInsertion,
};
use crate::persistence::TrackedStateStore;
use crate::registry::TaskRegistry;
use crate::tracking::TrackedDataStore;

/// Builds the runnable step sequence for a schedule's task reference.
///
/// Tracked-data steps are computed from the store's current persisted state
/// at build time, so a repeat run always presents the step set matching what
/// the participant has already recorded.
pub fn create_task<S: TrackedStateStore>(
    registry: &TaskRegistry,
    tracked: &TrackedDataStore<S>,
    schedule: &ScheduledActivity,
) -> CoreResult<(ActivityTask, TaskReference)> {
    let reference = registry.resolve(&schedule.task_identifier)?;
    let steps = build_steps(registry, tracked, reference)?;

    let task = ActivityTask {
        identifier: reference.identifier.clone(),
        steps,
    };
    Ok((task, reference.clone()))
}

fn build_steps<S: TrackedStateStore>(
    registry: &TaskRegistry,
    tracked: &TrackedDataStore<S>,
    reference: &TaskReference,
) -> CoreResult<Vec<Step>> {
    match &reference.structure {
        TaskStructure::Tracking => tracked.dynamic_steps(),
        TaskStructure::Simple {
            steps,
            combines_tracked_data,
        } => {
            if !combines_tracked_data {
                return Ok(steps.clone());
            }
            let dynamic = tracked.dynamic_steps()?;
            let mut combined = Vec::with_capacity(steps.len() + dynamic.len());
            match tracked.insertion() {
                TrackedStepInsertion::Start => {
                    combined.extend(dynamic);
                    combined.extend(steps.iter().cloned());
                }
                TrackedStepInsertion::End => {
                    combined.extend(steps.iter().cloned());
                    combined.extend(dynamic);
                }
            }
            Ok(combined)
        }
        TaskStructure::Combined { subtasks } => {
            let mut combined = Vec::new();
            for subtask_identifier in subtasks {
                let subtask = registry.resolve(subtask_identifier).map_err(|error| {
                    CoreError {
                        task: Some(reference.identifier.clone()),
                        message: format!(
                            "combined task names unknown sub-task '{subtask_identifier}'"
                        ),
                        ..error
                    }
                })?;
                match &subtask.structure {
                    // The tracking sub-task's slot is the designated insertion
                    // point: dynamic steps enter once, un-namespaced, so the
                    // splitter can replicate them across schemas later.
                    TaskStructure::Tracking => combined.extend(tracked.dynamic_steps()?),
                    TaskStructure::Simple { steps, .. } => combined.extend(
                        steps
                            .iter()
                            .cloned()
                            .map(|step| step.namespaced(subtask_identifier)),
                    ),
                    TaskStructure::Combined { .. } => {
                        return Err(CoreError {
                            task: Some(reference.identifier.clone()),
                            schema: None,
                            kind: CoreErrorKind::InvalidInput,
                            message: format!(
                                "sub-task '{subtask_identifier}' is itself a combined task"
                            ),
                        });
                    }
                }
            }
            Ok(combined)
        }
    }
}
