use std::collections::HashMap;

use crate::models::{
    ActivityResultBundle, AnswerRecord, CoreErrorKind, CoreResult, FlatTaskResult,
    NAMESPACE_SEPARATOR, ScheduledActivity, SchemaReference, StepResult, TaskReference,
    TaskStructure, TrackedStepScope,
};
use crate::registry::TaskRegistry;
use crate::tracking::TrackedSnapshot;

/// Splits one flat completed-task result into schema-tagged bundles ready
/// for independent upload.
///
/// Pure given its inputs: the tracked snapshot is taken by the caller,
/// exactly once, before the split begins.
pub fn activity_results_for_schedule(
    registry: &TaskRegistry,
    snapshot: &TrackedSnapshot,
    schedule: &ScheduledActivity,
    flat: &FlatTaskResult,
) -> CoreResult<Vec<ActivityResultBundle>> {
    let reference = registry.resolve(&schedule.task_identifier)?;
    let run = RunLayout::resolve(registry, snapshot, reference)?;

    // First-occurrence order of each schema among the flat steps decides
    // bundle order.
    let mut owned: Vec<(SchemaReference, Vec<StepResult>)> = Vec::new();
    let mut presented_tracked: HashMap<String, StepResult> = HashMap::new();

    for step_result in &flat.step_results {
        match run.resolve_step(snapshot, step_result) {
            ResolvedStep::Owned { schema, step } => {
                match owned.iter_mut().find(|(existing, _)| *existing == schema) {
                    Some((_, steps)) => steps.push(step),
                    None => owned.push((schema, vec![step])),
                }
            }
            ResolvedStep::Replicated => {
                presented_tracked.insert(step_result.identifier.clone(), step_result.clone());
            }
            ResolvedStep::Unrecognized => {
                tracing::warn!(
                    task = %flat.task_identifier,
                    schedule = %schedule.guid,
                    step = %step_result.identifier,
                    kind = ?CoreErrorKind::UnrecognizedStepNamespace,
                    "dropping step result with unrecognized sub-task namespace"
                );
            }
        }
    }

    let bundles = owned
        .into_iter()
        .map(|(schema, mut step_results)| {
            if run.tracks_data {
                append_replicated(&mut step_results, snapshot, &presented_tracked);
            }
            ActivityResultBundle {
                schema,
                schedule: schedule.clone(),
                step_results,
            }
        })
        .collect();

    Ok(bundles)
}

/// Every tracked step the schemas of this run depend on, in the order the
/// plan declares them: the run's own copy when the step was presented, the
/// snapshot fallback otherwise.
fn append_replicated(
    step_results: &mut Vec<StepResult>,
    snapshot: &TrackedSnapshot,
    presented: &HashMap<String, StepResult>,
) {
    for snapshot_step in &snapshot.steps {
        if snapshot_step.template.scope != TrackedStepScope::AllSchemas {
            continue;
        }
        let result = presented
            .get(&snapshot_step.template.identifier)
            .cloned()
            .unwrap_or_else(|| snapshot_step.fallback.clone());
        step_results.push(result);
    }
}

/// The schema layout of one run, resolved once at splitter entry.
struct RunLayout {
    /// Sub-task namespace -> owning schema, in declared order.
    namespaces: Vec<(String, SchemaReference)>,
    /// Schema owning un-namespaced non-tracked steps; combined runs have
    /// none, so such steps are unrecognized there.
    own_schema: Option<SchemaReference>,
    tracking_schema: SchemaReference,
    tracks_data: bool,
}

enum ResolvedStep {
    Owned {
        schema: SchemaReference,
        step: StepResult,
    },
    Replicated,
    Unrecognized,
}

impl RunLayout {
    fn resolve(
        registry: &TaskRegistry,
        snapshot: &TrackedSnapshot,
        reference: &TaskReference,
    ) -> CoreResult<Self> {
        let tracking_schema = SchemaReference::new(
            snapshot.schema_identifier.clone(),
            registry.schema_revision(&snapshot.schema_identifier),
        );

        match &reference.structure {
            TaskStructure::Tracking => Ok(Self {
                namespaces: Vec::new(),
                own_schema: Some(tracking_schema.clone()),
                tracking_schema,
                tracks_data: true,
            }),
            TaskStructure::Simple {
                combines_tracked_data,
                ..
            } => Ok(Self {
                namespaces: Vec::new(),
                own_schema: Some(registry.schema_for(reference)),
                tracking_schema,
                tracks_data: *combines_tracked_data,
            }),
            TaskStructure::Combined { subtasks } => {
                let mut namespaces = Vec::new();
                let mut tracks_data = false;
                for subtask_identifier in subtasks {
                    let subtask = registry.resolve(subtask_identifier)?;
                    match &subtask.structure {
                        TaskStructure::Tracking => tracks_data = true,
                        _ => namespaces
                            .push((subtask_identifier.clone(), registry.schema_for(subtask))),
                    }
                }
                Ok(Self {
                    namespaces,
                    own_schema: None,
                    tracking_schema,
                    tracks_data,
                })
            }
        }
    }

    fn resolve_step(&self, snapshot: &TrackedSnapshot, step_result: &StepResult) -> ResolvedStep {
        // Tracked contributions are never namespaced, so this match and the
        // namespace match below are disjoint.
        if let Some(snapshot_step) = snapshot.step(&step_result.identifier) {
            return match snapshot_step.template.scope {
                TrackedStepScope::TrackingOnly if self.tracks_data => ResolvedStep::Owned {
                    schema: self.tracking_schema.clone(),
                    step: step_result.clone(),
                },
                TrackedStepScope::AllSchemas if self.tracks_data => ResolvedStep::Replicated,
                _ => self.resolve_plain(step_result),
            };
        }

        for (namespace, schema) in &self.namespaces {
            if let Some(stripped) = strip_namespace(step_result, namespace) {
                return ResolvedStep::Owned {
                    schema: schema.clone(),
                    step: stripped,
                };
            }
        }

        self.resolve_plain(step_result)
    }

    fn resolve_plain(&self, step_result: &StepResult) -> ResolvedStep {
        match &self.own_schema {
            Some(schema) => ResolvedStep::Owned {
                schema: schema.clone(),
                step: step_result.clone(),
            },
            None => ResolvedStep::Unrecognized,
        }
    }
}

/// Strips `<namespace>.` from the step identifier and from every nested
/// answer identifier that carries it.
fn strip_namespace(step_result: &StepResult, namespace: &str) -> Option<StepResult> {
    let prefix = format!("{namespace}{NAMESPACE_SEPARATOR}");
    let local = step_result.identifier.strip_prefix(&prefix)?;

    let answers = step_result
        .answers
        .iter()
        .map(|answer| AnswerRecord {
            identifier: answer
                .identifier
                .strip_prefix(&prefix)
                .unwrap_or(&answer.identifier)
                .to_string(),
            answer: answer.answer.clone(),
        })
        .collect();

    Some(StepResult {
        identifier: local.to_string(),
        answers,
    })
}
