pub mod medication;

pub use medication::medication_tracking_plan;

use std::collections::HashMap;

use crate::models::{
    AnswerRecord, AnswerValue, CoreResult, FlatTaskResult, Step, StepKind, StepResult,
    TrackedItemSelection, TrackedStepInsertion, TrackedStepKind, TrackedStepTemplate,
    TrackedStepVisibility,
};
use crate::persistence::TrackedStateStore;

/// The data-driven description of what a tracked-data store contributes to a
/// run: which schema its own results upload under, where its steps enter a
/// built task, and the ordered step templates with their replication scope.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TrackedDataPlan {
    pub schema_identifier: String,
    pub insertion: TrackedStepInsertion,
    pub steps: Vec<TrackedStepTemplate>,
}

impl TrackedDataPlan {
    pub fn step(&self, identifier: &str) -> Option<&TrackedStepTemplate> {
        self.steps.iter().find(|step| step.identifier == identifier)
    }
}

/// A consistent view of the store taken once per split operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TrackedSnapshot {
    pub schema_identifier: String,
    pub selection: Vec<TrackedItemSelection>,
    pub steps: Vec<TrackedSnapshotStep>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TrackedSnapshotStep {
    pub template: TrackedStepTemplate,
    /// Result to replicate when the run itself did not present the step,
    /// synthesized from persisted state. An empty selection stays an explicit
    /// empty answer, never an absent step.
    pub fallback: StepResult,
}

impl TrackedSnapshot {
    pub fn step(&self, identifier: &str) -> Option<&TrackedSnapshotStep> {
        self.steps
            .iter()
            .find(|step| step.template.identifier == identifier)
    }
}

/// Cross-task answer holder (e.g. selected medications) layered over a
/// persistence seam, in the manner of an adapter over a source.
pub struct TrackedDataStore<S: TrackedStateStore> {
    plan: TrackedDataPlan,
    store: S,
}

impl<S: TrackedStateStore> TrackedDataStore<S> {
    pub fn new(plan: TrackedDataPlan, store: S) -> Self {
        Self { plan, store }
    }

    pub fn plan(&self) -> &TrackedDataPlan {
        &self.plan
    }

    pub fn schema_identifier(&self) -> &str {
        &self.plan.schema_identifier
    }

    pub fn insertion(&self) -> TrackedStepInsertion {
        self.plan.insertion
    }

    pub fn current_selection(&self) -> CoreResult<Vec<TrackedItemSelection>> {
        Ok(self.store.load_selection()?.unwrap_or_default())
    }

    /// The steps this store contributes to a task built right now, filtered
    /// by each template's visibility against persisted state.
    pub fn dynamic_steps(&self) -> CoreResult<Vec<Step>> {
        let selection = self.store.load_selection()?;
        let steps = self
            .plan
            .steps
            .iter()
            .filter(|template| match template.visibility {
                TrackedStepVisibility::InitialSelection => selection.is_none(),
                TrackedStepVisibility::WhenSelectionNonEmpty => {
                    selection.as_ref().is_some_and(|items| !items.is_empty())
                }
                TrackedStepVisibility::EveryRun => true,
            })
            .map(|template| {
                Step::local(
                    template.identifier.clone(),
                    StepKind::Tracked(template.kind),
                )
            })
            .collect();
        Ok(steps)
    }

    /// Harvests tracked answers out of a completed run and persists them, so
    /// the next snapshot reflects what the participant most recently said.
    /// Only un-namespaced step results are considered; namespaced results
    /// belong to sub-task schemas, not to this store.
    pub fn ingest(&self, flat: &FlatTaskResult) -> CoreResult<()> {
        let mut selection: Option<Vec<TrackedItemSelection>> = None;
        let mut quantities: HashMap<String, i64> = HashMap::new();
        let mut context_results: Vec<&StepResult> = Vec::new();

        for step_result in &flat.step_results {
            let Some(template) = self.plan.step(&step_result.identifier) else {
                continue;
            };
            match template.kind {
                TrackedStepKind::Selection => {
                    for answer in &step_result.answers {
                        if let AnswerValue::TrackedSelection(items) = &answer.answer {
                            selection = Some(items.clone());
                        }
                    }
                }
                TrackedStepKind::Frequency => {
                    for answer in &step_result.answers {
                        if let AnswerValue::Scale(Some(quantity)) = answer.answer {
                            quantities.insert(answer.identifier.clone(), quantity);
                        }
                    }
                }
                TrackedStepKind::Context => context_results.push(step_result),
            }
        }

        if let Some(mut items) = selection {
            apply_quantities(&mut items, &quantities);
            self.store.save_selection(&items)?;
            // Context answers cached for the previous selection no longer
            // apply once the selection changes.
            self.store.clear_context_results()?;
        } else if !quantities.is_empty() {
            // Frequency re-answered without a fresh selection step: fold the
            // quantities into the stored selection.
            if let Some(mut items) = self.store.load_selection()? {
                apply_quantities(&mut items, &quantities);
                self.store.save_selection(&items)?;
            }
        }

        for step_result in context_results {
            self.store.save_context_result(step_result)?;
        }

        Ok(())
    }

    /// Reads persisted state exactly once and fixes the view used for an
    /// entire split operation.
    pub fn snapshot(&self) -> CoreResult<TrackedSnapshot> {
        let selection = self.store.load_selection()?.unwrap_or_default();
        let cached_context = self.store.load_context_results()?;

        let steps = self
            .plan
            .steps
            .iter()
            .map(|template| TrackedSnapshotStep {
                template: template.clone(),
                fallback: fallback_result(template, &selection, &cached_context),
            })
            .collect();

        Ok(TrackedSnapshot {
            schema_identifier: self.plan.schema_identifier.clone(),
            selection,
            steps,
        })
    }

    pub fn reset(&self) -> CoreResult<()> {
        self.store.reset()
    }
}

fn apply_quantities(items: &mut [TrackedItemSelection], quantities: &HashMap<String, i64>) {
    for item in items {
        if let Some(quantity) = quantities.get(&item.item) {
            item.quantity = Some(*quantity);
        }
    }
}

fn fallback_result(
    template: &TrackedStepTemplate,
    selection: &[TrackedItemSelection],
    cached_context: &[StepResult],
) -> StepResult {
    let identifier = template.identifier.clone();
    match template.kind {
        TrackedStepKind::Selection => StepResult::new(
            identifier.clone(),
            vec![AnswerRecord::new(
                identifier,
                AnswerValue::TrackedSelection(selection.to_vec()),
            )],
        ),
        TrackedStepKind::Frequency => StepResult::new(
            identifier,
            selection
                .iter()
                .map(|item| AnswerRecord::new(item.item.clone(), AnswerValue::Scale(item.quantity)))
                .collect(),
        ),
        TrackedStepKind::Context => cached_context
            .iter()
            .find(|result| result.identifier == template.identifier)
            .cloned()
            .unwrap_or_else(|| {
                StepResult::new(
                    identifier.clone(),
                    vec![AnswerRecord::new(
                        identifier,
                        AnswerValue::TrackedSelection(selection.to_vec()),
                    )],
                )
            }),
    }
}

#[cfg(test)]
mod tests {
    use crate::models::{
        AnswerRecord, AnswerValue, FlatTaskResult, StepResult, TrackedItemSelection,
        TrackedStepVisibility,
    };
    use crate::persistence::InMemoryTrackedStateStore;

    use super::medication_tracking_plan;
    use super::{TrackedDataStore, TrackedSnapshot};

    fn store() -> TrackedDataStore<InMemoryTrackedStateStore> {
        TrackedDataStore::new(medication_tracking_plan(), InMemoryTrackedStateStore::new())
    }

    fn selection_result(identifier: &str, items: Vec<TrackedItemSelection>) -> StepResult {
        StepResult::new(
            identifier,
            vec![AnswerRecord::new(
                identifier,
                AnswerValue::TrackedSelection(items),
            )],
        )
    }

    #[test]
    fn first_run_presents_selection_steps() {
        let tracked = store();
        let steps = tracked.dynamic_steps().unwrap();
        let identifiers: Vec<&str> = steps
            .iter()
            .map(|step| step.identifier.name.as_str())
            .collect();
        assert!(identifiers.contains(&"medicationSelection"));
    }

    #[test]
    fn selection_steps_disappear_once_a_selection_is_recorded() {
        let tracked = store();
        let flat = FlatTaskResult::new(
            "Medication Task",
            vec![selection_result("medicationSelection", Vec::new())],
        );
        tracked.ingest(&flat).unwrap();

        let steps = tracked.dynamic_steps().unwrap();
        let identifiers: Vec<&str> = steps
            .iter()
            .map(|step| step.identifier.name.as_str())
            .collect();
        assert!(!identifiers.contains(&"medicationSelection"));
        assert!(identifiers.contains(&"momentInDay"));
    }

    #[test]
    fn frequency_step_is_tied_to_the_selection_pass() {
        let tracked = store();
        let first_run = tracked.dynamic_steps().unwrap();
        assert!(
            first_run
                .iter()
                .any(|step| step.identifier.name == "medicationFrequency")
        );

        let flat = FlatTaskResult::new(
            "Medication Task",
            vec![selection_result(
                "medicationSelection",
                vec![TrackedItemSelection::new("Levodopa", None)],
            )],
        );
        tracked.ingest(&flat).unwrap();

        let repeat_run = tracked.dynamic_steps().unwrap();
        assert!(
            !repeat_run
                .iter()
                .any(|step| step.identifier.name == "medicationFrequency")
        );
    }

    #[test]
    fn when_selection_non_empty_visibility_tracks_the_recorded_selection() {
        use crate::models::{
            TrackedStepKind, TrackedStepScope, TrackedStepTemplate, TrackedStepVisibility,
        };
        use crate::tracking::TrackedDataPlan;

        let plan = TrackedDataPlan {
            schema_identifier: "Symptom Tracker".to_string(),
            insertion: crate::models::TrackedStepInsertion::End,
            steps: vec![
                TrackedStepTemplate::new(
                    "symptomSelection",
                    TrackedStepKind::Selection,
                    TrackedStepScope::TrackingOnly,
                    TrackedStepVisibility::InitialSelection,
                ),
                TrackedStepTemplate::new(
                    "symptomSeverity",
                    TrackedStepKind::Frequency,
                    TrackedStepScope::TrackingOnly,
                    TrackedStepVisibility::WhenSelectionNonEmpty,
                ),
            ],
        };
        let tracked = TrackedDataStore::new(plan, InMemoryTrackedStateStore::new());

        // Nothing recorded yet: severity is withheld.
        assert!(
            !tracked
                .dynamic_steps()
                .unwrap()
                .iter()
                .any(|step| step.identifier.name == "symptomSeverity")
        );

        let flat = FlatTaskResult::new(
            "Symptom Task",
            vec![selection_result(
                "symptomSelection",
                vec![TrackedItemSelection::new("Tremor", None)],
            )],
        );
        tracked.ingest(&flat).unwrap();

        assert!(
            tracked
                .dynamic_steps()
                .unwrap()
                .iter()
                .any(|step| step.identifier.name == "symptomSeverity")
        );
    }

    #[test]
    fn ingest_merges_frequency_quantities_into_the_selection() {
        let tracked = store();
        let flat = FlatTaskResult::new(
            "Medication Task",
            vec![
                selection_result(
                    "medicationSelection",
                    vec![TrackedItemSelection::new("Levodopa", None)],
                ),
                StepResult::new(
                    "medicationFrequency",
                    vec![AnswerRecord::new("Levodopa", AnswerValue::Scale(Some(3)))],
                ),
            ],
        );
        tracked.ingest(&flat).unwrap();

        let selection = tracked.current_selection().unwrap();
        assert_eq!(selection.len(), 1);
        assert_eq!(selection[0].item, "Levodopa");
        assert_eq!(selection[0].quantity, Some(3));
    }

    #[test]
    fn snapshot_reports_an_explicit_empty_selection() {
        let tracked = store();
        let snapshot: TrackedSnapshot = tracked.snapshot().unwrap();
        let selection_step = snapshot.step("medicationSelection").unwrap();
        let answer = selection_step.fallback.answer("medicationSelection").unwrap();
        match &answer.answer {
            AnswerValue::TrackedSelection(items) => assert!(items.is_empty()),
            other => panic!("unexpected answer shape {other:?}"),
        }
    }

    #[test]
    fn snapshot_prefers_cached_context_results() {
        let tracked = store();
        let context = StepResult::new(
            "momentInDay",
            vec![AnswerRecord::new(
                "momentInDay",
                AnswerValue::Choices(vec!["Immediately before taking".to_string()]),
            )],
        );
        let flat = FlatTaskResult::new("Medication Task", vec![context.clone()]);
        tracked.ingest(&flat).unwrap();

        let snapshot = tracked.snapshot().unwrap();
        assert_eq!(snapshot.step("momentInDay").unwrap().fallback, context);
    }

    #[test]
    fn reset_restores_the_never_recorded_state() {
        let tracked = store();
        let flat = FlatTaskResult::new(
            "Medication Task",
            vec![selection_result("medicationSelection", Vec::new())],
        );
        tracked.ingest(&flat).unwrap();
        tracked.reset().unwrap();

        let steps = tracked.dynamic_steps().unwrap();
        assert!(
            steps
                .iter()
                .any(|step| step.identifier.name == "medicationSelection")
        );
    }

    #[test]
    fn every_run_templates_are_always_visible() {
        let tracked = store();
        for template in &tracked.plan().steps {
            if template.visibility == TrackedStepVisibility::EveryRun {
                let steps = tracked.dynamic_steps().unwrap();
                assert!(
                    steps
                        .iter()
                        .any(|step| step.identifier.name == template.identifier)
                );
            }
        }
    }

    #[test]
    fn namespaced_results_are_not_ingested() {
        let tracked = store();
        let flat = FlatTaskResult::new(
            "Combo Task",
            vec![selection_result(
                "Tapping Activity.medicationSelection",
                vec![TrackedItemSelection::new("Levodopa", None)],
            )],
        );
        tracked.ingest(&flat).unwrap();

        // Nothing was recorded, so the initial selection step is still due.
        assert!(tracked.current_selection().unwrap().is_empty());
        let steps = tracked.dynamic_steps().unwrap();
        assert!(
            steps
                .iter()
                .any(|step| step.identifier.name == "medicationSelection")
        );
    }
}
