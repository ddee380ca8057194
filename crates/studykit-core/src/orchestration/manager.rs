use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::builder;
use crate::classifier::{DayBoundaries, SectionPolicy, scheduled_activities_for_section};
use crate::models::{
    ActivityResultBundle, ActivitySection, ActivityTask, CoreError, CoreErrorKind, CoreResult,
    FlatTaskResult, ScheduledActivity, TaskReference,
};
use crate::orchestration::{OrchestrationResult, ResultUploader, ScheduleSink};
use crate::persistence::TrackedStateStore;
use crate::registry::TaskRegistry;
use crate::splitter;
use crate::tracking::TrackedDataStore;

const DEFAULT_SECTIONS: &[ActivitySection] = &[
    ActivitySection::ExpiredYesterday,
    ActivitySection::Today,
    ActivitySection::KeepGoing,
];

/// Composes resolver, builder, tracked-data store, splitter and classifier
/// behind the two external transports.
pub struct ActivityManager<S: TrackedStateStore> {
    registry: TaskRegistry,
    tracked: TrackedDataStore<S>,
    uploader: Arc<dyn ResultUploader>,
    schedule_sink: Arc<dyn ScheduleSink>,
    sections: Vec<ActivitySection>,
    policy: SectionPolicy,
    state: Mutex<ManagerState>,
}

#[derive(Default)]
struct ManagerState {
    activities: Vec<ScheduledActivity>,
    raw_results: HashMap<Uuid, FlatTaskResult>,
}

impl<S: TrackedStateStore> ActivityManager<S> {
    pub fn new(
        registry: TaskRegistry,
        tracked: TrackedDataStore<S>,
        uploader: Arc<dyn ResultUploader>,
        schedule_sink: Arc<dyn ScheduleSink>,
    ) -> Self {
        Self {
            registry,
            tracked,
            uploader,
            schedule_sink,
            sections: DEFAULT_SECTIONS.to_vec(),
            policy: SectionPolicy::default(),
            state: Mutex::new(ManagerState::default()),
        }
    }

    pub fn with_sections(mut self, sections: Vec<ActivitySection>) -> Self {
        self.sections = sections;
        self
    }

    pub fn with_policy(mut self, policy: SectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn sections(&self) -> &[ActivitySection] {
        &self.sections
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn tracked(&self) -> &TrackedDataStore<S> {
        &self.tracked
    }

    /// Replaces the held schedule snapshot.
    pub fn set_activities(&self, activities: Vec<ScheduledActivity>) -> CoreResult<()> {
        self.lock_state()?.activities = activities;
        Ok(())
    }

    pub fn activities(&self) -> CoreResult<Vec<ScheduledActivity>> {
        Ok(self.lock_state()?.activities.clone())
    }

    pub fn create_task(
        &self,
        schedule: &ScheduledActivity,
    ) -> CoreResult<(ActivityTask, TaskReference)> {
        builder::create_task(&self.registry, &self.tracked, schedule)
    }

    /// Activities for the display section at `section_index`, classified at
    /// `now`. An index beyond the configured section list is empty, not an
    /// error.
    pub fn scheduled_activities_for_section<Tz: TimeZone>(
        &self,
        section_index: usize,
        now: &DateTime<Tz>,
    ) -> CoreResult<Vec<ScheduledActivity>> {
        let Some(section) = self.sections.get(section_index).copied() else {
            return Ok(Vec::new());
        };
        let boundaries = DayBoundaries::containing(now);
        let state = self.lock_state()?;
        Ok(
            scheduled_activities_for_section(&state.activities, section, &boundaries, self.policy)
                .into_iter()
                .cloned()
                .collect(),
        )
    }

    /// Splits a completed run into schema bundles. The tracked snapshot is
    /// read here, exactly once per call.
    pub fn activity_results_for_schedule(
        &self,
        schedule: &ScheduledActivity,
        flat: &FlatTaskResult,
    ) -> CoreResult<Vec<ActivityResultBundle>> {
        let snapshot = self.tracked.snapshot()?;
        splitter::activity_results_for_schedule(&self.registry, &snapshot, schedule, flat)
    }

    /// Marks the one targeted schedule finished, persists the run's tracked
    /// answers, stores the raw result, and pushes the split bundles and the
    /// schedule update through the external transports.
    ///
    /// Transport failures are logged and do not fail the update; retries
    /// belong to the transport implementations. A resolution failure aborts
    /// before anything is uploaded.
    pub async fn update_scheduled_activity(
        &self,
        schedule_guid: Uuid,
        result: FlatTaskResult,
        finished_on: DateTime<Utc>,
    ) -> CoreResult<ScheduledActivity> {
        let mut updated = {
            let state = self.lock_state()?;
            state
                .activities
                .iter()
                .find(|activity| activity.guid == schedule_guid)
                .cloned()
                .ok_or_else(|| CoreError {
                    task: None,
                    schema: None,
                    kind: CoreErrorKind::InvalidInput,
                    message: format!("no scheduled activity with guid '{schedule_guid}'"),
                })?
        };
        // Append-only: a finished schedule keeps its original completion
        // time.
        if updated.finished_on.is_none() {
            updated.finished_on = Some(finished_on);
        }

        self.tracked.ingest(&result)?;
        let bundles = self.activity_results_for_schedule(&updated, &result)?;

        // The split succeeded; commit the completion and the raw result.
        {
            let mut state = self.lock_state()?;
            if let Some(activity) = state
                .activities
                .iter_mut()
                .find(|activity| activity.guid == schedule_guid)
            {
                *activity = updated.clone();
            }
            state.raw_results.insert(schedule_guid, result);
        }

        for bundle in bundles {
            let uploader = Arc::clone(&self.uploader);
            let schema = bundle.schema.clone();
            let outcome =
                tokio::task::spawn_blocking(move || uploader.upload(&bundle)).await;
            log_transport_outcome(outcome, "bundle upload failed", &schema.identifier);
        }

        let sink = Arc::clone(&self.schedule_sink);
        let pushed = updated.clone();
        let outcome =
            tokio::task::spawn_blocking(move || sink.schedule_updated(&pushed)).await;
        log_transport_outcome(outcome, "schedule update push failed", &updated.task_identifier);

        Ok(updated)
    }

    /// The raw flat result recorded for a schedule, if any run completed.
    pub fn raw_result(&self, schedule_guid: Uuid) -> CoreResult<Option<FlatTaskResult>> {
        Ok(self.lock_state()?.raw_results.get(&schedule_guid).cloned())
    }

    fn lock_state(&self) -> CoreResult<MutexGuard<'_, ManagerState>> {
        self.state.lock().map_err(|_| CoreError {
            task: None,
            schema: None,
            kind: CoreErrorKind::Internal,
            message: "activity manager mutex poisoned".to_string(),
        })
    }
}

fn log_transport_outcome(
    outcome: Result<OrchestrationResult<()>, tokio::task::JoinError>,
    context: &str,
    subject: &str,
) {
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(error)) => {
            tracing::error!(
                subject = %subject,
                kind = ?error.kind,
                message = %error.message,
                "{context}"
            );
        }
        Err(join_error) => {
            tracing::error!(
                subject = %subject,
                message = %join_error,
                "{context}: transport task join failure"
            );
        }
    }
}
