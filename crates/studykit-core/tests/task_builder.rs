use chrono::Utc;

use studykit_core::builder::create_task;
use studykit_core::models::{
    AnswerRecord, AnswerValue, CoreErrorKind, FlatTaskResult, ScheduledActivity, Step, StepKind,
    StepResult, TaskReference, TaskStructure,
};
use studykit_core::persistence::InMemoryTrackedStateStore;
use studykit_core::registry::TaskRegistry;
use studykit_core::tracking::{TrackedDataStore, medication_tracking_plan};

const MEDICATION_TASK_ID: &str = "Medication Task";
const COMBO_TASK_ID: &str = "Combo Task";
const TAPPING_TASK_ID: &str = "Tapping Task";
const MEMORY_TASK_ID: &str = "Memory Task";

fn registry() -> TaskRegistry {
    let tapping = vec![
        Step::local("instruction", StepKind::Instruction),
        Step::local("tapping", StepKind::Active),
    ];
    let memory = vec![
        Step::local("instruction", StepKind::Instruction),
        Step::local("memory", StepKind::Active),
    ];

    TaskRegistry::new(
        vec![
            TaskReference {
                identifier: MEDICATION_TASK_ID.to_string(),
                schema_identifier: None,
                structure: TaskStructure::Tracking,
            },
            TaskReference {
                identifier: COMBO_TASK_ID.to_string(),
                schema_identifier: None,
                structure: TaskStructure::Combined {
                    subtasks: vec![
                        MEDICATION_TASK_ID.to_string(),
                        "Tapping Activity".to_string(),
                        "Memory Activity".to_string(),
                    ],
                },
            },
            TaskReference {
                identifier: TAPPING_TASK_ID.to_string(),
                schema_identifier: Some("Tapping Activity".to_string()),
                structure: TaskStructure::Simple {
                    steps: tapping.clone(),
                    combines_tracked_data: true,
                },
            },
            TaskReference {
                identifier: MEMORY_TASK_ID.to_string(),
                schema_identifier: Some("Memory Activity".to_string()),
                structure: TaskStructure::Simple {
                    steps: memory.clone(),
                    combines_tracked_data: false,
                },
            },
            TaskReference {
                identifier: "Tapping Activity".to_string(),
                schema_identifier: None,
                structure: TaskStructure::Simple {
                    steps: tapping,
                    combines_tracked_data: false,
                },
            },
            TaskReference {
                identifier: "Memory Activity".to_string(),
                schema_identifier: None,
                structure: TaskStructure::Simple {
                    steps: memory,
                    combines_tracked_data: false,
                },
            },
        ],
        Vec::new(),
    )
    .unwrap()
}

fn tracked_store() -> TrackedDataStore<InMemoryTrackedStateStore> {
    TrackedDataStore::new(medication_tracking_plan(), InMemoryTrackedStateStore::new())
}

fn schedule(task_identifier: &str) -> ScheduledActivity {
    ScheduledActivity::new(task_identifier, Utc::now())
}

fn record_empty_selection(tracked: &TrackedDataStore<InMemoryTrackedStateStore>) {
    let flat = FlatTaskResult::new(
        MEDICATION_TASK_ID,
        vec![StepResult::new(
            "medicationSelection",
            vec![AnswerRecord::new(
                "medicationSelection",
                AnswerValue::TrackedSelection(Vec::new()),
            )],
        )],
    );
    tracked.ingest(&flat).unwrap();
}

#[test]
fn medication_task_is_built_from_the_tracked_plan() {
    let registry = registry();
    let tracked = tracked_store();

    let (task, reference) = create_task(&registry, &tracked, &schedule(MEDICATION_TASK_ID)).unwrap();

    assert_eq!(reference.identifier, MEDICATION_TASK_ID);
    let identifiers: Vec<String> = task
        .steps
        .iter()
        .map(|step| step.identifier.qualified())
        .collect();
    assert_eq!(
        identifiers,
        vec![
            "medicationSelection",
            "medicationFrequency",
            "momentInDay",
            "medicationActivityTiming",
            "medicationTrackEach",
        ]
    );
}

#[test]
fn combined_task_namespaces_subtask_steps_but_not_tracked_steps() {
    let registry = registry();
    let tracked = tracked_store();

    let (task, reference) = create_task(&registry, &tracked, &schedule(COMBO_TASK_ID)).unwrap();
    assert!(reference.is_combined());

    let identifiers: Vec<String> = task
        .steps
        .iter()
        .map(|step| step.identifier.qualified())
        .collect();
    assert_eq!(
        identifiers,
        vec![
            "medicationSelection",
            "medicationFrequency",
            "momentInDay",
            "medicationActivityTiming",
            "medicationTrackEach",
            "Tapping Activity.instruction",
            "Tapping Activity.tapping",
            "Memory Activity.instruction",
            "Memory Activity.memory",
        ]
    );

    for step in &task.steps {
        if matches!(step.kind, StepKind::Tracked(_)) {
            assert!(!step.identifier.is_namespaced());
        } else {
            assert!(step.identifier.is_namespaced());
        }
    }
}

#[test]
fn repeat_combined_task_omits_the_selection_pass() {
    let registry = registry();
    let tracked = tracked_store();
    record_empty_selection(&tracked);

    let (task, _) = create_task(&registry, &tracked, &schedule(COMBO_TASK_ID)).unwrap();

    assert!(
        !task
            .steps
            .iter()
            .any(|step| step.identifier.name == "medicationSelection")
    );
    assert!(
        task.steps
            .iter()
            .any(|step| step.identifier.name == "momentInDay")
    );
}

#[test]
fn simple_task_injects_tracked_steps_at_the_start() {
    let registry = registry();
    let tracked = tracked_store();

    let (task, _) = create_task(&registry, &tracked, &schedule(TAPPING_TASK_ID)).unwrap();

    assert_eq!(task.steps[0].identifier.name, "medicationSelection");
    let tapping_position = task
        .steps
        .iter()
        .position(|step| step.identifier.name == "tapping")
        .unwrap();
    assert_eq!(tapping_position, task.steps.len() - 1);
    // Injected steps stay un-namespaced in a simple task.
    assert!(task.steps.iter().all(|step| !step.identifier.is_namespaced()));
}

#[test]
fn plain_simple_task_gets_no_injection() {
    let registry = registry();
    let tracked = tracked_store();

    let (task, _) = create_task(&registry, &tracked, &schedule(MEMORY_TASK_ID)).unwrap();

    let identifiers: Vec<&str> = task
        .steps
        .iter()
        .map(|step| step.identifier.name.as_str())
        .collect();
    assert_eq!(identifiers, vec!["instruction", "memory"]);
}

#[test]
fn unknown_task_identifier_fails_resolution() {
    let registry = registry();
    let tracked = tracked_store();

    let error = create_task(&registry, &tracked, &schedule("Unmapped Task")).unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::UnresolvedTaskReference);
}

#[test]
fn combined_task_with_unknown_subtask_fails_resolution() {
    let tracked = tracked_store();
    let registry = TaskRegistry::new(
        vec![TaskReference {
            identifier: "Broken Combo".to_string(),
            schema_identifier: None,
            structure: TaskStructure::Combined {
                subtasks: vec!["Missing Activity".to_string()],
            },
        }],
        Vec::new(),
    )
    .unwrap();

    let error = create_task(&registry, &tracked, &schedule("Broken Combo")).unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::UnresolvedTaskReference);
    assert_eq!(error.task.as_deref(), Some("Broken Combo"));
}

#[test]
fn nested_combined_tasks_are_rejected() {
    let tracked = tracked_store();
    let registry = TaskRegistry::new(
        vec![
            TaskReference {
                identifier: "Outer Combo".to_string(),
                schema_identifier: None,
                structure: TaskStructure::Combined {
                    subtasks: vec!["Inner Combo".to_string()],
                },
            },
            TaskReference {
                identifier: "Inner Combo".to_string(),
                schema_identifier: None,
                structure: TaskStructure::Combined {
                    subtasks: Vec::new(),
                },
            },
        ],
        Vec::new(),
    )
    .unwrap();

    let error = create_task(&registry, &tracked, &schedule("Outer Combo")).unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::InvalidInput);
}
