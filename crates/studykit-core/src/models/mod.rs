pub mod error;
pub mod result;
pub mod schedule;
pub mod step;
pub mod task;
pub mod tracked;

pub use error::{CoreError, CoreErrorKind, CoreResult};
pub use result::{ActivityResultBundle, AnswerRecord, AnswerValue, FlatTaskResult, StepResult};
pub use schedule::{ActivitySection, ScheduledActivity};
pub use step::{NAMESPACE_SEPARATOR, Step, StepIdentifier, StepKind};
pub use task::{ActivityTask, SchemaReference, TaskReference, TaskStructure};
pub use tracked::{
    TrackedItemSelection, TrackedStepInsertion, TrackedStepKind, TrackedStepScope,
    TrackedStepTemplate, TrackedStepVisibility,
};
