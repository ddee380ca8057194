use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One assignment of a task to a participant at a point in time.
///
/// Mutation is append-only: `finished_on` is set once the activity has been
/// performed and is never cleared by this engine.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledActivity {
    pub guid: Uuid,
    pub task_identifier: String,
    pub scheduled_on: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_on: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub optional: bool,
}

impl ScheduledActivity {
    pub fn new(task_identifier: impl Into<String>, scheduled_on: DateTime<Utc>) -> Self {
        Self {
            guid: Uuid::new_v4(),
            task_identifier: task_identifier.into(),
            scheduled_on,
            expires_on: None,
            finished_on: None,
            optional: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished_on.is_some()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivitySection {
    ExpiredYesterday,
    Today,
    Tomorrow,
    KeepGoing,
    None,
}

impl ActivitySection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExpiredYesterday => "expiredYesterday",
            Self::Today => "today",
            Self::Tomorrow => "tomorrow",
            Self::KeepGoing => "keepGoing",
            Self::None => "none",
        }
    }
}

impl std::str::FromStr for ActivitySection {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "expiredYesterday" => Ok(Self::ExpiredYesterday),
            "today" => Ok(Self::Today),
            "tomorrow" => Ok(Self::Tomorrow),
            "keepGoing" => Ok(Self::KeepGoing),
            "none" => Ok(Self::None),
            _ => Err(()),
        }
    }
}
