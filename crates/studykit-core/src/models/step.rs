use std::fmt::{Display, Formatter};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::TrackedStepKind;

pub const NAMESPACE_SEPARATOR: char = '.';

/// A step identifier held as a `(namespace, name)` pair.
///
/// The joined `"<namespace>.<name>"` form exists only at the task-runner
/// boundary; inside the core the pair stays split so prefix handling never
/// involves string parsing.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct StepIdentifier {
    pub namespace: Option<String>,
    pub name: String,
}

impl StepIdentifier {
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    pub fn is_namespaced(&self) -> bool {
        self.namespace.is_some()
    }

    /// The joined form handed to the task runner.
    pub fn qualified(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!("{namespace}{NAMESPACE_SEPARATOR}{}", self.name),
            None => self.name.clone(),
        }
    }
}

impl Display for StepIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.qualified())
    }
}

impl Serialize for StepIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.qualified())
    }
}

// Namespaces are assigned by the task builder, never parsed back from
// serialized form: an identifier read from configuration is always local.
impl<'de> Deserialize<'de> for StepIdentifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::local(name))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "tracking", rename_all = "camelCase")]
pub enum StepKind {
    Instruction,
    Question,
    Active,
    Tracked(TrackedStepKind),
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub identifier: StepIdentifier,
    pub kind: StepKind,
}

impl Step {
    pub fn new(identifier: StepIdentifier, kind: StepKind) -> Self {
        Self { identifier, kind }
    }

    pub fn local(name: impl Into<String>, kind: StepKind) -> Self {
        Self::new(StepIdentifier::local(name), kind)
    }

    /// Rehomes the step under a sub-task namespace.
    pub fn namespaced(mut self, namespace: &str) -> Self {
        self.identifier.namespace = Some(namespace.to_string());
        self
    }
}
