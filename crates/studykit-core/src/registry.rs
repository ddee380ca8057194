use std::collections::HashMap;

use crate::models::{CoreError, CoreErrorKind, CoreResult, SchemaReference, TaskReference};

pub const DEFAULT_SCHEMA_REVISION: u32 = 1;

/// Immutable lookup for task references and schema revisions.
///
/// Constructed once from configuration and passed explicitly to the resolver
/// and splitter; there is no process-wide mutable lookup state.
#[derive(Debug)]
pub struct TaskRegistry {
    tasks: HashMap<String, TaskReference>,
    tasks_ordered: Vec<String>,
    schema_revisions: HashMap<String, u32>,
}

impl TaskRegistry {
    pub fn new(
        task_references: Vec<TaskReference>,
        schemas: Vec<SchemaReference>,
    ) -> CoreResult<Self> {
        let mut tasks = HashMap::new();
        let mut tasks_ordered = Vec::with_capacity(task_references.len());
        for reference in task_references {
            let identifier = reference.identifier.clone();
            if tasks.insert(identifier.clone(), reference).is_some() {
                return Err(CoreError {
                    task: Some(identifier.clone()),
                    schema: None,
                    kind: CoreErrorKind::InvalidInput,
                    message: format!("duplicate task reference for '{identifier}'"),
                });
            }
            tasks_ordered.push(identifier);
        }

        let mut schema_revisions = HashMap::new();
        for schema in schemas {
            if schema.revision < DEFAULT_SCHEMA_REVISION {
                return Err(CoreError {
                    task: None,
                    schema: Some(schema.identifier.clone()),
                    kind: CoreErrorKind::InvalidInput,
                    message: format!(
                        "schema '{}' declares revision {}, minimum is {DEFAULT_SCHEMA_REVISION}",
                        schema.identifier, schema.revision
                    ),
                });
            }
            if schema_revisions
                .insert(schema.identifier.clone(), schema.revision)
                .is_some()
            {
                return Err(CoreError {
                    task: None,
                    schema: Some(schema.identifier.clone()),
                    kind: CoreErrorKind::InvalidInput,
                    message: format!("duplicate schema mapping for '{}'", schema.identifier),
                });
            }
        }

        Ok(Self {
            tasks,
            tasks_ordered,
            schema_revisions,
        })
    }

    pub fn task_reference(&self, identifier: &str) -> Option<&TaskReference> {
        self.tasks.get(identifier)
    }

    pub fn resolve(&self, identifier: &str) -> CoreResult<&TaskReference> {
        self.tasks.get(identifier).ok_or_else(|| CoreError {
            task: Some(identifier.to_string()),
            schema: None,
            kind: CoreErrorKind::UnresolvedTaskReference,
            message: format!("no task reference is registered for '{identifier}'"),
        })
    }

    /// Registered task identifiers in registration order.
    pub fn task_identifiers(&self) -> &[String] {
        &self.tasks_ordered
    }

    /// Revision for a schema identifier; schemas without an explicit mapping
    /// upload at revision 1.
    pub fn schema_revision(&self, schema_identifier: &str) -> u32 {
        self.schema_revisions
            .get(schema_identifier)
            .copied()
            .unwrap_or(DEFAULT_SCHEMA_REVISION)
    }

    pub fn schema_for(&self, reference: &TaskReference) -> SchemaReference {
        let identifier = reference.effective_schema_identifier();
        SchemaReference::new(identifier, self.schema_revision(identifier))
    }
}
