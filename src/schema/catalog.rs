//! Built-in entity schemas of the task-tracking system
//!
//! The web layer, bot and export jobs all persist through these four
//! entities. Enumerated values are enforced on insert and skipped on update.

use super::errors::SchemaResult;
use super::loader::SchemaLoader;
use super::types::{FieldSpec, SchemaDescriptor};

pub const ROLES: [&str; 4] = ["admin", "manager", "member", "viewer"];
pub const TASK_STATUSES: [&str; 3] = ["todo", "in_progress", "done"];
pub const TASK_PRIORITIES: [&str; 4] = ["low", "medium", "high", "urgent"];
pub const DOC_ACCESS_LEVELS: [&str; 3] = ["public", "team", "private"];

pub fn users() -> SchemaResult<SchemaDescriptor> {
    SchemaDescriptor::builder("users")
        .field("telegram_username", FieldSpec::text().required().indexed().unique())
        .field("full_name", FieldSpec::text().required())
        .field(
            "role",
            FieldSpec::text().required().default_value("member").allowed(ROLES),
        )
        .field("is_active", FieldSpec::boolean().required().default_value(true))
        .field("registered_at", FieldSpec::timestamp())
        .field("last_login", FieldSpec::timestamp())
        .field("email", FieldSpec::text())
        .field("department", FieldSpec::text())
        .build()
}

pub fn tasks() -> SchemaResult<SchemaDescriptor> {
    SchemaDescriptor::builder("tasks")
        .field("task_id", FieldSpec::serial())
        .field("title", FieldSpec::text().required())
        .field("description", FieldSpec::text())
        .field(
            "status",
            FieldSpec::text()
                .required()
                .default_value("todo")
                .indexed()
                .allowed(TASK_STATUSES),
        )
        .field("assignee", FieldSpec::text().indexed())
        .field("creator", FieldSpec::text().required())
        .field("created_at", FieldSpec::timestamp())
        .field("updated_at", FieldSpec::timestamp())
        .field("due_date", FieldSpec::date())
        .field("completed_at", FieldSpec::timestamp())
        .field(
            "priority",
            FieldSpec::text()
                .required()
                .default_value("medium")
                .allowed(TASK_PRIORITIES),
        )
        .field("tags", FieldSpec::json())
        .build()
}

pub fn events() -> SchemaResult<SchemaDescriptor> {
    SchemaDescriptor::builder("events")
        .field("event_id", FieldSpec::serial())
        .field("title", FieldSpec::text().required())
        .field("description", FieldSpec::text())
        .field("start_time", FieldSpec::timestamp().required().indexed())
        .field("end_time", FieldSpec::timestamp().required())
        .field("creator", FieldSpec::text().required())
        .field("participants", FieldSpec::json())
        .field("created_at", FieldSpec::timestamp())
        .field("location", FieldSpec::text())
        .build()
}

pub fn docs() -> SchemaResult<SchemaDescriptor> {
    SchemaDescriptor::builder("docs")
        .field("doc_id", FieldSpec::serial())
        .field("title", FieldSpec::text().required())
        .field("content", FieldSpec::text())
        .field("file_path", FieldSpec::text())
        .field("creator", FieldSpec::text().required())
        .field("created_at", FieldSpec::timestamp())
        .field("updated_at", FieldSpec::timestamp())
        .field(
            "access_level",
            FieldSpec::text()
                .required()
                .default_value("team")
                .allowed(DOC_ACCESS_LEVELS),
        )
        .field("version", FieldSpec::text())
        .build()
}

/// Registers all built-in schemas.
pub fn register_builtin(loader: &mut SchemaLoader) -> SchemaResult<()> {
    for schema in [users()?, tasks()?, events()?, docs()?] {
        loader.register(schema)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_builtin_schemas_build() {
        let mut loader = SchemaLoader::new(Path::new("unused"));
        register_builtin(&mut loader).unwrap();
        let entities: Vec<_> = loader.entities().collect();
        assert_eq!(entities, vec!["docs", "events", "tasks", "users"]);
    }

    #[test]
    fn test_users_has_no_identity() {
        assert!(users().unwrap().identity().is_none());
        assert_eq!(tasks().unwrap().identity().unwrap().field, "task_id");
    }
}
