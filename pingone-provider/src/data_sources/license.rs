//! License data source
//!
//! Licenses belong to the organization rather than to an environment.

use pingone_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::{LookupDescriptor, Scope, lookup_schema};
use crate::bridge::FieldKind;
use crate::declarative::Field;

pub static LICENSE: LookupDescriptor = LookupDescriptor {
    type_name: "license",
    entity: "license",
    scope: Scope::Organization,
    collection: "licenses",
    embedded: "licenses",
    id_attribute: "license_id",
    name_attribute: "name",
    name_field: "name",
    case_insensitive: false,
    fields: &[
        Field::new("name", "name", FieldKind::String),
        Field::new("package", "package", FieldKind::String),
        Field::new("status", "status", FieldKind::String),
        Field::new("replaces_license_id", "replacesLicense.id", FieldKind::String),
        Field::new("replaced_by_license_id", "replacedByLicense.id", FieldKind::String),
        Field::new("begins_at", "beginsAt", FieldKind::Timestamp),
        Field::new("expires_at", "expiresAt", FieldKind::Timestamp),
        Field::new("terminates_at", "terminatesAt", FieldKind::Timestamp),
        Field::new(
            "assigned_environments_count",
            "assignedEnvironmentsCount",
            FieldKind::Int64,
        ),
        Field::new("environment_regions", "environments.regions", FieldKind::StringSet),
        Field::new("max_environments", "environments.max", FieldKind::Int64),
        Field::new(
            "allow_production",
            "environments.allowProduction",
            FieldKind::Bool,
        ),
    ],
    schema,
};

fn schema() -> ResourceSchema {
    lookup_schema(&LICENSE)
        .with_description("License of the organization")
        .attribute(AttributeSchema::new("package", AttributeType::String).computed())
        .attribute(AttributeSchema::new("status", AttributeType::String).computed())
        .attribute(AttributeSchema::new("replaces_license_id", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new("replaced_by_license_id", AttributeType::String).computed(),
        )
        .attribute(AttributeSchema::new("begins_at", AttributeType::String).computed())
        .attribute(AttributeSchema::new("expires_at", AttributeType::String).computed())
        .attribute(AttributeSchema::new("terminates_at", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new("assigned_environments_count", AttributeType::Int).computed(),
        )
        .attribute(
            AttributeSchema::new("environment_regions", pingone_core::schema::types::string_set())
                .computed(),
        )
        .attribute(AttributeSchema::new("max_environments", AttributeType::Int).computed())
        .attribute(AttributeSchema::new("allow_production", AttributeType::Bool).computed())
}
