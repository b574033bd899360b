//! System application data source

use pingone_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::{LookupDescriptor, Scope, lookup_schema};
use crate::bridge::FieldKind;
use crate::declarative::Field;

pub static SYSTEM_APPLICATION: LookupDescriptor = LookupDescriptor {
    type_name: "system_application",
    entity: "system application",
    scope: Scope::Environment,
    collection: "applications",
    embedded: "applications",
    id_attribute: "application_id",
    name_attribute: "name",
    name_field: "name",
    case_insensitive: true,
    fields: &[
        Field::new("name", "name", FieldKind::String),
        Field::new("type", "type", FieldKind::String),
        Field::new("enabled", "enabled", FieldKind::Bool),
    ],
    schema,
};

fn schema() -> ResourceSchema {
    lookup_schema(&SYSTEM_APPLICATION)
        .with_description("Built-in portal or self-service application, matched case-insensitively by name")
        .attribute(AttributeSchema::new("type", AttributeType::String).computed())
        .attribute(AttributeSchema::new("enabled", AttributeType::Bool).computed())
}
