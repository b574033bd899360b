//! Role data source

use pingone_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{LookupDescriptor, Scope, lookup_schema};
use crate::bridge::FieldKind;
use crate::declarative::Field;

pub static ROLE: LookupDescriptor = LookupDescriptor {
    type_name: "role",
    entity: "role",
    scope: Scope::Global,
    collection: "roles",
    embedded: "roles",
    id_attribute: "role_id",
    name_attribute: "name",
    name_field: "name",
    case_insensitive: false,
    fields: &[
        Field::new("name", "name", FieldKind::String),
        Field::new("description", "description", FieldKind::String),
        Field::new("applicable_to", "applicableTo", FieldKind::StringSet),
    ],
    schema,
};

fn schema() -> ResourceSchema {
    lookup_schema(&ROLE)
        .with_description("Built-in administrator role")
        .attribute(AttributeSchema::new("description", AttributeType::String).computed())
        .attribute(AttributeSchema::new("applicable_to", types::string_set()).computed())
}
