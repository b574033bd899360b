//! System application resource
//!
//! Every environment comes with one portal and one self-service
//! application. They cannot be created or deleted; "create" adopts the
//! existing application of the requested type and "delete" only forgets it.

use pingone_core::schema::{AttributeSchema, AttributeType, Discriminator, ResourceSchema, Variant, types};

use crate::bridge::FieldKind;
use crate::declarative::{CreateMode, DeleteMode, EntityDescriptor, Field};

pub static SYSTEM_APPLICATION: EntityDescriptor = EntityDescriptor {
    type_name: "system_application",
    entity: "system application",
    collection: "applications",
    embedded: "applications",
    fields: &[
        Field::new("type", "type", FieldKind::String),
        Field::new("name", "name", FieldKind::String).read_only(),
        Field::new("enabled", "enabled", FieldKind::Bool),
        Field::new("apply_default_theme", "applyDefaultTheme", FieldKind::Bool),
        Field::new(
            "enable_default_theme_footer",
            "enableDefaultThemeFooter",
            FieldKind::Bool,
        ),
    ],
    create: CreateMode::Adopt,
    delete: DeleteMode::Abandon,
    schema,
};

fn schema() -> ResourceSchema {
    ResourceSchema::new("system_application")
        .with_description("Built-in portal or self-service application of an environment")
        .attribute(AttributeSchema::new("id", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new("environment_id", types::resource_id())
                .required()
                .requires_replace(),
        )
        .attribute(
            AttributeSchema::new(
                "type",
                types::enum_of(&["PING_ONE_PORTAL", "PING_ONE_SELF_SERVICE"]),
            )
            .required()
            .requires_replace(),
        )
        .attribute(AttributeSchema::new("name", AttributeType::String).computed())
        .attribute(AttributeSchema::new("enabled", AttributeType::Bool).required())
        .attribute(AttributeSchema::new("apply_default_theme", AttributeType::Bool).optional_computed())
        .attribute(
            AttributeSchema::new("enable_default_theme_footer", AttributeType::Bool)
                .optional_computed(),
        )
        .with_discriminator(Discriminator::new(
            "type",
            vec![
                Variant::new("PING_ONE_PORTAL"),
                Variant::new("PING_ONE_SELF_SERVICE")
                    .optional(&["apply_default_theme", "enable_default_theme_footer"]),
            ],
        ))
}
