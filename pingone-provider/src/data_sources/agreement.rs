//! Agreement data source

use pingone_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::{LookupDescriptor, Scope, lookup_schema};
use crate::bridge::FieldKind;
use crate::declarative::Field;

pub static AGREEMENT: LookupDescriptor = LookupDescriptor {
    type_name: "agreement",
    entity: "agreement",
    scope: Scope::Environment,
    collection: "agreements",
    embedded: "agreements",
    id_attribute: "agreement_id",
    name_attribute: "name",
    name_field: "name",
    case_insensitive: false,
    fields: &[
        Field::new("name", "name", FieldKind::String),
        Field::new("description", "description", FieldKind::String),
        Field::new("enabled", "enabled", FieldKind::Bool),
        Field::new(
            "reconsent_period_days",
            "reconsentPeriodDays",
            FieldKind::Float32,
        ),
        Field::new("total_consents", "totalConsents", FieldKind::Int32),
        Field::new("expired_consents", "totalExpiredConsents", FieldKind::Int32),
        Field::new(
            "consent_counts_updated_at",
            "consentsAggregatedAt",
            FieldKind::Timestamp,
        ),
    ],
    schema,
};

fn schema() -> ResourceSchema {
    lookup_schema(&AGREEMENT)
        .with_description("Terms-of-service agreement of an environment")
        .attribute(AttributeSchema::new("description", AttributeType::String).computed())
        .attribute(AttributeSchema::new("enabled", AttributeType::Bool).computed())
        .attribute(AttributeSchema::new("reconsent_period_days", AttributeType::Float).computed())
        .attribute(AttributeSchema::new("total_consents", AttributeType::Int).computed())
        .attribute(AttributeSchema::new("expired_consents", AttributeType::Int).computed())
        .attribute(
            AttributeSchema::new("consent_counts_updated_at", AttributeType::String).computed(),
        )
}
