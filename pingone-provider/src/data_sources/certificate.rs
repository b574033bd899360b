//! Certificate data source

use pingone_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::{LookupDescriptor, Scope, lookup_schema};
use crate::bridge::FieldKind;
use crate::declarative::Field;

pub static CERTIFICATE: LookupDescriptor = LookupDescriptor {
    type_name: "certificate",
    entity: "certificate",
    scope: Scope::Environment,
    collection: "certificates",
    embedded: "certificates",
    id_attribute: "certificate_id",
    name_attribute: "name",
    name_field: "name",
    case_insensitive: false,
    fields: &[
        Field::new("name", "name", FieldKind::String),
        Field::new("algorithm", "algorithm", FieldKind::String),
        Field::new("default", "default", FieldKind::Bool),
        Field::new("issuer_dn", "issuerDN", FieldKind::String),
        Field::new("subject_dn", "subjectDN", FieldKind::String),
        Field::new("key_length", "keyLength", FieldKind::Int32),
        Field::new("serial_number", "serialNumber", FieldKind::String),
        Field::new("signature_algorithm", "signatureAlgorithm", FieldKind::String),
        Field::new("status", "status", FieldKind::String),
        Field::new("usage_type", "usageType", FieldKind::String),
        Field::new("validity_period", "validityPeriod", FieldKind::Int32),
        Field::new("starts_at", "startsAt", FieldKind::Timestamp),
        Field::new("expires_at", "expiresAt", FieldKind::Timestamp),
    ],
    schema,
};

fn schema() -> ResourceSchema {
    let mut schema = lookup_schema(&CERTIFICATE)
        .with_description("Certificate stored in an environment's certificate management");
    for (name, attr_type) in [
        ("algorithm", AttributeType::String),
        ("default", AttributeType::Bool),
        ("issuer_dn", AttributeType::String),
        ("subject_dn", AttributeType::String),
        ("key_length", AttributeType::Int),
        ("serial_number", AttributeType::String),
        ("signature_algorithm", AttributeType::String),
        ("status", AttributeType::String),
        ("usage_type", AttributeType::String),
        ("validity_period", AttributeType::Int),
        ("starts_at", AttributeType::String),
        ("expires_at", AttributeType::String),
    ] {
        schema = schema.attribute(AttributeSchema::new(name, attr_type).computed());
    }
    schema
}
