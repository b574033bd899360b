//! Gateway resource
//!
//! Tagged union on `type`: LDAP and RADIUS gateways carry their own
//! attribute groups; the other types only share the common fields.

use pingone_core::schema::{
    AttributeSchema, AttributeType, Discriminator, ResourceSchema, Validator, Variant, types,
};

use crate::bridge::FieldKind;
use crate::declarative::{CreateMode, DeleteMode, EntityDescriptor, Field};

pub const GATEWAY_TYPES: [&str; 5] = [
    "PING_FEDERATE",
    "API_GATEWAY_INTEGRATION",
    "LDAP",
    "RADIUS",
    "PING_INTELLIGENCE",
];

pub static GATEWAY: EntityDescriptor = EntityDescriptor {
    type_name: "gateway",
    entity: "gateway",
    collection: "gateways",
    embedded: "gateways",
    fields: &[
        Field::new("name", "name", FieldKind::String),
        Field::new("description", "description", FieldKind::String).null_clears(),
        Field::new("enabled", "enabled", FieldKind::Bool),
        Field::new("type", "type", FieldKind::String),
        Field::new("bind_dn", "bindDN", FieldKind::String),
        Field::new("bind_password", "bindPassword", FieldKind::String).write_only(),
        Field::new("connection_security", "connectionSecurity", FieldKind::String),
        Field::new("vendor", "vendor", FieldKind::String),
        Field::new("servers", "servers", FieldKind::StringSet),
        Field::new(
            "radius_davinci_policy_id",
            "davinciPolicy.id",
            FieldKind::String,
        ),
        Field::new(
            "radius_default_shared_secret",
            "radiusDefaultSharedSecret",
            FieldKind::String,
        )
        .write_only(),
    ],
    create: CreateMode::Post,
    delete: DeleteMode::Delete,
    schema,
};

fn schema() -> ResourceSchema {
    ResourceSchema::new("gateway")
        .with_description("Gateway that connects PingOne to an on-premises or third-party service")
        .attribute(AttributeSchema::new("id", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new("environment_id", types::resource_id())
                .required()
                .requires_replace(),
        )
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .required()
                .with_validator(Validator::NonEmpty),
        )
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(AttributeSchema::new("enabled", AttributeType::Bool).required())
        .attribute(
            AttributeSchema::new("type", types::enum_of(&GATEWAY_TYPES))
                .required()
                .requires_replace(),
        )
        .attribute(AttributeSchema::new("bind_dn", AttributeType::String))
        .attribute(AttributeSchema::new("bind_password", AttributeType::String).sensitive())
        .attribute(
            AttributeSchema::new(
                "connection_security",
                types::enum_of(&["None", "TLS", "StartTLS"]),
            )
            .optional_computed(),
        )
        .attribute(AttributeSchema::new(
            "vendor",
            types::enum_of(&[
                "PingDirectory",
                "Microsoft Active Directory",
                "Oracle Directory Server Enterprise Edition",
                "Oracle Unified Directory",
                "CA Directory",
                "OpenDJ Directory",
                "IBM (Tivoli) Security Directory Server",
                "LDAP v3 compliant Directory Server",
            ]),
        ))
        .attribute(
            AttributeSchema::new("servers", types::string_set())
                .with_validator(Validator::SizeBetween { min: 1, max: 10 }),
        )
        .attribute(
            AttributeSchema::new("radius_davinci_policy_id", AttributeType::String)
                .with_validator(Validator::NonEmpty),
        )
        .attribute(
            AttributeSchema::new("radius_default_shared_secret", AttributeType::String)
                .sensitive(),
        )
        .with_discriminator(Discriminator::new(
            "type",
            vec![
                Variant::new("PING_FEDERATE"),
                Variant::new("API_GATEWAY_INTEGRATION"),
                Variant::new("PING_INTELLIGENCE"),
                Variant::new("LDAP")
                    .required(&["bind_dn", "bind_password", "vendor", "servers"])
                    .optional(&["connection_security"]),
                Variant::new("RADIUS")
                    .required(&["radius_davinci_policy_id"])
                    .optional(&["radius_default_shared_secret"]),
            ],
        ))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pingone_core::context::OperationContext;
    use pingone_core::provider::ResourceDescriptor;
    use pingone_core::resource::{Attributes, Resource, State, Value};
    use serde_json::json;

    use super::*;
    use crate::client::{ClientSettings, Method};
    use crate::declarative::DeclarativeResource;
    use crate::testing::ScriptedTransport;

    const ENV: &str = "11111111-1111-1111-1111-111111111111";
    const GW: &str = "22222222-2222-2222-2222-222222222222";

    fn ldap_config() -> Attributes {
        [
            ("environment_id", Value::string(ENV)),
            ("name", Value::string("corp-ldap")),
            ("enabled", Value::Bool(true)),
            ("type", Value::string("LDAP")),
            ("bind_dn", Value::string("cn=admin")),
            ("bind_password", Value::string("s3cret")),
            ("vendor", Value::string("PingDirectory")),
            ("servers", Value::set([Value::string("ldap1:636")])),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    #[test]
    fn cross_variant_attributes_are_rejected() {
        let mut config = ldap_config();
        config.insert("radius_davinci_policy_id".to_string(), Value::string("p"));
        let diags = schema().validate(&config);
        assert!(diags.contains_summary("Invalid attribute combination"));
    }

    #[test]
    fn variant_required_attributes_are_enforced() {
        let mut config = ldap_config();
        config.remove("bind_dn");
        let diags = schema().validate(&config);
        assert!(diags.contains_summary("Missing required argument"));

        assert!(!schema().validate(&ldap_config()).has_error());
    }

    #[tokio::test(start_paused = true)]
    async fn create_posts_variant_fields_and_keeps_secrets() {
        let transport = ScriptedTransport::new();
        let path = format!("/environments/{}/gateways", ENV);
        transport.on(
            Method::Post,
            &path,
            201,
            json!({
                "id": GW, "name": "corp-ldap", "enabled": true, "type": "LDAP",
                "bindDN": "cn=admin", "vendor": "PingDirectory",
                "connectionSecurity": "None", "servers": ["ldap1:636"]
            }),
        );
        let resource = DeclarativeResource::new(&GATEWAY, transport.client(ClientSettings::default()));
        let ctx = OperationContext::with_timeout(Duration::from_secs(60));

        let planned = Resource {
            resource_type: "gateway".to_string(),
            attributes: ldap_config(),
        };
        let response = resource.create(&ctx, &planned).await;
        assert!(!response.has_error(), "{:?}", response.diagnostics);

        let request = &transport.requests()[0];
        let body = request.body.as_ref().unwrap();
        assert!(body.get("description").is_none());
        assert_eq!(body["bindPassword"], json!("s3cret"));
        assert!(body.get("radiusDefaultSharedSecret").is_none());

        let state = response.state.unwrap();
        assert_eq!(state.identifier.as_deref(), Some(GW));
        assert_eq!(state.get("bind_password"), &Value::string("s3cret"));
        assert!(state.get("radius_davinci_policy_id").is_null());
    }

    #[tokio::test(start_paused = true)]
    async fn read_of_deleted_gateway_drops_state() {
        let transport = ScriptedTransport::new();
        transport.on(
            Method::Get,
            &format!("/environments/{}/gateways/{}", ENV, GW),
            404,
            json!({"code": "NOT_FOUND", "message": "Unable to find gateway"}),
        );
        let resource = DeclarativeResource::new(&GATEWAY, transport.client(ClientSettings::default()));
        let ctx = OperationContext::with_timeout(Duration::from_secs(60));

        let current = State::existing("gateway", ldap_config()).with_identifier(GW);
        let response = resource.read(&ctx, &current).await;
        assert!(response.state.is_none());
        assert!(!response.has_error());
        assert!(
            response
                .diagnostics
                .contains_summary("Requested resource not found")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn update_clears_a_removed_description() {
        let transport = ScriptedTransport::new();
        let path = format!("/environments/{}/gateways/{}", ENV, GW);
        transport.on(
            Method::Put,
            &path,
            200,
            json!({"id": GW, "name": "corp-ldap", "enabled": true, "type": "LDAP"}),
        );
        let resource = DeclarativeResource::new(&GATEWAY, transport.client(ClientSettings::default()));
        let ctx = OperationContext::with_timeout(Duration::from_secs(60));

        let mut prior = ldap_config();
        prior.insert("description".to_string(), Value::string("old"));
        let prior = State::existing("gateway", prior).with_identifier(GW);
        let planned = Resource {
            resource_type: "gateway".to_string(),
            attributes: ldap_config(),
        };
        let response = resource.update(&ctx, &prior, &planned).await;
        assert!(!response.has_error(), "{:?}", response.diagnostics);
        let body = transport.requests()[0].body.clone().unwrap();
        assert_eq!(body.get("description"), Some(&serde_json::Value::Null));
    }

    #[tokio::test]
    async fn cancelled_read_and_update_keep_the_prior_state() {
        let transport = ScriptedTransport::new();
        let resource = DeclarativeResource::new(&GATEWAY, transport.client(ClientSettings::default()));
        let (ctx, handle) = OperationContext::new(Duration::from_secs(60));
        handle.cancel();

        let current = State::existing("gateway", ldap_config()).with_identifier(GW);
        let response = resource.read(&ctx, &current).await;
        assert_eq!(response.state.as_ref(), Some(&current));
        assert!(response.is_interrupted());

        let mut planned = current.to_resource();
        planned
            .attributes
            .insert("name".to_string(), Value::string("renamed"));
        let response = resource.update(&ctx, &current, &planned).await;
        assert_eq!(response.state.as_ref(), Some(&current));
        assert!(!response.succeeded());

        let diags = resource.delete(&ctx, &current).await;
        assert!(diags.is_interrupted());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn import_requires_environment_and_id() {
        let transport = ScriptedTransport::new();
        let resource = DeclarativeResource::new(&GATEWAY, transport.client(ClientSettings::default()));
        let ctx = OperationContext::with_timeout(Duration::from_secs(60));

        let response = resource.import(&ctx, GW).await;
        assert!(response.has_error());
        assert!(transport.requests().is_empty());
    }
}
