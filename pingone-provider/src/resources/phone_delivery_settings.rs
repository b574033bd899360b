//! Phone delivery settings resource
//!
//! SMS/voice sender configuration. The `provider` attribute selects the
//! custom, twilio or syniverse attribute group.

use pingone_core::schema::{
    AttributeSchema, AttributeType, Discriminator, ResourceSchema, Validator, Variant, types,
};

use crate::bridge::FieldKind;
use crate::declarative::{CreateMode, DeleteMode, EntityDescriptor, Field};

const PROVIDERS: &[(&str, &str)] = &[
    ("custom", "CUSTOM_PROVIDER"),
    ("twilio", "CUSTOM_TWILIO"),
    ("syniverse", "CUSTOM_SYNIVERSE"),
];

pub static PHONE_DELIVERY_SETTINGS: EntityDescriptor = EntityDescriptor {
    type_name: "phone_delivery_settings",
    entity: "phone delivery settings",
    collection: "notificationsSettings/phoneDeliverySettings",
    embedded: "phoneDeliverySettings",
    fields: &[
        Field::new("provider", "provider", FieldKind::Mapped(PROVIDERS)),
        Field::new("custom_name", "name", FieldKind::String),
        Field::new("custom_auth_method", "authentication.method", FieldKind::String),
        Field::new("custom_auth_username", "authentication.username", FieldKind::String),
        Field::new("custom_auth_password", "authentication.password", FieldKind::String)
            .write_only(),
        Field::new("custom_auth_token", "authentication.authToken", FieldKind::String)
            .write_only(),
        Field::new("twilio_sid", "sid", FieldKind::String),
        Field::new("twilio_auth_token", "authToken", FieldKind::String).write_only(),
        Field::new("syniverse_auth_token", "authToken", FieldKind::String).write_only(),
        Field::new("created_at", "createdAt", FieldKind::Timestamp).read_only(),
        Field::new("updated_at", "updatedAt", FieldKind::Timestamp).read_only(),
    ],
    create: CreateMode::Post,
    delete: DeleteMode::Delete,
    schema,
};

fn secret(name: &str) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::String)
        .sensitive()
        .with_validator(Validator::NonEmpty)
}

fn schema() -> ResourceSchema {
    ResourceSchema::new("phone_delivery_settings")
        .with_description("Phone delivery (SMS and voice) provider for an environment")
        .attribute(AttributeSchema::new("id", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new("environment_id", types::resource_id())
                .required()
                .requires_replace(),
        )
        .attribute(
            AttributeSchema::new("provider", types::enum_of(&["custom", "twilio", "syniverse"]))
                .required()
                .requires_replace(),
        )
        .attribute(
            AttributeSchema::new("custom_name", AttributeType::String)
                .with_validator(Validator::NonEmpty),
        )
        .attribute(AttributeSchema::new(
            "custom_auth_method",
            types::enum_of(&["BASIC", "BEARER"]),
        ))
        .attribute(
            AttributeSchema::new("custom_auth_username", AttributeType::String)
                .conflicts_with("custom_auth_token"),
        )
        .attribute(secret("custom_auth_password").conflicts_with("custom_auth_token"))
        .attribute(secret("custom_auth_token"))
        .attribute(
            AttributeSchema::new("twilio_sid", AttributeType::String)
                .with_validator(Validator::NonEmpty),
        )
        .attribute(secret("twilio_auth_token"))
        .attribute(secret("syniverse_auth_token"))
        .attribute(AttributeSchema::new("created_at", AttributeType::String).computed())
        .attribute(AttributeSchema::new("updated_at", AttributeType::String).computed())
        .with_discriminator(Discriminator::new(
            "provider",
            vec![
                Variant::new("custom")
                    .required(&["custom_name", "custom_auth_method"])
                    .optional(&[
                        "custom_auth_username",
                        "custom_auth_password",
                        "custom_auth_token",
                    ]),
                Variant::new("twilio").required(&["twilio_sid", "twilio_auth_token"]),
                Variant::new("syniverse").required(&["syniverse_auth_token"]),
            ],
        ))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pingone_core::context::OperationContext;
    use pingone_core::provider::ResourceDescriptor;
    use pingone_core::resource::{Attributes, Resource, Value};
    use serde_json::json;

    use super::*;
    use crate::client::{ClientSettings, Method};
    use crate::declarative::DeclarativeResource;
    use crate::testing::ScriptedTransport;

    const ENV: &str = "11111111-1111-1111-1111-111111111111";

    fn twilio() -> Attributes {
        [
            ("environment_id", Value::string(ENV)),
            ("provider", Value::string("twilio")),
            ("twilio_sid", Value::string("AC123")),
            ("twilio_auth_token", Value::string("tok")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    #[test]
    fn other_provider_groups_leak_is_rejected() {
        let mut config = twilio();
        config.insert("syniverse_auth_token".to_string(), Value::string("x"));
        let diags = schema().validate(&config);
        assert!(diags.contains_summary("Invalid attribute combination"));
        assert!(!schema().validate(&twilio()).has_error());
    }

    #[test]
    fn basic_and_bearer_credentials_conflict() {
        let config: Attributes = [
            ("environment_id", Value::string(ENV)),
            ("provider", Value::string("custom")),
            ("custom_name", Value::string("sender")),
            ("custom_auth_method", Value::string("BEARER")),
            ("custom_auth_username", Value::string("u")),
            ("custom_auth_token", Value::string("t")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        assert!(
            schema()
                .validate(&config)
                .contains_summary("Invalid parameter combination")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn provider_is_mapped_to_platform_value() {
        let transport = ScriptedTransport::new();
        transport.on(
            Method::Post,
            &format!("/environments/{}/notificationsSettings/phoneDeliverySettings", ENV),
            201,
            json!({
                "id": "p-1", "provider": "CUSTOM_TWILIO", "sid": "AC123",
                "createdAt": "2024-05-01T10:00:00.000Z"
            }),
        );
        let resource = DeclarativeResource::new(
            &PHONE_DELIVERY_SETTINGS,
            transport.client(ClientSettings::default()),
        );
        let ctx = OperationContext::with_timeout(Duration::from_secs(60));

        let planned = Resource {
            resource_type: "phone_delivery_settings".to_string(),
            attributes: twilio(),
        };
        let response = resource.create(&ctx, &planned).await;
        assert!(!response.has_error(), "{:?}", response.diagnostics);

        let body = transport.requests()[0].body.clone().unwrap();
        assert_eq!(
            body,
            json!({"provider": "CUSTOM_TWILIO", "sid": "AC123", "authToken": "tok"})
        );

        let state = response.state.unwrap();
        assert_eq!(state.get("provider"), &Value::string("twilio"));
        assert_eq!(state.get("twilio_auth_token"), &Value::string("tok"));
        assert!(state.get("syniverse_auth_token").is_null());
        assert!(state.get("custom_name").is_null());
        assert_eq!(
            state.get("created_at"),
            &Value::string("2024-05-01T10:00:00Z")
        );
    }
}
