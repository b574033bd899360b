//! Trusted email domain data source

use pingone_core::schema::ResourceSchema;

use super::{LookupDescriptor, Scope, lookup_schema};
use crate::bridge::FieldKind;
use crate::declarative::Field;

pub static TRUSTED_EMAIL_DOMAIN: LookupDescriptor = LookupDescriptor {
    type_name: "trusted_email_domain",
    entity: "trusted email domain",
    scope: Scope::Environment,
    collection: "emailDomains",
    embedded: "emailDomains",
    id_attribute: "trusted_email_domain_id",
    name_attribute: "domain_name",
    name_field: "domainName",
    case_insensitive: false,
    fields: &[Field::new("domain_name", "domainName", FieldKind::String)],
    schema,
};

fn schema() -> ResourceSchema {
    lookup_schema(&TRUSTED_EMAIL_DOMAIN)
        .with_description("Email domain verified for sending notifications from an environment")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pingone_core::context::OperationContext;
    use pingone_core::provider::DataSourceDescriptor;
    use pingone_core::resource::{Resource, Value};
    use serde_json::json;

    use super::*;
    use crate::client::{ClientSettings, Method};
    use crate::data_sources::LookupDataSource;
    use crate::testing::ScriptedTransport;

    const ENV: &str = "11111111-1111-1111-1111-111111111111";

    #[tokio::test]
    async fn lookup_by_domain_name() {
        let transport = ScriptedTransport::new();
        transport.on(
            Method::Get,
            &format!("/environments/{}/emailDomains", ENV),
            200,
            json!({"_embedded": {"emailDomains": [
                {"id": "d-1", "domainName": "mail.example.com"},
                {"id": "d-2", "domainName": "example.com"}
            ]}}),
        );
        let source =
            LookupDataSource::new(&TRUSTED_EMAIL_DOMAIN, transport.client(ClientSettings::default()));
        let ctx = OperationContext::with_timeout(Duration::from_secs(60));

        let config = Resource::new("trusted_email_domain")
            .with_attribute("environment_id", Value::string(ENV))
            .with_attribute("domain_name", Value::string("example.com"));
        let response = source.read(&ctx, &config).await;
        assert!(!response.has_error(), "{:?}", response.diagnostics);
        let state = response.state.unwrap();
        assert_eq!(state.get("trusted_email_domain_id"), &Value::string("d-2"));
        assert_eq!(transport.calls()[0], format!("GET /environments/{}/emailDomains", ENV));
    }

    #[tokio::test]
    async fn missing_domain_names_the_dimension() {
        let transport = ScriptedTransport::new();
        transport.on(
            Method::Get,
            &format!("/environments/{}/emailDomains", ENV),
            200,
            json!({"_embedded": {"emailDomains": []}}),
        );
        let source =
            LookupDataSource::new(&TRUSTED_EMAIL_DOMAIN, transport.client(ClientSettings::default()));
        let ctx = OperationContext::with_timeout(Duration::from_secs(60));

        let config = Resource::new("trusted_email_domain")
            .with_attribute("environment_id", Value::string(ENV))
            .with_attribute("domain_name", Value::string("example.org"));
        let response = source.read(&ctx, &config).await;
        assert!(
            response
                .diagnostics
                .contains_summary("Cannot find trusted email domain from name")
        );
    }
}
