//! Environments data source
//!
//! Lists environment ids matching a SCIM filter. The filter text is passed
//! through verbatim; the result id is derived from the filter so repeated
//! reads of the same query keep the same id.

use std::sync::Arc;

use pingone_core::context::OperationContext;
use pingone_core::diagnostics::Diagnostic;
use pingone_core::provider::{BoxFuture, DataSourceDescriptor, HookResponse};
use pingone_core::resource::{Resource, State, Value};
use pingone_core::schema::{AttributeSchema, AttributeType, ResourceSchema, Validator};

use crate::client::PlatformClient;
use crate::lookup::{self, Collection};
use crate::orchestrator::Outcome;

pub struct EnvironmentsDataSource {
    client: Arc<PlatformClient>,
}

impl EnvironmentsDataSource {
    pub fn new(client: Arc<PlatformClient>) -> Self {
        Self { client }
    }

    /// Scope of the synthetic id
    fn scope(&self) -> &str {
        let settings = &self.client.settings;
        settings
            .organization_id
            .as_deref()
            .or(settings.environment_id.as_deref())
            .unwrap_or_default()
    }

    async fn do_read(&self, ctx: &OperationContext, config: &Resource) -> HookResponse {
        let Some(filter) = config.get("scim_filter").as_str() else {
            return HookResponse::failed(
                Diagnostic::error("Missing required argument")
                    .with_detail("The argument \"scim_filter\" is required.")
                    .for_attribute("scim_filter"),
            );
        };
        let collection = Collection {
            entity: "environment",
            path: "/environments".to_string(),
            embedded: "environments",
            name_field: "name",
            case_insensitive: false,
        };
        match lookup::find_by_filter(&self.client, ctx, &collection, self.scope(), filter).await {
            Outcome::Done(result) => {
                let mut attributes = config.attributes.clone();
                attributes.insert("id".to_string(), Value::string(&result.id));
                attributes.insert(
                    "ids".to_string(),
                    Value::List(result.ids.into_iter().map(Value::String).collect()),
                );
                HookResponse::with_state(
                    State::existing("environments", attributes).with_identifier(result.id),
                )
            }
            Outcome::Absent(diags) | Outcome::Failed(diags) => HookResponse::failed(diags),
        }
    }
}

impl DataSourceDescriptor for EnvironmentsDataSource {
    fn type_name(&self) -> &'static str {
        "environments"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("environments")
            .with_description("Ids of the environments matching a SCIM filter")
            .attribute(AttributeSchema::new("id", AttributeType::String).computed())
            .attribute(
                AttributeSchema::new("scim_filter", AttributeType::String)
                    .required()
                    .with_validator(Validator::NonEmpty)
                    .with_description(
                        "`sw` supports `name`; `eq` supports `id`, `organization.id` and `license.id`; `and` combines conditions",
                    ),
            )
            .attribute(
                AttributeSchema::new("ids", AttributeType::List(Box::new(AttributeType::String)))
                    .computed(),
            )
    }

    fn read<'a>(
        &'a self,
        ctx: &'a OperationContext,
        config: &'a Resource,
    ) -> BoxFuture<'a, HookResponse> {
        Box::pin(self.do_read(ctx, config))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::client::{ClientSettings, Method};
    use crate::testing::ScriptedTransport;

    const FILTER: &str = r#"name sw "TEST-""#;

    fn settings() -> ClientSettings {
        ClientSettings {
            organization_id: Some("org-1".to_string()),
            ..Default::default()
        }
    }

    fn config() -> Resource {
        Resource::new("environments").with_attribute("scim_filter", Value::string(FILTER))
    }

    #[tokio::test]
    async fn filter_collects_ids_across_pages_with_a_stable_id() {
        let transport = ScriptedTransport::new();
        let next = "https://api.pingone.com/v1/environments?cursor=2";
        transport
            .on(
                Method::Get,
                "/environments",
                200,
                json!({
                    "_embedded": {"environments": [{"id": "e-1"}, {"id": "e-2"}]},
                    "_links": {"next": {"href": next}}
                }),
            )
            .on(
                Method::Get,
                next,
                200,
                json!({"_embedded": {"environments": [{"id": "e-3"}]}}),
            );
        let source = EnvironmentsDataSource::new(transport.client(settings()));
        let ctx = OperationContext::with_timeout(Duration::from_secs(60));

        let response = source.read(&ctx, &config()).await;
        assert!(!response.has_error(), "{:?}", response.diagnostics);
        let state = response.state.unwrap();
        assert_eq!(
            state.get("ids"),
            &Value::List(vec![
                Value::string("e-1"),
                Value::string("e-2"),
                Value::string("e-3"),
            ])
        );
        assert_eq!(
            state.identifier.as_deref(),
            Some(lookup::synthetic_id("org-1", FILTER).as_str())
        );

        let first = &transport.requests()[0];
        assert!(first.query.contains(&("filter".to_string(), FILTER.to_string())));
    }

    #[tokio::test]
    async fn no_matches_is_an_empty_list() {
        let transport = ScriptedTransport::new();
        transport.on(
            Method::Get,
            "/environments",
            200,
            json!({"_embedded": {"environments": []}}),
        );
        let source = EnvironmentsDataSource::new(transport.client(settings()));
        let ctx = OperationContext::with_timeout(Duration::from_secs(60));

        let response = source.read(&ctx, &config()).await;
        assert!(!response.has_error());
        assert_eq!(response.state.unwrap().get("ids"), &Value::List(vec![]));
    }
}
