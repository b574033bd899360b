//! Data sources
//!
//! Read-only lookups of existing platform entities by id or by name. Each
//! single-entity data source is a `LookupDescriptor`; `LookupDataSource`
//! runs it through the lookup protocol.

use std::sync::Arc;

use pingone_core::context::OperationContext;
use pingone_core::diagnostics::{Diagnostic, Diagnostics};
use pingone_core::provider::{BoxFuture, DataSourceDescriptor, HookResponse};
use pingone_core::resource::{Resource, State, Value};
use pingone_core::schema::{AttributeSchema, AttributeType, ResourceSchema, Validator, types};

use crate::bridge;
use crate::client::PlatformClient;
use crate::declarative::Field;
use crate::lookup::{self, Collection};
use crate::orchestrator::Outcome;

pub mod agreement;
pub mod certificate;
pub mod environments;
pub mod license;
pub mod role;
pub mod system_application;
pub mod trusted_email_domain;

pub use agreement::AGREEMENT;
pub use certificate::CERTIFICATE;
pub use environments::EnvironmentsDataSource;
pub use license::LICENSE;
pub use role::ROLE;
pub use system_application::SYSTEM_APPLICATION;
pub use trusted_email_domain::TRUSTED_EMAIL_DOMAIN;

/// Where a collection lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Below `/environments/{environment_id}`
    Environment,
    /// Below `/organizations/{organization_id}`
    Organization,
    /// At the API root
    Global,
}

/// Data describing one lookup data source
pub struct LookupDescriptor {
    pub type_name: &'static str,
    pub entity: &'static str,
    pub scope: Scope,
    pub collection: &'static str,
    pub embedded: &'static str,
    /// Attribute holding the entity id when looking up by id
    pub id_attribute: &'static str,
    /// Attribute holding the name when looking up by name
    pub name_attribute: &'static str,
    /// JSON field the name is compared against
    pub name_field: &'static str,
    pub case_insensitive: bool,
    pub fields: &'static [Field],
    pub schema: fn() -> ResourceSchema,
}

/// Base schema shared by lookup data sources: the scope attribute and the
/// id/name selector pair, exactly one of which is configured
pub fn lookup_schema(descriptor: &LookupDescriptor) -> ResourceSchema {
    let schema = ResourceSchema::new(descriptor.type_name)
        .attribute(AttributeSchema::new("id", AttributeType::String).computed());
    let schema = match descriptor.scope {
        Scope::Environment => schema.attribute(
            AttributeSchema::new("environment_id", types::resource_id()).required(),
        ),
        Scope::Organization => schema.attribute(
            AttributeSchema::new("organization_id", types::resource_id())
                .optional_computed()
                .with_description("Defaults to the organization the provider is configured for"),
        ),
        Scope::Global => schema,
    };
    schema
        .attribute(
            AttributeSchema::new(descriptor.id_attribute, AttributeType::String)
                .optional_computed(),
        )
        .attribute(
            AttributeSchema::new(descriptor.name_attribute, AttributeType::String)
                .optional_computed()
                .with_validator(Validator::NonEmpty),
        )
        .exactly_one_of(&[descriptor.id_attribute, descriptor.name_attribute])
}

pub struct LookupDataSource {
    descriptor: &'static LookupDescriptor,
    client: Arc<PlatformClient>,
}

impl LookupDataSource {
    pub fn new(descriptor: &'static LookupDescriptor, client: Arc<PlatformClient>) -> Self {
        Self { descriptor, client }
    }

    fn collection(&self, config: &Resource) -> Result<Collection, Diagnostics> {
        let d = self.descriptor;
        let path = match d.scope {
            Scope::Environment => match config.get("environment_id").as_str() {
                Some(environment_id) => {
                    format!("/environments/{}/{}", environment_id, d.collection)
                }
                None => return Err(missing_scope("environment_id").into()),
            },
            Scope::Organization => match self.organization_id(config) {
                Some(organization_id) => {
                    format!("/organizations/{}/{}", organization_id, d.collection)
                }
                None => return Err(missing_scope("organization_id").into()),
            },
            Scope::Global => format!("/{}", d.collection),
        };
        Ok(Collection {
            entity: d.entity,
            path,
            embedded: d.embedded,
            name_field: d.name_field,
            case_insensitive: d.case_insensitive,
        })
    }

    fn organization_id<'a>(&'a self, config: &'a Resource) -> Option<&'a str> {
        config
            .get("organization_id")
            .as_str()
            .or(self.client.settings.organization_id.as_deref())
    }

    fn state(&self, config: &Resource, json: &serde_json::Value) -> Result<State, Diagnostics> {
        let d = self.descriptor;
        let mut attributes = config.attributes.clone();
        let mut diags = Diagnostics::new();

        let id = json
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        attributes.insert("id".to_string(), Value::string(&id));
        attributes.insert(d.id_attribute.to_string(), Value::string(&id));
        if d.scope == Scope::Organization
            && let Some(organization_id) = self.organization_id(config)
        {
            attributes.insert("organization_id".to_string(), Value::string(organization_id));
        }

        for field in d.fields {
            match bridge::from_platform(field.attribute, field.kind, bridge::get_path(json, field.path))
            {
                Ok(value) => {
                    attributes.insert(field.attribute.to_string(), value);
                }
                Err(e) => diags.push(e.to_diagnostic()),
            }
        }
        if diags.has_error() {
            return Err(diags);
        }
        Ok(State::existing(d.type_name, attributes).with_identifier(id))
    }

    /// State for a selector that has not resolved yet: looked-up attributes
    /// the configuration leaves unset stay unknown
    fn pending(&self, config: &Resource) -> State {
        let d = self.descriptor;
        let mut attributes = config.attributes.clone();
        let looked_up = ["id", d.id_attribute, d.name_attribute]
            .into_iter()
            .chain(d.fields.iter().map(|f| f.attribute));
        for attribute in looked_up {
            let value = attributes.entry(attribute.to_string()).or_insert(Value::Null);
            if value.is_null() {
                *value = Value::Unknown;
            }
        }
        State::existing(d.type_name, attributes)
    }

    async fn do_read(&self, ctx: &OperationContext, config: &Resource) -> HookResponse {
        let d = self.descriptor;
        let selector = match lookup::select(config, d.id_attribute, d.name_attribute) {
            Ok(Some(selector)) => selector,
            Ok(None) => return HookResponse::with_state(self.pending(config)),
            Err(diags) => return HookResponse::failed(diags),
        };
        let collection = match self.collection(config) {
            Ok(collection) => collection,
            Err(diags) => return HookResponse::failed(diags),
        };
        match lookup::find(&self.client, ctx, &collection, selector).await {
            Outcome::Done(json) => match self.state(config, &json) {
                Ok(state) => HookResponse::with_state(state),
                Err(diags) => HookResponse::failed(diags),
            },
            Outcome::Absent(diags) | Outcome::Failed(diags) => HookResponse::failed(diags),
        }
    }
}

fn missing_scope(attribute: &str) -> Diagnostic {
    Diagnostic::error("Missing required argument")
        .with_detail(format!("The argument \"{}\" is required.", attribute))
        .for_attribute(attribute)
}

impl DataSourceDescriptor for LookupDataSource {
    fn type_name(&self) -> &'static str {
        self.descriptor.type_name
    }

    fn schema(&self) -> ResourceSchema {
        (self.descriptor.schema)()
    }

    fn read<'a>(
        &'a self,
        ctx: &'a OperationContext,
        config: &'a Resource,
    ) -> BoxFuture<'a, HookResponse> {
        Box::pin(self.do_read(ctx, config))
    }
}
