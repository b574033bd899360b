//! Declarative resource runner
//!
//! Resources whose lifecycle is a plain collection CRUD are described as
//! data: the collection path, the attribute-to-JSON field mappings and how
//! create and delete behave. `DeclarativeResource` drives any such
//! description through the orchestrator and the value bridge.

use std::sync::Arc;

use pingone_core::context::OperationContext;
use pingone_core::diagnostics::{Diagnostic, Diagnostics};
use pingone_core::provider::{BoxFuture, HookResponse, ResourceDescriptor};
use pingone_core::resource::{Attributes, Resource, State, Value};
use pingone_core::schema::ResourceSchema;
use serde_json::Map;

use crate::bridge::{self, FieldKind, WriteMode};
use crate::client::{ApiRequest, PlatformClient};
use crate::lookup::{self, Collection};
use crate::orchestrator::{self, Outcome, RetryPolicy};
use crate::utils::parse_import_id;

/// One attribute mapped onto a JSON field of the entity
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub attribute: &'static str,
    /// Dotted JSON path (e.g., "authentication.username")
    pub path: &'static str,
    pub kind: FieldKind,
    pub mode: WriteMode,
    /// Sent but never returned by the platform (secrets)
    pub write_only: bool,
    /// Returned but never sent
    pub read_only: bool,
}

impl Field {
    pub const fn new(attribute: &'static str, path: &'static str, kind: FieldKind) -> Self {
        Self {
            attribute,
            path,
            kind,
            mode: WriteMode::OmitNull,
            write_only: false,
            read_only: false,
        }
    }

    pub const fn null_clears(mut self) -> Self {
        self.mode = WriteMode::NullClears;
        self
    }

    pub const fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    pub const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// POST to the collection
    Post,
    /// The platform pre-creates one entity per discriminator value; find it
    /// and apply the configuration with a PUT
    Adopt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    Delete,
    /// Leave the entity on the platform and only drop it from state
    Abandon,
}

/// Data describing one collection-backed resource
pub struct EntityDescriptor {
    pub type_name: &'static str,
    /// Entity name used in diagnostics and operation names
    pub entity: &'static str,
    /// Path below the environment (e.g., "gateways")
    pub collection: &'static str,
    /// Key of the item array under `_embedded`
    pub embedded: &'static str,
    pub fields: &'static [Field],
    pub create: CreateMode,
    pub delete: DeleteMode,
    pub schema: fn() -> ResourceSchema,
}

impl EntityDescriptor {
    fn field(&self, attribute: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.attribute == attribute)
    }

    fn collection_path(&self, environment_id: &str) -> String {
        format!("/environments/{}/{}", environment_id, self.collection)
    }

    fn operation(&self, verb: &str) -> String {
        let noun: String = self
            .entity
            .split(' ')
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect();
        format!("{}{}", verb, noun)
    }
}

/// Resource descriptor driven by an `EntityDescriptor`
pub struct DeclarativeResource {
    descriptor: &'static EntityDescriptor,
    client: Arc<PlatformClient>,
}

impl DeclarativeResource {
    pub fn new(descriptor: &'static EntityDescriptor, client: Arc<PlatformClient>) -> Self {
        Self { descriptor, client }
    }

    /// Request body from the attributes; unknown and read-only fields are
    /// never sent
    /// Request body. Null-clearing fields only send an explicit null when
    /// `replacing` an existing entity; a new one simply omits them.
    fn body(
        &self,
        attributes: &Attributes,
        replacing: bool,
    ) -> Result<serde_json::Value, Diagnostics> {
        let mut body = Map::new();
        let mut diags = Diagnostics::new();
        for field in self.descriptor.fields.iter().filter(|f| !f.read_only) {
            let value = attributes.get(field.attribute).unwrap_or(&Value::Null);
            if let Err(e) = bridge::write_field(
                &mut body,
                field.path,
                field.attribute,
                field.kind,
                if replacing { field.mode } else { WriteMode::OmitNull },
                value,
            ) {
                diags.push(e.to_diagnostic());
            }
        }
        if diags.has_error() {
            return Err(diags);
        }
        Ok(serde_json::Value::Object(body))
    }

    /// State from an entity document. Write-only fields keep the value the
    /// caller supplied, and attributes of variants other than the one the
    /// platform reports read as null.
    fn state(
        &self,
        environment_id: &str,
        json: &serde_json::Value,
        known: &Attributes,
    ) -> Result<State, Diagnostics> {
        let schema = (self.descriptor.schema)();
        let mut attributes = Attributes::new();
        let mut diags = Diagnostics::new();

        let id = json
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        attributes.insert("id".to_string(), Value::string(id.clone()));
        attributes.insert(
            "environment_id".to_string(),
            Value::string(environment_id),
        );

        for field in self.descriptor.fields {
            let value = if field.write_only {
                known.get(field.attribute).cloned().unwrap_or(Value::Null)
            } else {
                match bridge::from_platform(
                    field.attribute,
                    field.kind,
                    bridge::get_path(json, field.path),
                ) {
                    Ok(v) => v,
                    Err(e) => {
                        diags.push(e.to_diagnostic());
                        Value::Null
                    }
                }
            };
            attributes.insert(field.attribute.to_string(), value);
        }

        if let Some(ref discriminator) = schema.discriminator {
            let selected = attributes
                .get(&discriminator.attribute)
                .and_then(|v| v.as_str())
                .and_then(|s| discriminator.variant(s));
            for name in discriminator.grouped_attributes() {
                if !selected.is_some_and(|v| v.attributes.iter().any(|a| a == name)) {
                    attributes.insert(name.to_string(), Value::Null);
                }
            }
        }

        if diags.has_error() {
            return Err(diags);
        }
        Ok(State::existing(self.descriptor.type_name, attributes).with_identifier(id))
    }

    fn finish(
        &self,
        environment_id: &str,
        outcome: Outcome<serde_json::Value>,
        known: &Attributes,
    ) -> HookResponse {
        match outcome {
            Outcome::Done(json) => match self.state(environment_id, &json, known) {
                Ok(state) => HookResponse::with_state(state),
                Err(diags) => HookResponse::failed(diags),
            },
            Outcome::Absent(diags) => HookResponse::removed().with_diagnostics(diags),
            Outcome::Failed(diags) => HookResponse::failed(diags),
        }
    }

    async fn put(
        &self,
        ctx: &OperationContext,
        environment_id: &str,
        id: &str,
        body: serde_json::Value,
    ) -> Outcome<serde_json::Value> {
        let client = &*self.client;
        let request = ApiRequest::put(
            format!("{}/{}", self.descriptor.collection_path(environment_id), id),
            body,
        );
        orchestrator::execute(
            ctx,
            move || client.send(request.clone()),
            &self.descriptor.operation("Update"),
            &orchestrator::defer,
            &RetryPolicy::create_read(),
        )
        .await
    }

    async fn do_create(&self, ctx: &OperationContext, planned: &Resource) -> HookResponse {
        let Some(environment_id) = planned.get("environment_id").as_str() else {
            return HookResponse::failed(missing_environment());
        };
        let adopting = self.descriptor.create == CreateMode::Adopt;
        let body = match self.body(&planned.attributes, adopting) {
            Ok(body) => body,
            Err(diags) => return HookResponse::failed(diags),
        };

        let outcome = match self.descriptor.create {
            CreateMode::Post => {
                let client = &*self.client;
                let request =
                    ApiRequest::post(self.descriptor.collection_path(environment_id), body);
                orchestrator::execute(
                    ctx,
                    move || client.send(request.clone()),
                    &self.descriptor.operation("Create"),
                    &orchestrator::defer,
                    &RetryPolicy::create_read(),
                )
                .await
            }
            CreateMode::Adopt => {
                let id = match self.adopt(ctx, environment_id, planned).await {
                    Ok(id) => id,
                    Err(diags) => return HookResponse::failed(diags),
                };
                self.put(ctx, environment_id, &id, body).await
            }
        };
        self.finish(environment_id, outcome, &planned.attributes)
    }

    /// Find the pre-created entity matching the planned discriminator
    async fn adopt(
        &self,
        ctx: &OperationContext,
        environment_id: &str,
        planned: &Resource,
    ) -> Result<String, Diagnostics> {
        let schema = (self.descriptor.schema)();
        let Some(discriminator) = schema.discriminator else {
            return Err(Diagnostic::error("Invalid resource description")
                .with_detail(format!(
                    "Resource \"{}\" adopts existing entities but declares no discriminator.",
                    self.descriptor.type_name
                ))
                .into());
        };
        let Some(field) = self.descriptor.field(&discriminator.attribute) else {
            return Err(Diagnostic::error("Invalid resource description")
                .with_detail(format!(
                    "Discriminator \"{}\" has no field mapping.",
                    discriminator.attribute
                ))
                .into());
        };
        let wanted = bridge::to_platform(
            field.attribute,
            field.kind,
            planned.get(&discriminator.attribute),
        )
        .map_err(|e| Diagnostics::from(e.to_diagnostic()))?
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();

        let collection = Collection {
            entity: self.descriptor.entity,
            path: self.descriptor.collection_path(environment_id),
            embedded: self.descriptor.embedded,
            name_field: field.path,
            case_insensitive: false,
        };
        let (found, diags) = lookup::find_where(
            &self.client,
            ctx,
            &collection,
            field.path,
            &wanted,
            &discriminator.attribute,
        )
        .await
        .into_parts();
        found
            .and_then(|item| item.get("id").and_then(|v| v.as_str()).map(str::to_string))
            .ok_or(diags)
    }

    async fn do_read(&self, ctx: &OperationContext, current: &State) -> HookResponse {
        let (Some(environment_id), Some(id)) = (
            current.get("environment_id").as_str(),
            current.identifier.as_deref(),
        ) else {
            return HookResponse::removed();
        };
        let client = &*self.client;
        let request = ApiRequest::get(format!(
            "{}/{}",
            self.descriptor.collection_path(environment_id),
            id
        ));
        let outcome = orchestrator::execute(
            ctx,
            move || client.send(request.clone()),
            &self.descriptor.operation("ReadOne"),
            &orchestrator::not_found_warning,
            &RetryPolicy::create_read(),
        )
        .await;
        match outcome {
            Outcome::Failed(diags) if diags.is_interrupted() => {
                HookResponse::unchanged(current.clone(), diags)
            }
            outcome => self.finish(environment_id, outcome, &current.attributes),
        }
    }

    async fn do_update(
        &self,
        ctx: &OperationContext,
        prior: &State,
        planned: &Resource,
    ) -> HookResponse {
        let (Some(environment_id), Some(id)) = (
            prior.get("environment_id").as_str(),
            prior.identifier.as_deref(),
        ) else {
            return HookResponse::failed(missing_environment());
        };
        let body = match self.body(&planned.attributes, true) {
            Ok(body) => body,
            Err(diags) => return HookResponse::failed(diags),
        };
        match self.put(ctx, environment_id, id, body).await {
            Outcome::Failed(diags) if diags.is_interrupted() => {
                HookResponse::unchanged(prior.clone(), diags)
            }
            outcome => self.finish(environment_id, outcome, &planned.attributes),
        }
    }

    async fn do_delete(&self, ctx: &OperationContext, prior: &State) -> Diagnostics {
        let (Some(environment_id), Some(id)) = (
            prior.get("environment_id").as_str(),
            prior.identifier.as_deref(),
        ) else {
            return Diagnostics::new();
        };
        if self.descriptor.delete == DeleteMode::Abandon {
            log::info!(
                "{} {} is left in place; removing it from state only",
                self.descriptor.entity,
                id
            );
            return Diagnostics::new();
        }

        let client = &*self.client;
        let request = ApiRequest::delete(format!(
            "{}/{}",
            self.descriptor.collection_path(environment_id),
            id
        ));
        let outcome: Outcome<serde_json::Value> = orchestrator::execute(
            ctx,
            move || client.send(request.clone()),
            &self.descriptor.operation("Delete"),
            &orchestrator::not_found_warning,
            &RetryPolicy::create_read(),
        )
        .await;
        match outcome {
            Outcome::Done(_) | Outcome::Absent(_) => Diagnostics::new(),
            Outcome::Failed(diags) => diags,
        }
    }

    async fn do_import(&self, ctx: &OperationContext, identifier: &str) -> HookResponse {
        let parts = match parse_import_id(identifier, &["environment_id", "id"]) {
            Ok(parts) => parts,
            Err(e) => return HookResponse::failed(e.to_diagnostic()),
        };
        let mut attributes = Attributes::new();
        attributes.insert("environment_id".to_string(), Value::string(&parts[0]));
        attributes.insert("id".to_string(), Value::string(&parts[1]));
        let state =
            State::existing(self.descriptor.type_name, attributes).with_identifier(&parts[1]);
        let response = self.do_read(ctx, &state).await;
        if response.is_interrupted() {
            return HookResponse::failed(response.diagnostics);
        }
        response
    }
}

fn missing_environment() -> Diagnostic {
    Diagnostic::error("Missing required argument")
        .with_detail("The argument \"environment_id\" is required.")
        .for_attribute("environment_id")
}

impl ResourceDescriptor for DeclarativeResource {
    fn type_name(&self) -> &'static str {
        self.descriptor.type_name
    }

    fn schema(&self) -> ResourceSchema {
        (self.descriptor.schema)()
    }

    fn create<'a>(
        &'a self,
        ctx: &'a OperationContext,
        planned: &'a Resource,
    ) -> BoxFuture<'a, HookResponse> {
        Box::pin(self.do_create(ctx, planned))
    }

    fn read<'a>(
        &'a self,
        ctx: &'a OperationContext,
        current: &'a State,
    ) -> BoxFuture<'a, HookResponse> {
        Box::pin(self.do_read(ctx, current))
    }

    fn update<'a>(
        &'a self,
        ctx: &'a OperationContext,
        prior: &'a State,
        planned: &'a Resource,
    ) -> BoxFuture<'a, HookResponse> {
        Box::pin(self.do_update(ctx, prior, planned))
    }

    fn delete<'a>(
        &'a self,
        ctx: &'a OperationContext,
        prior: &'a State,
    ) -> BoxFuture<'a, Diagnostics> {
        Box::pin(self.do_delete(ctx, prior))
    }

    fn import<'a>(
        &'a self,
        ctx: &'a OperationContext,
        identifier: &'a str,
    ) -> BoxFuture<'a, HookResponse> {
        Box::pin(self.do_import(ctx, identifier))
    }
}
