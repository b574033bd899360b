//! Engine - Adapt host lifecycle RPCs to descriptor hooks
//!
//! Compares the configuration the host supplies with the recorded state,
//! computes the plan, and dispatches create/read/update/delete/import to the
//! descriptor that owns the type. Configuration is validated against the
//! descriptor schema before any hook runs, so user errors never reach the
//! network.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::OperationContext;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::provider::{DataSourceDescriptor, HookResponse, Provider, ResourceDescriptor};
use crate::resource::{Attributes, Resource, State, Value};
use crate::schema::{AttributeMode, ResourceSchema};

/// What applying a plan will do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    Create,
    Update,
    /// Delete then create, because a replace-on-change attribute differs
    Replace,
    NoChange,
}

/// Planned configuration with computed placeholders filled in
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub action: PlanAction,
    pub planned: Resource,
    pub changed_attributes: Vec<String>,
    pub requires_replace: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PlanResponse {
    pub plan: Option<Plan>,
    pub diagnostics: Diagnostics,
}

/// Lifecycle engine over one provider's descriptors
pub struct Engine {
    provider_name: &'static str,
    resources: BTreeMap<&'static str, Arc<dyn ResourceDescriptor>>,
    data_sources: BTreeMap<&'static str, Arc<dyn DataSourceDescriptor>>,
}

impl Engine {
    pub fn new(provider: &dyn Provider) -> Self {
        Self {
            provider_name: provider.name(),
            resources: provider
                .resources()
                .into_iter()
                .map(|r| (r.type_name(), r))
                .collect(),
            data_sources: provider
                .data_sources()
                .into_iter()
                .map(|d| (d.type_name(), d))
                .collect(),
        }
    }

    /// Fully qualified resource type names (e.g., "pingone_environment")
    pub fn resource_types(&self) -> Vec<String> {
        self.resources
            .keys()
            .map(|t| format!("{}_{}", self.provider_name, t))
            .collect()
    }

    /// Fully qualified data-source type names
    pub fn data_source_types(&self) -> Vec<String> {
        self.data_sources
            .keys()
            .map(|t| format!("{}_{}", self.provider_name, t))
            .collect()
    }

    fn short_name<'n>(&self, type_name: &'n str) -> &'n str {
        type_name
            .strip_prefix(self.provider_name)
            .and_then(|t| t.strip_prefix('_'))
            .unwrap_or(type_name)
    }

    fn resource(&self, type_name: &str) -> Result<&Arc<dyn ResourceDescriptor>, Diagnostic> {
        self.resources
            .get(self.short_name(type_name))
            .ok_or_else(|| unknown_type("resource", type_name))
    }

    fn data_source(&self, type_name: &str) -> Result<&Arc<dyn DataSourceDescriptor>, Diagnostic> {
        self.data_sources
            .get(self.short_name(type_name))
            .ok_or_else(|| unknown_type("data source", type_name))
    }

    pub fn resource_schema(&self, type_name: &str) -> Option<ResourceSchema> {
        self.resource(type_name).ok().map(|r| r.schema())
    }

    pub fn data_source_schema(&self, type_name: &str) -> Option<ResourceSchema> {
        self.data_source(type_name).ok().map(|d| d.schema())
    }

    /// Validate user configuration for a resource type
    pub fn validate_resource(&self, config: &Resource) -> Diagnostics {
        match self.resource(&config.resource_type) {
            Ok(descriptor) => descriptor.schema().validate(&config.attributes),
            Err(d) => d.into(),
        }
    }

    /// Compute the plan for `config` against the prior state (None when the
    /// entity does not exist yet)
    pub fn plan(&self, prior: Option<&State>, config: &Resource) -> PlanResponse {
        let descriptor = match self.resource(&config.resource_type) {
            Ok(d) => d,
            Err(d) => {
                return PlanResponse {
                    plan: None,
                    diagnostics: d.into(),
                };
            }
        };
        let schema = descriptor.schema();
        let diagnostics = schema.validate(&config.attributes);
        if diagnostics.has_error() {
            return PlanResponse {
                plan: None,
                diagnostics,
            };
        }

        let prior = prior.filter(|p| p.exists);
        let mut attributes = config.attributes.clone();
        schema.apply_defaults(&mut attributes);
        schema.normalize(&mut attributes);
        fill_computed(&schema, prior, &mut attributes);

        let planned = Resource {
            resource_type: descriptor.type_name().to_string(),
            attributes,
        };

        let plan = match prior {
            None => Plan {
                action: PlanAction::Create,
                changed_attributes: planned.attributes.keys().cloned().collect(),
                requires_replace: Vec::new(),
                planned,
            },
            Some(prior) => {
                let changed = find_changed_attributes(&planned.attributes, &prior.attributes);
                let requires_replace: Vec<String> = schema
                    .replace_attributes()
                    .filter(|a| changed.iter().any(|c| c == a))
                    .map(str::to_string)
                    .collect();
                let action = if changed.is_empty() {
                    PlanAction::NoChange
                } else if requires_replace.is_empty() {
                    PlanAction::Update
                } else {
                    PlanAction::Replace
                };
                Plan {
                    action,
                    planned,
                    changed_attributes: changed,
                    requires_replace,
                }
            }
        };

        PlanResponse {
            plan: Some(plan),
            diagnostics,
        }
    }

    pub async fn create(&self, ctx: &OperationContext, planned: &Resource) -> HookResponse {
        let descriptor = match self.preflight(planned) {
            Ok(d) => d,
            Err(diags) => return HookResponse::failed(diags),
        };
        log::debug!("create {}", planned.resource_type);
        descriptor.create(ctx, planned).await
    }

    pub async fn read(&self, ctx: &OperationContext, current: &State) -> HookResponse {
        let descriptor = match self.resource(&current.resource_type) {
            Ok(d) => d,
            Err(d) => return HookResponse::failed(d),
        };
        if current.identifier.is_none() {
            return HookResponse::removed();
        }
        log::debug!("read {}", current.resource_type);
        let response = descriptor.read(ctx, current).await;
        if response.state.is_none() && response.is_interrupted() {
            return HookResponse::unchanged(current.clone(), response.diagnostics);
        }
        response
    }

    pub async fn update(
        &self,
        ctx: &OperationContext,
        prior: &State,
        planned: &Resource,
    ) -> HookResponse {
        let descriptor = match self.preflight(planned) {
            Ok(d) => d,
            Err(diags) => return HookResponse::failed(diags),
        };
        log::debug!("update {}", planned.resource_type);
        descriptor.update(ctx, prior, planned).await
    }

    pub async fn delete(&self, ctx: &OperationContext, prior: &State) -> Diagnostics {
        let descriptor = match self.resource(&prior.resource_type) {
            Ok(d) => d,
            Err(d) => return d.into(),
        };
        log::debug!("delete {}", prior.resource_type);
        descriptor.delete(ctx, prior).await
    }

    pub async fn import(
        &self,
        ctx: &OperationContext,
        type_name: &str,
        identifier: &str,
    ) -> HookResponse {
        let descriptor = match self.resource(type_name) {
            Ok(d) => d,
            Err(d) => return HookResponse::failed(d),
        };
        log::debug!("import {} {}", type_name, identifier);
        descriptor.import(ctx, identifier).await
    }

    pub async fn read_data_source(&self, ctx: &OperationContext, config: &Resource) -> HookResponse {
        let descriptor = match self.data_source(&config.resource_type) {
            Ok(d) => d,
            Err(d) => return HookResponse::failed(d),
        };
        let diagnostics = descriptor.schema().validate(&config.attributes);
        if diagnostics.has_error() {
            return HookResponse::failed(diagnostics);
        }
        descriptor.read(ctx, config).await
    }

    /// Validate a planned configuration: computed-only attributes are
    /// stripped first since the plan carries them as placeholders.
    fn preflight(&self, planned: &Resource) -> Result<&Arc<dyn ResourceDescriptor>, Diagnostics> {
        let descriptor = self.resource(&planned.resource_type)?;
        let schema = descriptor.schema();
        let config: Attributes = planned
            .attributes
            .iter()
            .filter(|(name, _)| {
                schema
                    .get(name)
                    .is_none_or(|a| a.mode != AttributeMode::Computed)
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let diagnostics = schema.validate(&config);
        if diagnostics.has_error() {
            return Err(diagnostics);
        }
        Ok(descriptor)
    }
}

fn unknown_type(kind: &str, type_name: &str) -> Diagnostic {
    Diagnostic::error(format!("Unknown {} type", kind))
        .with_detail(format!("The provider does not support \"{}\".", type_name))
}

/// Computed attributes the user left unset keep their prior value, or become
/// unknown until the platform assigns them
fn fill_computed(schema: &ResourceSchema, prior: Option<&State>, attributes: &mut Attributes) {
    for (name, attr) in &schema.attributes {
        if !attr.mode.is_computed() {
            continue;
        }
        let value = attributes.entry(name.clone()).or_insert(Value::Null);
        if value.is_null() {
            *value = match prior.map(|p| p.get(name)) {
                Some(v) if v.is_set() => v.clone(),
                _ => Value::Unknown,
            };
        }
    }
}

/// Find changed attributes between planned and prior state
fn find_changed_attributes(planned: &Attributes, prior: &Attributes) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, planned_value) in planned {
        match prior.get(key) {
            Some(prior_value) if prior_value == planned_value => {}
            None if planned_value.is_null() => {}
            _ => changed.push(key.clone()),
        }
    }

    changed
}
