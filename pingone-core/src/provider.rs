//! Provider - Descriptor traits the host drives
//!
//! A Provider publishes resource and data-source descriptors. Each descriptor
//! owns its schema and the hooks that reconcile one entity against the
//! platform. Hooks never raise: every outcome is a state plus diagnostics.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::OperationContext;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::resource::{Resource, State};
use crate::schema::ResourceSchema;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of a hook: the new state (None drops the entity from state) and
/// the diagnostics collected on the way
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookResponse {
    pub state: Option<State>,
    pub diagnostics: Diagnostics,
}

impl HookResponse {
    pub fn with_state(state: State) -> Self {
        Self {
            state: Some(state),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Entity is gone; the host removes it from state
    pub fn removed() -> Self {
        Self::default()
    }

    pub fn failed(diagnostics: impl Into<Diagnostics>) -> Self {
        Self {
            state: None,
            diagnostics: diagnostics.into(),
        }
    }

    /// Operation did not finish; the host keeps `prior` as the state
    pub fn unchanged(prior: State, diagnostics: impl Into<Diagnostics>) -> Self {
        Self {
            state: Some(prior),
            diagnostics: diagnostics.into(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics.extend(diagnostics);
        self
    }

    pub fn has_error(&self) -> bool {
        self.diagnostics.has_error()
    }

    /// Cancelled or otherwise stopped before finishing
    pub fn is_interrupted(&self) -> bool {
        self.diagnostics.is_interrupted()
    }

    pub fn succeeded(&self) -> bool {
        self.diagnostics.succeeded()
    }
}

/// Managed resource type
pub trait ResourceDescriptor: Send + Sync {
    /// Type name without provider prefix (e.g., "environment")
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    /// Create the entity described by the planned configuration
    fn create<'a>(
        &'a self,
        ctx: &'a OperationContext,
        planned: &'a Resource,
    ) -> BoxFuture<'a, HookResponse>;

    /// Refresh state from the platform. Returns no state when the entity
    /// no longer exists.
    fn read<'a>(&'a self, ctx: &'a OperationContext, current: &'a State)
    -> BoxFuture<'a, HookResponse>;

    fn update<'a>(
        &'a self,
        ctx: &'a OperationContext,
        prior: &'a State,
        planned: &'a Resource,
    ) -> BoxFuture<'a, HookResponse>;

    fn delete<'a>(&'a self, ctx: &'a OperationContext, prior: &'a State)
    -> BoxFuture<'a, Diagnostics>;

    /// Adopt an existing entity by its import identifier
    fn import<'a>(
        &'a self,
        _ctx: &'a OperationContext,
        _identifier: &'a str,
    ) -> BoxFuture<'a, HookResponse> {
        let type_name = self.type_name();
        Box::pin(async move {
            HookResponse::failed(Diagnostic::error("Import not supported").with_detail(format!(
                "Resource type \"{}\" cannot be imported.",
                type_name
            )))
        })
    }
}

/// Read-only data source type
pub trait DataSourceDescriptor: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    fn read<'a>(
        &'a self,
        ctx: &'a OperationContext,
        config: &'a Resource,
    ) -> BoxFuture<'a, HookResponse>;
}

/// Main Provider trait
pub trait Provider: Send + Sync {
    /// Name of this Provider, used as the type-name prefix (e.g., "pingone")
    fn name(&self) -> &'static str;

    fn resources(&self) -> Vec<Arc<dyn ResourceDescriptor>>;

    fn data_sources(&self) -> Vec<Arc<dyn DataSourceDescriptor>>;
}

/// Provider implementation for Box<dyn Provider>
/// This enables dynamic dispatch for Providers
impl Provider for Box<dyn Provider> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn resources(&self) -> Vec<Arc<dyn ResourceDescriptor>> {
        (**self).resources()
    }

    fn data_sources(&self) -> Vec<Arc<dyn DataSourceDescriptor>> {
        (**self).data_sources()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::schema::{AttributeSchema, AttributeType};

    // Mock descriptor for testing
    struct MockResource;

    impl ResourceDescriptor for MockResource {
        fn type_name(&self) -> &'static str {
            "mock"
        }

        fn schema(&self) -> ResourceSchema {
            ResourceSchema::new("mock")
                .attribute(AttributeSchema::new("name", AttributeType::String).required())
        }

        fn create<'a>(
            &'a self,
            _ctx: &'a OperationContext,
            planned: &'a Resource,
        ) -> BoxFuture<'a, HookResponse> {
            let attrs = planned.attributes.clone();
            Box::pin(async move {
                HookResponse::with_state(State::existing("mock", attrs).with_identifier("mock-id-123"))
            })
        }

        fn read<'a>(
            &'a self,
            _ctx: &'a OperationContext,
            _current: &'a State,
        ) -> BoxFuture<'a, HookResponse> {
            Box::pin(async { HookResponse::removed() })
        }

        fn update<'a>(
            &'a self,
            _ctx: &'a OperationContext,
            prior: &'a State,
            planned: &'a Resource,
        ) -> BoxFuture<'a, HookResponse> {
            let mut state = prior.clone();
            state.attributes = planned.attributes.clone();
            Box::pin(async move { HookResponse::with_state(state) })
        }

        fn delete<'a>(
            &'a self,
            _ctx: &'a OperationContext,
            _prior: &'a State,
        ) -> BoxFuture<'a, Diagnostics> {
            Box::pin(async { Diagnostics::new() })
        }
    }

    #[tokio::test]
    async fn mock_resource_read_drops_state() {
        let ctx = OperationContext::with_timeout(Duration::from_secs(60));
        let response = MockResource.read(&ctx, &State::not_found("mock")).await;
        assert!(response.state.is_none());
        assert!(!response.has_error());
    }

    #[tokio::test]
    async fn mock_resource_create_returns_identifier() {
        let ctx = OperationContext::with_timeout(Duration::from_secs(60));
        let resource = Resource::new("mock");
        let response = MockResource.create(&ctx, &resource).await;
        let state = response.state.unwrap();
        assert!(state.exists);
        assert_eq!(state.identifier, Some("mock-id-123".to_string()));
    }

    #[tokio::test]
    async fn import_is_unsupported_by_default() {
        let ctx = OperationContext::with_timeout(Duration::from_secs(60));
        let response = MockResource.import(&ctx, "x").await;
        assert!(response.diagnostics.contains_summary("Import not supported"));
    }
}
