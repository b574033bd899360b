//! PingOne provider
//!
//! Owns the shared platform client and hands out every resource and data
//! source descriptor.

use std::sync::Arc;
use std::time::Duration;

use pingone_core::provider::{DataSourceDescriptor, Provider, ResourceDescriptor};

use crate::client::{
    ClientCredentials, ClientSettings, HttpTransport, PlatformClient, StaticToken, TokenSource,
};
use crate::config::{ConfigError, ProviderConfig};
use crate::data_sources::{self, EnvironmentsDataSource, LookupDataSource};
use crate::declarative::DeclarativeResource;
use crate::region::RegionTable;
use crate::resources::{self, EnvironmentResource};

/// Timeout of every operation unless configured otherwise
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Host operations, for timeout selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Import,
}

pub struct PingOneProvider {
    client: Arc<PlatformClient>,
}

impl PingOneProvider {
    /// Validate the configuration and build the HTTP-backed client
    pub fn configure(config: &ProviderConfig) -> Result<Self, ConfigError> {
        let regions = RegionTable::builtin();
        let name = config.region.as_deref().ok_or(ConfigError::MissingRegion)?;
        let region = regions
            .resolve(name)
            .ok_or_else(|| ConfigError::UnknownRegion(name.to_string()))?;

        let default_environment_region = match config.default_environment_region.as_deref() {
            Some(name) => Some(
                regions
                    .resolve(name)
                    .filter(|r| r.selectable)
                    .ok_or_else(|| ConfigError::UnknownRegion(name.to_string()))?
                    .name
                    .to_string(),
            ),
            None => None,
        };

        let tokens: Arc<dyn TokenSource> = match config {
            ProviderConfig {
                access_token: Some(token),
                ..
            } => Arc::new(StaticToken::new(token.clone())),
            ProviderConfig {
                client_id: Some(client_id),
                client_secret: Some(client_secret),
                environment_id: Some(environment_id),
                ..
            } => Arc::new(ClientCredentials::new(
                region,
                config.auth_url.as_deref(),
                environment_id,
                client_id.clone(),
                client_secret.clone(),
            )),
            _ => return Err(ConfigError::MissingCredentials),
        };
        let transport = HttpTransport::new(
            region,
            config.api_url.as_deref(),
            config.auth_url.as_deref(),
            tokens,
        )?;
        log::debug!("configured PingOne provider for region {}", region.name);

        let settings = ClientSettings {
            force_delete_production_type: config.force_delete_production_type,
            default_environment_region,
            organization_id: config.organization_id.clone(),
            license_id: config.license_id.clone(),
            environment_id: config.environment_id.clone(),
            operation_timeout: config.operation_timeout(),
        };
        Ok(Self::with_client(Arc::new(PlatformClient::new(
            Arc::new(transport),
            settings,
        ))))
    }

    pub fn with_client(client: Arc<PlatformClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<PlatformClient> {
        &self.client
    }

    /// Deadline for one host operation. Environment deletion waits for the
    /// platform to finish and gets the longer default.
    pub fn timeout(&self, type_name: &str, operation: Operation) -> Duration {
        let configured = self
            .client
            .settings
            .operation_timeout
            .unwrap_or(DEFAULT_OPERATION_TIMEOUT);
        let is_environment = type_name.trim_start_matches("pingone_") == "environment";
        if is_environment && operation == Operation::Delete {
            return configured.max(resources::environment::ENVIRONMENT_DELETE_TIMEOUT);
        }
        configured
    }
}

impl Provider for PingOneProvider {
    fn name(&self) -> &'static str {
        "pingone"
    }

    fn resources(&self) -> Vec<Arc<dyn ResourceDescriptor>> {
        let client = &self.client;
        vec![
            Arc::new(EnvironmentResource::new(client.clone())),
            Arc::new(DeclarativeResource::new(&resources::GATEWAY, client.clone())),
            Arc::new(DeclarativeResource::new(
                &resources::PHONE_DELIVERY_SETTINGS,
                client.clone(),
            )),
            Arc::new(DeclarativeResource::new(
                &resources::SYSTEM_APPLICATION,
                client.clone(),
            )),
        ]
    }

    fn data_sources(&self) -> Vec<Arc<dyn DataSourceDescriptor>> {
        let client = &self.client;
        let lookups = [
            &data_sources::AGREEMENT,
            &data_sources::CERTIFICATE,
            &data_sources::LICENSE,
            &data_sources::ROLE,
            &data_sources::SYSTEM_APPLICATION,
            &data_sources::TRUSTED_EMAIL_DOMAIN,
        ];
        let mut sources: Vec<Arc<dyn DataSourceDescriptor>> = lookups
            .into_iter()
            .map(|d| Arc::new(LookupDataSource::new(d, client.clone())) as Arc<dyn DataSourceDescriptor>)
            .collect();
        sources.push(Arc::new(EnvironmentsDataSource::new(client.clone())));
        sources
    }
}

#[cfg(test)]
mod tests {
    use pingone_core::engine::{Engine, PlanAction};
    use pingone_core::resource::{Resource, State, Value};

    use super::*;
    use crate::testing::ScriptedTransport;

    const LICENSE: &str = "33333333-3333-3333-3333-333333333333";

    fn provider(settings: ClientSettings) -> PingOneProvider {
        PingOneProvider::with_client(ScriptedTransport::new().client(settings))
    }

    fn config(region: &str) -> ProviderConfig {
        ProviderConfig {
            region: Some(region.to_string()),
            access_token: Some("token".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn configure_accepts_region_names_and_codes() {
        assert!(PingOneProvider::configure(&config("Europe")).is_ok());
        assert!(PingOneProvider::configure(&config("EU")).is_ok());
    }

    #[test]
    fn configure_rejects_unknown_region_and_missing_credentials() {
        assert!(matches!(
            PingOneProvider::configure(&config("Mars")),
            Err(ConfigError::UnknownRegion(_))
        ));
        let no_credentials = ProviderConfig {
            region: Some("NA".to_string()),
            client_id: Some("id".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            PingOneProvider::configure(&no_credentials),
            Err(ConfigError::MissingCredentials)
        ));
        assert!(matches!(
            PingOneProvider::configure(&ProviderConfig::default()),
            Err(ConfigError::MissingRegion)
        ));
    }

    #[test]
    fn every_descriptor_is_registered() {
        let engine = Engine::new(&provider(ClientSettings::default()));
        assert_eq!(
            engine.resource_types(),
            vec![
                "pingone_environment",
                "pingone_gateway",
                "pingone_phone_delivery_settings",
                "pingone_system_application",
            ]
        );
        assert_eq!(engine.data_source_types().len(), 7);
    }

    #[test]
    fn environment_delete_gets_the_longer_timeout() {
        let provider = provider(ClientSettings::default());
        assert_eq!(
            provider.timeout("pingone_environment", Operation::Delete),
            resources::environment::ENVIRONMENT_DELETE_TIMEOUT
        );
        assert_eq!(
            provider.timeout("pingone_environment", Operation::Create),
            DEFAULT_OPERATION_TIMEOUT
        );
        assert_eq!(
            provider.timeout("gateway", Operation::Delete),
            DEFAULT_OPERATION_TIMEOUT
        );
    }

    #[test]
    fn plan_fills_environment_defaults() {
        let settings = ClientSettings {
            license_id: Some(LICENSE.to_string()),
            ..Default::default()
        };
        let engine = Engine::new(&provider(settings));
        let config =
            Resource::new("pingone_environment").with_attribute("name", Value::string("env1"));

        let response = engine.plan(None, &config);
        assert!(!response.diagnostics.has_error(), "{:?}", response.diagnostics);
        let plan = response.plan.unwrap();
        assert_eq!(plan.action, PlanAction::Create);
        let planned = &plan.planned;
        assert_eq!(planned.get("license_id"), &Value::string(LICENSE));
        assert_eq!(planned.get("type"), &Value::string("SANDBOX"));
        assert_eq!(
            planned.get("service"),
            &Value::set([Value::object([("type", Value::string("SSO"))])])
        );
        assert_eq!(
            planned.get("default_population"),
            &Value::object([("name", Value::string("Default"))])
        );
        assert!(planned.get("id").is_unknown());
    }

    #[test]
    fn region_change_replaces_the_environment() {
        let settings = ClientSettings {
            license_id: Some(LICENSE.to_string()),
            ..Default::default()
        };
        let engine = Engine::new(&provider(settings));
        let config = Resource::new("pingone_environment")
            .with_attribute("name", Value::string("env1"))
            .with_attribute("region", Value::string("Europe"));
        let planned = engine.plan(None, &config).plan.unwrap().planned;

        let mut attributes = planned.attributes.clone();
        attributes.insert("id".to_string(), Value::string("A1B2"));
        attributes.insert("region".to_string(), Value::string("NorthAmerica"));
        for computed in ["organization_id", "default_population_id"] {
            attributes.insert(computed.to_string(), Value::string("x"));
        }
        let prior = State::existing("environment", attributes).with_identifier("A1B2");

        let plan = engine.plan(Some(&prior), &config).plan.unwrap();
        assert_eq!(plan.action, PlanAction::Replace);
        assert_eq!(plan.requires_replace, vec!["region".to_string()]);
    }

    #[test]
    fn ldap_attributes_on_a_radius_gateway_fail_at_plan() {
        let engine = Engine::new(&provider(ClientSettings::default()));
        let config = Resource::new("pingone_gateway")
            .with_attribute(
                "environment_id",
                Value::string("11111111-1111-1111-1111-111111111111"),
            )
            .with_attribute("name", Value::string("radius"))
            .with_attribute("enabled", Value::Bool(true))
            .with_attribute("type", Value::string("RADIUS"))
            .with_attribute("radius_davinci_policy_id", Value::string("p-1"))
            .with_attribute("bind_dn", Value::string("cn=admin"));
        let response = engine.plan(None, &config);
        assert!(response.plan.is_none());
        assert!(
            response
                .diagnostics
                .contains_summary("Invalid attribute combination")
        );
    }
}
