//! Provider configuration
//!
//! Read once at configure time, from a JSON document or from the process
//! environment.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::error::TransportError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no API region configured (set PINGONE_REGION_CODE or PINGONE_REGION)")]
    MissingRegion,

    #[error("unknown region '{0}'")]
    UnknownRegion(String),

    #[error(
        "no credentials configured (set PINGONE_API_ACCESS_TOKEN, or PINGONE_CLIENT_ID, PINGONE_CLIENT_SECRET and PINGONE_ENVIRONMENT_ID)"
    )]
    MissingCredentials,

    #[error("invalid value '{value}' for {name}")]
    InvalidValue { name: &'static str, value: String },

    #[error("invalid configuration document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("cannot build HTTP transport: {0}")]
    Transport(#[from] TransportError),
}

#[derive(Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API host region, as a region name or an API code
    pub region: Option<String>,
    pub environment_id: Option<String>,
    pub organization_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
    /// Region for environments that do not set one
    pub default_environment_region: Option<String>,
    pub license_id: Option<String>,
    pub force_delete_production_type: bool,
    pub operation_timeout_secs: Option<u64>,
    pub api_url: Option<String>,
    pub auth_url: Option<String>,
}

// Secrets stay out of debug output
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("ProviderConfig")
            .field("region", &self.region)
            .field("environment_id", &self.environment_id)
            .field("organization_id", &self.organization_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &redacted(&self.client_secret))
            .field("access_token", &redacted(&self.access_token))
            .field("default_environment_region", &self.default_environment_region)
            .field("license_id", &self.license_id)
            .field("force_delete_production_type", &self.force_delete_production_type)
            .field("operation_timeout_secs", &self.operation_timeout_secs)
            .field("api_url", &self.api_url)
            .field("auth_url", &self.auth_url)
            .finish()
    }
}

impl ProviderConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from a variable lookup; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let force_delete_production_type = match var("PINGONE_FORCE_DELETE_PRODUCTION_TYPE") {
            Some(value) => parse_bool(&value).ok_or(ConfigError::InvalidValue {
                name: "PINGONE_FORCE_DELETE_PRODUCTION_TYPE",
                value,
            })?,
            None => false,
        };
        let operation_timeout_secs = match var("PINGONE_OPERATION_TIMEOUT") {
            Some(value) => Some(value.parse().map_err(|_| ConfigError::InvalidValue {
                name: "PINGONE_OPERATION_TIMEOUT",
                value,
            })?),
            None => None,
        };

        Ok(Self {
            region: var("PINGONE_REGION_CODE").or_else(|| var("PINGONE_REGION")),
            environment_id: var("PINGONE_ENVIRONMENT_ID"),
            organization_id: var("PINGONE_ORGANIZATION_ID"),
            client_id: var("PINGONE_CLIENT_ID"),
            client_secret: var("PINGONE_CLIENT_SECRET"),
            access_token: var("PINGONE_API_ACCESS_TOKEN"),
            default_environment_region: var("PINGONE_ENVIRONMENT_REGION"),
            license_id: var("PINGONE_LICENSE_ID"),
            force_delete_production_type,
            operation_timeout_secs,
            api_url: var("PINGONE_API_URL"),
            auth_url: var("PINGONE_AUTH_URL"),
        })
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn region_code_wins_over_region_name() {
        let config = ProviderConfig::from_lookup(lookup(&[
            ("PINGONE_REGION", "Europe"),
            ("PINGONE_REGION_CODE", "NA"),
            ("PINGONE_FORCE_DELETE_PRODUCTION_TYPE", "true"),
        ]))
        .unwrap();
        assert_eq!(config.region.as_deref(), Some("NA"));
        assert!(config.force_delete_production_type);
    }

    #[test]
    fn empty_variables_are_unset() {
        let config =
            ProviderConfig::from_lookup(lookup(&[("PINGONE_LICENSE_ID", "  ")])).unwrap();
        assert_eq!(config.license_id, None);
    }

    #[test]
    fn malformed_timeout_is_rejected() {
        let err = ProviderConfig::from_lookup(lookup(&[("PINGONE_OPERATION_TIMEOUT", "soon")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                name: "PINGONE_OPERATION_TIMEOUT",
                ..
            }
        ));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = ProviderConfig {
            client_secret: Some("hunter2".to_string()),
            access_token: Some("eyJ...".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("eyJ"));
    }

    #[test]
    fn json_document_uses_field_names() {
        let config = ProviderConfig::from_json(
            r#"{"region": "Europe", "license_id": "l-1", "operation_timeout_secs": 30}"#,
        )
        .unwrap();
        assert_eq!(config.region.as_deref(), Some("Europe"));
        assert_eq!(config.operation_timeout(), Some(Duration::from_secs(30)));
    }
}
