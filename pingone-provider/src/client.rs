//! Platform client
//!
//! The `Transport` trait is the seam to the platform's REST API. The
//! reqwest-backed `HttpTransport` builds `https://<service>.pingone.<suffix>`
//! hosts from the region table; tests substitute a scripted transport.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::TransportError;
use crate::product::ProductCatalog;
use crate::region::{Region, RegionTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        };
        write!(f, "{}", s)
    }
}

/// Platform service a request is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Api,
    Auth,
}

impl Service {
    pub fn host_prefix(&self) -> &'static str {
        match self {
            Service::Api => "api",
            Service::Auth => "auth",
        }
    }
}

/// One HTTP request to the platform
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub service: Service,
    /// Path below the service base (e.g., "/environments/{id}"), or an
    /// absolute URL taken from a pagination link
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            service: Service::Api,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::Post, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::Put, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// HTTP response as received, body undecoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body; an empty body decodes as JSON null
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        if self.body.trim().is_empty() {
            serde_json::from_str("null")
        } else {
            serde_json::from_str(&self.body)
        }
    }
}

/// Performs one HTTP exchange with the platform
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// Supplies bearer tokens; acquisition and refresh live outside this crate
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<String, TransportError>;
}

/// Fixed access token
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<String, TransportError> {
        Ok(self.0.clone())
    }
}

/// Worker client-credentials grant against the auth service. Tokens are
/// cached until shortly before they expire.
pub struct ClientCredentials {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    cached: tokio::sync::Mutex<Option<(String, tokio::time::Instant)>>,
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl ClientCredentials {
    pub fn new(
        region: &Region,
        auth_url: Option<&str>,
        environment_id: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        let auth_base = match auth_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}", region.host(Service::Auth.host_prefix())),
        };
        Self {
            client: reqwest::Client::new(),
            token_url: format!("{}/{}/as/token", auth_base, environment_id),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            cached: tokio::sync::Mutex::new(None),
        }
    }
}

#[async_trait]
impl TokenSource for ClientCredentials {
    async fn token(&self) -> Result<String, TransportError> {
        let mut cached = self.cached.lock().await;
        if let Some((ref token, expires)) = *cached
            && tokio::time::Instant::now() < expires
        {
            return Ok(token.clone());
        }

        log::debug!("requesting worker token from {}", self.token_url);
        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(TransportError::Auth(format!(
                "token request failed with HTTP {}",
                response.status().as_u16()
            )));
        }
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Auth(e.to_string()))?;

        let lifetime = Duration::from_secs(body.expires_in.unwrap_or(3600).saturating_sub(60));
        *cached = Some((
            body.access_token.clone(),
            tokio::time::Instant::now() + lifetime,
        ));
        Ok(body.access_token)
    }
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: reqwest::Client,
    api_base: String,
    auth_base: String,
    tokens: Arc<dyn TokenSource>,
}

impl HttpTransport {
    pub fn new(
        region: &Region,
        api_url: Option<&str>,
        auth_url: Option<&str>,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("pingone-provider/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let api_base = match api_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}/v1", region.host(Service::Api.host_prefix())),
        };
        let auth_base = match auth_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}", region.host(Service::Auth.host_prefix())),
        };

        Ok(Self {
            client,
            api_base,
            auth_base,
            tokens,
        })
    }

    fn url(&self, request: &ApiRequest) -> String {
        if request.path.starts_with("https://") || request.path.starts_with("http://") {
            return request.path.clone();
        }
        let base = match request.service {
            Service::Api => &self.api_base,
            Service::Auth => &self.auth_base,
        };
        format!("{}{}", base, request.path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url(&request);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let token = self.tokens.token().await?;
        let mut builder = self
            .client
            .request(method, &url)
            .bearer_auth(token)
            .query(&request.query);
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(ApiResponse { status, body })
    }
}

/// Shared, immutable handle every descriptor holds after configure
pub struct PlatformClient {
    transport: Arc<dyn Transport>,
    regions: &'static RegionTable,
    products: &'static ProductCatalog,
    pub settings: ClientSettings,
}

/// Process-wide settings read once at configure time
#[derive(Debug, Clone, Default)]
pub struct ClientSettings {
    /// Flip PRODUCTION environments to SANDBOX before deleting them
    pub force_delete_production_type: bool,
    /// Environment region used when the configuration leaves it unset
    pub default_environment_region: Option<String>,
    pub organization_id: Option<String>,
    /// Schema-time default for an environment's license
    pub license_id: Option<String>,
    /// Environment holding the worker credentials
    pub environment_id: Option<String>,
    pub operation_timeout: Option<Duration>,
}

impl PlatformClient {
    pub fn new(transport: Arc<dyn Transport>, settings: ClientSettings) -> Self {
        Self {
            transport,
            regions: RegionTable::builtin(),
            products: ProductCatalog::builtin(),
            settings,
        }
    }

    pub fn regions(&self) -> &'static RegionTable {
        self.regions
    }

    pub fn products(&self) -> &'static ProductCatalog {
        self.products
    }

    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        log::debug!("{}", request);
        self.transport.send(request).await
    }
}

/// One page of a paginated collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<serde_json::Value>,
    /// Absolute URL of the next page
    pub next: Option<String>,
}

impl Page {
    /// Read `_embedded.<key>` and `_links.next.href` from a collection body
    pub fn from_body(body: &serde_json::Value, key: &str) -> Self {
        let items = body
            .get("_embedded")
            .and_then(|e| e.get(key))
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        let next = body
            .get("_links")
            .and_then(|l| l.get("next"))
            .and_then(|n| n.get("href"))
            .and_then(|h| h.as_str())
            .map(str::to_string);
        Self { items, next }
    }
}
