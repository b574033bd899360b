//! Scripted in-memory transport for tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::client::{ApiRequest, ApiResponse, ClientSettings, Method, PlatformClient, Transport};
use crate::error::TransportError;

struct Route {
    method: Method,
    path: String,
    /// Replayed in order; the last one repeats
    responses: VecDeque<Result<ApiResponse, TransportError>>,
    /// How long each answer takes
    latency: Duration,
}

/// Records every request and answers from canned responses keyed by
/// method and path. Unscripted requests fail with a request error.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a JSON response for `method path`
    pub fn on(&self, method: Method, path: &str, status: u16, body: serde_json::Value) -> &Self {
        let body = if body.is_null() {
            String::new()
        } else {
            body.to_string()
        };
        self.push(method, path, Ok(ApiResponse::new(status, body)))
    }

    /// Queue a transport failure for `method path`
    pub fn fail(&self, method: Method, path: &str, error: TransportError) -> &Self {
        self.push(method, path, Err(error))
    }

    fn push(
        &self,
        method: Method,
        path: &str,
        response: Result<ApiResponse, TransportError>,
    ) -> &Self {
        let mut routes = self.routes.lock().unwrap();
        match routes
            .iter_mut()
            .find(|r| r.method == method && r.path == path)
        {
            Some(route) => route.responses.push_back(response),
            None => routes.push(Route {
                method,
                path: path.to_string(),
                responses: VecDeque::from([response]),
                latency: Duration::ZERO,
            }),
        }
        self
    }

    /// Answer every scripted `method path` request only after `latency`
    pub fn delay(&self, method: Method, path: &str, latency: Duration) -> &Self {
        let mut routes = self.routes.lock().unwrap();
        for route in routes
            .iter_mut()
            .filter(|r| r.method == method && r.path == path)
        {
            route.latency = latency;
        }
        drop(routes);
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests rendered as "METHOD path"
    pub fn calls(&self) -> Vec<String> {
        self.requests().iter().map(|r| r.to_string()).collect()
    }

    pub fn client(self: &Arc<Self>, settings: ClientSettings) -> Arc<PlatformClient> {
        Arc::new(PlatformClient::new(self.clone(), settings))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let (latency, response) = {
            let mut routes = self.routes.lock().unwrap();
            let route = routes
                .iter_mut()
                .find(|r| r.method == request.method && r.path == request.path)
                .ok_or_else(|| {
                    TransportError::Request(format!("no scripted response for {}", request))
                })?;
            let response = if route.responses.len() > 1 {
                route.responses.pop_front().unwrap()
            } else {
                route.responses.front().cloned().unwrap()
            };
            (route.latency, response)
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        response
    }
}
