//! Environment resource
//!
//! Creating an environment takes two calls (the environment, then its
//! default population), reading takes three, and updates fan out into up to
//! four independent calls. Deletion waits until the platform stops serving
//! the environment.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use pingone_core::context::OperationContext;
use pingone_core::diagnostics::{Diagnostic, Diagnostics};
use pingone_core::provider::{BoxFuture, HookResponse, ResourceDescriptor};
use pingone_core::resource::{Attributes, Resource, State, Value};
use pingone_core::schema::{AttributeSchema, AttributeType, ResourceSchema, Validator, types};
use serde_json::{Map, json};

use crate::bridge::{self, FieldKind};
use crate::client::{ApiRequest, ApiResponse, PlatformClient};
use crate::declarative::Field;
use crate::error::PlatformError;
use crate::orchestrator::{self, Classified, Outcome, RetryPolicy};
use crate::product::ProductCatalog;
use crate::region::Region;
use crate::utils::parse_import_id;

pub const DEFAULT_POPULATION_NAME: &str = "Default";

/// Default timeout for environment deletion, which includes the wait for
/// the platform to stop serving the environment
pub const ENVIRONMENT_DELETE_TIMEOUT: Duration = Duration::from_secs(20 * 60);

const MAX_SERVICES: usize = 13;
const MAX_BOOKMARKS: usize = 5;

const POLL_INITIAL_DELAY: Duration = Duration::from_secs(1);
const POLL_MIN_INTERVAL: Duration = Duration::from_millis(500);
const POLL_MAX_INTERVAL: Duration = Duration::from_secs(10);
/// Deletion polling stops this long before the operation deadline
const POLL_MARGIN: Duration = Duration::from_secs(60);
/// Consecutive 404s required before a deletion counts as finished
const POLL_GONE_CONFIRMATIONS: u32 = 2;

const SOLUTION_CUSTOMER: &str = "CUSTOMER";
const SOLUTION_WORKFORCE: &str = "WORKFORCE";

/// Fields read from an environment document
const READ_FIELDS: &[Field] = &[
    Field::new("id", "id", FieldKind::String),
    Field::new("name", "name", FieldKind::String),
    Field::new("description", "description", FieldKind::String),
    Field::new("type", "type", FieldKind::String),
    Field::new("license_id", "license.id", FieldKind::String),
    Field::new("organization_id", "organization.id", FieldKind::String),
];

const CREATE_FIELDS: &[Field] = &[
    Field::new("name", "name", FieldKind::String),
    Field::new("description", "description", FieldKind::String),
    Field::new("type", "type", FieldKind::String),
    Field::new("license_id", "license.id", FieldKind::String),
];

/// Type changes go through their own endpoint
const UPDATE_FIELDS: &[Field] = &[
    Field::new("name", "name", FieldKind::String),
    Field::new("description", "description", FieldKind::String).null_clears(),
    Field::new("license_id", "license.id", FieldKind::String),
];

pub struct EnvironmentResource {
    client: Arc<PlatformClient>,
}

impl EnvironmentResource {
    pub fn new(client: Arc<PlatformClient>) -> Self {
        Self { client }
    }

    fn environment_path(id: &str) -> String {
        format!("/environments/{}", id)
    }

    // =====================================================================
    // Request bodies
    // =====================================================================

    fn write_fields(
        body: &mut Map<String, serde_json::Value>,
        fields: &[Field],
        attributes: &Attributes,
    ) -> Diagnostics {
        let mut diags = Diagnostics::new();
        for field in fields {
            let value = attributes.get(field.attribute).unwrap_or(&Value::Null);
            if let Err(e) = bridge::write_field(
                body,
                field.path,
                field.attribute,
                field.kind,
                field.mode,
                value,
            ) {
                diags.push(e.to_diagnostic());
            }
        }
        diags
    }

    fn create_body(
        &self,
        planned: &Resource,
        region: Option<&Region>,
    ) -> Result<serde_json::Value, Diagnostics> {
        let mut body = Map::new();
        let mut diags = Self::write_fields(&mut body, CREATE_FIELDS, &planned.attributes);
        if let Some(region) = region {
            body.insert("region".to_string(), json!(region.api_code));
        }
        match bill_of_materials(
            self.client.products(),
            planned.get("service"),
            planned.get("solution"),
        ) {
            Ok(Some(bom)) => {
                body.insert("billOfMaterials".to_string(), bom);
            }
            Ok(None) => {}
            Err(d) => diags.extend(d),
        }
        if diags.has_error() {
            return Err(diags);
        }
        Ok(serde_json::Value::Object(body))
    }

    /// Region to submit: the configured one, else the process default,
    /// else none
    fn planned_region(&self, planned: &Resource) -> Result<Option<&'static Region>, Diagnostics> {
        let name = match planned.get("region") {
            Value::String(name) => Some(name.as_str()),
            _ => self.client.settings.default_environment_region.as_deref(),
        };
        let Some(name) = name else {
            return Ok(None);
        };
        match self.client.regions().resolve(name) {
            Some(region) if region.selectable => Ok(Some(region)),
            _ => Err(Diagnostic::error("Invalid region")
                .with_detail(format!(
                    "\"{}\" is not a region environments can be created in. Expected one of: {}.",
                    name,
                    self.client.regions().selectable_names().join(", ")
                ))
                .for_attribute("region")
                .into()),
        }
    }

    // =====================================================================
    // Platform calls
    // =====================================================================

    async fn call(
        &self,
        ctx: &OperationContext,
        request: ApiRequest,
        operation: &str,
        classify: orchestrator::Classifier<'_>,
        policy: &RetryPolicy,
    ) -> Outcome<serde_json::Value> {
        let client = &*self.client;
        orchestrator::execute(
            ctx,
            move || client.send(request.clone()),
            operation,
            classify,
            policy,
        )
        .await
    }

    /// Submit the environment. When no region was chosen and the platform
    /// answers with exactly one allowed region, submit once more in it.
    async fn create_environment(
        &self,
        ctx: &OperationContext,
        planned: &Resource,
        region: Option<&'static Region>,
    ) -> Outcome<serde_json::Value> {
        let advertised = OnceLock::new();
        let outcome = self.post_environment(ctx, planned, region, &advertised).await;

        if region.is_none()
            && let Outcome::Failed(_) = outcome
            && let Some([code]) = advertised.get().map(Vec::as_slice)
            && let Some(only) = self.client.regions().by_api_code(code)
        {
            log::info!(
                "retrying environment create in the organization's only allowed region {}",
                only.name
            );
            return self
                .post_environment(ctx, planned, Some(only), &OnceLock::new())
                .await;
        }
        outcome
    }

    async fn post_environment(
        &self,
        ctx: &OperationContext,
        planned: &Resource,
        region: Option<&'static Region>,
        advertised: &OnceLock<Vec<String>>,
    ) -> Outcome<serde_json::Value> {
        let body = match self.create_body(planned, region) {
            Ok(body) => body,
            Err(diags) => return Outcome::Failed(diags),
        };
        let attempted = region.map_or("(none)", |r| r.name).to_string();
        let base = orchestrator::environment_create(self.client.regions(), attempted);
        let classify = |response: &ApiResponse, error: Option<&PlatformError>| -> Classified {
            if let Some(allowed) = error.and_then(orchestrator::allowed_regions) {
                let _ = advertised.set(allowed.to_vec());
            }
            base(response, error)
        };
        self.call(
            ctx,
            ApiRequest::post("/environments", body),
            "CreateEnvironmentActiveLicense",
            &classify,
            &RetryPolicy::environment(),
        )
        .await
    }

    async fn create_population(
        &self,
        ctx: &OperationContext,
        environment_id: &str,
        block: &Value,
    ) -> Outcome<serde_json::Value> {
        self.call(
            ctx,
            ApiRequest::post(
                format!("{}/populations", Self::environment_path(environment_id)),
                population_body(block),
            ),
            "CreatePopulation",
            &orchestrator::defer,
            &RetryPolicy::environment(),
        )
        .await
    }

    async fn update_type(
        &self,
        ctx: &OperationContext,
        id: &str,
        environment_type: &str,
    ) -> Outcome<serde_json::Value> {
        self.call(
            ctx,
            ApiRequest::put(
                format!("{}/type", Self::environment_path(id)),
                json!({ "type": environment_type }),
            ),
            "UpdateEnvironmentType",
            &orchestrator::defer,
            &RetryPolicy::environment(),
        )
        .await
    }

    // =====================================================================
    // State mapping
    // =====================================================================

    /// Environment document fields; region codes map back to region names
    fn read_environment(
        &self,
        json: &serde_json::Value,
        attributes: &mut Attributes,
        diags: &mut Diagnostics,
    ) {
        for field in READ_FIELDS {
            match bridge::from_platform(field.attribute, field.kind, bridge::get_path(json, field.path))
            {
                Ok(value) => {
                    attributes.insert(field.attribute.to_string(), value);
                }
                Err(e) => diags.push(e.to_diagnostic()),
            }
        }
        match json.get("region").and_then(|v| v.as_str()) {
            Some(code) => match self.client.regions().by_api_code(code) {
                Some(region) => {
                    attributes.insert("region".to_string(), Value::string(region.name));
                }
                None => diags.push(orchestrator::unknown_region_code(code)),
            },
            None => {
                attributes.insert("region".to_string(), Value::Null);
            }
        }
    }

    /// `service` and `solution` from a bill of materials
    fn read_bill_of_materials(
        &self,
        bom: &serde_json::Value,
        attributes: &mut Attributes,
        diags: &mut Diagnostics,
    ) {
        let mut services = Vec::new();
        for entry in bom
            .get("products")
            .and_then(|p| p.as_array())
            .into_iter()
            .flatten()
        {
            let code = entry.get("type").and_then(|t| t.as_str()).unwrap_or_default();
            let Some(product) = self.client.products().by_api_code(code) else {
                diags.push(Diagnostic::error("Unexpected product code").with_detail(format!(
                    "The platform returned product \"{}\", which is not in the provider's product catalog. This is a provider bug; please report it.",
                    code
                )));
                continue;
            };
            let mut service = Attributes::new();
            service.insert("type".to_string(), Value::string(product.code));
            if let Some(url) = entry
                .get("console")
                .and_then(|c| c.get("href"))
                .and_then(|h| h.as_str())
            {
                service.insert("console_url".to_string(), Value::string(url));
            }
            if let Some(bookmarks) = entry.get("bookmarks").and_then(|b| b.as_array()) {
                let bookmarks = bookmarks.iter().map(|b| {
                    Value::object([
                        ("name", string_or_null(b.get("name"))),
                        ("url", string_or_null(b.get("href"))),
                    ])
                });
                service.insert("bookmark".to_string(), Value::set(bookmarks));
            }
            services.push(Value::Object(service));
        }
        attributes.insert("service".to_string(), Value::set(services));

        let solution = match bom.get("solutionType").and_then(|s| s.as_str()) {
            Some(SOLUTION_WORKFORCE) => {
                diags.push(
                    Diagnostic::error("Unsupported environment solution")
                        .with_detail("The environment's bill of materials declares the WORKFORCE solution, which this resource does not manage.")
                        .for_attribute("solution"),
                );
                Value::Null
            }
            Some(solution) => Value::string(solution),
            None => Value::Null,
        };
        attributes.insert("solution".to_string(), solution);
    }

    fn read_population(json: &serde_json::Value, attributes: &mut Attributes) {
        attributes.insert(
            "default_population_id".to_string(),
            string_or_null(json.get("id")),
        );
        let block: Attributes = [("name", json.get("name")), ("description", json.get("description"))]
            .into_iter()
            .filter_map(|(k, v)| v.and_then(|v| v.as_str()).map(|s| (k.to_string(), Value::string(s))))
            .collect();
        attributes.insert("default_population".to_string(), Value::Object(block));
    }

    fn state(attributes: Attributes) -> State {
        let id = attributes
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        State::existing("environment", attributes).with_identifier(id)
    }

    // =====================================================================
    // Hooks
    // =====================================================================

    async fn do_create(&self, ctx: &OperationContext, planned: &Resource) -> HookResponse {
        let region = match self.planned_region(planned) {
            Ok(region) => region,
            Err(diags) => return HookResponse::failed(diags),
        };
        let environment = match self.create_environment(ctx, planned, region).await {
            Outcome::Done(json) => json,
            Outcome::Absent(diags) | Outcome::Failed(diags) => return HookResponse::failed(diags),
        };

        let mut attributes = Attributes::new();
        let mut diags = Diagnostics::new();
        self.read_environment(&environment, &mut attributes, &mut diags);
        match environment.get("billOfMaterials") {
            Some(bom) => self.read_bill_of_materials(bom, &mut attributes, &mut diags),
            None => {
                attributes.insert("service".to_string(), planned.get("service").clone());
                attributes.insert("solution".to_string(), planned.get("solution").clone());
            }
        }
        let Some(id) = attributes.get("id").and_then(Value::as_str).map(str::to_string) else {
            diags.add_error(
                "Unexpected create response",
                "The platform did not return an id for the new environment.",
            );
            return HookResponse::failed(diags);
        };
        log::info!("created environment {}", id);

        match self
            .create_population(ctx, &id, planned.get("default_population"))
            .await
        {
            Outcome::Done(population) => Self::read_population(&population, &mut attributes),
            Outcome::Absent(d) | Outcome::Failed(d) => {
                attributes.insert("default_population".to_string(), Value::Null);
                attributes.insert("default_population_id".to_string(), Value::Null);
                diags.extend(d);
            }
        }
        HookResponse::with_state(Self::state(attributes)).with_diagnostics(diags)
    }

    async fn do_read(&self, ctx: &OperationContext, current: &State) -> HookResponse {
        let Some(id) = current.identifier.as_deref() else {
            return HookResponse::removed();
        };
        let environment = match self
            .call(
                ctx,
                ApiRequest::get(Self::environment_path(id)),
                "ReadOneEnvironment",
                &orchestrator::not_found_warning,
                &RetryPolicy::create_read(),
            )
            .await
        {
            Outcome::Done(json) => json,
            Outcome::Absent(diags) => return HookResponse::removed().with_diagnostics(diags),
            Outcome::Failed(diags) if diags.is_interrupted() => {
                return HookResponse::unchanged(current.clone(), diags);
            }
            Outcome::Failed(diags) => return HookResponse::failed(diags),
        };

        let mut attributes = Attributes::new();
        let mut diags = Diagnostics::new();
        self.read_environment(&environment, &mut attributes, &mut diags);

        match self
            .call(
                ctx,
                ApiRequest::get(format!("{}/billOfMaterials", Self::environment_path(id))),
                "ReadOneBillOfMaterials",
                &orchestrator::defer,
                &RetryPolicy::environment(),
            )
            .await
        {
            Outcome::Done(bom) => self.read_bill_of_materials(&bom, &mut attributes, &mut diags),
            Outcome::Absent(d) | Outcome::Failed(d) => diags.extend(d),
        }

        match current.get("default_population_id").as_str() {
            Some(population_id) => match self
                .call(
                    ctx,
                    ApiRequest::get(format!(
                        "{}/populations/{}",
                        Self::environment_path(id),
                        population_id
                    )),
                    "ReadOnePopulation",
                    &orchestrator::not_found_warning,
                    &RetryPolicy::create_read(),
                )
                .await
            {
                Outcome::Done(population) => Self::read_population(&population, &mut attributes),
                Outcome::Absent(d) => {
                    attributes.insert("default_population".to_string(), Value::Null);
                    attributes.insert("default_population_id".to_string(), Value::Null);
                    diags.extend(d);
                }
                Outcome::Failed(d) => diags.extend(d),
            },
            None => {
                attributes.insert("default_population".to_string(), Value::Null);
                attributes.insert("default_population_id".to_string(), Value::Null);
            }
        }

        if diags.is_interrupted() {
            return HookResponse::unchanged(current.clone(), diags);
        }
        if diags.has_error() {
            return HookResponse::failed(diags);
        }
        HookResponse::with_state(Self::state(attributes)).with_diagnostics(diags)
    }

    /// Each step stands alone; a failed step returns the state reached so
    /// far together with its diagnostics.
    async fn do_update(
        &self,
        ctx: &OperationContext,
        prior: &State,
        planned: &Resource,
    ) -> HookResponse {
        let Some(id) = prior.identifier.clone() else {
            return HookResponse::failed(
                Diagnostic::error("Missing environment id")
                    .with_detail("The prior state carries no environment id to update."),
            );
        };
        let mut attributes = prior.attributes.clone();
        let mut diags = Diagnostics::new();
        let partial = |attributes: Attributes, diags: Diagnostics| {
            HookResponse::with_state(Self::state(attributes)).with_diagnostics(diags)
        };

        if let Some(environment_type) = planned.get("type").as_str()
            && prior.get("type").as_str() != Some(environment_type)
        {
            match self.update_type(ctx, &id, environment_type).await {
                Outcome::Done(_) => {
                    attributes.insert("type".to_string(), Value::string(environment_type));
                }
                Outcome::Absent(d) | Outcome::Failed(d) => return partial(attributes, d),
            }
        }

        let mut body = Map::new();
        let d = Self::write_fields(&mut body, UPDATE_FIELDS, &planned.attributes);
        if d.has_error() {
            return partial(attributes, d);
        }
        if let Some(region) = prior
            .get("region")
            .as_str()
            .and_then(|name| self.client.regions().by_name(name))
        {
            body.insert("region".to_string(), json!(region.api_code));
        }
        match self
            .call(
                ctx,
                ApiRequest::put(Self::environment_path(&id), serde_json::Value::Object(body)),
                "UpdateEnvironment",
                &orchestrator::defer,
                &RetryPolicy::environment(),
            )
            .await
        {
            Outcome::Done(json) => self.read_environment(&json, &mut attributes, &mut diags),
            Outcome::Absent(d) | Outcome::Failed(d) => return partial(attributes, d),
        }

        if planned.get("service") != prior.get("service")
            || (planned.get("solution").is_known() && planned.get("solution") != prior.get("solution"))
        {
            let bom = match bill_of_materials(
                self.client.products(),
                planned.get("service"),
                planned.get("solution"),
            ) {
                Ok(bom) => bom.unwrap_or_else(|| json!({ "products": [] })),
                Err(d) => return partial(attributes, d),
            };
            match self
                .call(
                    ctx,
                    ApiRequest::put(format!("{}/billOfMaterials", Self::environment_path(&id)), bom),
                    "UpdateBillOfMaterials",
                    &orchestrator::defer,
                    &RetryPolicy::environment(),
                )
                .await
            {
                Outcome::Done(json) => self.read_bill_of_materials(&json, &mut attributes, &mut diags),
                Outcome::Absent(d) | Outcome::Failed(d) => return partial(attributes, d),
            }
        }

        if planned.get("default_population").is_known()
            && planned.get("default_population") != prior.get("default_population")
        {
            let Some(population_id) = prior.get("default_population_id").as_str() else {
                diags.add_error(
                    "Missing default population id",
                    "The prior state carries no default population id, so the default population cannot be updated. Import the environment again to recover it.",
                );
                return partial(attributes, diags);
            };
            match self
                .call(
                    ctx,
                    ApiRequest::put(
                        format!("{}/populations/{}", Self::environment_path(&id), population_id),
                        population_body(planned.get("default_population")),
                    ),
                    "UpdatePopulation",
                    &orchestrator::defer,
                    &RetryPolicy::environment(),
                )
                .await
            {
                Outcome::Done(json) => Self::read_population(&json, &mut attributes),
                Outcome::Absent(d) | Outcome::Failed(d) => return partial(attributes, d),
            }
        }

        partial(attributes, diags)
    }

    async fn do_delete(&self, ctx: &OperationContext, prior: &State) -> Diagnostics {
        let Some(id) = prior.identifier.as_deref() else {
            return Diagnostics::new();
        };

        if prior.get("type").as_str() == Some("PRODUCTION") {
            if self.client.settings.force_delete_production_type {
                log::info!("switching production environment {} to SANDBOX before delete", id);
                if let Outcome::Absent(d) | Outcome::Failed(d) =
                    self.update_type(ctx, id, "SANDBOX").await
                {
                    return d;
                }
            } else {
                log::debug!("deleting production environment {} without force", id);
            }
        }

        match self
            .call(
                ctx,
                ApiRequest::delete(Self::environment_path(id)),
                "DeleteEnvironment",
                &orchestrator::not_found_warning,
                &RetryPolicy::create_read(),
            )
            .await
        {
            Outcome::Done(_) => self.wait_for_deletion(ctx, id).await,
            Outcome::Absent(_) => Diagnostics::new(),
            Outcome::Failed(d) => d,
        }
    }

    /// Poll until the environment reads as not found twice in a row.
    /// Existing (200) and not-yet-revoked access (403) responses mean the
    /// deletion is still in progress.
    async fn wait_for_deletion(&self, ctx: &OperationContext, id: &str) -> Diagnostics {
        const OPERATION: &str = "ReadOneEnvironment";
        let poll = ctx.with_total_timeout(ctx.timeout().saturating_sub(POLL_MARGIN));
        let path = Self::environment_path(id);

        if poll.sleep(POLL_INITIAL_DELAY.min(poll.remaining())).await.is_err() {
            return orchestrator::cancelled_diagnostic(OPERATION).into();
        }
        let mut interval = POLL_MIN_INTERVAL;
        let mut gone = 0;
        loop {
            let result = tokio::select! {
                result = self.client.send(ApiRequest::get(path.clone())) => result,
                _ = poll.cancelled() => return orchestrator::cancelled_diagnostic(OPERATION).into(),
                _ = tokio::time::sleep_until(poll.deadline()) => return delete_timeout(id, &poll).into(),
            };
            match result {
                Ok(response) if response.status == 404 => {
                    gone += 1;
                    log::debug!("environment {} not found ({}/{})", id, gone, POLL_GONE_CONFIRMATIONS);
                    if gone >= POLL_GONE_CONFIRMATIONS {
                        return Diagnostics::new();
                    }
                }
                Ok(response)
                    if matches!(response.status, 200 | 403)
                        || orchestrator::is_transient_status(response.status) =>
                {
                    gone = 0;
                    log::debug!("environment {} still present (HTTP {})", id, response.status);
                    interval = (interval * 2).min(POLL_MAX_INTERVAL);
                }
                Ok(response) => {
                    let error = PlatformError::parse(&response.body);
                    return orchestrator::default_diagnostic(OPERATION, &response, error.as_ref())
                        .into();
                }
                Err(e) if e.is_transient() => {
                    gone = 0;
                    log::debug!("environment {} delete poll: {}", id, e);
                }
                Err(e) => return orchestrator::transport_diagnostic(OPERATION, &e).into(),
            }

            if poll.remaining() < interval {
                return delete_timeout(id, &poll).into();
            }
            if poll.sleep(interval).await.is_err() {
                return orchestrator::cancelled_diagnostic(OPERATION).into();
            }
        }
    }

    async fn do_import(&self, ctx: &OperationContext, identifier: &str) -> HookResponse {
        let parts = match parse_import_id(identifier, &["environment_id", "population_id"]) {
            Ok(parts) => parts,
            Err(e) => return HookResponse::failed(e.to_diagnostic()),
        };
        let mut attributes = Attributes::new();
        attributes.insert("id".to_string(), Value::string(&parts[0]));
        attributes.insert("default_population_id".to_string(), Value::string(&parts[1]));
        let state = State::existing("environment", attributes).with_identifier(&parts[0]);
        let response = self.do_read(ctx, &state).await;
        if response.is_interrupted() {
            return HookResponse::failed(response.diagnostics);
        }
        response
    }
}

fn delete_timeout(id: &str, poll: &OperationContext) -> Diagnostic {
    Diagnostic::warning("Environment Delete Timeout").with_detail(format!(
        "Environment {} was deleted, but the platform still served it when the wait of {}s ended. It may take a few more minutes to disappear.",
        id,
        poll.timeout().as_secs()
    ))
}

fn string_or_null(value: Option<&serde_json::Value>) -> Value {
    value
        .and_then(|v| v.as_str())
        .map_or(Value::Null, Value::string)
}

fn population_body(block: &Value) -> serde_json::Value {
    let name = block
        .field("name")
        .as_str()
        .unwrap_or(DEFAULT_POPULATION_NAME);
    let mut body = json!({ "name": name });
    if let Some(description) = block.field("description").as_str()
        && !description.is_empty()
    {
        body["description"] = json!(description);
    }
    body
}

/// Bill of materials for a `service` set; `None` when neither services nor
/// a solution are known
fn bill_of_materials(
    catalog: &ProductCatalog,
    services: &Value,
    solution: &Value,
) -> Result<Option<serde_json::Value>, Diagnostics> {
    let mut body = Map::new();
    let mut diags = Diagnostics::new();

    if let Some(entries) = services.as_items() {
        let mut products = Vec::with_capacity(entries.len());
        for entry in entries {
            let code = entry.field("type").as_str().unwrap_or_default();
            let Some(product) = catalog.by_product_code(code).filter(|p| p.selectable) else {
                diags.push(
                    Diagnostic::error("Invalid service type")
                        .with_detail(format!("\"{}\" is not a selectable service.", code))
                        .for_attribute("service"),
                );
                continue;
            };
            let mut item = json!({ "type": product.api_code });
            if let Some(url) = entry.field("console_url").as_str() {
                item["console"] = json!({ "href": url });
            }
            if let Some(bookmarks) = entry.field("bookmark").as_items() {
                item["bookmarks"] = bookmarks
                    .iter()
                    .map(|b| {
                        json!({
                            "name": b.field("name").as_str(),
                            "href": b.field("url").as_str(),
                        })
                    })
                    .collect();
            }
            products.push(item);
        }
        body.insert("products".to_string(), serde_json::Value::Array(products));
    }

    if let Some(solution) = solution.as_str() {
        if solution != SOLUTION_CUSTOMER {
            diags.push(
                Diagnostic::error("Invalid solution")
                    .with_detail(format!("Only the {} solution can be set.", SOLUTION_CUSTOMER))
                    .for_attribute("solution"),
            );
        }
        body.insert("solutionType".to_string(), json!(solution));
    }

    if diags.has_error() {
        return Err(diags);
    }
    Ok((!body.is_empty()).then_some(serde_json::Value::Object(body)))
}

// =========================================================================
// Schema
// =========================================================================

/// Console URLs and bookmarks only exist for products with their own
/// console; each product appears at most once
fn check_services(value: &Value) -> Result<(), String> {
    let catalog = ProductCatalog::builtin();
    let mut seen = Vec::new();
    for entry in value.as_items().unwrap_or_default() {
        let Some(code) = entry.field("type").as_str() else {
            continue;
        };
        if seen.contains(&code) {
            return Err(format!("service \"{}\" is listed more than once", code));
        }
        seen.push(code);
        let Some(product) = catalog.by_product_code(code) else {
            continue;
        };
        if !product.has_console {
            if entry.field("console_url").is_set() {
                return Err(format!("console_url cannot be set for service \"{}\"", code));
            }
            if entry.field("bookmark").is_set() {
                return Err(format!("bookmark cannot be set for service \"{}\"", code));
            }
        }
    }
    Ok(())
}

fn service_type() -> AttributeType {
    let bookmark = AttributeType::Object(vec![
        AttributeSchema::new("name", AttributeType::String)
            .required()
            .with_validator(Validator::NonEmpty),
        AttributeSchema::new("url", AttributeType::String)
            .required()
            .with_validator(Validator::NonEmpty),
    ]);
    let entry = AttributeType::Object(vec![
        AttributeSchema::new(
            "type",
            types::enum_of(&ProductCatalog::builtin().selectable_product_codes()),
        )
        .required(),
        AttributeSchema::new("console_url", AttributeType::String)
            .with_validator(Validator::NonEmpty),
        AttributeSchema::new("bookmark", AttributeType::Set(Box::new(bookmark))).with_validator(
            Validator::SizeBetween {
                min: 0,
                max: MAX_BOOKMARKS,
            },
        ),
    ]);
    AttributeType::Custom {
        name: "ServiceSet".to_string(),
        base: Box::new(AttributeType::Set(Box::new(entry))),
        validate: check_services,
    }
}

fn schema(license_default: Option<&str>) -> ResourceSchema {
    let mut license = AttributeSchema::new("license_id", types::resource_id())
        .required()
        .with_description("License the environment is bound to");
    if let Some(license_id) = license_default {
        license = license.with_default(Value::string(license_id));
    }
    let regions = crate::region::RegionTable::builtin().selectable_names();

    ResourceSchema::new("environment")
        .with_description("PingOne environment with its services and default population")
        .attribute(AttributeSchema::new("id", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .required()
                .with_validator(Validator::NonEmpty),
        )
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(
            AttributeSchema::new("type", types::enum_of(&["SANDBOX", "PRODUCTION"]))
                .optional_computed()
                .with_default(Value::string("SANDBOX")),
        )
        .attribute(
            AttributeSchema::new("region", types::enum_of(&regions))
                .optional_computed()
                .requires_replace(),
        )
        .attribute(license)
        .attribute(AttributeSchema::new("organization_id", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new("solution", types::enum_of(&[SOLUTION_CUSTOMER])).optional_computed(),
        )
        .attribute(
            AttributeSchema::new("service", service_type())
                .optional_computed()
                .with_validator(Validator::SizeBetween {
                    min: 1,
                    max: MAX_SERVICES,
                })
                .with_default(Value::set([Value::object([("type", Value::string("SSO"))])])),
        )
        .attribute(
            AttributeSchema::new(
                "default_population",
                AttributeType::Object(vec![
                    AttributeSchema::new("name", AttributeType::String)
                        .with_validator(Validator::NonEmpty),
                    AttributeSchema::new("description", AttributeType::String),
                ]),
            )
            .optional_computed()
            .with_default(Value::object([(
                "name",
                Value::string(DEFAULT_POPULATION_NAME),
            )])),
        )
        .attribute(AttributeSchema::new("default_population_id", AttributeType::String).computed())
}

impl ResourceDescriptor for EnvironmentResource {
    fn type_name(&self) -> &'static str {
        "environment"
    }

    fn schema(&self) -> ResourceSchema {
        schema(self.client.settings.license_id.as_deref())
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
