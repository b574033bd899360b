//! Lookup protocol
//!
//! Resolves a platform entity by id (one GET), by name (paginated list and
//! scan in arrival order) or by a filter expression passed through verbatim.

use pingone_core::context::OperationContext;
use pingone_core::diagnostics::{Diagnostic, Diagnostics};
use pingone_core::resource::{Resource, Value};
use uuid::Uuid;

use crate::client::{ApiRequest, ApiResponse, Page, PlatformClient};
use crate::error::PlatformError;
use crate::orchestrator::{self, Classified, Outcome, RetryPolicy};

/// How an entity is selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector<'a> {
    Id(&'a str),
    Name(&'a str),
}

/// A platform collection that can be searched
#[derive(Debug, Clone)]
pub struct Collection {
    /// Entity name used in diagnostics (e.g., "agreement")
    pub entity: &'static str,
    /// Collection path (e.g., "/environments/{id}/agreements")
    pub path: String,
    /// Key of the item array under `_embedded`
    pub embedded: &'static str,
    /// JSON field compared against the requested name
    pub name_field: &'static str,
    pub case_insensitive: bool,
}

/// Pick the selector from a configuration where exactly one of the id and
/// name attributes must be set. `None` while either is still unknown; the
/// choice is made once both have resolved.
pub fn select<'a>(
    config: &'a Resource,
    id_attribute: &str,
    name_attribute: &str,
) -> Result<Option<Selector<'a>>, Diagnostics> {
    match (config.get(id_attribute), config.get(name_attribute)) {
        (Value::Unknown, _) | (_, Value::Unknown) => Ok(None),
        (Value::String(id), Value::Null) => Ok(Some(Selector::Id(id))),
        (Value::Null, Value::String(name)) => Ok(Some(Selector::Name(name))),
        (Value::Null, Value::Null) => Err(Diagnostic::error("Missing parameter")
            .with_detail(format!(
                "Exactly one of these attributes must be configured: [\"{}\", \"{}\"]",
                id_attribute, name_attribute
            ))
            .into()),
        _ => Err(Diagnostic::error("Invalid parameter combination")
            .with_detail(format!(
                "Only one of these attributes may be configured: [\"{}\", \"{}\"]",
                id_attribute, name_attribute
            ))
            .into()),
    }
}

/// Canonical not-found diagnostic
pub fn not_found(entity: &str, dimension: &str, value: &str) -> Diagnostic {
    Diagnostic::error(format!("Cannot find {} from {}", entity, dimension)).with_detail(format!(
        "The {} with {} \"{}\" cannot be found.",
        entity, dimension, value
    ))
}

pub async fn find(
    client: &PlatformClient,
    ctx: &OperationContext,
    collection: &Collection,
    selector: Selector<'_>,
) -> Outcome<serde_json::Value> {
    match selector {
        Selector::Id(id) => find_by_id(client, ctx, collection, id).await,
        Selector::Name(name) => find_by_name(client, ctx, collection, name).await,
    }
}

pub async fn find_by_id(
    client: &PlatformClient,
    ctx: &OperationContext,
    collection: &Collection,
    id: &str,
) -> Outcome<serde_json::Value> {
    let request = ApiRequest::get(format!("{}/{}", collection.path, id));
    let classify = |response: &ApiResponse, error: Option<&PlatformError>| {
        if response.status == 404 || error.is_some_and(|e| e.code() == "NOT_FOUND") {
            return Classified::Fail(not_found(collection.entity, "id", id).into());
        }
        Classified::Defer
    };
    orchestrator::execute(
        ctx,
        move || client.send(request.clone()),
        &format!("ReadOne{}", operation_noun(collection.entity)),
        &classify,
        &RetryPolicy::create_read(),
    )
    .await
}

pub async fn find_by_name(
    client: &PlatformClient,
    ctx: &OperationContext,
    collection: &Collection,
    name: &str,
) -> Outcome<serde_json::Value> {
    find_where(client, ctx, collection, collection.name_field, name, "name").await
}

/// First item, in arrival order, whose `field` equals `wanted`. Not-found
/// diagnostics name `dimension`.
pub async fn find_where(
    client: &PlatformClient,
    ctx: &OperationContext,
    collection: &Collection,
    field: &str,
    wanted: &str,
    dimension: &str,
) -> Outcome<serde_json::Value> {
    let is_match = |item: &serde_json::Value| {
        let Some(candidate) = item.get(field).and_then(|v| v.as_str()) else {
            return false;
        };
        if collection.case_insensitive {
            candidate.eq_ignore_ascii_case(wanted)
        } else {
            candidate == wanted
        }
    };

    let mut pages = Pages::new(client, collection, ApiRequest::get(collection.path.clone()));
    loop {
        match pages.next(ctx).await {
            Ok(Some(page)) => {
                if let Some(item) = page.items.into_iter().find(|item| is_match(item)) {
                    return Outcome::Done(item);
                }
            }
            Ok(None) => break,
            Err(diags) => return Outcome::Failed(diags),
        }
    }
    Outcome::Failed(not_found(collection.entity, dimension, wanted).into())
}

/// Result of a filter query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterResult {
    /// Deterministic id derived from the scope and the filter text
    pub id: String,
    /// Matched entity ids in platform order
    pub ids: Vec<String>,
}

pub async fn find_by_filter(
    client: &PlatformClient,
    ctx: &OperationContext,
    collection: &Collection,
    scope: &str,
    filter: &str,
) -> Outcome<FilterResult> {
    let first = ApiRequest::get(collection.path.clone()).with_query("filter", filter);
    let mut pages = Pages::new(client, collection, first);
    let mut ids = Vec::new();
    loop {
        match pages.next(ctx).await {
            Ok(Some(page)) => ids.extend(
                page.items
                    .iter()
                    .filter_map(|item| item.get("id").and_then(|v| v.as_str()))
                    .map(str::to_string),
            ),
            Ok(None) => break,
            Err(diags) => return Outcome::Failed(diags),
        }
    }
    Outcome::Done(FilterResult {
        id: synthetic_id(scope, filter),
        ids,
    })
}

/// Name-based UUID for a (scope, filter) pair
pub fn synthetic_id(scope: &str, filter: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("{}/{}", scope, filter).as_bytes()).to_string()
}

/// Walks a collection page by page following `_links.next`
struct Pages<'a> {
    client: &'a PlatformClient,
    collection: &'a Collection,
    next: Option<ApiRequest>,
}

impl<'a> Pages<'a> {
    fn new(client: &'a PlatformClient, collection: &'a Collection, first: ApiRequest) -> Self {
        Self {
            client,
            collection,
            next: Some(first),
        }
    }

    async fn next(&mut self, ctx: &OperationContext) -> Result<Option<Page>, Diagnostics> {
        let Some(request) = self.next.take() else {
            return Ok(None);
        };
        let client = self.client;
        let body: serde_json::Value = match orchestrator::execute(
            ctx,
            move || client.send(request.clone()),
            &format!("ReadAll{}s", operation_noun(self.collection.entity)),
            &orchestrator::defer,
            &RetryPolicy::create_read(),
        )
        .await
        {
            Outcome::Done(body) => body,
            Outcome::Absent(diags) | Outcome::Failed(diags) => return Err(diags),
        };
        let page = Page::from_body(&body, self.collection.embedded);
        self.next = page.next.clone().map(ApiRequest::get);
        Ok(Some(page))
    }
}

/// "trusted email domain" -> "TrustedEmailDomain"
fn operation_noun(entity: &str) -> String {
    entity
        .split([' ', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::client::{ClientSettings, Method};
    use crate::testing::ScriptedTransport;

    const ENV: &str = "11111111-1111-1111-1111-111111111111";

    fn agreements() -> Collection {
        Collection {
            entity: "agreement",
            path: format!("/environments/{}/agreements", ENV),
            embedded: "agreements",
            name_field: "name",
            case_insensitive: false,
        }
    }

    fn ctx() -> OperationContext {
        OperationContext::with_timeout(Duration::from_secs(60))
    }

    #[test]
    fn select_requires_exactly_one() {
        let neither = Resource::new("agreement");
        let diags = select(&neither, "agreement_id", "name").unwrap_err();
        assert!(diags.contains_summary("Missing parameter"));

        let both = Resource::new("agreement")
            .with_attribute("agreement_id", Value::string("a"))
            .with_attribute("name", Value::string("b"));
        let diags = select(&both, "agreement_id", "name").unwrap_err();
        assert!(diags.contains_summary("Invalid parameter combination"));

        let by_name = Resource::new("agreement").with_attribute("name", Value::string("b"));
        assert_eq!(
            select(&by_name, "agreement_id", "name").unwrap(),
            Some(Selector::Name("b"))
        );
    }

    #[test]
    fn select_waits_for_unknown_values() {
        let pending_id = Resource::new("agreement").with_attribute("agreement_id", Value::Unknown);
        assert_eq!(select(&pending_id, "agreement_id", "name").unwrap(), None);

        let pending_name = Resource::new("agreement")
            .with_attribute("agreement_id", Value::string("a"))
            .with_attribute("name", Value::Unknown);
        assert_eq!(select(&pending_name, "agreement_id", "name").unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn name_lookup_scans_all_pages() {
        let transport = ScriptedTransport::new();
        let next = format!("https://api.pingone.com/v1/environments/{}/agreements?cursor=2", ENV);
        transport
            .on(
                Method::Get,
                &agreements().path,
                200,
                json!({"_embedded": {"agreements": [{"id": "1", "name": "a"}]},
                       "_links": {"next": {"href": next.clone()}}}),
            )
            .on(
                Method::Get,
                &next,
                200,
                json!({"_embedded": {"agreements": [{"id": "2", "name": "b"}]}}),
            );
        let client = transport.client(ClientSettings::default());

        let outcome = find_by_name(&client, &ctx(), &agreements(), "b").await;
        assert_eq!(outcome, Outcome::Done(json!({"id": "2", "name": "b"})));
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn name_lookup_not_found() {
        let transport = ScriptedTransport::new();
        transport.on(
            Method::Get,
            &agreements().path,
            200,
            json!({"_embedded": {"agreements": [{"id": "1", "name": "a"}, {"id": "2", "name": "b"}]}}),
        );
        let client = transport.client(ClientSettings::default());

        let (_, diags) = find_by_name(&client, &ctx(), &agreements(), "nope")
            .await
            .into_parts();
        assert!(diags.contains_summary("Cannot find agreement from name"));
    }

    #[tokio::test(start_paused = true)]
    async fn name_matching_is_case_sensitive_unless_opted_out() {
        let transport = ScriptedTransport::new();
        transport.on(
            Method::Get,
            &agreements().path,
            200,
            json!({"_embedded": {"agreements": [{"id": "1", "name": "Self-Service"}]}}),
        );
        let client = transport.client(ClientSettings::default());

        let exact = find_by_name(&client, &ctx(), &agreements(), "self-service").await;
        assert!(!exact.is_done());

        let relaxed = Collection {
            case_insensitive: true,
            ..agreements()
        };
        let found = find_by_name(&client, &ctx(), &relaxed, "self-service").await;
        assert!(found.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn id_lookup_not_found_quotes_id() {
        let transport = ScriptedTransport::new();
        transport.on(
            Method::Get,
            &format!("{}/missing", agreements().path),
            404,
            json!({"code": "NOT_FOUND", "message": "Unable to find agreement"}),
        );
        let client = transport.client(ClientSettings::default());

        let (_, diags) = find_by_id(&client, &ctx(), &agreements(), "missing")
            .await
            .into_parts();
        let diagnostic = diags.iter().next().unwrap();
        assert_eq!(diagnostic.summary, "Cannot find agreement from id");
        assert!(diagnostic.detail.as_ref().unwrap().contains("\"missing\""));
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn synthetic_id_is_deterministic() {
        let a = synthetic_id("org-1", "(name sw \"env-\")");
        let b = synthetic_id("org-1", "(name sw \"env-\")");
        let c = synthetic_id("org-2", "(name sw \"env-\")");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn operation_names() {
        assert_eq!(operation_noun("trusted email domain"), "TrustedEmailDomain");
        assert_eq!(operation_noun("agreement"), "Agreement");
    }
}
