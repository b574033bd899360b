//! Call orchestrator
//!
//! Runs one platform call to completion: retries transient and
//! eventually-consistent failures with jittered exponential backoff inside
//! the operation deadline, lets the caller classify structured platform
//! errors, and turns everything else into diagnostics.

use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use pingone_core::context::OperationContext;
use pingone_core::diagnostics::{Diagnostic, Diagnostics};
use rand::Rng;
use regex::Regex;
use serde::de::DeserializeOwned;

use crate::client::ApiResponse;
use crate::error::{PlatformError, TransportError};
use crate::region::RegionTable;

/// Upper bound on raw response text copied into a diagnostic
const MAX_BODY_IN_DETAIL: usize = 1024;

/// Status codes the platform marks as retryable
const TRANSIENT_STATUSES: [u16; 4] = [429, 502, 503, 504];

/// Permission and replica propagation after environment changes can take
/// longer than the default budget covers
const ENVIRONMENT_MAX_ATTEMPTS: u32 = 10;

pub fn is_transient_status(status: u16) -> bool {
    TRANSIENT_STATUSES.contains(&status)
}

/// Decides whether a failed response is worth another attempt
pub type RetryPredicate = fn(&OperationContext, &ApiResponse, Option<&PlatformError>) -> bool;

/// Caller-specific mapping of a failed response
pub type Classifier<'a> = &'a (dyn Fn(&ApiResponse, Option<&PlatformError>) -> Classified + Send + Sync);

/// Result of classifying a failed response
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    /// Use the default mapping
    Defer,
    /// Stop now with these diagnostics
    Fail(Diagnostics),
    /// The entity does not exist; not an error once retries are exhausted
    Absent(Diagnostics),
}

/// Terminal state of one orchestrated call
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Done(T),
    Absent(Diagnostics),
    Failed(Diagnostics),
}

impl<T> Outcome<T> {
    /// Body and diagnostics, in the shape hooks hand back to the host
    pub fn into_parts(self) -> (Option<T>, Diagnostics) {
        match self {
            Outcome::Done(body) => (Some(body), Diagnostics::new()),
            Outcome::Absent(diags) | Outcome::Failed(diags) => (None, diags),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            multiplier: 2,
        }
    }
}

impl Backoff {
    fn next(&self, delay: Duration) -> Duration {
        delay.saturating_mul(self.multiplier).min(self.max)
    }
}

/// Retry predicate plus attempt budget and backoff shape
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retryable: RetryPredicate,
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Retry transient transport failures and retryable statuses only
    pub fn transient_only() -> Self {
        Self {
            retryable: never,
            max_attempts: 5,
            backoff: Backoff::default(),
        }
    }

    /// Also retry while a freshly granted role has not propagated
    pub fn create_read() -> Self {
        Self {
            retryable: create_read_retryable,
            ..Self::transient_only()
        }
    }

    /// Policy for environment operations: permission propagation and
    /// not-found-after-mutation races
    pub fn environment() -> Self {
        Self {
            retryable: environment_retryable,
            ..Self::transient_only()
        }
        .with_max_attempts(ENVIRONMENT_MAX_ATTEMPTS)
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}

// =========================================================================
// Retry predicates
// =========================================================================

pub fn never(_ctx: &OperationContext, _response: &ApiResponse, _error: Option<&PlatformError>) -> bool {
    false
}

pub fn create_read_retryable(
    _ctx: &OperationContext,
    _response: &ApiResponse,
    error: Option<&PlatformError>,
) -> bool {
    error.is_some_and(|e| {
        e.message()
            .starts_with("The actor attempting to perform the request is not authorized.")
    })
}

pub fn environment_retryable(
    ctx: &OperationContext,
    response: &ApiResponse,
    error: Option<&PlatformError>,
) -> bool {
    if create_read_retryable(ctx, response, error) {
        return true;
    }
    match error {
        Some(e) if response.status == 403 => e
            .message()
            .contains("You do not have access to this resource"),
        Some(e) => response.status == 404 || e.code() == "NOT_FOUND",
        None => response.status == 404,
    }
}

// =========================================================================
// Classifiers
// =========================================================================

pub fn defer(_response: &ApiResponse, _error: Option<&PlatformError>) -> Classified {
    Classified::Defer
}

/// 404 means the entity is gone: a warning, and the caller drops it
pub fn not_found_warning(response: &ApiResponse, error: Option<&PlatformError>) -> Classified {
    if response.status == 404 || error.is_some_and(|e| e.code() == "NOT_FOUND") {
        return Classified::Absent(
            Diagnostic::warning("Requested resource not found")
                .with_detail(
                    "The requested resource object cannot be found. It may have been deleted outside of this provider.",
                )
                .into(),
        );
    }
    Classified::Defer
}

/// INVALID_VALUE on `target` becomes an error scoped to that attribute
pub fn invalid_value(
    target: &'static str,
) -> impl Fn(&ApiResponse, Option<&PlatformError>) -> Classified + Send + Sync {
    move |_response, error| {
        if let Some(detail) = error.and_then(PlatformError::first_detail)
            && detail.code.as_deref() == Some("INVALID_VALUE")
            && detail.target.as_deref() == Some(target)
        {
            return Classified::Fail(
                Diagnostic::error(format!("Invalid \"{}\" value", target))
                    .with_detail(detail.message.clone().unwrap_or_default())
                    .for_attribute(target)
                    .into(),
            );
        }
        Classified::Defer
    }
}

static FEATURE_FLAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Organization does not have (.+?) enabled")
        .expect("feature flag message is a valid regex pattern")
});

/// Readable diagnostic for "Organization does not have X enabled"
pub fn feature_not_enabled(error: &PlatformError) -> Option<Diagnostic> {
    let captures = FEATURE_FLAG.captures(error.message())?;
    let feature = captures.get(1)?.as_str();
    let feature = feature.strip_suffix(" FF").unwrap_or(feature);
    Some(
        Diagnostic::error(format!(
            "The {} service is not enabled in this organization tenant.",
            feature
        ))
        .with_detail(error.message().to_string()),
    )
}

/// Allowed region codes from a region-targeted detail
pub fn allowed_regions(error: &PlatformError) -> Option<&[String]> {
    let detail = error.first_detail()?;
    if detail.target.as_deref() != Some("region") {
        return None;
    }
    detail
        .inner_error
        .as_ref()
        .and_then(|inner| inner.allowed_values.as_deref())
}

/// Region-mismatch diagnostic listing allowed regions by their
/// user-facing names
pub fn region_mismatch(
    regions: &RegionTable,
    allowed_codes: &[String],
    attempted: &str,
) -> Diagnostic {
    let mut names = Vec::with_capacity(allowed_codes.len());
    for code in allowed_codes {
        match regions.by_api_code(code) {
            Some(region) => names.push(region.name),
            None => return unknown_region_code(code),
        }
    }
    Diagnostic::error(format!(
        "Incompatible environment region for the organization tenant. Expecting regions [{}], region provided: {}",
        names.join(", "),
        attempted
    ))
    .with_detail("Ensure the region parameter is correctly set. If the region parameter is correctly set in the resource creation, please raise an issue with the provider maintainers.")
    .for_attribute("region")
}

/// The platform named a region this provider has no entry for
pub fn unknown_region_code(code: &str) -> Diagnostic {
    Diagnostic::error("Unexpected region code").with_detail(format!(
        "The platform returned region code \"{}\", which is not in the provider's region table. This is a provider bug; please report it.",
        code
    ))
}

/// Classifier for environment creation: region mismatch and disabled
/// features end the call
pub fn environment_create(
    regions: &'static RegionTable,
    attempted_region: String,
) -> impl Fn(&ApiResponse, Option<&PlatformError>) -> Classified + Send + Sync {
    move |_response, error| {
        let Some(error) = error else {
            return Classified::Defer;
        };
        if let Some(allowed) = allowed_regions(error) {
            return Classified::Fail(region_mismatch(regions, allowed, &attempted_region).into());
        }
        if let Some(diagnostic) = feature_not_enabled(error) {
            return Classified::Fail(diagnostic.into());
        }
        Classified::Defer
    }
}

// =========================================================================
// Execution
// =========================================================================

/// Last failure seen before giving up
enum Failure {
    Transport(TransportError),
    Response {
        response: ApiResponse,
        error: Option<PlatformError>,
        classified: Classified,
    },
}

impl Failure {
    fn reason(&self) -> String {
        match self {
            Failure::Transport(e) => e.to_string(),
            Failure::Response {
                response, error, ..
            } => match error {
                Some(e) => format!("HTTP {} {}", response.status, e.code()),
                None => format!("HTTP {}", response.status),
            },
        }
    }

    fn into_outcome<T>(self, operation: &str) -> Outcome<T> {
        match self {
            Failure::Transport(e) => Outcome::Failed(transport_diagnostic(operation, &e).into()),
            Failure::Response {
                classified: Classified::Absent(diags),
                ..
            } => Outcome::Absent(diags),
            Failure::Response {
                response, error, ..
            } => Outcome::Failed(default_diagnostic(operation, &response, error.as_ref()).into()),
        }
    }

    fn timed_out<T>(self, operation: &str, attempts: u32) -> Outcome<T> {
        let reason = self.reason();
        match self.into_outcome::<T>(operation) {
            Outcome::Absent(diags) => Outcome::Absent(diags),
            _ => Outcome::Failed(
                Diagnostic::error("Operation timed out")
                    .with_detail(format!(
                        "`{}` did not succeed within the operation timeout after {} attempt(s). Last failure: {}",
                        operation, attempts, reason
                    ))
                    .into(),
            ),
        }
    }
}

/// Execute one platform call.
///
/// `call` performs a single HTTP exchange and is invoked once per attempt.
/// A successful response body is decoded as `T` (an empty body decodes as
/// JSON null). Failed responses go to `classify` first; a `Fail` ends the
/// call immediately. Otherwise retryable statuses, transient transport
/// errors and responses accepted by the policy predicate are retried until
/// the attempt budget or the context deadline runs out. Cancellation and
/// the deadline both interrupt in-flight calls and waits.
pub async fn execute<T, F, Fut>(
    ctx: &OperationContext,
    mut call: F,
    operation: &str,
    classify: Classifier<'_>,
    policy: &RetryPolicy,
) -> Outcome<T>
where
    T: DeserializeOwned,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ApiResponse, TransportError>>,
{
    let mut attempt: u32 = 0;
    let mut delay = policy.backoff.initial;

    loop {
        if ctx.is_cancelled() {
            return cancelled(operation);
        }
        attempt += 1;
        log::debug!("{}: attempt {}", operation, attempt);

        let result = tokio::select! {
            result = call() => result,
            _ = ctx.cancelled() => return cancelled(operation),
            _ = tokio::time::sleep_until(ctx.deadline()) => {
                log::debug!("{}: deadline reached during attempt {}", operation, attempt);
                return Outcome::Failed(deadline_diagnostic(operation, ctx, attempt).into());
            }
        };

        let failure = match result {
            Ok(response) if response.is_success() => return decode(operation, &response),
            Ok(response) => {
                let error = PlatformError::parse(&response.body);
                let classified = match classify(&response, error.as_ref()) {
                    Classified::Fail(diags) => return Outcome::Failed(diags),
                    other => other,
                };
                let retry = is_transient_status(response.status)
                    || (policy.retryable)(ctx, &response, error.as_ref());
                let failure = Failure::Response {
                    response,
                    error,
                    classified,
                };
                if !retry {
                    return failure.into_outcome(operation);
                }
                failure
            }
            Err(e) if e.is_transient() => Failure::Transport(e),
            Err(e) => return Outcome::Failed(transport_diagnostic(operation, &e).into()),
        };

        if attempt >= policy.max_attempts {
            log::debug!("{}: giving up after {} attempts", operation, attempt);
            return failure.into_outcome(operation);
        }

        let wait = jitter(delay);
        if wait > ctx.remaining() {
            log::debug!("{}: deadline reached after {} attempts", operation, attempt);
            return failure.timed_out(operation, attempt);
        }

        log::warn!(
            "{}: attempt {} failed ({}), retrying in {:?}",
            operation,
            attempt,
            failure.reason(),
            wait
        );
        if ctx.sleep(wait).await.is_err() {
            return cancelled(operation);
        }
        delay = policy.backoff.next(delay);
    }
}

/// Half the delay plus a random share of the other half
fn jitter(delay: Duration) -> Duration {
    let half = delay / 2;
    let spread = half.as_millis() as u64;
    let extra = if spread == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=spread)
    };
    half + Duration::from_millis(extra)
}

fn decode<T: DeserializeOwned>(operation: &str, response: &ApiResponse) -> Outcome<T> {
    match response.json::<T>() {
        Ok(body) => Outcome::Done(body),
        Err(e) => Outcome::Failed(
            Diagnostic::error(format!(
                "Error when calling `{}`: unexpected response body",
                operation
            ))
            .with_detail(format!(
                "{}\nResponse body:\n{}",
                e,
                truncate(&response.body)
            ))
            .into(),
        ),
    }
}

fn cancelled<T>(operation: &str) -> Outcome<T> {
    Outcome::Failed(cancelled_diagnostic(operation).into())
}

pub fn cancelled_diagnostic(operation: &str) -> Diagnostic {
    Diagnostic::warning("Operation cancelled")
        .with_detail(format!("`{}` was cancelled before it completed.", operation))
        .interrupting()
}

/// The operation deadline passed while a call was still in flight
pub fn deadline_diagnostic(operation: &str, ctx: &OperationContext, attempt: u32) -> Diagnostic {
    Diagnostic::error("Operation timed out").with_detail(format!(
        "`{}` was still in flight on attempt {} when the operation timeout of {}s ran out.",
        operation,
        attempt,
        ctx.timeout().as_secs()
    ))
}

pub fn transport_diagnostic(operation: &str, error: &TransportError) -> Diagnostic {
    Diagnostic::error(format!("Error when calling `{}`: {}", operation, error))
}

/// Default mapping of a failed response
pub fn default_diagnostic(
    operation: &str,
    response: &ApiResponse,
    error: Option<&PlatformError>,
) -> Diagnostic {
    match error {
        Some(e) => Diagnostic::error(format!("Error when calling `{}`: {}", operation, e.message()))
            .with_detail(e.render()),
        None => Diagnostic::error(format!(
            "Error when calling `{}`: unexpected response (HTTP {})",
            operation, response.status
        ))
        .with_detail(format!("Response body:\n{}", truncate(&response.body))),
    }
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_BODY_IN_DETAIL {
        return body.to_string();
    }
    let mut end = MAX_BODY_IN_DETAIL;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} bytes truncated)", &body[..end], body.len() - end)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde_json::json;

    use super::*;

    fn error_body(code: &str, message: &str) -> String {
        json!({"id": "err-1", "code": code, "message": message}).to_string()
    }

    fn counted<F>(
        counter: &Arc<AtomicU32>,
        respond: F,
    ) -> impl FnMut() -> std::future::Ready<Result<ApiResponse, TransportError>>
    where
        F: Fn(u32) -> Result<ApiResponse, TransportError>,
    {
        let counter = counter.clone();
        move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(respond(n))
        }
    }

    fn ctx(secs: u64) -> OperationContext {
        OperationContext::with_timeout(Duration::from_secs(secs))
    }

    #[tokio::test(start_paused = true)]
    async fn success_decodes_body() {
        let calls = Arc::new(AtomicU32::new(0));
        let outcome: Outcome<serde_json::Value> = execute(
            &ctx(60),
            counted(&calls, |_| Ok(ApiResponse::new(200, r#"{"id": "e1"}"#))),
            "ReadOneEnvironment",
            &defer,
            &RetryPolicy::transient_only(),
        )
        .await;

        assert_eq!(outcome, Outcome::Done(json!({"id": "e1"})));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_status_is_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let outcome: Outcome<serde_json::Value> = execute(
            &ctx(60),
            counted(&calls, |n| {
                if n < 3 {
                    Ok(ApiResponse::new(503, "unavailable"))
                } else {
                    Ok(ApiResponse::new(200, "{}"))
                }
            }),
            "ReadOneEnvironment",
            &defer,
            &RetryPolicy::transient_only(),
        )
        .await;

        assert!(outcome.is_done());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_transport_error_is_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let outcome: Outcome<serde_json::Value> = execute(
            &ctx(60),
            counted(&calls, |n| {
                if n == 1 {
                    Err(TransportError::Connect("connection reset".to_string()))
                } else {
                    Ok(ApiResponse::new(200, "{}"))
                }
            }),
            "ReadOneEnvironment",
            &defer,
            &RetryPolicy::transient_only(),
        )
        .await;

        assert!(outcome.is_done());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_transport_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let outcome: Outcome<serde_json::Value> = execute(
            &ctx(60),
            counted(&calls, |_| Err(TransportError::Request("bad url".to_string()))),
            "ReadOneEnvironment",
            &defer,
            &RetryPolicy::transient_only(),
        )
        .await;

        let (body, diags) = outcome.into_parts();
        assert!(body.is_none());
        assert!(diags.has_error());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_budget_is_bounded_by_deadline() {
        let calls = Arc::new(AtomicU32::new(0));
        let context = ctx(60);
        let policy = RetryPolicy::transient_only().with_max_attempts(1000);

        let outcome: Outcome<serde_json::Value> = execute(
            &context,
            counted(&calls, |_| Err(TransportError::Timeout)),
            "ReadOneEnvironment",
            &defer,
            &policy,
        )
        .await;

        let (_, diags) = outcome.into_parts();
        assert!(diags.contains_summary("Operation timed out"));
        assert!(context.elapsed() <= Duration::from_secs(60) + policy.backoff.max);
        let attempts = calls.load(Ordering::SeqCst);
        assert!(attempts > 1 && attempts < 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_budget_ends_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let outcome: Outcome<serde_json::Value> = execute(
            &ctx(600),
            counted(&calls, |_| Ok(ApiResponse::new(502, "bad gateway"))),
            "ReadOneEnvironment",
            &defer,
            &RetryPolicy::transient_only().with_max_attempts(3),
        )
        .await;

        let (_, diags) = outcome.into_parts();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let diagnostic = diags.iter().next().unwrap();
        assert!(diagnostic.summary.contains("HTTP 502"));
        assert!(diagnostic.detail.as_ref().unwrap().contains("bad gateway"));
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_after_budget_is_absent() {
        let calls = Arc::new(AtomicU32::new(0));
        let outcome: Outcome<serde_json::Value> = execute(
            &ctx(600),
            counted(&calls, |_| {
                Ok(ApiResponse::new(404, error_body("NOT_FOUND", "Unable to find environment")))
            }),
            "ReadOneEnvironment",
            &not_found_warning,
            &RetryPolicy::environment().with_max_attempts(3),
        )
        .await;

        match outcome {
            Outcome::Absent(diags) => {
                assert!(!diags.has_error());
                assert!(diags.contains_summary("Requested resource not found"));
            }
            other => panic!("expected Absent, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permission_propagation_is_retried_for_environments() {
        let calls = Arc::new(AtomicU32::new(0));
        let outcome: Outcome<serde_json::Value> = execute(
            &ctx(600),
            counted(&calls, |n| {
                if n == 1 {
                    Ok(ApiResponse::new(
                        403,
                        error_body(
                            "ACCESS_FAILED",
                            "The request could not be completed. You do not have access to this resource.",
                        ),
                    ))
                } else {
                    Ok(ApiResponse::new(200, "{}"))
                }
            }),
            "ReadOneEnvironment",
            &defer,
            &RetryPolicy::environment(),
        )
        .await;

        assert!(outcome.is_done());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn classifier_failure_short_circuits_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let classify = |_: &ApiResponse, _: Option<&PlatformError>| {
            Classified::Fail(Diagnostic::error("stop").into())
        };
        let outcome: Outcome<serde_json::Value> = execute(
            &ctx(600),
            counted(&calls, |_| Ok(ApiResponse::new(503, "unavailable"))),
            "CreateEnvironmentActiveLicense",
            &classify,
            &RetryPolicy::environment(),
        )
        .await;

        assert_eq!(outcome, Outcome::Failed(Diagnostic::error("stop").into()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn classified_platform_error_uses_default_format() {
        let calls = Arc::new(AtomicU32::new(0));
        let outcome: Outcome<serde_json::Value> = execute(
            &ctx(600),
            counted(&calls, |_| {
                Ok(ApiResponse::new(400, error_body("INVALID_DATA", "Name is invalid")))
            }),
            "UpdateEnvironment",
            &defer,
            &RetryPolicy::environment(),
        )
        .await;

        let (_, diags) = outcome.into_parts();
        let diagnostic = diags.iter().next().unwrap();
        assert_eq!(
            diagnostic.summary,
            "Error when calling `UpdateEnvironment`: Name is invalid"
        );
        assert!(diagnostic.detail.as_ref().unwrap().starts_with("PingOne Error Details:"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn environment_policy_has_the_larger_budget() {
        assert_eq!(RetryPolicy::environment().max_attempts, ENVIRONMENT_MAX_ATTEMPTS);
        assert!(RetryPolicy::create_read().max_attempts < ENVIRONMENT_MAX_ATTEMPTS);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_interrupts_a_call_in_flight() {
        let context = ctx(60);
        let outcome: Outcome<serde_json::Value> = execute(
            &context,
            || async {
                tokio::time::sleep(Duration::from_secs(300)).await;
                Ok(ApiResponse::new(200, "{}"))
            },
            "ReadOneEnvironment",
            &defer,
            &RetryPolicy::transient_only(),
        )
        .await;

        let (body, diags) = outcome.into_parts();
        assert!(body.is_none());
        assert!(diags.has_error());
        assert!(diags.contains_summary("Operation timed out"));
        assert!(context.elapsed() >= Duration::from_secs(60));
        assert!(context.elapsed() < Duration::from_secs(61));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_further_calls() {
        let calls = Arc::new(AtomicU32::new(0));
        let (context, handle) = OperationContext::new(Duration::from_secs(600));

        let task = {
            let calls = calls.clone();
            let context = context.clone();
            tokio::spawn(async move {
                execute::<serde_json::Value, _, _>(
                    &context,
                    counted(&calls, |_| Ok(ApiResponse::new(503, "unavailable"))),
                    "ReadOneEnvironment",
                    &defer,
                    &RetryPolicy::transient_only().with_max_attempts(100),
                )
                .await
            })
        };

        while calls.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        handle.cancel();
        let outcome = task.await.unwrap();
        let seen = calls.load(Ordering::SeqCst);

        let (_, diags) = outcome.into_parts();
        assert!(diags.contains_summary("Operation cancelled"));
        assert!(!diags.has_error());
        assert!(diags.is_interrupted());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(calls.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn non_json_success_body_is_reported() {
        let calls = Arc::new(AtomicU32::new(0));
        let outcome: Outcome<serde_json::Value> = execute(
            &ctx(60),
            counted(&calls, |_| Ok(ApiResponse::new(200, "<html>oops</html>"))),
            "ReadOneEnvironment",
            &defer,
            &RetryPolicy::transient_only(),
        )
        .await;

        let (_, diags) = outcome.into_parts();
        let diagnostic = diags.iter().next().unwrap();
        assert!(diagnostic.detail.as_ref().unwrap().contains("<html>oops</html>"));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(MAX_BODY_IN_DETAIL * 2);
        let out = truncate(&body);
        assert!(out.len() < body.len());
        assert!(out.ends_with("(1024 bytes truncated)"));
    }

    #[test]
    fn region_mismatch_names_regions() {
        let error: PlatformError = serde_json::from_value(json!({
            "code": "INVALID_DATA",
            "message": "The request could not be completed.",
            "details": [{"code": "INVALID_VALUE", "target": "region",
                         "innerError": {"allowedValues": ["NA"]}}]
        }))
        .unwrap();
        let classify = environment_create(RegionTable::builtin(), "Canada".to_string());

        match classify(&ApiResponse::new(400, ""), Some(&error)) {
            Classified::Fail(diags) => assert!(diags.contains_summary(
                "Incompatible environment region for the organization tenant. Expecting regions [NorthAmerica], region provided: Canada"
            )),
            other => panic!("expected Fail, got {:?}", other),
        }
    }

    #[test]
    fn unknown_allowed_region_is_a_programming_error() {
        let diagnostic = region_mismatch(RegionTable::builtin(), &["ZZ".to_string()], "Canada");
        assert_eq!(diagnostic.summary, "Unexpected region code");
    }

    #[test]
    fn feature_flag_message_is_readable() {
        let error = PlatformError {
            code: Some("INVALID_DATA".to_string()),
            message: Some("Organization does not have Ping One DaVinci FF enabled".to_string()),
            ..Default::default()
        };
        let diagnostic = feature_not_enabled(&error).unwrap();
        assert_eq!(
            diagnostic.summary,
            "The Ping One DaVinci service is not enabled in this organization tenant."
        );
    }

    #[test]
    fn invalid_value_targets_attribute() {
        let error: PlatformError = serde_json::from_value(json!({
            "code": "INVALID_DATA",
            "message": "bad",
            "details": [{"code": "INVALID_VALUE", "target": "name", "message": "Name already in use"}]
        }))
        .unwrap();
        let classify = invalid_value("name");
        match classify(&ApiResponse::new(400, ""), Some(&error)) {
            Classified::Fail(diags) => {
                let d = diags.iter().next().unwrap();
                assert_eq!(d.attribute.as_deref(), Some("name"));
            }
            other => panic!("expected Fail, got {:?}", other),
        }
    }
}
