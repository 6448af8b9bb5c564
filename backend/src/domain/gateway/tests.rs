//! Pipeline behaviour of `GatewayClient::execute`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rstest::{fixture, rstest};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::*;
use crate::domain::Identity;
use crate::domain::api_result::FailureKind;
use crate::domain::envelope::INVALID_DATA_PAYLOAD;
use crate::domain::ports::{
    FixtureUpstreamTransport, MockUpstreamTransport, RateLimitStore, UpstreamResponse,
};
use crate::domain::rate_limit::EvictionPolicy;
use crate::domain::schema::{AnyJson, JsonSchema, NoBody, SchemaExt};
use crate::test_support::MutableClock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Project {
    id: u32,
    name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct NewProject {
    name: String,
}

#[fixture]
fn clock() -> Arc<MutableClock> {
    let start: DateTime<Utc> = Utc
        .with_ymd_and_hms(2026, 1, 20, 8, 30, 0)
        .single()
        .expect("valid fixture time");
    Arc::new(MutableClock::new(start))
}

fn client_with(transport: impl UpstreamTransport + 'static, clock: Arc<MutableClock>) -> GatewayClient {
    let limiter = RateLimiter::in_memory(EvictionPolicy::default(), clock);
    GatewayClient::new(Arc::new(transport), limiter)
}

fn identity() -> Identity {
    Identity::new("user-1").expect("fixture identity")
}

fn project_envelope(status: u16) -> UpstreamResponse {
    UpstreamResponse::json(
        status,
        &json!({ "success": true, "message": "ok", "data": { "id": 3, "name": "Apollo" } }),
    )
}

#[rstest]
#[tokio::test]
async fn success_returns_typed_payload(clock: Arc<MutableClock>) {
    let mut transport = MockUpstreamTransport::new();
    transport
        .expect_send()
        .times(1)
        .returning(|_| Ok(project_envelope(200)));
    let client = client_with(transport, clock);

    let result = client
        .execute(
            GatewayCall::new(identity(), GatewayRequest::get("/projects/3")),
            &NoBody,
            &JsonSchema::<Project>::new(),
        )
        .await
        .expect("no fatal error");

    assert_eq!(
        result.data(),
        Some(&Project {
            id: 3,
            name: "Apollo".to_owned()
        })
    );
    assert_eq!(result.message(), Some("ok"));
}

#[rstest]
#[tokio::test]
async fn empty_success_envelope_satisfies_no_body_payload(clock: Arc<MutableClock>) {
    let client = client_with(FixtureUpstreamTransport, clock);

    let result = client
        .execute(
            GatewayCall::new(identity(), GatewayRequest::delete("/projects/3")),
            &NoBody,
            &NoBody,
        )
        .await
        .expect("no fatal error");

    assert!(result.is_ok());
    assert_eq!(result.status(), 200);
    assert_eq!(result.data(), Some(&()));
}

#[rstest]
#[tokio::test]
async fn second_call_inside_window_is_rate_limited_without_dispatch(clock: Arc<MutableClock>) {
    let mut transport = MockUpstreamTransport::new();
    transport
        .expect_send()
        .times(1)
        .returning(|_| Ok(project_envelope(200)));
    let client = client_with(transport, clock.clone());
    let call = || {
        GatewayCall::new(identity(), GatewayRequest::get("/projects/3"))
            .with_policy(RateLimitPolicy::from_millis(500))
    };

    let first = client
        .execute(call(), &NoBody, &AnyJson)
        .await
        .expect("first call");
    assert!(first.is_ok());

    clock.advance(Duration::from_millis(200));
    let second = client
        .execute(call(), &NoBody, &AnyJson)
        .await
        .expect("second call");
    let failure = second.failure().expect("rate limited");
    assert_eq!(failure.status(), 429);
    assert_eq!(failure.message(), "too many requests");
    assert_eq!(
        failure.kind(),
        &FailureKind::RateLimited {
            retry_after: Duration::from_millis(300)
        }
    );
}

#[rstest]
#[tokio::test]
async fn invalid_input_is_rejected_locally(clock: Arc<MutableClock>) {
    let mut transport = MockUpstreamTransport::new();
    transport.expect_send().times(0);
    let client = client_with(transport, clock);
    let schema = JsonSchema::<NewProject>::new().refine(
        "$.name",
        "name must not be blank",
        |project: &NewProject| !project.name.trim().is_empty(),
    );

    let result = client
        .execute(
            GatewayCall::new(identity(), GatewayRequest::post("/projects", json!({ "name": " " }))),
            &schema,
            &AnyJson,
        )
        .await
        .expect("no fatal error");

    let failure = result.failure().expect("validation failure");
    assert_eq!(failure.status(), 400);
    assert_eq!(failure.message(), "invalid data");
    let issues = failure.validation_error().expect("validation detail").issues();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues.first().map(|issue| issue.path.as_str()), Some("$.name"));
}

#[rstest]
#[tokio::test]
async fn validated_input_is_what_gets_sent(clock: Arc<MutableClock>) {
    let mut transport = MockUpstreamTransport::new();
    transport
        .expect_send()
        .withf(|request| {
            request.body == Some(json!({ "name": "Apollo" }))
                && request.path == "/projects"
                && request.method == crate::domain::ports::HttpMethod::Post
                && request
                    .headers
                    .iter()
                    .any(|(name, value)| name == "Authorization" && value == "Bearer t0k")
        })
        .times(1)
        .returning(|_| Ok(project_envelope(201)));
    let client = client_with(transport, clock);

    let result = client
        .execute(
            GatewayCall::new(
                identity(),
                GatewayRequest::post("/projects", json!({ "name": "Apollo", "extra": true }))
                    .with_bearer("t0k"),
            ),
            &JsonSchema::<NewProject>::new(),
            &JsonSchema::<Project>::new(),
        )
        .await
        .expect("no fatal error");

    assert_eq!(result.status(), 201);
}

#[rstest]
#[tokio::test]
async fn requests_without_body_send_none(clock: Arc<MutableClock>) {
    let mut transport = MockUpstreamTransport::new();
    transport
        .expect_send()
        .withf(|request| request.body.is_none())
        .times(1)
        .returning(|_| Ok(project_envelope(200)));
    let client = client_with(transport, clock);

    let result = client
        .execute(
            GatewayCall::new(identity(), GatewayRequest::delete("/projects/3")),
            &NoBody,
            &AnyJson,
        )
        .await
        .expect("no fatal error");
    assert!(result.is_ok());
}

#[rstest]
#[tokio::test]
async fn backend_error_envelope_is_surfaced(clock: Arc<MutableClock>) {
    let mut transport = MockUpstreamTransport::new();
    transport.expect_send().returning(|_| {
        Ok(UpstreamResponse::json(
            404,
            &json!({
                "success": false,
                "message": "Not found",
                "error": "NOT_FOUND",
                "details": []
            }),
        ))
    });
    let client = client_with(transport, clock);

    let result = client
        .execute(
            GatewayCall::new(identity(), GatewayRequest::get("/projects/404")),
            &NoBody,
            &JsonSchema::<Project>::new(),
        )
        .await
        .expect("no fatal error");

    let failure = result.failure().expect("backend failure");
    assert_eq!(failure.status(), 404);
    assert_eq!(failure.message(), "Not found");
    assert_eq!(failure.backend_error(), Some("NOT_FOUND"));
    assert_eq!(failure.details(), Some(&[][..]));
    assert!(failure.validation_error().is_none());
}

#[rstest]
#[tokio::test]
async fn payload_mismatch_is_a_validation_failure(clock: Arc<MutableClock>) {
    let mut transport = MockUpstreamTransport::new();
    transport.expect_send().returning(|_| {
        Ok(UpstreamResponse::json(
            200,
            &json!({ "success": true, "message": "ok", "data": { "id": "three" } }),
        ))
    });
    let client = client_with(transport, clock);

    let result = client
        .execute(
            GatewayCall::new(identity(), GatewayRequest::get("/projects/3")),
            &NoBody,
            &JsonSchema::<Project>::new(),
        )
        .await
        .expect("no fatal error");

    let failure = result.failure().expect("validation failure");
    assert_eq!(failure.status(), 200);
    assert_eq!(failure.message(), INVALID_DATA_PAYLOAD);
    assert!(failure.validation_error().is_some());
}

#[rstest]
#[tokio::test]
async fn transport_failure_is_fatal(clock: Arc<MutableClock>) {
    let mut transport = MockUpstreamTransport::new();
    transport
        .expect_send()
        .returning(|_| Err(UpstreamTransportError::transport("connection refused")));
    let client = client_with(transport, clock);

    let outcome = client
        .execute::<(), Value, _, _>(
            GatewayCall::new(identity(), GatewayRequest::get("/projects")),
            &NoBody,
            &AnyJson,
        )
        .await;

    assert_eq!(
        outcome,
        Err(GatewayError::Transport(UpstreamTransportError::transport(
            "connection refused"
        )))
    );
}

struct SlowTransport {
    delay: Duration,
    completed: Arc<AtomicUsize>,
}

#[async_trait]
impl UpstreamTransport for SlowTransport {
    async fn send(
        &self,
        _request: UpstreamRequest,
    ) -> Result<UpstreamResponse, UpstreamTransportError> {
        tokio::time::sleep(self.delay).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(project_envelope(200))
    }
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn slow_upstream_times_out_with_408(clock: Arc<MutableClock>) {
    let completed = Arc::new(AtomicUsize::new(0));
    let client = client_with(
        SlowTransport {
            delay: Duration::from_secs(30),
            completed: Arc::clone(&completed),
        },
        clock,
    );
    let started = tokio::time::Instant::now();

    let result = client
        .execute(
            GatewayCall::new(identity(), GatewayRequest::get("/slow"))
                .with_timeout(Duration::from_millis(250)),
            &NoBody,
            &AnyJson,
        )
        .await
        .expect("no fatal error");

    let failure = result.failure().expect("timeout failure");
    assert_eq!(failure.status(), 408);
    assert_eq!(failure.message(), "request timed out");
    assert_eq!(failure.kind(), &FailureKind::Timeout);
    assert!(started.elapsed() < Duration::from_millis(300));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(
        completed.load(Ordering::SeqCst),
        1,
        "the detached dispatch still completes"
    );
}

struct PanickingTransport;

#[async_trait]
impl UpstreamTransport for PanickingTransport {
    async fn send(
        &self,
        _request: UpstreamRequest,
    ) -> Result<UpstreamResponse, UpstreamTransportError> {
        panic!("transport bug");
    }
}

#[rstest]
#[tokio::test]
async fn panicking_dispatch_is_fatal(clock: Arc<MutableClock>) {
    let client = client_with(PanickingTransport, clock);

    let outcome = client
        .execute::<(), Value, _, _>(
            GatewayCall::new(identity(), GatewayRequest::get("/boom")),
            &NoBody,
            &AnyJson,
        )
        .await;

    assert_eq!(
        outcome,
        Err(GatewayError::DispatchPanicked {
            message: "transport bug".to_owned()
        })
    );
}

struct UnavailableStore;

impl RateLimitStore for UnavailableStore {
    fn try_admit(
        &self,
        _identity: &Identity,
        _policy: &RateLimitPolicy,
        _now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, RateLimitStoreError> {
        Err(RateLimitStoreError::state_unavailable("poisoned"))
    }

    fn sweep(&self, _now: DateTime<Utc>) -> Result<usize, RateLimitStoreError> {
        Err(RateLimitStoreError::state_unavailable("poisoned"))
    }

    fn tracked_identities(&self) -> Result<usize, RateLimitStoreError> {
        Err(RateLimitStoreError::state_unavailable("poisoned"))
    }
}

#[rstest]
#[tokio::test]
async fn unavailable_rate_limit_state_is_fatal(clock: Arc<MutableClock>) {
    let mut transport = MockUpstreamTransport::new();
    transport.expect_send().times(0);
    let client = GatewayClient::new(
        Arc::new(transport),
        RateLimiter::with_store(Arc::new(UnavailableStore), clock),
    );

    let outcome = client
        .execute::<(), Value, _, _>(
            GatewayCall::new(identity(), GatewayRequest::get("/projects")),
            &NoBody,
            &AnyJson,
        )
        .await;

    assert!(matches!(outcome, Err(GatewayError::StateUnavailable(_))));
}

#[rstest]
#[tokio::test]
async fn cached_execution_dispatches_once_per_scope(clock: Arc<MutableClock>) {
    let mut transport = MockUpstreamTransport::new();
    transport
        .expect_send()
        .times(2)
        .returning(|_| Ok(project_envelope(200)));
    let client = client_with(transport, clock).with_defaults(GatewayDefaults {
        rate_limit: RateLimitPolicy::from_millis(1_000).with_max_per_interval(10),
        timeout: DEFAULT_TIMEOUT,
    });
    let call = || GatewayCall::new(identity(), GatewayRequest::get("/projects/3"));
    let schema = JsonSchema::<Project>::new();

    let (first, second) = RequestCache::scope(async {
        let first = client.execute_cached(call(), &NoBody, &schema).await;
        let second = client.execute_cached(call(), &NoBody, &schema).await;
        (first, second)
    })
    .await;
    assert_eq!(first, second);

    let outside = client
        .execute_cached(call(), &NoBody, &schema)
        .await
        .expect("no fatal error");
    assert!(outside.is_ok(), "outside a scope the call is dispatched again");
}

#[rstest]
#[tokio::test]
async fn cached_execution_keys_on_authorization(clock: Arc<MutableClock>) {
    let mut transport = MockUpstreamTransport::new();
    transport.expect_send().times(2).returning(|request| {
        let bearer = request
            .headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("authorization"))
            .map(|(_, value)| value.clone())
            .unwrap_or_default();
        Ok(UpstreamResponse::json(
            200,
            &json!({ "success": true, "message": "ok", "data": { "id": 1, "name": bearer } }),
        ))
    });
    let client = client_with(transport, clock).with_defaults(GatewayDefaults {
        rate_limit: RateLimitPolicy::from_millis(1_000).with_max_per_interval(10),
        timeout: DEFAULT_TIMEOUT,
    });
    let call = |token: &str| {
        GatewayCall::new(identity(), GatewayRequest::get("/me").with_bearer(token))
    };
    let schema = JsonSchema::<Project>::new();

    let (alice, bob) = RequestCache::scope(async {
        let alice = client.execute_cached(call("alice"), &NoBody, &schema).await;
        let bob = client.execute_cached(call("bob"), &NoBody, &schema).await;
        (alice, bob)
    })
    .await;

    let name = |outcome: Result<ApiResult<Project>, GatewayError>| {
        outcome
            .expect("no fatal error")
            .data()
            .map(|project| project.name.clone())
    };
    assert_eq!(name(alice).as_deref(), Some("Bearer alice"));
    assert_eq!(name(bob).as_deref(), Some("Bearer bob"));
}

#[rstest]
fn cache_key_ignores_header_order_and_case() {
    let first = GatewayCall::new(
        identity(),
        GatewayRequest::get("/me")
            .with_header("X-Tenant", "t1")
            .with_header("Authorization", "Bearer a"),
    );
    let second = GatewayCall::new(
        identity(),
        GatewayRequest::get("/me")
            .with_header("authorization", "Bearer a")
            .with_header("x-tenant", "t1"),
    );
    assert_eq!(cache_key(&first), cache_key(&second));
}
