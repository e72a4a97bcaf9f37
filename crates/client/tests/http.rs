// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Integration tests for the Meridian HTTP client using a mock Axum server.

use std::{
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use axum::{
    Router,
    extract::{RawQuery, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
};
use meridian_client::{
    config::{MeridianClientConfig, TokenConfig},
    http::{HttpRequest, MeridianHttpClient, MeridianHttpError},
};
use reqwest::Method;
use rstest::rstest;
use serde_json::{Value, json};
use url::Url;

#[derive(Clone)]
struct TestServerState {
    base_url: String,
    discovery_hits: Arc<AtomicUsize>,
    auth_hits: Arc<AtomicUsize>,
    thing_hits: Arc<AtomicUsize>,
    guarded_hits: Arc<AtomicUsize>,
    unstable_hits: Arc<AtomicUsize>,
    forbidden_hits: Arc<AtomicUsize>,
    first_token_expires_immediately: Arc<AtomicBool>,
    last_query: Arc<Mutex<Option<String>>>,
}

impl TestServerState {
    fn new(base_url: String) -> Self {
        Self {
            base_url,
            discovery_hits: Arc::new(AtomicUsize::new(0)),
            auth_hits: Arc::new(AtomicUsize::new(0)),
            thing_hits: Arc::new(AtomicUsize::new(0)),
            guarded_hits: Arc::new(AtomicUsize::new(0)),
            unstable_hits: Arc::new(AtomicUsize::new(0)),
            forbidden_hits: Arc::new(AtomicUsize::new(0)),
            first_token_expires_immediately: Arc::new(AtomicBool::new(false)),
            last_query: Arc::new(Mutex::new(None)),
        }
    }
}

async fn handle_discovery(State(state): State<TestServerState>) -> Json<Value> {
    state.discovery_hits.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "graph": {
            "endpoint": format!("{}/api/graph/7", state.base_url),
            "version": "7"
        },
        "query": {
            "endpoint": format!("{}/api/query/2", state.base_url),
            "version": "2"
        }
    }))
}

async fn handle_auth(
    State(state): State<TestServerState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    assert!(body.get("username").is_some());
    assert!(body.get("password").is_some());

    let count = state.auth_hits.fetch_add(1, Ordering::SeqCst) + 1;
    let expires_in =
        if count == 1 && state.first_token_expires_immediately.load(Ordering::SeqCst) {
            0
        } else {
            3_600
        };

    (
        StatusCode::OK,
        Json(json!({"token": format!("token-{count}"), "expires_in": expires_in})),
    )
}

async fn handle_thing(
    State(state): State<TestServerState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> (StatusCode, Json<Value>) {
    state.thing_hits.fetch_add(1, Ordering::SeqCst);
    *state.last_query.lock().unwrap() = query;

    let authorized = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("Bearer "));

    if authorized {
        (StatusCode::OK, Json(json!({"ok": true})))
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({"error": "no token"})))
    }
}

async fn handle_guarded(
    State(state): State<TestServerState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.guarded_hits.fetch_add(1, Ordering::SeqCst);

    let authorized = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == "Bearer token-2");

    if authorized {
        (StatusCode::OK, Json(json!({"ok": true})))
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({"error": "stale token"})))
    }
}

async fn handle_unstable(State(state): State<TestServerState>) -> (StatusCode, Json<Value>) {
    state.unstable_hits.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({"error": "unavailable"})),
    )
}

async fn handle_forbidden(State(state): State<TestServerState>) -> (StatusCode, Json<Value>) {
    state.forbidden_hits.fetch_add(1, Ordering::SeqCst);
    (StatusCode::FORBIDDEN, Json(json!({"error": "forbidden"})))
}

fn create_router(state: TestServerState) -> Router {
    Router::new()
        .route("/api/version", get(handle_discovery))
        .route("/api/auth/token", post(handle_auth))
        .route("/api/graph/7/thing", get(handle_thing))
        .route("/api/query/2/thing", get(handle_thing))
        .route("/api/graph/7/guarded", get(handle_guarded))
        .route("/api/graph/7/unstable", get(handle_unstable))
        .route("/api/graph/7/forbidden", get(handle_forbidden))
        .with_state(state)
}

fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

async fn start_test_server() -> (SocketAddr, TestServerState) {
    init_test_tracing();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = TestServerState::new(format!("http://{addr}"));
    let router = create_router(state.clone());

    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .await
            .unwrap();
    });

    (addr, state)
}

fn fixed_config(addr: SocketAddr) -> MeridianClientConfig {
    MeridianClientConfig {
        retry_delay_initial_ms: Some(10),
        retry_delay_max_ms: Some(50),
        ..MeridianClientConfig::new(
            format!("http://{addr}"),
            "graph",
            TokenConfig::Fixed("fixed-token".to_string()),
        )
    }
}

fn credentials_config(addr: SocketAddr) -> MeridianClientConfig {
    MeridianClientConfig {
        token: TokenConfig::Credentials {
            username: "svc".to_string(),
            password: "secret".to_string(),
            auth_url: None,
        },
        ..fixed_config(addr)
    }
}

#[rstest]
#[tokio::test]
async fn test_discovery_resolves_and_caches() {
    let (addr, state) = start_test_server().await;
    let client = MeridianHttpClient::new(fixed_config(addr)).unwrap();

    let first = client.execute(HttpRequest::get("/thing")).await.unwrap();
    let second = client.execute(HttpRequest::get("/thing")).await.unwrap();

    assert_eq!(first.status.as_u16(), 200);
    assert_eq!(second.status.as_u16(), 200);

    // Repeated resolution returns the identical URI without a second fetch.
    let resolved = client.resolver().resolve("graph").await.unwrap();
    assert_eq!(resolved.as_str(), format!("http://{addr}/api/graph/7"));
    assert_eq!(state.discovery_hits.load(Ordering::SeqCst), 1);
}

#[rstest]
#[tokio::test]
async fn test_unknown_api_after_successful_discovery() {
    let (addr, state) = start_test_server().await;
    let client = MeridianHttpClient::new(fixed_config(addr)).unwrap();

    let result = client.resolver().resolve("missing").await;

    assert!(
        matches!(result, Err(MeridianHttpError::UnknownApi { name }) if name == "missing")
    );
    assert_eq!(state.discovery_hits.load(Ordering::SeqCst), 1);
}

#[rstest]
#[tokio::test]
async fn test_discovery_failure_is_not_cached() {
    // Nothing is listening on this address.
    let config = MeridianClientConfig {
        http_timeout_secs: Some(1),
        max_retries: Some(0),
        ..MeridianClientConfig::new(
            "http://127.0.0.1:1",
            "graph",
            TokenConfig::Fixed("fixed-token".to_string()),
        )
    };
    let client = MeridianHttpClient::new(config).unwrap();

    let first = client.resolver().resolve("graph").await;
    let second = client.resolver().resolve("graph").await;

    // Both lookups retried the fetch and surfaced the discovery failure.
    assert!(matches!(first, Err(MeridianHttpError::Discovery { .. })));
    assert!(matches!(second, Err(MeridianHttpError::Discovery { .. })));
}

#[rstest]
#[tokio::test]
async fn test_override_bypasses_discovery() {
    let (addr, state) = start_test_server().await;
    let config = MeridianClientConfig {
        endpoint_override: Some(format!("http://{addr}/api/graph/7")),
        ..fixed_config(addr)
    };
    let client = MeridianHttpClient::new(config).unwrap();

    let response = client.execute(HttpRequest::get("/thing")).await.unwrap();

    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(state.discovery_hits.load(Ordering::SeqCst), 0);
}

#[rstest]
#[tokio::test]
async fn test_full_uri_target_bypasses_resolution() {
    let (addr, state) = start_test_server().await;
    let client = MeridianHttpClient::new(fixed_config(addr)).unwrap();

    let url = Url::parse(&format!("http://{addr}/api/graph/7/thing")).unwrap();
    let response = client
        .execute(HttpRequest::with_url(Method::GET, url))
        .await
        .unwrap();

    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(state.discovery_hits.load(Ordering::SeqCst), 0);
}

#[rstest]
#[tokio::test]
async fn test_shared_resolver_performs_single_fetch() {
    let (addr, state) = start_test_server().await;
    let primary = MeridianHttpClient::new(fixed_config(addr)).unwrap();
    let secondary_config = MeridianClientConfig {
        api_name: "query".to_string(),
        ..fixed_config(addr)
    };
    let secondary = MeridianHttpClient::bound_to(secondary_config, &primary).unwrap();

    let first = primary.execute(HttpRequest::get("/thing")).await.unwrap();
    let second = secondary.execute(HttpRequest::get("/thing")).await.unwrap();

    assert_eq!(first.status.as_u16(), 200);
    assert_eq!(second.status.as_u16(), 200);
    assert_eq!(state.discovery_hits.load(Ordering::SeqCst), 1);
}

#[rstest]
#[tokio::test]
async fn test_reactive_refresh_on_unauthorized() {
    let (addr, state) = start_test_server().await;
    let client = MeridianHttpClient::new(credentials_config(addr)).unwrap();

    // The guarded route accepts only the second issued token: the first
    // dispatch sees 401, one reactive refresh follows, the retry succeeds.
    let response = client.execute(HttpRequest::get("/guarded")).await.unwrap();

    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(state.guarded_hits.load(Ordering::SeqCst), 2);
    assert_eq!(state.auth_hits.load(Ordering::SeqCst), 2);
}

#[rstest]
#[tokio::test]
async fn test_unauthorized_with_fixed_token_surfaces_original_status() {
    let (addr, state) = start_test_server().await;
    let client = MeridianHttpClient::new(fixed_config(addr)).unwrap();

    let result = client.execute(HttpRequest::get("/guarded")).await;

    // The provider cannot refresh, so the 401 surfaces unchanged after a
    // single dispatch.
    assert!(matches!(
        result,
        Err(MeridianHttpError::UnexpectedStatus { status: 401, .. })
    ));
    assert_eq!(state.guarded_hits.load(Ordering::SeqCst), 1);
}

#[rstest]
#[tokio::test]
async fn test_transport_retries_exhausted() {
    let (addr, state) = start_test_server().await;
    let config = MeridianClientConfig {
        max_retries: Some(2),
        ..fixed_config(addr)
    };
    let client = MeridianHttpClient::new(config).unwrap();

    let result = client.execute(HttpRequest::get("/unstable")).await;

    // Initial attempt plus two retries, no auth traffic.
    assert!(matches!(result, Err(MeridianHttpError::Transport(_))));
    assert_eq!(state.unstable_hits.load(Ordering::SeqCst), 3);
    assert_eq!(state.auth_hits.load(Ordering::SeqCst), 0);
}

#[rstest]
#[tokio::test]
async fn test_terminal_status_not_retried() {
    let (addr, state) = start_test_server().await;
    let client = MeridianHttpClient::new(fixed_config(addr)).unwrap();

    let result = client.execute(HttpRequest::get("/forbidden")).await;

    assert!(matches!(
        result,
        Err(MeridianHttpError::UnexpectedStatus { status: 403, .. })
    ));
    assert_eq!(state.forbidden_hits.load(Ordering::SeqCst), 1);
}

#[rstest]
#[tokio::test]
async fn test_proactive_refresh_at_expiry() {
    let (addr, state) = start_test_server().await;
    state
        .first_token_expires_immediately
        .store(true, Ordering::SeqCst);
    let client = MeridianHttpClient::new(credentials_config(addr)).unwrap();

    // The first request acquires a token that is already expired; the second
    // request refreshes exactly once before its dispatch.
    let first = client.execute(HttpRequest::get("/thing")).await.unwrap();
    assert_eq!(first.status.as_u16(), 200);
    assert_eq!(state.auth_hits.load(Ordering::SeqCst), 1);

    let second = client.execute(HttpRequest::get("/thing")).await.unwrap();
    assert_eq!(second.status.as_u16(), 200);
    assert_eq!(state.auth_hits.load(Ordering::SeqCst), 2);
    assert_eq!(state.thing_hits.load(Ordering::SeqCst), 2);
}

#[rstest]
#[tokio::test]
async fn test_no_refresh_before_expiry() {
    let (addr, state) = start_test_server().await;
    let client = MeridianHttpClient::new(credentials_config(addr)).unwrap();

    for _ in 0..3 {
        let response = client.execute(HttpRequest::get("/thing")).await.unwrap();
        assert_eq!(response.status.as_u16(), 200);
    }

    // One acquisition, zero refreshes while the token is valid.
    assert_eq!(state.auth_hits.load(Ordering::SeqCst), 1);
}

#[rstest]
#[tokio::test]
async fn test_query_params_forwarded() {
    let (addr, state) = start_test_server().await;
    let client = MeridianHttpClient::new(fixed_config(addr)).unwrap();

    let request = HttpRequest::get("/thing")
        .with_param("a", "1")
        .with_param("b", "2");
    client.execute(request).await.unwrap();

    assert_eq!(
        state.last_query.lock().unwrap().as_deref(),
        Some("a=1&b=2")
    );
}

#[rstest]
#[tokio::test]
async fn test_request_json_decodes_body() {
    let (addr, _state) = start_test_server().await;
    let client = MeridianHttpClient::new(fixed_config(addr)).unwrap();

    let value: Value = client.request_json(HttpRequest::get("/thing")).await.unwrap();

    assert_eq!(value["ok"], json!(true));
}
