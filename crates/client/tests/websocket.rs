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

//! Integration tests for the Meridian WebSocket client using a mock server.

use std::{
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Router,
    extract::{
        State,
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    },
    http::HeaderMap,
    response::{Json, Response},
    routing::get,
};
use meridian_client::{
    config::{MeridianClientConfig, TokenConfig},
    http::MeridianHttpClient,
    websocket::{MeridianWebSocketClient, MeridianWebSocketConfig, MeridianWsError, SessionEvent, SessionState},
};
use rstest::rstest;
use serde_json::{Value, json};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

#[derive(Clone)]
struct TestServerState {
    base_url: String,
    connection_count: Arc<AtomicUsize>,
    protocol_headers: Arc<Mutex<Vec<String>>>,
    messages_received: Arc<Mutex<Vec<String>>>,
    close_first_connection: Arc<AtomicBool>,
}

impl TestServerState {
    fn new(base_url: String) -> Self {
        Self {
            base_url,
            connection_count: Arc::new(AtomicUsize::new(0)),
            protocol_headers: Arc::new(Mutex::new(Vec::new())),
            messages_received: Arc::new(Mutex::new(Vec::new())),
            close_first_connection: Arc::new(AtomicBool::new(false)),
        }
    }
}

async fn handle_discovery(State(state): State<TestServerState>) -> Json<Value> {
    Json(json!({
        "stream": {"endpoint": format!("{}/ws", state.base_url), "version": "1"}
    }))
}

async fn handle_websocket(
    ws: WebSocketUpgrade,
    State(state): State<TestServerState>,
    headers: HeaderMap,
) -> Response {
    if let Some(value) = headers
        .get("sec-websocket-protocol")
        .and_then(|value| value.to_str().ok())
    {
        state.protocol_headers.lock().unwrap().push(value.to_string());
    }

    ws.protocols(["meridian.v1"])
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: TestServerState) {
    let connection = state.connection_count.fetch_add(1, Ordering::SeqCst) + 1;

    if connection == 1 && state.close_first_connection.load(Ordering::SeqCst) {
        return;
    }

    let _ = socket.send(WsMessage::Text("hello".into())).await;

    while let Some(Ok(message)) = socket.recv().await {
        if let WsMessage::Text(text) = message {
            state
                .messages_received
                .lock()
                .unwrap()
                .push(text.as_str().to_string());
        }
    }
}

fn create_router(state: TestServerState) -> Router {
    Router::new()
        .route("/api/version", get(handle_discovery))
        .route("/ws", get(handle_websocket))
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

fn session_client(addr: SocketAddr, config: MeridianWebSocketConfig) -> MeridianWebSocketClient {
    let http = MeridianHttpClient::new(MeridianClientConfig::new(
        format!("http://{addr}"),
        "stream",
        TokenConfig::Fixed("secret1".to_string()),
    ))
    .unwrap();

    MeridianWebSocketClient::new(config, http.token_provider(), http.resolver()).unwrap()
}

fn session_config() -> MeridianWebSocketConfig {
    MeridianWebSocketConfig {
        api_name: "stream".to_string(),
        heartbeat_secs: None,
        max_send_retries: 1,
        max_restart_attempts: 3,
        ..Default::default()
    }
}

async fn wait_until<F>(condition: F, timeout: Duration)
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {timeout:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn expect_event<F>(
    rx: &mut UnboundedReceiver<SessionEvent>,
    predicate: F,
    timeout: Duration,
) -> SessionEvent
where
    F: Fn(&SessionEvent) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Some(event)) if predicate(&event) => return event,
            Ok(Some(_)) => {}
            Ok(None) => panic!("Listener channel closed"),
            Err(_) => panic!("Event not observed within {timeout:?}"),
        }
    }
}

#[rstest]
#[tokio::test]
async fn test_handshake_carries_token_subprotocol() {
    let (addr, state) = start_test_server().await;
    let client = session_client(addr, session_config());
    let (tx, _rx) = unbounded_channel();

    client.connect(tx).await.unwrap();

    assert_eq!(client.state(), SessionState::RunningPreliminary);

    let protocols = state.protocol_headers.lock().unwrap().clone();
    assert_eq!(protocols.len(), 1);
    assert!(protocols[0].contains("meridian.v1"));
    assert!(protocols[0].contains("token-secret1"));

    client.confirm_ready();
    assert_eq!(client.state(), SessionState::Running);

    client.close().await;
    assert_eq!(client.state(), SessionState::Done);
}

#[rstest]
#[tokio::test]
async fn test_connect_is_idempotent_while_live() {
    let (addr, state) = start_test_server().await;
    let client = session_client(addr, session_config());
    let (tx, _rx) = unbounded_channel();

    client.connect(tx.clone()).await.unwrap();
    client.connect(tx).await.unwrap();

    assert_eq!(state.connection_count.load(Ordering::SeqCst), 1);

    client.close().await;
}

#[rstest]
#[tokio::test]
async fn test_send_before_connect_fails_fast() {
    let (addr, state) = start_test_server().await;
    let client = session_client(addr, session_config());

    let started = std::time::Instant::now();
    let result = client.send_text("ping").await;

    // No sleeps and no physical attempts: the state gate rejects immediately.
    assert!(matches!(
        result,
        Err(MeridianWsError::SessionState {
            state: SessionState::None,
        })
    ));
    assert!(started.elapsed() < Duration::from_millis(100));
    assert_eq!(state.connection_count.load(Ordering::SeqCst), 0);
}

#[rstest]
#[tokio::test]
async fn test_send_and_receive_round_trip() {
    let (addr, state) = start_test_server().await;
    let client = session_client(addr, session_config());
    let (tx, mut rx) = unbounded_channel();

    client.connect(tx).await.unwrap();

    let greeting = expect_event(
        &mut rx,
        |event| matches!(event, SessionEvent::Text(_)),
        Duration::from_secs(5),
    )
    .await;
    assert!(matches!(greeting, SessionEvent::Text(text) if text == "hello"));

    client.confirm_ready();
    client.send_text("ping").await.unwrap();

    let messages = state.messages_received.clone();
    wait_until(
        || messages.lock().unwrap().contains(&"ping".to_string()),
        Duration::from_secs(5),
    )
    .await;

    client.close().await;
}

#[rstest]
#[tokio::test]
async fn test_close_is_terminal() {
    let (addr, _state) = start_test_server().await;
    let client = session_client(addr, session_config());
    let (tx, _rx) = unbounded_channel();

    client.connect(tx).await.unwrap();
    client.close().await;

    assert_eq!(client.state(), SessionState::Done);

    let send_result = client.send_text("ping").await;
    assert!(matches!(
        send_result,
        Err(MeridianWsError::SessionState {
            state: SessionState::Done,
        })
    ));

    let (tx2, _rx2) = unbounded_channel();
    let connect_result = client.connect(tx2).await;
    assert!(matches!(
        connect_result,
        Err(MeridianWsError::SessionState {
            state: SessionState::Done,
        })
    ));
}

#[rstest]
#[tokio::test]
async fn test_disconnect_restarts_and_sends_fail_meanwhile() {
    let (addr, state) = start_test_server().await;
    state.close_first_connection.store(true, Ordering::SeqCst);
    let client = session_client(addr, session_config());
    let (tx, mut rx) = unbounded_channel();

    // The server drops the first connection right after the handshake.
    client.connect(tx).await.unwrap();

    let session = client.clone();
    wait_until(
        || session.state() == SessionState::Restarting,
        Duration::from_secs(2),
    )
    .await;

    // A send against the broken session fails with a typed error naming the
    // state; it is never silently absorbed.
    let result = client.send_text("ping").await;
    assert!(matches!(
        result,
        Err(MeridianWsError::SessionState {
            state: SessionState::Restarting,
        })
    ));

    // The restart loop re-establishes the connection under its delay ramp.
    expect_event(
        &mut rx,
        |event| matches!(event, SessionEvent::Reconnected),
        Duration::from_secs(5),
    )
    .await;

    assert_eq!(state.connection_count.load(Ordering::SeqCst), 2);
    assert_eq!(client.state(), SessionState::RunningPreliminary);

    // The recovered session carries traffic again.
    client.confirm_ready();
    client.send_text("after-restart").await.unwrap();

    let messages = state.messages_received.clone();
    wait_until(
        || messages.lock().unwrap().contains(&"after-restart".to_string()),
        Duration::from_secs(5),
    )
    .await;

    client.close().await;
}

#[rstest]
#[tokio::test]
async fn test_restart_failures_exhaust_to_failed() {
    let (addr, state) = start_test_server().await;
    state.close_first_connection.store(true, Ordering::SeqCst);
    let client = session_client(
        addr,
        MeridianWebSocketConfig {
            max_restart_attempts: 0,
            ..session_config()
        },
    );
    let (tx, mut rx) = unbounded_channel();

    client.connect(tx).await.unwrap();

    // With a zero restart budget the first transport loss is unrecoverable.
    expect_event(
        &mut rx,
        |event| matches!(event, SessionEvent::Closed),
        Duration::from_secs(5),
    )
    .await;

    assert_eq!(client.state(), SessionState::Failed);

    let result = client.send_text("ping").await;
    assert!(matches!(
        result,
        Err(MeridianWsError::SessionState {
            state: SessionState::Failed,
        })
    ));
}

#[rstest]
#[tokio::test]
async fn test_heartbeat_pings_keep_connection_alive() {
    let (addr, state) = start_test_server().await;
    let client = session_client(
        addr,
        MeridianWebSocketConfig {
            heartbeat_secs: Some(1),
            ..session_config()
        },
    );
    let (tx, _rx) = unbounded_channel();

    client.connect(tx).await.unwrap();
    client.confirm_ready();

    // Outlive a couple of heartbeat intervals without losing the session.
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(client.state(), SessionState::Running);
    assert_eq!(state.connection_count.load(Ordering::SeqCst), 1);

    client.close().await;
}
