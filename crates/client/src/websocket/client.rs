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

//! Provides the WebSocket session client for Meridian streaming APIs.
//!
//! The session owns one persistent bidirectional connection built from the
//! same token provider and endpoint resolver the HTTP client uses. A single
//! atomically-updated state field is the point of truth for liveness: every
//! sender reads it before acting, and every transition stores it exactly
//! once. Transport loss moves the session into a restart loop driven by the
//! ramp-then-plateau delay schedule; a clean close or an unrecoverable error
//! parks it in a terminal state.

use std::{
    fmt::{Debug, Display},
    sync::{
        Arc, RwLock,
        atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering},
    },
    time::Duration,
};

use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Bytes, Message, client::IntoClientRequest, http::HeaderValue},
};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{backoff::Backoff, config::MeridianWebSocketConfig, error::MeridianWsError};
use crate::{
    common::{
        consts::{MERIDIAN_USER_AGENT, WS_TOKEN_PROTOCOL_PREFIX},
        token::TokenProvider,
    },
    http::discovery::EndpointResolver,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

/// Lifecycle states of a WebSocket session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// No connection has been attempted yet.
    None = 0,
    /// A handshake is in progress.
    Starting = 1,
    /// The connection is open but the remote has not signaled readiness.
    RunningPreliminary = 2,
    /// The connection is open and the remote signaled readiness.
    Running = 3,
    /// The connection was lost and a reconnect is pending.
    Restarting = 4,
    /// The session was closed intentionally.
    Done = 5,
    /// The session hit an unrecoverable error.
    Failed = 6,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Starting,
            2 => Self::RunningPreliminary,
            3 => Self::Running,
            4 => Self::Restarting,
            5 => Self::Done,
            6 => Self::Failed,
            _ => Self::None,
        }
    }

    /// Returns whether the state is terminal for sending purposes.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::None | Self::Done | Self::Failed)
    }

    /// Returns whether the session can attempt a physical send.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Running | Self::RunningPreliminary)
    }
}

impl Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::None => "NONE",
            Self::Starting => "STARTING",
            Self::RunningPreliminary => "RUNNING_PRELIMINARY",
            Self::Running => "RUNNING",
            Self::Restarting => "RESTARTING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        })
    }
}

/// Events forwarded to the session listener.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    /// A text frame received from the remote.
    Text(String),
    /// A binary frame received from the remote.
    Binary(Vec<u8>),
    /// The session re-established its connection; subscriptions and other
    /// remote state should be replayed by the listener.
    Reconnected,
    /// The session closed and no restart will follow.
    Closed,
}

struct SessionCore {
    config: MeridianWebSocketConfig,
    endpoint_override: Option<Url>,
    token_provider: Arc<TokenProvider>,
    resolver: Arc<EndpointResolver>,
    state: AtomicU8,
    generation: AtomicU64,
    restart_attempts: AtomicU32,
    writer: tokio::sync::RwLock<Option<WsWriter>>,
    listener: RwLock<Option<tokio::sync::mpsc::UnboundedSender<SessionEvent>>>,
    cancellation_token: CancellationToken,
}

impl SessionCore {
    fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, next: SessionState) {
        let prev = SessionState::from_u8(self.state.swap(next as u8, Ordering::AcqRel));
        if prev != next {
            tracing::debug!("Session state {prev} -> {next}");
        }
    }

    fn emit(&self, event: SessionEvent) {
        // SAFETY: Lock poisoning indicates a panic in another thread, which is fatal
        let guard = self.listener.read().expect("Lock poisoned");
        if let Some(tx) = guard.as_ref() {
            if tx.send(event).is_err() {
                tracing::debug!("Session listener dropped");
            }
        }
    }

    async fn handshake_url(&self) -> Result<Url, MeridianWsError> {
        let mut url = match &self.endpoint_override {
            Some(url) => url.clone(),
            None => self.resolver.resolve(&self.config.api_name).await?,
        };

        // Discovery documents advertise HTTP endpoints; map to WS schemes.
        let mapped = match url.scheme() {
            "http" => Some("ws"),
            "https" => Some("wss"),
            _ => None,
        };
        if let Some(scheme) = mapped {
            if url.set_scheme(scheme).is_err() {
                return Err(MeridianWsError::Connection(format!(
                    "Cannot map `{url}` to a WebSocket scheme"
                )));
            }
        }

        Ok(url)
    }

    async fn open_connection(self: &Arc<Self>) -> Result<(), MeridianWsError> {
        let url = self.handshake_url().await?;
        let token = self.token_provider.token().await?;

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| MeridianWsError::Connection(format!("Invalid handshake request: {e}")))?;

        // The bearer token travels in-band as a sub-protocol value because
        // the handshake cannot carry arbitrary authorization headers in
        // every target environment.
        let protocols = format!(
            "{}, {}{}",
            self.config.protocol,
            WS_TOKEN_PROTOCOL_PREFIX,
            token.value()
        );
        let headers = request.headers_mut();
        headers.insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_str(&protocols)
                .map_err(|e| MeridianWsError::Connection(format!("Invalid protocol value: {e}")))?,
        );
        headers.insert("User-Agent", HeaderValue::from_static(MERIDIAN_USER_AGENT));

        tracing::debug!(url = %url, "Opening WebSocket connection");
        let (stream, _response) = connect_async(request)
            .await
            .map_err(|e| MeridianWsError::Connection(e.to_string()))?;

        let (writer, reader) = stream.split();
        *self.writer.write().await = Some(writer);

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.restart_attempts.store(0, Ordering::Release);
        self.transition(SessionState::RunningPreliminary);

        self.spawn_reader(reader, generation);
        if let Some(secs) = self.config.heartbeat_secs.filter(|secs| *secs > 0) {
            self.spawn_heartbeat(generation, secs);
        }

        Ok(())
    }

    fn spawn_reader(self: &Arc<Self>, mut reader: WsReader, generation: u64) {
        let core = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = core.cancellation_token.cancelled() => break,
                    frame = reader.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            core.emit(SessionEvent::Text(text.as_str().to_string()));
                        }
                        Some(Ok(Message::Binary(data))) => {
                            core.emit(SessionEvent::Binary(data.to_vec()));
                        }
                        Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                        Some(Ok(Message::Close(_))) => {
                            core.handle_disconnect(generation, "closed by remote").await;
                            break;
                        }
                        Some(Err(e)) => {
                            core.handle_disconnect(generation, &format!("transport error: {e}"))
                                .await;
                            break;
                        }
                        None => {
                            core.handle_disconnect(generation, "stream ended").await;
                            break;
                        }
                    }
                }
            }
        });
    }

    fn spawn_heartbeat(self: &Arc<Self>, generation: u64, interval_secs: u64) {
        let core = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                tokio::select! {
                    () = core.cancellation_token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                if core.generation.load(Ordering::Acquire) != generation
                    || !core.state().is_ready()
                {
                    break;
                }

                let mut guard = core.writer.write().await;
                match guard.as_mut() {
                    Some(writer) => {
                        if let Err(e) = writer.send(Message::Ping(Bytes::new())).await {
                            tracing::debug!("Heartbeat ping failed: {e}");
                            break;
                        }
                    }
                    None => break,
                }
            }
        });
    }

    async fn handle_disconnect(self: &Arc<Self>, generation: u64, reason: &str) {
        if self.generation.load(Ordering::Acquire) != generation {
            return;
        }

        let state = self.state();
        if state.is_terminal() || state == SessionState::Restarting {
            return;
        }

        tracing::warn!("WebSocket transport lost while {state}: {reason}");
        self.writer.write().await.take();
        self.schedule_restart();
    }

    fn schedule_restart(self: &Arc<Self>) {
        loop {
            let current = self.state();
            if current.is_terminal() || current == SessionState::Restarting {
                return;
            }
            if self
                .state
                .compare_exchange(
                    current as u8,
                    SessionState::Restarting as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                tracing::debug!("Session state {current} -> {}", SessionState::Restarting);
                break;
            }
        }

        let core = Arc::clone(self);
        tokio::spawn(async move { core.run_restart().await });
    }

    async fn run_restart(self: Arc<Self>) {
        let mut backoff = Backoff::new();
        loop {
            let attempt = self.restart_attempts.fetch_add(1, Ordering::AcqRel) + 1;
            if attempt > self.config.max_restart_attempts {
                tracing::error!(
                    "Giving up after {} reconnect attempts",
                    self.config.max_restart_attempts,
                );
                self.transition(SessionState::Failed);
                self.emit(SessionEvent::Closed);
                return;
            }

            backoff.advance();
            tokio::select! {
                () = tokio::time::sleep(backoff.current()) => {}
                () = self.cancellation_token.cancelled() => return,
            }

            // The session may have been closed while waiting.
            if self.state() != SessionState::Restarting {
                return;
            }

            self.transition(SessionState::Starting);
            match self.open_connection().await {
                Ok(()) => {
                    tracing::info!("WebSocket session reconnected (attempt {attempt})");
                    self.emit(SessionEvent::Reconnected);
                    return;
                }
                Err(MeridianWsError::Auth(e)) => {
                    tracing::error!("Authentication failed during reconnect: {e}");
                    self.transition(SessionState::Failed);
                    self.emit(SessionEvent::Closed);
                    return;
                }
                Err(e) => {
                    tracing::warn!("Reconnect attempt {attempt} failed: {e}");
                    self.transition(SessionState::Restarting);
                }
            }
        }
    }

    async fn try_send(&self, message: Message) -> Result<(), MeridianWsError> {
        let mut guard = self.writer.write().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| MeridianWsError::Send("No live connection".to_string()))?;
        writer
            .send(message)
            .await
            .map_err(|e| MeridianWsError::Send(e.to_string()))
    }
}

impl Debug for SessionCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(SessionCore))
            .field("api_name", &self.config.api_name)
            .field("state", &self.state())
            .finish()
    }
}

/// WebSocket session client for Meridian streaming APIs.
///
/// Cloning is cheap and clones share the same underlying session.
#[derive(Clone, Debug)]
pub struct MeridianWebSocketClient {
    core: Arc<SessionCore>,
}

impl MeridianWebSocketClient {
    /// Creates a new [`MeridianWebSocketClient`] instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        config: MeridianWebSocketConfig,
        token_provider: Arc<TokenProvider>,
        resolver: Arc<EndpointResolver>,
    ) -> anyhow::Result<Self> {
        config.validate().map_err(|e| anyhow::anyhow!(e))?;

        let endpoint_override = config
            .endpoint_override
            .as_deref()
            .map(Url::parse)
            .transpose()?;

        Ok(Self {
            core: Arc::new(SessionCore {
                config,
                endpoint_override,
                token_provider,
                resolver,
                state: AtomicU8::new(SessionState::None as u8),
                generation: AtomicU64::new(0),
                restart_attempts: AtomicU32::new(0),
                writer: tokio::sync::RwLock::new(None),
                listener: RwLock::new(None),
                cancellation_token: CancellationToken::new(),
            }),
        })
    }

    /// Returns the current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.core.state()
    }

    /// Returns whether the session can currently attempt sends.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.core.state().is_ready()
    }

    /// Get the cancellation token for this session.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.core.cancellation_token
    }

    /// Connects the session, or reuses the live connection if one exists.
    ///
    /// The handshake endpoint is resolved the same way the HTTP client
    /// resolves request targets: the explicit override if configured,
    /// otherwise the discovery document entry for the configured API name.
    /// The current bearer token is advertised in-band via the
    /// `Sec-WebSocket-Protocol` header.
    ///
    /// Frames and lifecycle notices are forwarded to `listener`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is terminal, endpoint resolution or
    /// token acquisition fails, or the handshake is rejected.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (indicates a panic in another
    /// thread).
    pub async fn connect(
        &self,
        listener: tokio::sync::mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<(), MeridianWsError> {
        let state = self.core.state();
        if state.is_ready() {
            return Ok(());
        }
        if matches!(state, SessionState::Done | SessionState::Failed) {
            return Err(MeridianWsError::SessionState { state });
        }

        // SAFETY: Lock poisoning indicates a panic in another thread, which is fatal
        *self.core.listener.write().expect("Lock poisoned") = Some(listener);

        self.core.transition(SessionState::Starting);
        match self.core.open_connection().await {
            Ok(()) => Ok(()),
            Err(e) => {
                // A handshake that cannot authenticate is unrecoverable.
                let next = if matches!(e, MeridianWsError::Auth(_)) {
                    SessionState::Failed
                } else {
                    SessionState::None
                };
                self.core.transition(next);
                Err(e)
            }
        }
    }

    /// Reports the remote's application-level readiness signal.
    ///
    /// The external collaborator calls this when the first readiness message
    /// arrives on the listener, promoting the session from preliminary to
    /// fully running.
    pub fn confirm_ready(&self) {
        if self.core.state() == SessionState::RunningPreliminary {
            self.core.transition(SessionState::Running);
        }
    }

    /// Waits until the session is ready for sends, up to `timeout_secs`.
    ///
    /// # Errors
    ///
    /// Returns an error if the timeout elapses first.
    pub async fn wait_until_ready(&self, timeout_secs: f64) -> Result<(), MeridianWsError> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs_f64(timeout_secs);
        while !self.core.state().is_ready() {
            if tokio::time::Instant::now() >= deadline {
                return Err(MeridianWsError::Connection(format!(
                    "Session not ready within {timeout_secs}s (state {})",
                    self.core.state(),
                )));
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    }

    /// Sends a message over the live connection.
    ///
    /// The call is synchronous from the caller's point of view: it occupies
    /// the calling task for its full retry sequence, including the delay
    /// schedule slept before each physical attempt. Sends from a single
    /// caller are therefore strictly ordered.
    ///
    /// When the retry bound is exhausted the session restarts asynchronously
    /// and the call fails; the message can be replayed by the listener after
    /// the reconnect notice.
    ///
    /// # Errors
    ///
    /// Fails fast with [`MeridianWsError::SessionState`] when the session is
    /// not ready, with [`MeridianWsError::Send`] once the retry bound is
    /// exhausted, or with [`MeridianWsError::Canceled`] if the session's
    /// cancellation signal fires during a backoff sleep.
    pub async fn send(&self, message: Message) -> Result<(), MeridianWsError> {
        let state = self.core.state();
        if !state.is_ready() {
            return Err(MeridianWsError::SessionState { state });
        }

        let mut backoff = Backoff::new();
        let mut retries: u32 = 0;

        loop {
            tokio::select! {
                () = tokio::time::sleep(backoff.current()) => {}
                () = self.core.cancellation_token.cancelled() => {
                    return Err(MeridianWsError::Canceled(
                        "Session disconnecting or shutting down".to_string(),
                    ));
                }
            }

            let state = self.core.state();
            if !state.is_ready() {
                return Err(MeridianWsError::SessionState { state });
            }

            match self.core.try_send(message.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    retries += 1;
                    if retries > self.core.config.max_send_retries {
                        tracing::warn!(
                            "Send failed after {retries} attempts, restarting session: {e}"
                        );
                        self.core.writer.write().await.take();
                        self.core.schedule_restart();
                        return Err(MeridianWsError::Send(format!(
                            "Failed after {retries} attempts; session restarting: {e}"
                        )));
                    }
                    tracing::debug!(
                        "Physical send failed (retry {retries}/{}): {e}",
                        self.core.config.max_send_retries,
                    );
                    backoff.advance();
                }
            }
        }
    }

    /// Sends a text message over the live connection.
    ///
    /// # Errors
    ///
    /// See [`MeridianWebSocketClient::send`].
    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), MeridianWsError> {
        self.send(Message::text(text.into())).await
    }

    /// Closes the session intentionally.
    ///
    /// The session transitions to its final closed state from any state and
    /// cannot be reconnected afterwards.
    pub async fn close(&self) {
        self.core.transition(SessionState::Done);
        self.core.cancellation_token.cancel();

        if let Some(mut writer) = self.core.writer.write().await.take() {
            let _ = writer.send(Message::Close(None)).await;
            let _ = writer.close().await;
        }

        self.core.emit(SessionEvent::Closed);
    }
}
