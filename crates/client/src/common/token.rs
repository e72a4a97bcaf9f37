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

//! Bearer token lifecycle management for the Meridian gateway.
//!
//! A [`TokenProvider`] owns the current token value and its validity window,
//! dispatching over the configured strategy:
//!
//! - **Fixed**: the value is supplied at construction and can never change.
//! - **Environment**: the value is read from a process-wide variable at call
//!   time and can never be refreshed by this client.
//! - **Credentials**: the value is obtained by exchanging login credentials
//!   against the gateway token endpoint and tracks an expiry instant.
//!
//! The stored token is replaced wholesale on refresh, never mutated in place,
//! so concurrent readers always observe a complete value.

use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};

use reqwest::Method;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;
use zeroize::ZeroizeOnDrop;

use super::credential::Credential;
use crate::http::transport::{HttpTransport, HttpTransportError};

/// A typed error enumeration for token acquisition and lifecycle calls.
#[derive(Debug, Clone, Error)]
pub enum MeridianAuthError {
    /// The configured environment variable is absent or not unicode.
    #[error("Environment variable `{name}` is not set")]
    MissingEnvVar { name: String },
    /// Refresh or revoke was requested on an immutable token strategy.
    ///
    /// Always fatal for the triggering request; callers must not retry.
    #[error("Token is fixed for this provider and cannot be refreshed or revoked")]
    FixedToken,
    /// The token endpoint rejected the exchange.
    #[error("Token exchange rejected with HTTP status {status}: {body}")]
    ExchangeRejected { status: u16, body: String },
    /// The token endpoint could not be reached.
    #[error("Token exchange transport error: {0}")]
    Transport(String),
    /// The token endpoint returned a malformed payload.
    #[error("Token exchange returned an invalid payload: {0}")]
    InvalidPayload(String),
}

impl From<HttpTransportError> for MeridianAuthError {
    fn from(error: HttpTransportError) -> Self {
        Self::Transport(error.to_string())
    }
}

/// An opaque bearer token with an optional expiry instant.
#[derive(Clone, ZeroizeOnDrop)]
pub struct Token {
    value: Box<str>,
    #[zeroize(skip)]
    expires_at: Option<Instant>,
}

impl Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(Token))
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Token {
    /// Creates a new [`Token`] instance.
    #[must_use]
    pub fn new(value: impl Into<String>, expires_at: Option<Instant>) -> Self {
        Self {
            value: value.into().into_boxed_str(),
            expires_at,
        }
    }

    /// Returns the raw token value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns the instant after which the token should be refreshed, if any.
    #[must_use]
    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    /// Returns whether the token has reached its expiry instant.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }

    /// Creates an `Authorization` header value for bearer authentication.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.value)
    }
}

#[derive(Debug, Serialize)]
struct TokenExchangeRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug)]
enum TokenStrategy {
    Fixed {
        token: Token,
    },
    Environment {
        var_name: String,
    },
    Credentials {
        credential: Credential,
        auth_url: Url,
        transport: Arc<HttpTransport>,
        current: RwLock<Option<Token>>,
        refresh_guard: tokio::sync::Mutex<()>,
    },
}

/// Owns a bearer token value and its validity window.
///
/// One provider instance is shared by reference across all handlers that
/// target the same gateway with the same identity, so a refresh performed for
/// one request is visible to every other request.
#[derive(Debug)]
pub struct TokenProvider {
    strategy: TokenStrategy,
}

impl TokenProvider {
    /// Creates a provider around a fixed token value.
    #[must_use]
    pub fn fixed(value: impl Into<String>) -> Self {
        Self {
            strategy: TokenStrategy::Fixed {
                token: Token::new(value, None),
            },
        }
    }

    /// Creates a provider reading the token from a process-wide variable.
    ///
    /// The variable is read on every call so external rotation is picked up
    /// without restarting the client.
    #[must_use]
    pub fn from_env(var_name: impl Into<String>) -> Self {
        Self {
            strategy: TokenStrategy::Environment {
                var_name: var_name.into(),
            },
        }
    }

    /// Creates a provider exchanging login credentials for tokens.
    #[must_use]
    pub fn with_credentials(
        credential: Credential,
        auth_url: Url,
        transport: Arc<HttpTransport>,
    ) -> Self {
        Self {
            strategy: TokenStrategy::Credentials {
                credential,
                auth_url,
                transport,
                current: RwLock::new(None),
                refresh_guard: tokio::sync::Mutex::new(()),
            },
        }
    }

    /// Returns whether this provider can replace its token.
    #[must_use]
    pub fn is_refreshable(&self) -> bool {
        matches!(self.strategy, TokenStrategy::Credentials { .. })
    }

    /// Returns the current token, acquiring one first if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment source is missing or the initial
    /// token exchange fails.
    pub async fn token(&self) -> Result<Token, MeridianAuthError> {
        match &self.strategy {
            TokenStrategy::Fixed { token } => Ok(token.clone()),
            TokenStrategy::Environment { var_name } => std::env::var(var_name)
                .map(|value| Token::new(value, None))
                .map_err(|_| MeridianAuthError::MissingEnvVar {
                    name: var_name.clone(),
                }),
            TokenStrategy::Credentials { current, .. } => {
                if let Some(token) = read_current(current) {
                    return Ok(token);
                }
                self.refresh().await?;
                read_current(current).ok_or_else(|| {
                    MeridianAuthError::InvalidPayload(
                        "Token exchange completed without a token".to_string(),
                    )
                })
            }
        }
    }

    /// Forces acquisition of a new token, replacing the stored one.
    ///
    /// Concurrent refreshers are serialized per provider: a caller that
    /// observes the token changed while it waited for the guard skips its
    /// own exchange, so racing requests coalesce on a single round trip.
    ///
    /// # Errors
    ///
    /// Returns [`MeridianAuthError::FixedToken`] for strategies without a
    /// refresh capability, or the exchange failure otherwise.
    pub async fn refresh(&self) -> Result<(), MeridianAuthError> {
        match &self.strategy {
            TokenStrategy::Fixed { .. } | TokenStrategy::Environment { .. } => {
                Err(MeridianAuthError::FixedToken)
            }
            TokenStrategy::Credentials {
                credential,
                auth_url,
                transport,
                current,
                refresh_guard,
            } => {
                let observed = read_current(current).map(|token| token.value().to_string());
                let _guard = refresh_guard.lock().await;

                // Another refresh may have landed while waiting for the guard.
                let latest = read_current(current).map(|token| token.value().to_string());
                if latest != observed {
                    return Ok(());
                }

                let token = exchange(credential, auth_url, transport).await?;
                store_current(current, Some(token));
                tracing::debug!("Token refreshed via credential exchange");
                Ok(())
            }
        }
    }

    /// Invalidates the current token server-side and clears it locally.
    ///
    /// # Errors
    ///
    /// Returns [`MeridianAuthError::FixedToken`] for strategies without a
    /// revoke capability, or the revocation failure otherwise.
    pub async fn revoke(&self) -> Result<(), MeridianAuthError> {
        match &self.strategy {
            TokenStrategy::Fixed { .. } | TokenStrategy::Environment { .. } => {
                Err(MeridianAuthError::FixedToken)
            }
            TokenStrategy::Credentials {
                auth_url,
                transport,
                current,
                ..
            } => {
                let Some(token) = read_current(current) else {
                    return Ok(());
                };

                let mut headers = HashMap::new();
                headers.insert("Authorization".to_string(), token.bearer());

                let response = transport
                    .send(Method::DELETE, auth_url.clone(), headers, None, None)
                    .await?;

                if !response.status.is_success() {
                    return Err(MeridianAuthError::ExchangeRejected {
                        status: response.status.as_u16(),
                        body: String::from_utf8_lossy(&response.body).to_string(),
                    });
                }

                store_current(current, None);
                tracing::debug!("Token revoked");
                Ok(())
            }
        }
    }

    /// Returns the instant after which proactive refresh should occur.
    ///
    /// Strategies that cannot expire return `None`.
    #[must_use]
    pub fn expires_at(&self) -> Option<Instant> {
        match &self.strategy {
            TokenStrategy::Credentials { current, .. } => {
                read_current(current).and_then(|token| token.expires_at())
            }
            _ => None,
        }
    }

    /// Returns whether the stored token has reached its expiry instant.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at().is_some_and(|at| Instant::now() >= at)
    }
}

// SAFETY: Lock poisoning indicates a panic in another thread, which is fatal
fn read_current(current: &RwLock<Option<Token>>) -> Option<Token> {
    current.read().expect("Lock poisoned").clone()
}

fn store_current(current: &RwLock<Option<Token>>, token: Option<Token>) {
    *current.write().expect("Lock poisoned") = token;
}

async fn exchange(
    credential: &Credential,
    auth_url: &Url,
    transport: &HttpTransport,
) -> Result<Token, MeridianAuthError> {
    let body = serde_json::to_vec(&TokenExchangeRequest {
        username: credential.username(),
        password: credential.password(),
    })
    .map_err(|e| MeridianAuthError::InvalidPayload(e.to_string()))?;

    let mut headers = HashMap::new();
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    headers.insert("Accept".to_string(), "application/json".to_string());

    let response = transport
        .send(Method::POST, auth_url.clone(), headers, Some(body), None)
        .await?;

    if !response.status.is_success() {
        return Err(MeridianAuthError::ExchangeRejected {
            status: response.status.as_u16(),
            body: String::from_utf8_lossy(&response.body).to_string(),
        });
    }

    let payload: TokenExchangeResponse = serde_json::from_slice(&response.body)
        .map_err(|e| MeridianAuthError::InvalidPayload(e.to_string()))?;
    let expires_at = payload
        .expires_in
        .map(|secs| Instant::now() + Duration::from_secs(secs));

    Ok(Token::new(payload.token, expires_at))
}
