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

//! Provides the authenticated request executor for Meridian REST APIs.
//!
//! The executor composes each outgoing request from the shared token
//! provider and endpoint resolver, dispatches it over the transport, and
//! applies the retry policy: network-level failures and 5xx responses are
//! retried up to the configured bound, a 401 triggers exactly one reactive
//! token refresh per logical request, and every other non-2xx status is
//! terminal immediately.

use std::{collections::HashMap, fmt::Debug, sync::Arc, time::Duration};

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{
    discovery::{EndpointResolver, join_url},
    error::MeridianHttpError,
    request::{HttpRequest, RequestTarget},
    transport::{HttpResponse, HttpTransport},
};
use crate::{
    common::{
        consts::{MERIDIAN_AUTH_TOKEN_PATH, MERIDIAN_USER_AGENT},
        credential::Credential,
        token::{MeridianAuthError, TokenProvider},
    },
    config::{MeridianClientConfig, TokenConfig},
    retry::RetryManager,
};

/// HTTP client for a single named Meridian API.
///
/// The token provider and endpoint resolver are shared, read-mostly
/// collaborators: clients created via [`MeridianHttpClient::bound_to`] reuse
/// another client's provider, resolver cache and connection pool so a group
/// of handlers targeting the same gateway performs one discovery fetch and
/// one token exchange between them.
pub struct MeridianHttpClient {
    transport: Arc<HttpTransport>,
    token_provider: Arc<TokenProvider>,
    resolver: Arc<EndpointResolver>,
    api_name: String,
    retry_manager: RetryManager<MeridianHttpError>,
    cancellation_token: CancellationToken,
}

impl Debug for MeridianHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(MeridianHttpClient))
            .field("api_name", &self.api_name)
            .field("root_url", &self.resolver.root_url().as_str())
            .field("shared_resolver", &self.resolver.is_bound())
            .finish()
    }
}

impl MeridianHttpClient {
    /// Creates a new [`MeridianHttpClient`] from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the transport
    /// cannot be built.
    pub fn new(config: MeridianClientConfig) -> Result<Self, MeridianHttpError> {
        config.validate().map_err(MeridianHttpError::Validation)?;

        let root_url = Url::parse(&config.root_url)?;
        let transport = Arc::new(HttpTransport::new(&config.transport_config())?);
        let token_provider = Arc::new(build_token_provider(
            &config.token,
            &root_url,
            transport.clone(),
        )?);
        let resolver = Arc::new(EndpointResolver::new(
            root_url,
            transport.clone(),
            endpoint_overrides(&config)?,
        ));

        let retry_manager = RetryManager::new(config.retry_config());

        Ok(Self {
            transport,
            token_provider,
            resolver,
            api_name: config.api_name,
            retry_manager,
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Creates a client sharing another client's token provider, resolver
    /// cache and connection pool.
    ///
    /// Use this for additional handlers targeting the same gateway with the
    /// same identity: lookups delegate to `other`'s live discovery cache and
    /// refreshes performed by either client are visible to both.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn bound_to(
        config: MeridianClientConfig,
        other: &MeridianHttpClient,
    ) -> Result<Self, MeridianHttpError> {
        config.validate().map_err(MeridianHttpError::Validation)?;

        let resolver = Arc::new(EndpointResolver::bound(
            other.resolver.clone(),
            endpoint_overrides(&config)?,
        ));

        let retry_manager = RetryManager::new(config.retry_config());

        Ok(Self {
            transport: other.transport.clone(),
            token_provider: other.token_provider.clone(),
            resolver,
            api_name: config.api_name,
            retry_manager,
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Returns the logical API name this client targets.
    #[must_use]
    pub fn api_name(&self) -> &str {
        &self.api_name
    }

    /// Returns the shared token provider.
    #[must_use]
    pub fn token_provider(&self) -> Arc<TokenProvider> {
        self.token_provider.clone()
    }

    /// Returns the shared endpoint resolver.
    #[must_use]
    pub fn resolver(&self) -> Arc<EndpointResolver> {
        self.resolver.clone()
    }

    /// Returns the shared transport handle.
    #[must_use]
    pub fn transport(&self) -> Arc<HttpTransport> {
        self.transport.clone()
    }

    /// Cancel all pending HTTP requests.
    pub fn cancel_all_requests(&self) {
        self.cancellation_token.cancel();
    }

    /// Get the cancellation token for this client.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    /// Executes a single logical request.
    ///
    /// # Errors
    ///
    /// Returns an error identifying the failed stage: token acquisition,
    /// endpoint discovery, transport (after retries), or a terminal status
    /// from the remote.
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, MeridianHttpError> {
        // Proactive refresh once the provider's expiry instant has passed.
        if self.token_provider.is_expired() {
            tracing::debug!("Token expired, refreshing before dispatch");
            self.token_provider.refresh().await?;
        }

        let url = match &request.target {
            RequestTarget::Url(_) => request.build_url(None)?,
            RequestTarget::Path(_) => {
                let endpoint = self.resolver.resolve(&self.api_name).await?;
                request.build_url(Some(&endpoint))?
            }
        };

        match self.dispatch(&url, &request).await {
            Err(err @ MeridianHttpError::UnexpectedStatus { status: 401, .. }) => {
                match self.token_provider.refresh().await {
                    Ok(()) => {
                        tracing::debug!("Refreshed token after HTTP 401, retrying request");
                        self.dispatch(&url, &request).await
                    }
                    // An immutable token cannot recover; surface the original 401.
                    Err(MeridianAuthError::FixedToken) => Err(err),
                    Err(refresh_err) => Err(refresh_err.into()),
                }
            }
            other => other,
        }
    }

    /// Executes a request and deserializes the response body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body cannot be decoded.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        request: HttpRequest,
    ) -> Result<T, MeridianHttpError> {
        let response = self.execute(request).await?;
        serde_json::from_slice(&response.body).map_err(|e| {
            MeridianHttpError::Json(format!("Failed to deserialize response: {e}"))
        })
    }

    async fn dispatch(
        &self,
        url: &Url,
        request: &HttpRequest,
    ) -> Result<HttpResponse, MeridianHttpError> {
        let operation = || {
            let url = url.clone();
            let method = request.method.clone();
            let caller_headers = request.headers.clone();
            let body = request.body.clone();
            let timeout = request.timeout_secs.map(Duration::from_secs);

            async move {
                let token = self.token_provider.token().await?;

                let mut headers = Self::default_headers();
                headers.extend(caller_headers);
                headers.insert("Authorization".to_string(), token.bearer());

                let response = self
                    .transport
                    .send(method, url, headers, body, timeout)
                    .await?;

                if response.status.is_success() {
                    return Ok(response);
                }

                let status = response.status.as_u16();
                let body = String::from_utf8_lossy(&response.body).to_string();

                // Server-side failures are transport-class and retryable.
                if status >= 500 {
                    return Err(MeridianHttpError::Transport(format!(
                        "HTTP status {status}: {body}"
                    )));
                }

                Err(MeridianHttpError::UnexpectedStatus { status, body })
            }
        };

        let should_retry =
            |error: &MeridianHttpError| matches!(error, MeridianHttpError::Transport(_));

        let create_error = |msg: String| {
            if msg == "canceled" {
                MeridianHttpError::Canceled("Client disconnecting or shutting down".to_string())
            } else {
                MeridianHttpError::Transport(msg)
            }
        };

        self.retry_manager
            .execute_with_retry_with_cancel(
                url.path(),
                operation,
                should_retry,
                create_error,
                &self.cancellation_token,
            )
            .await
    }

    fn default_headers() -> HashMap<String, String> {
        HashMap::from([
            ("User-Agent".to_string(), MERIDIAN_USER_AGENT.to_string()),
            ("Accept".to_string(), "application/json".to_string()),
        ])
    }
}

fn endpoint_overrides(
    config: &MeridianClientConfig,
) -> Result<HashMap<String, Url>, MeridianHttpError> {
    let mut overrides = HashMap::new();
    if let Some(endpoint) = &config.endpoint_override {
        overrides.insert(config.api_name.clone(), Url::parse(endpoint)?);
    }
    Ok(overrides)
}

fn build_token_provider(
    token: &TokenConfig,
    root_url: &Url,
    transport: Arc<HttpTransport>,
) -> Result<TokenProvider, MeridianHttpError> {
    match token {
        TokenConfig::Fixed(value) => Ok(TokenProvider::fixed(value.clone())),
        TokenConfig::Environment(name) => Ok(TokenProvider::from_env(name.clone())),
        TokenConfig::Credentials {
            username,
            password,
            auth_url,
        } => {
            let auth_url = match auth_url {
                Some(explicit) => Url::parse(explicit)?,
                None => join_url(root_url, MERIDIAN_AUTH_TOKEN_PATH)?,
            };
            Ok(TokenProvider::with_credentials(
                Credential::new(username.clone(), password.clone()),
                auth_url,
                transport,
            ))
        }
    }
}
