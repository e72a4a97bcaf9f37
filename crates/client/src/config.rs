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

//! Configuration structures for the Meridian HTTP client.

use std::fmt::Debug;

use url::Url;

use crate::{
    common::consts::{DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_MAX_RETRIES},
    http::transport::HttpTransportConfig,
    retry::RetryConfig,
};

/// The source a client obtains its bearer token from.
#[derive(Clone)]
pub enum TokenConfig {
    /// A token value supplied directly; can never be refreshed.
    Fixed(String),
    /// The name of a process-wide variable read at call time.
    Environment(String),
    /// Login credentials exchanged against the gateway token endpoint.
    Credentials {
        /// Login username.
        username: String,
        /// Login password.
        password: String,
        /// Optional override for the token exchange URL; defaults to the
        /// well-known path under the root URL.
        auth_url: Option<String>,
    },
}

impl Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed(_) => f.debug_tuple("Fixed").field(&"<redacted>").finish(),
            Self::Environment(name) => f.debug_tuple("Environment").field(name).finish(),
            Self::Credentials { username, auth_url, .. } => f
                .debug_struct("Credentials")
                .field("username", username)
                .field("password", &"<redacted>")
                .field("auth_url", auth_url)
                .finish(),
        }
    }
}

/// Configuration for a Meridian HTTP client handler.
#[derive(Clone, Debug)]
pub struct MeridianClientConfig {
    /// Root URL the discovery document is fetched from.
    pub root_url: String,
    /// Logical name of the API this handler targets.
    pub api_name: String,
    /// Optional explicit endpoint, bypassing discovery for this API name.
    pub endpoint_override: Option<String>,
    /// The token source for authenticated requests.
    pub token: TokenConfig,
    /// Optional request timeout in seconds.
    pub http_timeout_secs: Option<u64>,
    /// Optional TCP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Optional maximum retry attempts for transport failures.
    pub max_retries: Option<u32>,
    /// Optional initial retry backoff in milliseconds.
    pub retry_delay_initial_ms: Option<u64>,
    /// Optional maximum retry backoff in milliseconds.
    pub retry_delay_max_ms: Option<u64>,
    /// Optional HTTP proxy URL.
    pub proxy_url: Option<String>,
    /// Optional maximum idle pooled connections per host.
    pub pool_max_idle_per_host: Option<usize>,
    /// Optional bound on followed redirects (`Some(0)` disables redirects).
    pub max_redirects: Option<usize>,
    /// Accept invalid TLS certificates (trust-all mode, testing only).
    pub accept_invalid_certs: bool,
}

impl Default for MeridianClientConfig {
    fn default() -> Self {
        Self {
            root_url: String::new(),
            api_name: String::new(),
            endpoint_override: None,
            token: TokenConfig::Environment("MERIDIAN_API_TOKEN".to_string()),
            http_timeout_secs: Some(DEFAULT_HTTP_TIMEOUT_SECS),
            connect_timeout_secs: None,
            max_retries: Some(DEFAULT_MAX_RETRIES),
            retry_delay_initial_ms: Some(1_000),
            retry_delay_max_ms: Some(10_000),
            proxy_url: None,
            pool_max_idle_per_host: None,
            max_redirects: None,
            accept_invalid_certs: false,
        }
    }
}

impl MeridianClientConfig {
    /// Creates a configuration for the given root URL, API name and token
    /// source, with default values for everything else.
    #[must_use]
    pub fn new(
        root_url: impl Into<String>,
        api_name: impl Into<String>,
        token: TokenConfig,
    ) -> Self {
        Self {
            root_url: root_url.into(),
            api_name: api_name.into(),
            token,
            ..Default::default()
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        Url::parse(&self.root_url).map_err(|e| format!("Invalid `root_url`: {e}"))?;

        if self.api_name.is_empty() {
            return Err("`api_name` must not be empty".to_string());
        }

        if let Some(endpoint) = &self.endpoint_override {
            Url::parse(endpoint).map_err(|e| format!("Invalid `endpoint_override`: {e}"))?;
        }

        if let Some(proxy) = &self.proxy_url {
            Url::parse(proxy).map_err(|e| format!("Invalid `proxy_url`: {e}"))?;
        }

        match &self.token {
            TokenConfig::Fixed(value) if value.is_empty() => {
                Err("Fixed token value must not be empty".to_string())
            }
            TokenConfig::Environment(name) if name.is_empty() => {
                Err("Environment variable name must not be empty".to_string())
            }
            TokenConfig::Credentials {
                username, auth_url, ..
            } => {
                if username.is_empty() {
                    return Err("Credential username must not be empty".to_string());
                }
                if let Some(auth_url) = auth_url {
                    Url::parse(auth_url).map_err(|e| format!("Invalid `auth_url`: {e}"))?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Returns the transport settings derived from this configuration.
    pub(crate) fn transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            timeout_secs: self.http_timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            connect_timeout_secs: self.connect_timeout_secs,
            proxy_url: self.proxy_url.clone(),
            pool_max_idle_per_host: self.pool_max_idle_per_host,
            max_redirects: self.max_redirects,
            accept_invalid_certs: self.accept_invalid_certs,
        }
    }

    /// Returns the retry settings derived from this configuration.
    pub(crate) fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            initial_delay_ms: self.retry_delay_initial_ms.unwrap_or(1_000),
            max_delay_ms: self.retry_delay_max_ms.unwrap_or(10_000),
            ..Default::default()
        }
    }
}
