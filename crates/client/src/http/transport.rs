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

//! HTTP transport handle applying opaque connection settings.
//!
//! The transport is built once per client and consumed as an opaque handle:
//! proxy, TLS trust mode, redirect policy, pool sizing and timeouts are
//! applied at build time and never inspected afterwards.

use std::{collections::HashMap, time::Duration};

use reqwest::{Method, StatusCode, redirect::Policy};
use thiserror::Error;
use url::Url;

use crate::common::consts::{DEFAULT_HTTP_TIMEOUT_SECS, MERIDIAN_USER_AGENT};

/// Connection settings applied once when the transport handle is built.
#[derive(Clone, Debug)]
pub struct HttpTransportConfig {
    /// Request timeout (seconds) applied to every dispatch unless overridden.
    pub timeout_secs: u64,
    /// Optional TCP connect timeout (seconds).
    pub connect_timeout_secs: Option<u64>,
    /// Optional proxy URL applied to all requests.
    pub proxy_url: Option<String>,
    /// Optional maximum number of idle pooled connections per host.
    pub pool_max_idle_per_host: Option<usize>,
    /// Optional bound on followed redirects (`Some(0)` disables redirects).
    pub max_redirects: Option<usize>,
    /// Accept invalid TLS certificates (trust-all mode, testing only).
    pub accept_invalid_certs: bool,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            connect_timeout_secs: None,
            proxy_url: None,
            pool_max_idle_per_host: None,
            max_redirects: None,
            accept_invalid_certs: false,
        }
    }
}

/// A typed error enumeration for the HTTP transport.
#[derive(Debug, Clone, Error)]
pub enum HttpTransportError {
    /// The request exceeded its timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),
    /// The connection could not be established or was reset.
    #[error("Connection error: {0}")]
    Connect(String),
    /// The configured proxy URL is malformed.
    #[error("Invalid proxy configuration: {0}")]
    InvalidProxy(String),
    /// The underlying client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Build(String),
    /// Any other network-level error.
    #[error("HTTP error: {0}")]
    Error(String),
}

/// A raw HTTP response carrying status, headers and an opaque body.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HashMap<String, String>,
    /// The response body bytes.
    pub body: Vec<u8>,
}

/// Thin transport handle over a shared connection pool.
///
/// All requests issued by a client (and its shared collaborators) go through
/// one transport so they share pooled connections and transport settings.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a new [`HttpTransport`] from the given settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the proxy URL is malformed or the underlying
    /// client cannot be built.
    pub fn new(config: &HttpTransportConfig) -> Result<Self, HttpTransportError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(MERIDIAN_USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs));

        if let Some(secs) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }

        if let Some(proxy_url) = &config.proxy_url {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| HttpTransportError::InvalidProxy(e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        if let Some(max_idle) = config.pool_max_idle_per_host {
            builder = builder.pool_max_idle_per_host(max_idle);
        }

        if let Some(max_redirects) = config.max_redirects {
            let policy = if max_redirects == 0 {
                Policy::none()
            } else {
                Policy::limited(max_redirects)
            };
            builder = builder.redirect(policy);
        }

        if config.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| HttpTransportError::Build(e.to_string()))?;

        Ok(Self { client })
    }

    /// Wraps an externally supplied client as a transport handle.
    #[must_use]
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Dispatches a single request and collects the full response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request times out, the connection fails, or
    /// the response body cannot be read.
    pub async fn send(
        &self,
        method: Method,
        url: Url,
        headers: HashMap<String, String>,
        body: Option<Vec<u8>>,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, HttpTransportError> {
        let mut request = self.client.request(method, url);

        for (key, value) in &headers {
            request = request.header(key, value);
        }

        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(key, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (key.to_string(), value.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(map_reqwest_error)?.to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn map_reqwest_error(error: reqwest::Error) -> HttpTransportError {
    if error.is_timeout() {
        HttpTransportError::Timeout(error.to_string())
    } else if error.is_connect() {
        HttpTransportError::Connect(error.to_string())
    } else {
        HttpTransportError::Error(error.to_string())
    }
}
