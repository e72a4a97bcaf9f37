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

//! Endpoint discovery and caching for named Meridian APIs.
//!
//! The gateway publishes a discovery document at a well-known path mapping
//! logical API names to concrete endpoint descriptors. The resolver fetches
//! that document lazily on first use and caches it for its lifetime; a
//! resolver may instead be bound to another resolver's live cache so a group
//! of handlers targeting the same root shares one discovery round trip.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{error::MeridianHttpError, transport::HttpTransport};
use crate::common::consts::MERIDIAN_DISCOVERY_PATH;

/// A single entry of the gateway discovery document.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ApiDescriptor {
    /// The concrete base endpoint serving this API.
    pub endpoint: String,
    /// The version currently served, if advertised.
    #[serde(default)]
    pub version: Option<String>,
    /// Additional versions the endpoint accepts, if advertised.
    #[serde(default)]
    pub supported_versions: Vec<String>,
}

/// The discovery document: a mapping from API name to endpoint descriptor.
///
/// Immutable once populated; a new discovery call replaces the whole map.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct EndpointMap(HashMap<String, ApiDescriptor>);

impl EndpointMap {
    /// Returns the descriptor for the given API name, if present.
    #[must_use]
    pub fn get(&self, api_name: &str) -> Option<&ApiDescriptor> {
        self.0.get(api_name)
    }

    /// Returns the API names present in the document.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    /// Returns the number of named APIs in the document.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the document is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug)]
enum EndpointCache {
    /// This resolver fetches and owns the live cache.
    Owned(RwLock<Option<Arc<EndpointMap>>>),
    /// This resolver delegates lookups to another resolver's cache and never
    /// fetches on its own.
    Shared(Arc<EndpointResolver>),
}

/// Resolves logical API names to concrete endpoint URIs.
#[derive(Debug)]
pub struct EndpointResolver {
    root_url: Url,
    transport: Arc<HttpTransport>,
    overrides: HashMap<String, Url>,
    cache: EndpointCache,
}

impl EndpointResolver {
    /// Creates a new [`EndpointResolver`] owning its discovery cache.
    ///
    /// Any API name present in `overrides` is resolved to the given URI
    /// without ever consulting the discovery document.
    #[must_use]
    pub fn new(root_url: Url, transport: Arc<HttpTransport>, overrides: HashMap<String, Url>) -> Self {
        Self {
            root_url,
            transport,
            overrides,
            cache: EndpointCache::Owned(RwLock::new(None)),
        }
    }

    /// Creates a resolver bound to another resolver's live cache.
    ///
    /// Lookups not satisfied by this instance's own overrides delegate to the
    /// bound resolver; this instance never performs a discovery call of its
    /// own and never holds a cache entry.
    #[must_use]
    pub fn bound(delegate: Arc<EndpointResolver>, overrides: HashMap<String, Url>) -> Self {
        Self {
            root_url: delegate.root_url.clone(),
            transport: delegate.transport.clone(),
            overrides,
            cache: EndpointCache::Shared(delegate),
        }
    }

    /// Returns the root URL discovery is issued against.
    #[must_use]
    pub fn root_url(&self) -> &Url {
        &self.root_url
    }

    /// Returns whether this resolver delegates to another resolver's cache.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        matches!(self.cache, EndpointCache::Shared(_))
    }

    /// Returns the concrete base URI for a named API.
    ///
    /// The discovery document is fetched on first use only; repeated calls
    /// return the cached entry without further network traffic. Discovery
    /// failures are never cached, so the next lookup retries the fetch.
    ///
    /// # Errors
    ///
    /// Returns [`MeridianHttpError::Discovery`] if the discovery call fails,
    /// or [`MeridianHttpError::UnknownApi`] if the fetched document has no
    /// entry for `api_name`.
    pub async fn resolve(&self, api_name: &str) -> Result<Url, MeridianHttpError> {
        let mut target: &Self = self;
        loop {
            if let Some(url) = target.overrides.get(api_name) {
                return Ok(url.clone());
            }
            match &target.cache {
                EndpointCache::Shared(delegate) => target = delegate,
                EndpointCache::Owned(cell) => return target.resolve_owned(cell, api_name).await,
            }
        }
    }

    /// Re-fetches the discovery document, replacing the cached map.
    ///
    /// For a bound resolver this refreshes the owning resolver's cache.
    ///
    /// # Errors
    ///
    /// Returns [`MeridianHttpError::Discovery`] if the discovery call fails;
    /// the previously cached map stays in place in that case.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (indicates a panic in another
    /// thread).
    pub async fn force_refresh(&self) -> Result<(), MeridianHttpError> {
        let mut target: &Self = self;
        loop {
            match &target.cache {
                EndpointCache::Shared(delegate) => target = delegate,
                EndpointCache::Owned(cell) => {
                    let map = Arc::new(target.fetch().await?);
                    // SAFETY: Lock poisoning indicates a panic in another thread, which is fatal
                    *cell.write().expect("Lock poisoned") = Some(map);
                    return Ok(());
                }
            }
        }
    }

    async fn resolve_owned(
        &self,
        cell: &RwLock<Option<Arc<EndpointMap>>>,
        api_name: &str,
    ) -> Result<Url, MeridianHttpError> {
        // SAFETY: Lock poisoning indicates a panic in another thread, which is fatal
        let cached = cell.read().expect("Lock poisoned").clone();
        let map = match cached {
            Some(map) => map,
            None => {
                let map = Arc::new(self.fetch().await?);
                *cell.write().expect("Lock poisoned") = Some(map.clone());
                map
            }
        };

        let descriptor = map
            .get(api_name)
            .ok_or_else(|| MeridianHttpError::UnknownApi {
                name: api_name.to_string(),
            })?;

        Url::parse(&descriptor.endpoint).map_err(|e| MeridianHttpError::Discovery {
            reason: format!("Invalid endpoint URI for `{api_name}`: {e}"),
        })
    }

    async fn fetch(&self) -> Result<EndpointMap, MeridianHttpError> {
        let url = join_url(&self.root_url, MERIDIAN_DISCOVERY_PATH)
            .map_err(|e| MeridianHttpError::Discovery {
                reason: format!("Invalid discovery URL: {e}"),
            })?;
        tracing::debug!(url = %url, "Fetching discovery document");

        let mut headers = HashMap::new();
        headers.insert("Accept".to_string(), "application/json".to_string());

        let response = self
            .transport
            .send(Method::GET, url, headers, None, None)
            .await
            .map_err(|e| MeridianHttpError::Discovery {
                reason: e.to_string(),
            })?;

        if !response.status.is_success() {
            return Err(MeridianHttpError::Discovery {
                reason: format!(
                    "HTTP status {}: {}",
                    response.status.as_u16(),
                    String::from_utf8_lossy(&response.body)
                ),
            });
        }

        let map: EndpointMap =
            serde_json::from_slice(&response.body).map_err(|e| MeridianHttpError::Discovery {
                reason: format!("Invalid discovery document: {e}"),
            })?;
        tracing::debug!("Discovery document fetched ({} named APIs)", map.len());

        Ok(map)
    }
}

/// Joins a base URL and a path, normalizing the slash between them.
pub(crate) fn join_url(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    if path.is_empty() {
        return Ok(base.clone());
    }
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined)
}
