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

//! Request specification consumed by the authenticated executor.

use std::collections::HashMap;

use reqwest::Method;
use serde::Serialize;
use url::Url;

use super::{discovery::join_url, error::MeridianHttpError};

/// The target of a request: a path joined onto the resolved endpoint, or a
/// full URI used verbatim.
#[derive(Clone, Debug)]
pub enum RequestTarget {
    /// A path relative to the resolved (or overridden) API endpoint.
    Path(String),
    /// A full URI bypassing endpoint resolution entirely.
    Url(Url),
}

/// A single outgoing request, immutable once built and consumed once.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    /// The HTTP method.
    pub method: Method,
    /// The request target.
    pub target: RequestTarget,
    /// Query parameters appended to the target, in insertion order.
    pub params: Vec<(String, String)>,
    /// Optional URI fragment.
    pub fragment: Option<String>,
    /// Caller-supplied headers, taking precedence over the baseline.
    pub headers: HashMap<String, String>,
    /// Optional request body.
    pub body: Option<Vec<u8>>,
    /// Optional per-request timeout override (seconds).
    pub timeout_secs: Option<u64>,
}

impl HttpRequest {
    /// Creates a new [`HttpRequest`] for the given method and path.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            target: RequestTarget::Path(path.into()),
            params: Vec::new(),
            fragment: None,
            headers: HashMap::new(),
            body: None,
            timeout_secs: None,
        }
    }

    /// Creates a `GET` request for the given path.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Creates a `POST` request for the given path.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Creates a `PUT` request for the given path.
    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// Creates a `DELETE` request for the given path.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Creates a request targeting a full URI, bypassing resolution.
    #[must_use]
    pub fn with_url(method: Method, url: Url) -> Self {
        Self {
            method,
            target: RequestTarget::Url(url),
            params: Vec::new(),
            fragment: None,
            headers: HashMap::new(),
            body: None,
            timeout_secs: None,
        }
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Sets the URI fragment.
    #[must_use]
    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }

    /// Sets a header, replacing any previous value for the same key.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Sets the body and its content type.
    #[must_use]
    pub fn with_body(mut self, content_type: impl Into<String>, body: Vec<u8>) -> Self {
        self.headers
            .insert("Content-Type".to_string(), content_type.into());
        self.body = Some(body);
        self
    }

    /// Serializes the given value as the JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized.
    pub fn with_json<T: Serialize>(self, value: &T) -> Result<Self, MeridianHttpError> {
        let body = serde_json::to_vec(value)?;
        Ok(self.with_body("application/json", body))
    }

    /// Sets a per-request timeout override (seconds).
    #[must_use]
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    /// Builds the final URL for this request.
    ///
    /// A full-URI target is used verbatim; a path target is joined onto the
    /// given endpoint. Query parameters and the fragment are appended in both
    /// cases.
    pub(crate) fn build_url(&self, endpoint: Option<&Url>) -> Result<Url, MeridianHttpError> {
        let mut url = match &self.target {
            RequestTarget::Url(url) => url.clone(),
            RequestTarget::Path(path) => {
                let endpoint = endpoint.ok_or_else(|| {
                    MeridianHttpError::Validation(
                        "Path target requires a resolved endpoint".to_string(),
                    )
                })?;
                join_url(endpoint, path)?
            }
        };

        if !self.params.is_empty() {
            url.query_pairs_mut().extend_pairs(
                self.params
                    .iter()
                    .map(|(key, value)| (key.as_str(), value.as_str())),
            );
        }

        if let Some(fragment) = &self.fragment {
            url.set_fragment(Some(fragment));
        }

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_build_url_joins_endpoint_and_path() {
        let endpoint = Url::parse("https://api.example.com/api/graph/7").unwrap();
        let request = HttpRequest::get("/thing");

        let url = request.build_url(Some(&endpoint)).unwrap();

        assert_eq!(url.as_str(), "https://api.example.com/api/graph/7/thing");
    }

    #[rstest]
    fn test_build_url_appends_query_and_fragment() {
        let endpoint = Url::parse("https://api.example.com/api/graph/7").unwrap();
        let request = HttpRequest::get("/thing")
            .with_param("a", "1")
            .with_param("b", "two words")
            .with_fragment("section");

        let url = request.build_url(Some(&endpoint)).unwrap();

        assert_eq!(url.query(), Some("a=1&b=two+words"));
        assert_eq!(url.fragment(), Some("section"));
    }

    #[rstest]
    fn test_build_url_full_uri_verbatim() {
        let full = Url::parse("https://other.example.com/v2/status").unwrap();
        let request = HttpRequest::with_url(Method::GET, full.clone());

        let url = request.build_url(None).unwrap();

        assert_eq!(url, full);
    }

    #[rstest]
    fn test_with_body_sets_content_type() {
        let request = HttpRequest::post("/submit").with_body("text/plain", b"hello".to_vec());

        assert_eq!(
            request.headers.get("Content-Type").map(String::as_str),
            Some("text/plain")
        );
        assert_eq!(request.body.as_deref(), Some(b"hello".as_slice()));
    }

    #[rstest]
    fn test_with_json_sets_body_and_content_type() {
        let request = HttpRequest::post("/submit")
            .with_json(&serde_json::json!({"key": "value"}))
            .unwrap();

        assert_eq!(
            request.headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(request.body.as_deref(), Some(br#"{"key":"value"}"#.as_slice()));
    }
}
