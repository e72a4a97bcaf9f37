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

//! Error structures and enumerations for the Meridian HTTP integration.

use thiserror::Error;

use crate::{common::token::MeridianAuthError, http::transport::HttpTransportError};

/// A typed error enumeration for the Meridian HTTP client.
///
/// Every failure identifies the stage that produced it (token, discovery,
/// transport, remote rejection) so callers can decide whether to abort,
/// prompt for new credentials, or retry at a higher level.
#[derive(Debug, Clone, Error)]
pub enum MeridianHttpError {
    /// No usable token could be obtained or refreshed.
    #[error("Authentication error: {0}")]
    Auth(#[from] MeridianAuthError),
    /// The discovery call itself failed; the result is never cached.
    #[error("Endpoint discovery failed: {reason}")]
    Discovery { reason: String },
    /// Discovery succeeded but the requested API name is absent.
    #[error("API `{name}` is not present in the gateway discovery document")]
    UnknownApi { name: String },
    /// Network-level failure (connectivity, timeout), after retries.
    #[error("Transport error: {0}")]
    Transport(String),
    /// The remote rejected the request with a terminal status.
    #[error("Unexpected HTTP status code {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
    /// The request was canceled, typically due to shutdown.
    #[error("Request canceled: {0}")]
    Canceled(String),
    /// Failure during JSON serialization/deserialization.
    #[error("JSON error: {0}")]
    Json(String),
    /// Parameter validation error.
    #[error("Parameter validation error: {0}")]
    Validation(String),
}

impl From<HttpTransportError> for MeridianHttpError {
    fn from(error: HttpTransportError) -> Self {
        Self::Transport(error.to_string())
    }
}

impl From<serde_json::Error> for MeridianHttpError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error.to_string())
    }
}

impl From<url::ParseError> for MeridianHttpError {
    fn from(error: url::ParseError) -> Self {
        Self::Validation(error.to_string())
    }
}
