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

//! Configuration for Meridian WebSocket sessions.

use std::fmt::Debug;

use url::Url;

use crate::common::consts::{
    DEFAULT_MAX_RESTART_ATTEMPTS, DEFAULT_MAX_SEND_RETRIES, MERIDIAN_WS_PROTOCOL,
};

/// Configuration for a Meridian WebSocket session.
///
/// The default restart bound is finite: a session that cannot re-establish
/// its connection after repeated attempts transitions to a failed state
/// rather than retrying forever, so the embedding application can decide
/// whether to rebuild the session or surface the outage.
#[derive(Clone, Debug)]
pub struct MeridianWebSocketConfig {
    /// Logical name of the API the handshake endpoint is resolved from.
    pub api_name: String,
    /// Optional explicit handshake endpoint, bypassing discovery.
    pub endpoint_override: Option<String>,
    /// Application sub-protocol advertised during the handshake.
    pub protocol: String,
    /// Optional heartbeat interval (seconds); pings are sent while connected.
    pub heartbeat_secs: Option<u64>,
    /// Maximum physical send retries before the session restarts.
    pub max_send_retries: u32,
    /// Maximum consecutive reconnect attempts before the session fails.
    pub max_restart_attempts: u32,
}

impl Default for MeridianWebSocketConfig {
    fn default() -> Self {
        Self {
            api_name: "stream".to_string(),
            endpoint_override: None,
            protocol: MERIDIAN_WS_PROTOCOL.to_string(),
            heartbeat_secs: Some(20),
            max_send_retries: DEFAULT_MAX_SEND_RETRIES,
            max_restart_attempts: DEFAULT_MAX_RESTART_ATTEMPTS,
        }
    }
}

impl MeridianWebSocketConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.api_name.is_empty() {
            return Err("`api_name` must not be empty".to_string());
        }

        if self.protocol.is_empty() {
            return Err("`protocol` must not be empty".to_string());
        }

        if let Some(endpoint) = &self.endpoint_override {
            Url::parse(endpoint).map_err(|e| format!("Invalid `endpoint_override`: {e}"))?;
        }

        Ok(())
    }
}
