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

//! Constants shared across the Meridian client.

/// The `User-Agent` value sent with every HTTP request and WebSocket handshake.
pub const MERIDIAN_USER_AGENT: &str = concat!("MeridianClient/", env!("CARGO_PKG_VERSION"));

/// Well-known path of the gateway discovery document.
///
/// The document maps logical API names to concrete endpoint descriptors.
pub const MERIDIAN_DISCOVERY_PATH: &str = "/api/version";

/// Default path of the gateway token exchange endpoint.
pub const MERIDIAN_AUTH_TOKEN_PATH: &str = "/api/auth/token";

/// Default application sub-protocol advertised during the WebSocket handshake.
pub const MERIDIAN_WS_PROTOCOL: &str = "meridian.v1";

/// Prefix carrying the bearer token inside the WebSocket sub-protocol list.
///
/// The handshake cannot carry arbitrary authorization headers in every target
/// environment, so the token travels in-band as `token-<value>`.
pub const WS_TOKEN_PROTOCOL_PREFIX: &str = "token-";

/// Default HTTP request timeout (seconds).
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Default bound on transport-level retries for a single logical request.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default bound on physical send retries before a session restart.
pub const DEFAULT_MAX_SEND_RETRIES: u32 = 3;

/// Default bound on consecutive reconnect attempts before a session fails.
pub const DEFAULT_MAX_RESTART_ATTEMPTS: u32 = 10;
