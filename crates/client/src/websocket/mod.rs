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

//! WebSocket session management for Meridian streaming APIs.
//!
//! Features:
//! - Bearer token carried in-band via sub-protocol negotiation
//! - Session state machine as the single point of truth for liveness
//! - Automatic reconnection under the ramp-then-plateau delay schedule
//! - Heartbeat ping task
//! - Cancellable sends with bounded physical retries

pub mod backoff;
pub mod client;
pub mod config;
pub mod error;

pub use backoff::{Backoff, next_delay_secs};
pub use client::{MeridianWebSocketClient, SessionEvent, SessionState};
pub use config::MeridianWebSocketConfig;
pub use error::MeridianWsError;
