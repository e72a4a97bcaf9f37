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

//! Error structures and enumerations for the Meridian WebSocket integration.

use thiserror::Error;

use super::client::SessionState;
use crate::{common::token::MeridianAuthError, http::error::MeridianHttpError};

/// A typed error enumeration for the Meridian WebSocket client.
#[derive(Debug, Clone, Error)]
pub enum MeridianWsError {
    /// The session is in a state that cannot accept the operation.
    #[error("Session is {state} and cannot send")]
    SessionState {
        /// The offending session state.
        state: SessionState,
    },
    /// The handshake could not be completed (resolution, token, connect).
    #[error("Connection error: {0}")]
    Connection(String),
    /// No usable token could be obtained for the handshake.
    #[error("Authentication error: {0}")]
    Auth(#[from] MeridianAuthError),
    /// A physical send failed after exhausting its retry bound.
    #[error("Send failed: {0}")]
    Send(String),
    /// The operation was aborted by the session's cancellation signal.
    #[error("Operation canceled: {0}")]
    Canceled(String),
}

impl From<MeridianHttpError> for MeridianWsError {
    fn from(error: MeridianHttpError) -> Self {
        match error {
            MeridianHttpError::Auth(auth) => Self::Auth(auth),
            other => Self::Connection(other.to_string()),
        }
    }
}
