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

//! Meridian credential storage for the password token exchange.

use core::fmt::Debug;

use zeroize::ZeroizeOnDrop;

/// Login credentials exchanged against the gateway token endpoint.
///
/// The username and password are only ever sent to the token exchange
/// endpoint; every other call carries the bearer token obtained from it.
#[derive(Clone, ZeroizeOnDrop)]
pub struct Credential {
    username: Box<str>,
    password: Box<str>,
}

impl Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(Credential))
            .field("username", &self.masked_username())
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credential {
    /// Creates a new [`Credential`] instance from the username and password.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into().into_boxed_str(),
            password: password.into().into_boxed_str(),
        }
    }

    /// Returns the username associated with this credential.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the password associated with this credential.
    ///
    /// # Safety
    ///
    /// The password should be handled carefully and never logged or exposed.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Returns a masked version of the username for logging purposes.
    ///
    /// Shows first 2 and last 2 characters with ellipsis in between.
    /// For usernames shorter than 5 characters, shows asterisks only.
    #[must_use]
    pub fn masked_username(&self) -> String {
        let name = self.username.as_ref();
        let len = name.len();

        if len <= 4 {
            "*".repeat(len)
        } else {
            format!("{}...{}", &name[..2], &name[len - 2..])
        }
    }
}
