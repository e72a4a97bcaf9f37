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

//! HTTP integration for the Meridian gateway REST APIs.

pub mod client;
pub mod discovery;
pub mod error;
pub mod request;
pub mod transport;

pub use client::MeridianHttpClient;
pub use discovery::{ApiDescriptor, EndpointMap, EndpointResolver};
pub use error::MeridianHttpError;
pub use request::{HttpRequest, RequestTarget};
pub use transport::{HttpResponse, HttpTransport, HttpTransportConfig, HttpTransportError};
