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

//! Client library for the Meridian platform gateway.
//!
//! Meridian exposes its concrete endpoints through a self-describing
//! discovery document: clients fetch `GET <root>/api/version` once, obtain a
//! mapping from logical API names to endpoint descriptors, and address every
//! subsequent call by name. All traffic is authenticated with a bearer token
//! whose lifecycle (fixed, environment-sourced, or credential-exchanged) is
//! managed by a shared token provider.
//!
//! This crate provides the resilient connection layer for that model:
//!
//! - [`common::token::TokenProvider`]: token acquisition, refresh and
//!   revocation across the supported strategies.
//! - [`http::discovery::EndpointResolver`]: lazy discovery fetch with a
//!   shareable cache so co-located handlers avoid redundant round trips.
//! - [`http::client::MeridianHttpClient`]: authenticated request execution
//!   with bounded transport retries and reactive re-authentication on 401.
//! - [`websocket::client::MeridianWebSocketClient`]: a persistent session
//!   with an explicit state machine, in-band token negotiation, and
//!   reconnect-with-backoff.
//!
//! Model types for specific gateway resources, configuration file loading
//! and any CLI surface live in the crates embedding this one.

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod common;
pub mod config;
pub mod http;
pub mod retry;
pub mod websocket;
