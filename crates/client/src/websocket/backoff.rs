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

//! Delay schedule for WebSocket send retries and reconnects.
//!
//! The schedule is a monotonic ramp with a randomized plateau rather than a
//! classic exponential backoff: the delay grows by one second up to ten
//! seconds, by ten seconds up to one minute, and then settles on a jittered
//! ceiling so a fleet of clients does not reconnect in lockstep. Gateway
//! deployments are provisioned around this exact shape, so keep it intact.

use std::time::Duration;

use rand::Rng;

const FINE_RAMP_CEILING_SECS: u64 = 10;
const COARSE_RAMP_CEILING_SECS: u64 = 60;
const PLATEAU_JITTER_SECS: u64 = 540;

/// Computes the delay following `prev` seconds.
///
/// The result is `prev + 1` below 10 seconds, `prev + 10` below 60 seconds,
/// and a random value in `[60, 600)` once the ramp has reached a minute.
#[must_use]
pub fn next_delay_secs(prev: u64) -> u64 {
    next_delay_secs_with(prev, |bound| rand::rng().random_range(0..bound))
}

fn next_delay_secs_with<F>(prev: u64, jitter: F) -> u64
where
    F: FnOnce(u64) -> u64,
{
    if prev < FINE_RAMP_CEILING_SECS {
        prev + 1
    } else if prev < COARSE_RAMP_CEILING_SECS {
        prev + 10
    } else {
        COARSE_RAMP_CEILING_SECS + jitter(PLATEAU_JITTER_SECS)
    }
}

/// Tracks the current delay across a sequence of attempts.
///
/// The delay starts at zero so the first attempt of a sequence proceeds
/// without waiting.
#[derive(Clone, Debug, Default)]
pub struct Backoff {
    delay_secs: u64,
}

impl Backoff {
    /// Creates a new [`Backoff`] cursor starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current delay.
    #[must_use]
    pub fn current(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }

    /// Advances the cursor to the next delay in the schedule.
    pub fn advance(&mut self) {
        self.delay_secs = next_delay_secs(self.delay_secs);
    }

    /// Resets the cursor to zero.
    pub fn reset(&mut self) {
        self.delay_secs = 0;
    }
}
