// This file is part of the terraform-provider-scaleway project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, Instant};

use crate::client::ScalewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    pub timeout: Duration,
    pub interval: Duration,
}

impl WaitConfig {
    pub const fn new(timeout_secs: u64, interval_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
            interval: Duration::from_secs(interval_secs),
        }
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self::new(10 * 60, 5)
    }
}

/// Observed state of a polled resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status<T> {
    /// Target state reached
    Ready(T),
    /// Still converging, with the current state
    Pending(String),
    /// Terminal state that will never reach the target
    Failed(String),
}

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("timeout after {elapsed:?} waiting for {what} (last state: `{last_state}`)")]
    Timeout {
        what: String,
        elapsed: Duration,
        last_state: String,
    },
    #[error("{what} reached failure state `{state}`")]
    Failed { what: String, state: String },
    #[error(transparent)]
    Api(#[from] ScalewayError),
}

/// Poll until the resource reaches its target state, fails, or `config.timeout` elapses
pub async fn wait_for<T, F, Fut>(
    what: &str,
    config: &WaitConfig,
    mut poll: F,
) -> Result<T, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Status<T>, ScalewayError>>,
{
    let start = Instant::now();
    let mut last_state = String::new();

    loop {
        match poll().await? {
            Status::Ready(value) => {
                tracing::debug!(what, elapsed = ?start.elapsed(), "wait complete");
                return Ok(value);
            }
            Status::Failed(state) => {
                return Err(WaitError::Failed {
                    what: what.to_owned(),
                    state,
                })
            }
            Status::Pending(state) => {
                if state != last_state {
                    tracing::info!(what, %state, "waiting");
                }
                last_state = state;
            }
        }

        let elapsed = start.elapsed();
        if elapsed + config.interval > config.timeout {
            return Err(WaitError::Timeout {
                what: what.to_owned(),
                elapsed,
                last_state,
            });
        }
        sleep(config.interval).await;
    }
}

/// Poll until the resource is gone
///
/// `poll` returns the current state of the resource; a not-found error ends the wait.
pub async fn wait_for_deletion<F, Fut>(
    what: &str,
    config: &WaitConfig,
    mut poll: F,
) -> Result<(), WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, ScalewayError>>,
{
    wait_for(what, config, || {
        let state = poll();
        async move {
            match state.await {
                Ok(state) => Ok(Status::Pending(state)),
                Err(err) if err.is_not_found() => Ok(Status::Ready(())),
                Err(err) => Err(err),
            }
        }
    })
    .await
}
