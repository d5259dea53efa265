// This file is part of Bask-e Updater.
//
// Copyright 2026 Bask-e contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! Liveness reporting, independent from the update loop.

use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cloud::{CloudError, HttpClient};

use self::sender::Task;

pub mod sender;

pub const DEFAULT_PERIOD: Duration = Duration::from_secs(10);

/// Credentials of the user reporting the device as online.
#[derive(Clone, PartialEq, Eq)]
pub struct LivenessConfig {
    pub username: String,
    pub password: String,
    pub period: Duration,
}

impl std::fmt::Debug for LivenessConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LivenessConfig")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("period", &self.period)
            .finish()
    }
}

/// Logs in and spawns the liveness task.
///
/// A failed login is returned to the caller, the process can't report itself online without it.
pub async fn start(
    tasks: &mut JoinSet<stable_eyre::Result<()>>,
    client: HttpClient,
    config: &LivenessConfig,
    cancel: CancellationToken,
) -> Result<(), CloudError> {
    let bearer = client.login(&config.username, &config.password).await?;

    info!(period = ?config.period, "starting liveness reporter");

    let task = Task::new(client, bearer, cancel, config.period);

    tasks.spawn(async move {
        task.run().await;

        Ok(())
    });

    Ok(())
}
