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

//! Task to send the online status.

use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::cloud::HttpClient;

#[derive(Debug)]
pub struct Task {
    client: HttpClient,
    bearer: String,
    cancel: CancellationToken,
    period: Duration,
}

impl Task {
    pub fn new(client: HttpClient, bearer: String, cancel: CancellationToken, period: Duration) -> Self {
        Self {
            client,
            bearer,
            cancel,
            period,
        }
    }

    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.period);

        loop {
            match self.cancel.run_until_cancelled(interval.tick()).await {
                Some(_) => {
                    trace!("sending online status");

                    self.send().await;
                }
                None => {
                    debug!("liveness task cancelled");

                    break;
                }
            }
        }
    }

    async fn send(&self) {
        let status = json!({"status": "online"});

        if let Err(err) = self.client.send_status(&self.bearer, &status).await {
            error!(
                error = format!("{:#}", stable_eyre::Report::new(err)),
                "couldn't send the online status"
            );
        }
    }
}
