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

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cloud::HttpClient;
use crate::error::UpdaterError;
use crate::ota::ota_handler::OtaHandler;
use crate::UpdaterOptions;

/// Wires the platform client to the update loop and the liveness reporter.
#[derive(Debug)]
pub struct Runtime;

impl Runtime {
    /// Spawns every task of the updater in the [`JoinSet`].
    ///
    /// The liveness reporter logs in before anything is spawned, so wrong credentials stop the
    /// start up.
    pub async fn start(
        tasks: &mut JoinSet<stable_eyre::Result<()>>,
        opts: UpdaterOptions,
        cancel: CancellationToken,
    ) -> Result<(), UpdaterError> {
        #[cfg(feature = "systemd")]
        crate::systemd_wrapper::systemd_notify_status("Initializing");

        info!(host = %opts.cloud.host, "initializing");

        let client = HttpClient::new(&opts.cloud)?;

        if let Some(liveness) = &opts.liveness {
            crate::telemetry::start(tasks, client.clone(), liveness, cancel.clone())
                .await
                .map_err(UpdaterError::Authentication)?;
        }

        OtaHandler::start(tasks, Arc::new(client), opts.ota, cancel);

        #[cfg(feature = "systemd")]
        crate::systemd_wrapper::systemd_notify_ready_status("Running");

        info!("running");

        Ok(())
    }
}
