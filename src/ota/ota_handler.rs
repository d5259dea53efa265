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
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::applier::ArchiveApplier;
use super::config::OtaConfig;
use super::ota_handle::Ota;
use super::{CurrentInstalled, PackageKind, UpdateState};
use crate::cloud::CloudClient;

/// Spawns the update polling loop.
#[derive(Debug)]
pub struct OtaHandler;

impl OtaHandler {
    pub fn start<C>(
        tasks: &mut JoinSet<stable_eyre::Result<()>>,
        client: Arc<C>,
        config: OtaConfig,
        cancel: CancellationToken,
    ) where
        C: CloudClient + 'static,
    {
        info!(kind = %config.kind, "starting OTA polling loop");

        let applier = ArchiveApplier::new(&config);
        let ota = Ota::new(client, applier, config);

        tasks.spawn(ota.run(cancel));
    }
}

/// Reports the update state of the package to the platform.
#[derive(Debug)]
pub struct OtaPublisher<C: ?Sized> {
    client: Arc<C>,
    kind: PackageKind,
    delay: Duration,
}

impl<C> OtaPublisher<C>
where
    C: CloudClient + ?Sized,
{
    pub fn new(client: Arc<C>, kind: PackageKind, delay: Duration) -> Self {
        Self {
            client,
            kind,
            delay,
        }
    }

    /// Builds `{current_<p>_title, current_<p>_version, <p>_state}`.
    pub fn telemetry(&self, current: &CurrentInstalled, state: Option<UpdateState>) -> Value {
        let mut map = Map::new();

        let title = format!("current_{}", self.kind.attribute(super::attributes::TITLE));
        let version = format!("current_{}", self.kind.attribute(super::attributes::VERSION));

        map.insert(title, current.title.clone().into());
        map.insert(version, current.version.clone().into());

        if let Some(state) = state {
            map.insert(self.kind.attribute("state"), state.as_str().into());
        }

        Value::Object(map)
    }

    /// Waits for the pacing delay then sends the telemetry, failures are only logged.
    pub async fn send_state(&self, current: &CurrentInstalled, state: Option<UpdateState>) {
        tokio::time::sleep(self.delay).await;

        let telemetry = self.telemetry(current, state);

        debug!(%telemetry, "sending current info");

        if let Err(err) = self.client.send_telemetry(&telemetry).await {
            error!(
                error = format!("{:#}", stable_eyre::Report::new(err)),
                "couldn't send the update state"
            );
        }

        #[cfg(feature = "systemd")]
        if let Some(state) = state {
            crate::systemd_wrapper::systemd_notify_update_state(self.kind, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::cloud::{CloudError, MockCloudClient};

    #[test]
    fn should_build_telemetry() {
        let publisher = OtaPublisher::new(
            Arc::new(MockCloudClient::new()),
            PackageKind::Software,
            Duration::ZERO,
        );

        let current = CurrentInstalled {
            title: Some("sw-1.0.zip".to_string()),
            version: Some("1.0".to_string()),
        };

        assert_eq!(
            publisher.telemetry(&current, Some(UpdateState::Verified)),
            json!({
                "current_sw_title": "sw-1.0.zip",
                "current_sw_version": "1.0",
                "sw_state": "VERIFIED",
            })
        );

        assert_eq!(
            publisher.telemetry(&CurrentInstalled::default(), None),
            json!({
                "current_sw_title": null,
                "current_sw_version": null,
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_wait_before_sending() {
        let mut client = MockCloudClient::new();

        client
            .expect_send_telemetry()
            .with(predicate::eq(json!({
                "current_fw_title": null,
                "current_fw_version": null,
                "fw_state": "DOWNLOADING",
            })))
            .once()
            .returning(|_| Ok(()));

        let publisher = OtaPublisher::new(
            Arc::new(client),
            PackageKind::Firmware,
            Duration::from_secs(1),
        );

        let start = tokio::time::Instant::now();

        publisher
            .send_state(&CurrentInstalled::default(), Some(UpdateState::Downloading))
            .await;

        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn telemetry_errors_are_ignored() {
        let mut client = MockCloudClient::new();

        client
            .expect_send_telemetry()
            .once()
            .returning(|_| Err(CloudError::MissingToken));

        let publisher = OtaPublisher::new(Arc::new(client), PackageKind::Firmware, Duration::ZERO);

        publisher
            .send_state(&CurrentInstalled::default(), Some(UpdateState::Failed))
            .await;
    }
}
