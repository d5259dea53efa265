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

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use super::applier::PackageApplier;
use super::attributes::fetch_metadata;
use super::checksum::Verifier;
use super::config::OtaConfig;
use super::fetcher::fetch_package;
use super::ota_handler::OtaPublisher;
use super::{CurrentInstalled, OtaError, PackageMetadata, UpdateState};
use crate::cloud::CloudClient;

/// Version reported to the applier when nothing was installed yet.
const NO_VERSION: &str = "none";

/// Result of a single poll of the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The metadata couldn't be read, nothing was done
    MetadataUnavailable,
    /// The announced package is the one already installed
    UpToDate,
    /// The download was aborted
    FetchFailed,
    /// The checksum didn't match, the package was downloaded a second time
    VerificationFailed,
    /// The package was installed, `applied` is `false` if the applier reported a failure
    Updated { applied: bool },
}

/// Update state machine, it owns the currently installed package.
#[derive(Debug)]
pub struct Ota<C: ?Sized, A> {
    client: Arc<C>,
    applier: A,
    publisher: OtaPublisher<C>,
    verifier: Arc<Verifier>,
    config: OtaConfig,
    current: CurrentInstalled,
}

impl<C, A> Ota<C, A>
where
    C: CloudClient + ?Sized,
    A: PackageApplier,
{
    pub fn new(client: Arc<C>, applier: A, config: OtaConfig) -> Self {
        let publisher = OtaPublisher::new(
            Arc::clone(&client),
            config.kind,
            config.telemetry_delay_duration(),
        );
        let verifier = Arc::new(Verifier::new(config.failure_injection.simulator()));

        Self {
            client,
            applier,
            publisher,
            verifier,
            config,
            current: CurrentInstalled::default(),
        }
    }

    async fn publish(&self, state: UpdateState) {
        self.publisher.send_state(&self.current, Some(state)).await;
    }

    async fn download(&self, metadata: &PackageMetadata) -> Option<Bytes> {
        let res = fetch_package(
            self.client.as_ref(),
            self.config.kind,
            metadata,
            self.config.chunk_size,
        )
        .await;

        match res {
            Ok(package) => Some(package),
            Err(err) => {
                error!(
                    error = format!("{:#}", stable_eyre::Report::new(err)),
                    "couldn't download the package"
                );

                None
            }
        }
    }

    /// Hashes the package on the blocking pool.
    async fn verify(&self, metadata: &PackageMetadata, package: Bytes) -> bool {
        let verifier = Arc::clone(&self.verifier);
        let algorithm = metadata.checksum_algorithm.clone();
        let expected = metadata.checksum.clone();

        let res = tokio::task::spawn_blocking(move || {
            verifier.verify(&package, algorithm.as_deref(), expected.as_deref())
        })
        .await;

        match res {
            Ok(verified) => verified,
            Err(err) => {
                error!(
                    error = format!("{:#}", stable_eyre::Report::new(err)),
                    "checksum task failed"
                );

                false
            }
        }
    }

    /// Writes the package in the download directory, named after the last component of the title.
    async fn store(&self, metadata: &PackageMetadata, package: &[u8]) -> Result<PathBuf, OtaError> {
        let name = metadata
            .title
            .as_deref()
            .map(Path::new)
            .and_then(Path::file_name)
            .ok_or_else(|| OtaError::InvalidTitle(metadata.title.clone()))?;

        let path = self.config.download_directory.join(name);

        tokio::fs::write(&path, package)
            .await
            .map_err(|err| OtaError::Store {
                path: path.display().to_string(),
                err,
            })?;

        debug!(path = %path.display(), "package stored");

        Ok(path)
    }

    async fn install(&self, metadata: &PackageMetadata, package: &[u8]) -> bool {
        let path = match self.store(metadata, package).await {
            Ok(path) => path,
            Err(err) => {
                error!(
                    error = format!("{:#}", stable_eyre::Report::new(err)),
                    "couldn't store the package"
                );

                return false;
            }
        };

        let from = self.current.version.as_deref().unwrap_or(NO_VERSION);
        let to = metadata.version.as_deref().unwrap_or(NO_VERSION);

        self.applier.apply(&path, from, to).await
    }

    /// Polls the platform once and drives a full update if a new package is announced.
    #[instrument(skip_all, fields(kind = %self.config.kind))]
    pub async fn poll_once(&mut self) -> CycleOutcome {
        let metadata = match fetch_metadata(self.client.as_ref(), self.config.kind).await {
            Ok(metadata) => metadata,
            Err(err) => {
                error!(
                    error = format!("{:#}", stable_eyre::Report::new(err)),
                    "couldn't get the package info"
                );

                return CycleOutcome::MetadataUnavailable;
            }
        };

        if !metadata.is_new(&self.current) {
            trace!("no new package");

            return CycleOutcome::UpToDate;
        }

        info!(
            title = ?metadata.title,
            version = ?metadata.version,
            "new package available"
        );

        self.publish(UpdateState::Downloading).await;

        let Some(package) = self.download(&metadata).await else {
            return CycleOutcome::FetchFailed;
        };

        self.publish(UpdateState::Downloaded).await;

        if !self.verify(&metadata, package.clone()).await {
            warn!("checksum verification failed");

            self.publish(UpdateState::Failed).await;

            // the second copy is discarded, the next cycle starts over from the metadata
            let _ = self.download(&metadata).await;

            return CycleOutcome::VerificationFailed;
        }

        info!("checksum verified");

        self.publish(UpdateState::Verified).await;
        self.publish(UpdateState::Updating).await;

        let applied = self.install(&metadata, &package).await;
        if !applied {
            warn!("the package wasn't applied, it's recorded as installed anyway");
        }

        self.current = CurrentInstalled::from(&metadata);

        self.publish(UpdateState::Updated).await;

        CycleOutcome::Updated { applied }
    }

    async fn poll_loop(&mut self) {
        self.publisher.send_state(&self.current, None).await;

        let interval = self.config.poll_interval_duration();

        loop {
            let outcome = self.poll_once().await;

            debug!(?outcome, "poll completed");

            if outcome != CycleOutcome::VerificationFailed {
                tokio::time::sleep(interval).await;
            }
        }
    }

    /// Runs the polling loop until cancelled.
    pub async fn run(mut self, cancel: CancellationToken) -> stable_eyre::Result<()> {
        info!("getting package info");

        if cancel.run_until_cancelled(self.poll_loop()).await.is_none() {
            info!(current = ?self.current, "OTA polling loop cancelled");
        }

        Ok(())
    }
}
