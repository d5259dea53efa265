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

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use super::checksum::{DiceRoll, FailureSimulator, NoFailures};
use super::PackageKind;

const DEFAULT_SCRATCH_DIRECTORY: &str = "/tmp/ota_update";
const DEFAULT_SERVICE_UNIT: &str = "ota_update.service";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct OtaConfig {
    #[serde(default)]
    pub kind: PackageKind,
    /// Size of the download chunks in bytes, 0 downloads the package with a single request
    #[serde(default)]
    pub chunk_size: u64,
    /// Seconds between two polls of the shared attributes
    #[serde(default = "default_secs")]
    pub poll_interval: u64,
    /// Seconds to wait before every state telemetry
    #[serde(default = "default_secs")]
    pub telemetry_delay: u64,
    #[serde(default = "default_download_directory")]
    pub download_directory: PathBuf,
    #[serde(default = "default_scratch_directory")]
    pub scratch_directory: PathBuf,
    /// Unit restarted after the package is applied, an empty string skips the restart
    #[serde(default = "default_service_unit")]
    pub service_unit: Option<String>,
    /// Run the `install.sh` shipped in the package, defaults to `true` only for software
    #[serde(default)]
    pub install_script: Option<bool>,
    /// Run the external commands through `sudo`
    #[serde(default = "default_sudo")]
    pub sudo: bool,
    #[serde(default)]
    pub failure_injection: FailureInjection,
}

impl OtaConfig {
    pub fn poll_interval_duration(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn telemetry_delay_duration(&self) -> Duration {
        Duration::from_secs(self.telemetry_delay)
    }

    pub fn restart_unit(&self) -> Option<&str> {
        self.service_unit.as_deref().filter(|unit| !unit.is_empty())
    }

    pub fn run_install_script(&self) -> bool {
        self.install_script.unwrap_or(self.kind == PackageKind::Software)
    }
}

impl Default for OtaConfig {
    fn default() -> Self {
        Self {
            kind: PackageKind::default(),
            chunk_size: 0,
            poll_interval: default_secs(),
            telemetry_delay: default_secs(),
            download_directory: default_download_directory(),
            scratch_directory: default_scratch_directory(),
            service_unit: default_service_unit(),
            install_script: None,
            sudo: default_sudo(),
            failure_injection: FailureInjection::default(),
        }
    }
}

fn default_secs() -> u64 {
    1
}

fn default_download_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_scratch_directory() -> PathBuf {
    PathBuf::from(DEFAULT_SCRATCH_DIRECTORY)
}

fn default_service_unit() -> Option<String> {
    Some(DEFAULT_SERVICE_UNIT.to_string())
}

fn default_sudo() -> bool {
    true
}

/// Simulated failures of the checksum verification
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailureInjection {
    #[default]
    Disabled,
    /// Fails one verification out of three on average
    Dice,
}

impl FailureInjection {
    pub fn simulator(&self) -> Box<dyn FailureSimulator> {
        match self {
            FailureInjection::Disabled => Box::new(NoFailures),
            FailureInjection::Dice => Box::new(DiceRoll::default()),
        }
    }
}
