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

//! Command Line options and configurations

use std::path::PathBuf;
use std::time::Duration;

use baske_updater::cloud::DEFAULT_TIMEOUT;
use baske_updater::telemetry::{LivenessConfig, DEFAULT_PERIOD};
use baske_updater::CloudConfig;
use clap::{Args, Parser};
use serde::Deserialize;
use stable_eyre::eyre::{bail, OptionExt};
use url::Url;

#[derive(Debug, Parser)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    display_name = "Bask-e Updater",
    long_about = env!("CARGO_PKG_DESCRIPTION"),
    version,
)]
pub struct Cli {
    /// Override configuration file path
    #[arg(short, long, env = "BASKE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub cloud: CloudArgs,

    #[command(flatten)]
    pub liveness: LivenessArgs,
}

#[derive(Debug, Clone, Default, Args, Deserialize)]
#[command(next_help_heading = "Platform Options")]
pub struct CloudArgs {
    /// Base url of the IoT platform.
    #[arg(long, env = "BASKE_HOST")]
    pub host: Option<Url>,
    /// Access token of the device.
    #[arg(long, env = "BASKE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
    /// Timeout of every request in seconds.
    #[arg(long, env = "BASKE_TIMEOUT")]
    pub timeout: Option<u64>,
    /// Ignores invalid TLS certificates of the platform.
    #[arg(long, env = "BASKE_IGNORE_SSL")]
    pub ignore_ssl: Option<bool>,
}

impl CloudArgs {
    pub fn merge(&mut self, other: Self) {
        self.host.merge(other.host);
        self.token.merge(other.token);
        self.timeout.merge(other.timeout);
        self.ignore_ssl.merge(other.ignore_ssl);
    }
}

impl TryFrom<CloudArgs> for CloudConfig {
    type Error = stable_eyre::eyre::Error;

    fn try_from(value: CloudArgs) -> Result<Self, Self::Error> {
        let host = value.host.ok_or_eyre("config is missing the platform host")?;
        let token = value.token.ok_or_eyre("config is missing the device token")?;

        Ok(Self {
            host,
            token,
            timeout: value
                .timeout
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
            ignore_ssl: value.ignore_ssl.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, Args, Deserialize)]
#[command(next_help_heading = "Liveness Options")]
pub struct LivenessArgs {
    /// User reporting the device online.
    #[arg(long, env = "BASKE_USERNAME")]
    pub username: Option<String>,
    /// Password of the user reporting the device online.
    #[arg(long, env = "BASKE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    /// Seconds between two online status.
    #[arg(long = "liveness-period", env = "BASKE_LIVENESS_PERIOD")]
    pub period: Option<u64>,
}

impl LivenessArgs {
    pub fn merge(&mut self, other: Self) {
        self.username.merge(other.username);
        self.password.merge(other.password);
        self.period.merge(other.period);
    }

    /// The reporter is disabled when no credentials are given.
    pub fn into_config(self) -> stable_eyre::Result<Option<LivenessConfig>> {
        let period = self
            .period
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_PERIOD);

        match (self.username, self.password) {
            (None, None) => Ok(None),
            (Some(username), Some(password)) => Ok(Some(LivenessConfig {
                username,
                password,
                period,
            })),
            (Some(_), None) => bail!("config is missing the liveness password"),
            (None, Some(_)) => bail!("config is missing the liveness username"),
        }
    }
}

pub trait OverrideOption {
    fn merge(&mut self, value: Self);
}

impl<T> OverrideOption for Option<T> {
    fn merge(&mut self, value: Self) {
        if value.is_some() {
            *self = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn should_override_options() {
        let mut opt = Some(1);

        opt.merge(None);
        assert_eq!(opt, Some(1));

        opt.merge(Some(2));
        assert_eq!(opt, Some(2));
    }

    #[test]
    fn cloud_defaults() {
        let args = CloudArgs {
            host: Some(Url::parse("https://iot.example.com").unwrap()),
            token: Some("tkn".to_string()),
            timeout: None,
            ignore_ssl: None,
        };

        let config = CloudConfig::try_from(args).unwrap();

        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(!config.ignore_ssl);

        assert!(CloudConfig::try_from(CloudArgs::default()).is_err());
    }

    #[test]
    fn liveness_needs_both_credentials() {
        assert_eq!(LivenessArgs::default().into_config().unwrap(), None);

        let only_user = LivenessArgs {
            username: Some("admin".to_string()),
            ..Default::default()
        };
        assert!(only_user.into_config().is_err());

        let both = LivenessArgs {
            username: Some("admin".to_string()),
            password: Some("secret".to_string()),
            period: Some(3),
        };
        let config = both.into_config().unwrap().unwrap();
        assert_eq!(config.period, Duration::from_secs(3));
    }
}
