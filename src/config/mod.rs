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

use baske_updater::ota::config::OtaConfig;
use baske_updater::UpdaterOptions;
use serde::Deserialize;
use stable_eyre::eyre::ensure;
use tracing::info;

use crate::cli::{Cli, CloudArgs, LivenessArgs};

/// Configuration file
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    pub cloud: Option<CloudArgs>,
    pub liveness: Option<LivenessArgs>,
    pub ota: Option<OtaConfig>,
}

impl Config {
    /// Command line options take precedence over the file.
    fn merge(&mut self, cli: Cli) {
        match &mut self.cloud {
            Some(cloud) => cloud.merge(cli.cloud),
            None => self.cloud = Some(cli.cloud),
        }

        match &mut self.liveness {
            Some(liveness) => liveness.merge(cli.liveness),
            None => self.liveness = Some(cli.liveness),
        }
    }
}

impl TryFrom<Config> for UpdaterOptions {
    type Error = stable_eyre::eyre::Error;

    fn try_from(value: Config) -> Result<Self, Self::Error> {
        let cloud = value.cloud.unwrap_or_default().try_into()?;
        let liveness = value.liveness.unwrap_or_default().into_config()?;
        let ota = value.ota.unwrap_or_default();

        Ok(Self {
            cloud,
            ota,
            liveness,
        })
    }
}

/// First existing file among `--config` and the default locations.
fn config_file(cli_path: Option<&Path>) -> Option<PathBuf> {
    let defaults = [
        Path::new("baske-updater.toml"),
        Path::new("/etc/baske/updater.toml"),
    ];

    cli_path
        .into_iter()
        .chain(defaults)
        .find(|f| f.is_file())
        .map(Path::to_path_buf)
}

pub async fn read_options(cli: Cli) -> stable_eyre::Result<UpdaterOptions> {
    if let Some(path) = &cli.config {
        ensure!(
            path.exists(),
            "configuration file {} doesn't exists",
            path.display()
        );
    }

    let mut config: Config = if let Some(path) = config_file(cli.config.as_deref()) {
        info!(config = %path.display(), "reading config file");

        let config = tokio::fs::read_to_string(&path).await?;

        toml::from_str(&config)?
    } else {
        Config::default()
    };

    config.merge(cli);

    config.try_into()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use baske_updater::ota::config::FailureInjection;
    use baske_updater::ota::PackageKind;
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use tempdir::TempDir;

    use super::*;

    const CONFIG: &str = r#"
    [cloud]
    host = "https://iot.example.com"
    token = "file-token"
    timeout = 5

    [liveness]
    username = "admin"
    password = "secret"

    [ota]
    kind = "software"
    chunk_size = 4096
    failure_injection = "dice"
    "#;

    #[test]
    fn should_convert_config() {
        let config: Config = toml::from_str(CONFIG).unwrap();

        let options = UpdaterOptions::try_from(config).unwrap();

        assert_eq!(options.cloud.host.as_str(), "https://iot.example.com/");
        assert_eq!(options.cloud.token, "file-token");
        assert_eq!(options.cloud.timeout, Duration::from_secs(5));
        assert_eq!(options.ota.kind, PackageKind::Software);
        assert_eq!(options.ota.chunk_size, 4096);
        assert_eq!(options.ota.failure_injection, FailureInjection::Dice);

        let liveness = options.liveness.unwrap();
        assert_eq!(liveness.username, "admin");
        assert_eq!(liveness.period, Duration::from_secs(10));
    }

    #[test]
    fn example_config_is_valid() {
        let config: Config =
            toml::from_str(include_str!("../../baske-updater.example.toml")).unwrap();

        let options = UpdaterOptions::try_from(config).unwrap();

        assert_eq!(options.ota.poll_interval, 10);
        assert_eq!(options.ota.restart_unit(), Some("ota_update.service"));
        assert!(options.ota.run_install_script());
    }

    #[test]
    fn missing_token_is_an_error() {
        let config: Config = toml::from_str(
            r#"
            [cloud]
            host = "https://iot.example.com"
            "#,
        )
        .unwrap();

        assert!(UpdaterOptions::try_from(config).is_err());
    }

    #[tokio::test]
    async fn cli_overrides_file() {
        let dir = TempDir::new("baske-config").unwrap();
        let path = dir.path().join("updater.toml");
        tokio::fs::write(&path, CONFIG).await.unwrap();

        let cli = Cli::try_parse_from([
            "baske-updater",
            "--config",
            path.to_str().unwrap(),
            "--token",
            "cli-token",
        ])
        .unwrap();

        let options = read_options(cli).await.unwrap();

        assert_eq!(options.cloud.token, "cli-token");
        assert_eq!(options.cloud.host.as_str(), "https://iot.example.com/");
    }

    #[test]
    fn cli_config_file_comes_first() {
        let dir = TempDir::new("baske-config").unwrap();
        let path = dir.path().join("updater.toml");
        std::fs::write(&path, CONFIG).unwrap();

        assert_eq!(config_file(Some(&path)), Some(path.clone()));
        assert_eq!(config_file(Some(dir.path())).as_deref(), config_file(None).as_deref());
    }

    #[tokio::test]
    async fn missing_config_file() {
        let cli = Cli::try_parse_from([
            "baske-updater",
            "--config",
            "/nonexistent/baske-updater.toml",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/nonexistent/baske-updater.toml")));

        assert!(read_options(cli).await.is_err());
    }
}
