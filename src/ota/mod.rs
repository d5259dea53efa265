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

//! Over the air update of the firmware or software package.

use std::fmt::Display;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::cloud::CloudError;

pub mod applier;
pub mod attributes;
pub mod checksum;
pub mod config;
pub mod fetcher;
pub(crate) mod ota_handle;
pub(crate) mod ota_handler;

/// Kind of package handled by the updater.
///
/// Selects the attribute prefix and the download endpoint.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    #[default]
    Firmware,
    Software,
}

impl PackageKind {
    pub const fn prefix(&self) -> &'static str {
        match self {
            PackageKind::Firmware => "fw",
            PackageKind::Software => "sw",
        }
    }

    pub const fn endpoint(&self) -> &'static str {
        match self {
            PackageKind::Firmware => "firmware",
            PackageKind::Software => "software",
        }
    }

    /// Prefixed attribute name, e.g. `fw_title`.
    pub fn attribute(&self, name: &str) -> String {
        format!("{}_{name}", self.prefix())
    }
}

impl Display for PackageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.endpoint())
    }
}

/// Package announced by the platform through the shared attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMetadata {
    pub checksum: Option<String>,
    pub checksum_algorithm: Option<String>,
    pub size: u64,
    pub title: Option<String>,
    pub version: Option<String>,
}

impl PackageMetadata {
    /// Reads the metadata from the prefixed shared attributes.
    pub fn from_shared(kind: PackageKind, shared: &Map<String, Value>) -> Self {
        let get = |name: &str| shared.get(&kind.attribute(name));

        let size = match get(attributes::SIZE) {
            None | Some(Value::Null) => 0,
            Some(value) => as_size(value).unwrap_or_else(|| {
                warn!(%value, "invalid package size, defaulting to 0");

                0
            }),
        };

        Self {
            checksum: get(attributes::CHECKSUM).and_then(as_text),
            checksum_algorithm: get(attributes::CHECKSUM_ALGORITHM).and_then(as_text),
            size,
            title: get(attributes::TITLE).and_then(as_text),
            version: get(attributes::VERSION).and_then(as_text),
        }
    }

    /// Returns `true` if the package differs from the installed one.
    ///
    /// A package with no title or no version is never considered new.
    pub fn is_new(&self, current: &CurrentInstalled) -> bool {
        match (&self.title, &self.version) {
            (Some(title), Some(version)) => {
                current.title.as_ref() != Some(title) || current.version.as_ref() != Some(version)
            }
            _ => false,
        }
    }
}

fn as_size(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Last package successfully applied during the lifetime of the process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentInstalled {
    pub title: Option<String>,
    pub version: Option<String>,
}

impl From<&PackageMetadata> for CurrentInstalled {
    fn from(value: &PackageMetadata) -> Self {
        Self {
            title: value.title.clone(),
            version: value.version.clone(),
        }
    }
}

/// State of the update reported to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateState {
    Downloading,
    Downloaded,
    Verified,
    Updating,
    Updated,
    Failed,
}

impl UpdateState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            UpdateState::Downloading => "DOWNLOADING",
            UpdateState::Downloaded => "DOWNLOADED",
            UpdateState::Verified => "VERIFIED",
            UpdateState::Updating => "UPDATING",
            UpdateState::Updated => "UPDATED",
            UpdateState::Failed => "FAILED",
        }
    }
}

impl Display for UpdateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Possible errors returned by the OTA pipeline.
#[derive(Debug, displaydoc::Display, thiserror::Error)]
pub enum OtaError {
    /// couldn't download chunk {chunk} of the package
    Download {
        chunk: u64,
        #[source]
        err: CloudError,
    },
    /// the package title {0:?} is not a valid file name
    InvalidTitle(Option<String>),
    /// couldn't store the package in {path}
    Store {
        path: String,
        #[source]
        err: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn shared(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("not an object"),
        }
    }

    #[test]
    fn should_prefix_attributes() {
        assert_eq!(PackageKind::Firmware.attribute("title"), "fw_title");
        assert_eq!(PackageKind::Software.attribute("version"), "sw_version");
        assert_eq!(PackageKind::Software.endpoint(), "software");
    }

    #[test]
    fn should_read_metadata() {
        let map = shared(json!({
            "fw_checksum": "abc",
            "fw_checksum_algorithm": "SHA256",
            "fw_size": 1024,
            "fw_title": "fw-2.0.zip",
            "fw_version": "2.0",
        }));

        let metadata = PackageMetadata::from_shared(PackageKind::Firmware, &map);

        assert_eq!(
            metadata,
            PackageMetadata {
                checksum: Some("abc".to_string()),
                checksum_algorithm: Some("SHA256".to_string()),
                size: 1024,
                title: Some("fw-2.0.zip".to_string()),
                version: Some("2.0".to_string()),
            }
        );
    }

    #[test]
    fn missing_attributes_are_none() {
        let map = shared(json!({
            "sw_title": "pkg.zip",
            "sw_size": "42",
            "fw_version": "ignored",
        }));

        let metadata = PackageMetadata::from_shared(PackageKind::Software, &map);

        assert_eq!(
            metadata,
            PackageMetadata {
                size: 42,
                title: Some("pkg.zip".to_string()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn numeric_version_and_invalid_size() {
        let map = shared(json!({
            "fw_version": 3,
            "fw_size": "big",
        }));

        let metadata = PackageMetadata::from_shared(PackageKind::Firmware, &map);

        assert_eq!(metadata.version.as_deref(), Some("3"));
        assert_eq!(metadata.size, 0);
    }

    #[test]
    fn should_detect_new_package() {
        let current = CurrentInstalled {
            title: Some("fw-1.0.zip".to_string()),
            version: Some("1.0".to_string()),
        };

        let same = PackageMetadata {
            title: Some("fw-1.0.zip".to_string()),
            version: Some("1.0".to_string()),
            ..Default::default()
        };
        assert!(!same.is_new(&current));

        let version = PackageMetadata {
            version: Some("1.1".to_string()),
            ..same.clone()
        };
        assert!(version.is_new(&current));

        let title = PackageMetadata {
            title: Some("fw-1.0-hotfix.zip".to_string()),
            ..same.clone()
        };
        assert!(title.is_new(&current));
    }

    #[test]
    fn missing_title_or_version_is_never_new() {
        let current = CurrentInstalled::default();

        let no_version = PackageMetadata {
            title: Some("fw.zip".to_string()),
            ..Default::default()
        };
        let no_title = PackageMetadata {
            version: Some("2.0".to_string()),
            ..Default::default()
        };

        assert!(!no_version.is_new(&current));
        assert!(!no_title.is_new(&current));
        assert!(!PackageMetadata::default().is_new(&current));
    }

    #[test]
    fn state_names() {
        let states = [
            (UpdateState::Downloading, "DOWNLOADING"),
            (UpdateState::Downloaded, "DOWNLOADED"),
            (UpdateState::Verified, "VERIFIED"),
            (UpdateState::Updating, "UPDATING"),
            (UpdateState::Updated, "UPDATED"),
            (UpdateState::Failed, "FAILED"),
        ];

        for (state, exp) in states {
            assert_eq!(state.to_string(), exp);
        }
    }
}
