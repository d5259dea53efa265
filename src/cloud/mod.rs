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

//! Access to the IoT platform device API.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)]
use mockall::automock;
use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

use crate::ota::PackageKind;

pub use self::http::HttpClient;

mod http;

/// Default timeout for every request to the platform.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection parameters for the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudConfig {
    /// Base url of the platform, e.g. `https://iot.example.com`
    pub host: Url,
    /// Device access token
    pub token: String,
    pub timeout: Duration,
    /// Accept invalid TLS certificates
    pub ignore_ssl: bool,
}

#[derive(Debug, displaydoc::Display, thiserror::Error)]
pub enum CloudError {
    /// couldn't build the HTTP client
    Client(#[source] reqwest::Error),
    /// the url {0} cannot be used as a base
    BaseUrl(Url),
    /// HTTP request failed
    Request(#[from] reqwest::Error),
    /// login response is missing the token
    MissingToken,
}

impl CloudError {
    /// Returns the HTTP status of a failed request, if the server answered.
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            CloudError::Request(err) => err.status(),
            CloudError::Client(_) | CloudError::BaseUrl(_) | CloudError::MissingToken => None,
        }
    }
}

/// Query parameters of a package chunk request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub size: u64,
    pub chunk: u64,
}

/// Device side API used by the OTA pipeline.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CloudClient: Send + Sync {
    /// Reads the given shared attributes, keys the platform doesn't know are omitted.
    async fn shared_attributes(&self, keys: &[String]) -> Result<Map<String, Value>, CloudError>;

    /// Downloads a single chunk of a package.
    async fn package_chunk(&self, kind: PackageKind, query: &ChunkQuery)
        -> Result<Bytes, CloudError>;

    async fn send_telemetry(&self, telemetry: &Value) -> Result<(), CloudError>;
}
