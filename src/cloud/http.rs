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

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument, trace};
use url::Url;

use super::{ChunkQuery, CloudClient, CloudConfig, CloudError};
use crate::ota::PackageKind;

#[derive(Debug, Deserialize)]
struct AttributesResponse {
    #[serde(default)]
    shared: Map<String, Value>,
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: Option<String>,
}

/// Client for the platform HTTP device API.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    host: Url,
    token: String,
}

impl HttpClient {
    pub fn new(config: &CloudConfig) -> Result<Self, CloudError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.ignore_ssl)
            .build()
            .map_err(CloudError::Client)?;

        Ok(Self {
            client,
            host: config.host.clone(),
            token: config.token.clone(),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, CloudError> {
        let mut url = self.host.clone();

        url.path_segments_mut()
            .map_err(|()| CloudError::BaseUrl(self.host.clone()))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    /// Url of a device API endpoint, authenticated by the access token in the path.
    fn device_url(&self, endpoint: &str) -> Result<Url, CloudError> {
        self.url(&["api", "v1", self.token.as_str(), endpoint])
    }

    /// Exchanges the user credentials for a bearer token.
    #[instrument(skip_all, fields(%username))]
    pub async fn login(&self, username: &str, password: &str) -> Result<String, CloudError> {
        let url = self.url(&["api", "auth", "login"])?;

        let res: LoginResponse = self
            .client
            .post(url)
            .json(&Credentials { username, password })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!("logged in");

        res.token.ok_or(CloudError::MissingToken)
    }

    /// Sends telemetry on behalf of an authenticated user.
    pub async fn send_status(&self, bearer: &str, telemetry: &Value) -> Result<(), CloudError> {
        let url = self.device_url("telemetry")?;

        self.client
            .post(url)
            .bearer_auth(bearer)
            .json(telemetry)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

#[async_trait]
impl CloudClient for HttpClient {
    async fn shared_attributes(&self, keys: &[String]) -> Result<Map<String, Value>, CloudError> {
        let url = self.device_url("attributes")?;

        let res: AttributesResponse = self
            .client
            .get(url)
            .query(&[("sharedKeys", keys.join(","))])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        trace!(attributes = ?res.shared, "shared attributes received");

        Ok(res.shared)
    }

    async fn package_chunk(
        &self,
        kind: PackageKind,
        query: &ChunkQuery,
    ) -> Result<Bytes, CloudError> {
        let url = self.device_url(kind.endpoint())?;

        let bytes = self
            .client
            .get(url)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        Ok(bytes)
    }

    async fn send_telemetry(&self, telemetry: &Value) -> Result<(), CloudError> {
        let url = self.device_url("telemetry")?;

        self.client
            .post(url)
            .json(telemetry)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}
