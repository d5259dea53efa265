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

use tracing::{debug, instrument};

use super::{PackageKind, PackageMetadata};
use crate::cloud::{CloudClient, CloudError};

pub const CHECKSUM: &str = "checksum";
pub const CHECKSUM_ALGORITHM: &str = "checksum_algorithm";
pub const SIZE: &str = "size";
pub const TITLE: &str = "title";
pub const VERSION: &str = "version";

const KEYS: [&str; 5] = [CHECKSUM, CHECKSUM_ALGORITHM, SIZE, TITLE, VERSION];

/// Prefixed shared keys describing the package of the given kind.
pub fn shared_keys(kind: PackageKind) -> Vec<String> {
    KEYS.iter().map(|key| kind.attribute(key)).collect()
}

/// Reads the package metadata currently announced by the platform.
#[instrument(skip(client))]
pub async fn fetch_metadata<C>(client: &C, kind: PackageKind) -> Result<PackageMetadata, CloudError>
where
    C: CloudClient + ?Sized,
{
    let shared = client.shared_attributes(&shared_keys(kind)).await?;

    let metadata = PackageMetadata::from_shared(kind, &shared);

    debug!(?metadata, "package metadata");

    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::{json, Map};

    use super::*;
    use crate::cloud::MockCloudClient;

    #[test]
    fn should_build_keys() {
        assert_eq!(
            shared_keys(PackageKind::Software),
            [
                "sw_checksum",
                "sw_checksum_algorithm",
                "sw_size",
                "sw_title",
                "sw_version"
            ]
        );
    }

    #[tokio::test]
    async fn should_fetch_metadata() {
        let mut client = MockCloudClient::new();

        client
            .expect_shared_attributes()
            .withf(|keys| {
                keys.join(",") == "fw_checksum,fw_checksum_algorithm,fw_size,fw_title,fw_version"
            })
            .once()
            .returning(|_| {
                let mut map = Map::new();
                map.insert("fw_title".to_string(), json!("fw-2.0.zip"));
                map.insert("fw_version".to_string(), json!("2.0"));
                map.insert("fw_size".to_string(), json!(1024));

                Ok(map)
            });

        let metadata = fetch_metadata(&client, PackageKind::Firmware)
            .await
            .unwrap();

        assert_eq!(
            metadata,
            PackageMetadata {
                checksum: None,
                checksum_algorithm: None,
                size: 1024,
                title: Some("fw-2.0.zip".to_string()),
                version: Some("2.0".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn should_propagate_errors() {
        let mut client = MockCloudClient::new();

        client
            .expect_shared_attributes()
            .once()
            .returning(|_| Err(CloudError::MissingToken));

        let res = fetch_metadata(&client, PackageKind::Firmware).await;

        assert!(res.is_err());
    }
}
