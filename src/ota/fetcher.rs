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

//! Chunked download of the package.

use bytes::{Bytes, BytesMut};
use tracing::{debug, instrument, trace};

use super::{OtaError, PackageKind, PackageMetadata};
use crate::cloud::{ChunkQuery, CloudClient};

/// A single download attempt of a package.
///
/// The buffer is dropped with the session if any chunk fails.
#[derive(Debug)]
pub struct DownloadSession<'a> {
    kind: PackageKind,
    metadata: &'a PackageMetadata,
    chunk_size: u64,
    buffer: BytesMut,
    chunk: u64,
}

impl<'a> DownloadSession<'a> {
    pub fn new(kind: PackageKind, metadata: &'a PackageMetadata, chunk_size: u64) -> Self {
        Self {
            kind,
            metadata,
            chunk_size,
            buffer: BytesMut::new(),
            chunk: 0,
        }
    }

    /// Number of chunks the package is split into, 0 when unchunked.
    pub fn chunk_count(&self) -> u64 {
        if self.chunk_size == 0 {
            return 0;
        }

        self.metadata.size.div_ceil(self.chunk_size)
    }

    fn query(&self) -> ChunkQuery {
        let size = if self.chunk_size == 0 {
            self.metadata.size
        } else {
            self.chunk_size.min(self.metadata.size)
        };

        ChunkQuery {
            title: self.metadata.title.clone(),
            version: self.metadata.version.clone(),
            size,
            chunk: self.chunk,
        }
    }

    /// Requests every chunk in order and concatenates the bodies.
    #[instrument(skip_all, fields(kind = %self.kind, chunk_size = self.chunk_size))]
    pub async fn fetch<C>(mut self, client: &C) -> Result<Bytes, OtaError>
    where
        C: CloudClient + ?Sized,
    {
        // the chunk past the count is requested too
        let last = self.chunk_count();

        debug!(count = self.chunk_count(), "downloading package");

        while self.chunk <= last {
            let query = self.query();

            let bytes = client
                .package_chunk(self.kind, &query)
                .await
                .map_err(|err| OtaError::Download {
                    chunk: self.chunk,
                    err,
                })?;

            trace!(chunk = self.chunk, len = bytes.len(), "chunk received");

            self.buffer.extend_from_slice(&bytes);
            self.chunk += 1;
        }

        debug!(len = self.buffer.len(), "package downloaded");

        Ok(self.buffer.freeze())
    }
}

/// Downloads the package described by the metadata, with a single request if `chunk_size` is 0.
pub async fn fetch_package<C>(
    client: &C,
    kind: PackageKind,
    metadata: &PackageMetadata,
    chunk_size: u64,
) -> Result<Bytes, OtaError>
where
    C: CloudClient + ?Sized,
{
    DownloadSession::new(kind, metadata, chunk_size)
        .fetch(client)
        .await
}
