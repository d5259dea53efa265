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

//! Integrity verification of the downloaded package.
//!
//! The hash based algorithms are compared as lowercase hex. The CRC and murmur digests are
//! integers: their hex representation is compared with the byte order reversed, see
//! [`reverse_byte_order`].

use std::fmt::{Debug, Display};
use std::io::{self, Cursor};
use std::str::FromStr;

use crc::{Crc, CRC_32_ISO_HDLC};
use md5::Md5;
#[cfg(test)]
use mockall::automock;
use rand::Rng;
use sha2::{Digest, Sha256, Sha384, Sha512};
use tracing::{debug, error, warn};

/// CRC-32 used by zlib
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);
const MURMUR3_SEED: u32 = 0;

#[derive(Debug, thiserror::Error)]
#[error("unsupported checksum algorithm: {algorithm}")]
pub struct UnsupportedAlgorithm {
    algorithm: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumAlgorithm {
    Sha256,
    Sha384,
    Sha512,
    Md5,
    Crc32,
    Murmur3_32,
    Murmur3_128,
}

impl ChecksumAlgorithm {
    pub const ALL: [ChecksumAlgorithm; 7] = [
        ChecksumAlgorithm::Sha256,
        ChecksumAlgorithm::Sha384,
        ChecksumAlgorithm::Sha512,
        ChecksumAlgorithm::Md5,
        ChecksumAlgorithm::Crc32,
        ChecksumAlgorithm::Murmur3_32,
        ChecksumAlgorithm::Murmur3_128,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha256 => "sha256",
            ChecksumAlgorithm::Sha384 => "sha384",
            ChecksumAlgorithm::Sha512 => "sha512",
            ChecksumAlgorithm::Md5 => "md5",
            ChecksumAlgorithm::Crc32 => "crc32",
            ChecksumAlgorithm::Murmur3_32 => "murmur3_32",
            ChecksumAlgorithm::Murmur3_128 => "murmur3_128",
        }
    }

    /// Computes the digest of the data in the representation the platform expects.
    pub fn digest(&self, data: &[u8]) -> io::Result<String> {
        let digest = match self {
            ChecksumAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
            ChecksumAlgorithm::Sha384 => hex::encode(Sha384::digest(data)),
            ChecksumAlgorithm::Sha512 => hex::encode(Sha512::digest(data)),
            ChecksumAlgorithm::Md5 => hex::encode(Md5::digest(data)),
            ChecksumAlgorithm::Crc32 => {
                let crc = CRC32.checksum(data);

                reverse_byte_order(&format!("{crc:02X}"))
            }
            ChecksumAlgorithm::Murmur3_32 => {
                let hash = murmur3::murmur3_32(&mut Cursor::new(data), MURMUR3_SEED)?;

                reverse_byte_order(&format!("{hash:02X}"))
            }
            ChecksumAlgorithm::Murmur3_128 => {
                let hash = murmur3::murmur3_x64_128(&mut Cursor::new(data), MURMUR3_SEED)?;

                reverse_byte_order(&format!("{hash:02X}"))
            }
        };

        Ok(digest)
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = UnsupportedAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();

        Self::ALL
            .into_iter()
            .find(|algorithm| algorithm.as_str() == lower)
            .ok_or_else(|| UnsupportedAlgorithm {
                algorithm: s.to_string(),
            })
    }
}

impl Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reverses the order of the bytes in a hex string and lowercases it.
///
/// A string with an odd number of digits is padded with a leading zero first. The digits are
/// not padded to the width of the integer, so `ABCDEF` becomes `efcdab`.
pub fn reverse_byte_order(hex: &str) -> String {
    let padded = if hex.len() % 2 != 0 {
        format!("0{hex}")
    } else {
        hex.to_string()
    };

    padded
        .as_bytes()
        .chunks(2)
        .rev()
        .map(String::from_utf8_lossy)
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Forces verification failures independently of the checksum.
#[cfg_attr(test, automock)]
pub trait FailureSimulator: Debug + Send + Sync {
    fn should_fail(&self) -> bool;
}

/// Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFailures;

impl FailureSimulator for NoFailures {
    fn should_fail(&self) -> bool {
        false
    }
}

/// Draws a uniform number in `[0, faces)` and fails if it's greater than the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceRoll {
    faces: u8,
    threshold: u8,
}

impl DiceRoll {
    pub fn new(faces: u8, threshold: u8) -> Self {
        Self { faces, threshold }
    }

    /// Probability of a simulated failure.
    pub fn failure_rate(&self) -> f64 {
        let failing = self.faces.saturating_sub(self.threshold.saturating_add(1));

        if self.faces == 0 {
            0.0
        } else {
            f64::from(failing) / f64::from(self.faces)
        }
    }
}

impl Default for DiceRoll {
    /// Draws in `[0, 5]` and fails above 3, a failure rate of 1/3.
    fn default() -> Self {
        Self::new(6, 3)
    }
}

impl FailureSimulator for DiceRoll {
    fn should_fail(&self) -> bool {
        if self.faces == 0 {
            return false;
        }

        rand::thread_rng().gen_range(0..self.faces) > self.threshold
    }
}

/// Verifies the downloaded package against the checksum announced by the platform.
#[derive(Debug)]
pub struct Verifier {
    failures: Box<dyn FailureSimulator>,
}

impl Verifier {
    pub fn new(failures: Box<dyn FailureSimulator>) -> Self {
        Self { failures }
    }

    /// Returns `true` only if the digest of the data matches the expected checksum.
    ///
    /// Fails closed on empty data, a missing checksum or an unknown algorithm.
    pub fn verify(&self, data: &[u8], algorithm: Option<&str>, expected: Option<&str>) -> bool {
        if data.is_empty() {
            warn!("package wasn't received");

            return false;
        }

        let Some(expected) = expected else {
            warn!("checksum wasn't provided");

            return false;
        };

        let computed = match algorithm.map(ChecksumAlgorithm::from_str) {
            Some(Ok(algorithm)) => {
                debug!(%algorithm, "computing checksum");

                algorithm
                    .digest(data)
                    .inspect_err(|err| error!(error = %err, "couldn't compute checksum"))
                    .ok()
            }
            Some(Err(err)) => {
                error!(error = %err, "client error");

                None
            }
            None => {
                error!("checksum algorithm wasn't provided");

                None
            }
        };

        debug!(?computed, expected, "package checksum");

        if self.failures.should_fail() {
            warn!("simulated verification failure, the next attempt will download the package again");

            return false;
        }

        computed.as_deref() == Some(expected)
    }
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new(Box::new(NoFailures))
    }
}
