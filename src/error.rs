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

use crate::cloud::CloudError;

#[derive(Debug, displaydoc::Display, thiserror::Error)]
pub enum UpdaterError {
    /// couldn't communicate with the cloud platform
    Cloud(#[from] CloudError),

    /// couldn't authenticate the liveness reporter
    Authentication(#[source] CloudError),
}
