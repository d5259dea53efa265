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

//! Service status notifications for systemd.

use std::io;

use systemd::daemon;
use systemd::daemon::{STATE_READY, STATE_STATUS};
use tracing::{error, trace};

use crate::ota::{PackageKind, UpdateState};

/// Logs the outcome of `sd_notify`.
///
/// `Ok(false)` means the notification socket isn't set, the process is not run by systemd.
fn check_notify_result(notify: Result<bool, io::Error>) {
    match notify {
        Ok(true) => {}
        Ok(false) => trace!("not running under systemd"),
        Err(err) => error!("couldn't notify status to systemd: {err}"),
    }
}

pub fn systemd_notify_status(service_status: &str) {
    let pairs = [(STATE_STATUS, service_status)];

    check_notify_result(daemon::notify(false, pairs.iter()));
}

pub fn systemd_notify_ready_status(service_status: &str) {
    let pairs = [(STATE_READY, "1"), (STATE_STATUS, service_status)];

    check_notify_result(daemon::notify(false, pairs.iter()));
}

/// Shows the update state in `systemctl status`, e.g. `firmware DOWNLOADING`.
pub fn systemd_notify_update_state(kind: PackageKind, state: UpdateState) {
    systemd_notify_status(&format!("{kind} {state}"));
}
