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

//! Installation of a verified package.

use std::fs::{File, Permissions};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::process::Command;
use tracing::{debug, error, info, instrument, warn};

use super::config::OtaConfig;

const INSTALL_SCRIPT: &str = "install.sh";

#[derive(Debug, displaydoc::Display, thiserror::Error)]
enum ApplyError {
    /// couldn't create the scratch directory {path}
    Scratch {
        path: String,
        #[source]
        err: io::Error,
    },
    /// couldn't open the package {path}
    Open {
        path: String,
        #[source]
        err: io::Error,
    },
    /// couldn't extract the package
    Extract(#[from] zip::result::ZipError),
    /// the extraction task panicked
    Join(#[from] tokio::task::JoinError),
    /// couldn't make {path} executable
    Permissions {
        path: String,
        #[source]
        err: io::Error,
    },
    /// couldn't run {cmd}
    Spawn {
        cmd: String,
        #[source]
        err: io::Error,
    },
    /// {cmd} exited with {status}
    Status { cmd: String, status: ExitStatus },
}

/// Applies a downloaded package to the system.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PackageApplier: Send + Sync {
    /// Returns `true` if the package was installed, errors are logged.
    async fn apply(&self, package: &Path, version_from: &str, version_to: &str) -> bool;
}

/// Scratch directory, removed after the update or when dropped.
#[derive(Debug)]
struct ScratchDir {
    path: PathBuf,
    sudo: bool,
    removed: bool,
}

impl ScratchDir {
    async fn create(path: &Path, sudo: bool) -> Result<Self, ApplyError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|err| ApplyError::Scratch {
                path: path.display().to_string(),
                err,
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            sudo,
            removed: false,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn remove(mut self) {
        self.removed = true;

        let path = self.path.clone();
        let sudo = self.sudo;

        if let Err(err) = tokio::task::spawn_blocking(move || remove_scratch(&path, sudo)).await {
            error!(
                error = format!("{:#}", stable_eyre::Report::new(err)),
                "scratch removal task failed"
            );
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if !self.removed {
            remove_scratch(&self.path, self.sudo);
        }
    }
}

/// Removes the directory, retrying with `sudo rm -rf` if the install script left files we can't delete.
fn remove_scratch(path: &Path, sudo: bool) {
    let err = match std::fs::remove_dir_all(path) {
        Ok(()) => {
            debug!(path = %path.display(), "scratch directory removed");

            return;
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => return,
        Err(err) => err,
    };

    if !sudo {
        warn!(path = %path.display(), "couldn't remove scratch directory: {err}");

        return;
    }

    debug!(path = %path.display(), "removing scratch directory with sudo: {err}");

    match sudo_remove_command(path).status() {
        Ok(status) if status.success() => {
            debug!(path = %path.display(), "scratch directory removed")
        }
        Ok(status) => warn!(
            path = %path.display(),
            %status,
            "couldn't remove scratch directory"
        ),
        Err(err) => warn!(
            path = %path.display(),
            "couldn't run sudo to remove the scratch directory: {err}"
        ),
    }
}

fn sudo_remove_command(path: &Path) -> std::process::Command {
    let mut cmd = std::process::Command::new("sudo");
    cmd.args(["rm", "-rf"]).arg(path);

    cmd
}

/// Extracts the zip archive into the directory.
fn extract(package: &Path, directory: &Path) -> Result<(), ApplyError> {
    let file = File::open(package).map_err(|err| ApplyError::Open {
        path: package.display().to_string(),
        err,
    })?;

    let mut archive = zip::ZipArchive::new(file)?;

    debug!(entries = archive.len(), "extracting package");

    archive.extract(directory)?;

    Ok(())
}

/// Extracts a zip package, optionally runs its `install.sh` and restarts a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveApplier {
    scratch: PathBuf,
    unit: Option<String>,
    install_script: bool,
    sudo: bool,
}

impl ArchiveApplier {
    pub fn new(config: &OtaConfig) -> Self {
        Self {
            scratch: config.scratch_directory.clone(),
            unit: config.restart_unit().map(str::to_string),
            install_script: config.run_install_script(),
            sudo: config.sudo,
        }
    }

    fn command<I, S>(&self, program: &str, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut cmd = if self.sudo {
            let mut cmd = Command::new("sudo");
            cmd.arg(program);
            cmd
        } else {
            Command::new(program)
        };

        cmd.args(args);

        cmd
    }

    async fn run(&self, mut cmd: Command, cmd_line: &str) -> Result<(), ApplyError> {
        debug!(cmd = cmd_line, "running command");

        let output = cmd.output().await.map_err(|err| ApplyError::Spawn {
            cmd: cmd_line.to_string(),
            err,
        })?;

        debug!(
            stdout = %String::from_utf8_lossy(&output.stdout),
            stderr = %String::from_utf8_lossy(&output.stderr),
            "{cmd_line} exited"
        );

        if !output.status.success() {
            return Err(ApplyError::Status {
                cmd: cmd_line.to_string(),
                status: output.status,
            });
        }

        Ok(())
    }

    async fn install(&self, scratch: &Path) -> Result<(), ApplyError> {
        let script = scratch.join(INSTALL_SCRIPT);

        info!("executing {INSTALL_SCRIPT}");

        tokio::fs::set_permissions(&script, Permissions::from_mode(0o755))
            .await
            .map_err(|err| ApplyError::Permissions {
                path: script.display().to_string(),
                err,
            })?;

        let script = script.display().to_string();

        self.run(self.command(&script, std::iter::empty::<&str>()), &script)
            .await
    }

    async fn try_apply(&self, package: &Path) -> Result<(), ApplyError> {
        let scratch = ScratchDir::create(&self.scratch, self.sudo).await?;

        let res = self.install_from(package, scratch.path()).await;

        scratch.remove().await;

        res
    }

    async fn install_from(&self, package: &Path, scratch: &Path) -> Result<(), ApplyError> {
        info!("extracting package");

        let package_path = package.to_path_buf();
        let directory = scratch.to_path_buf();
        tokio::task::spawn_blocking(move || extract(&package_path, &directory)).await??;

        if self.install_script {
            self.install(scratch).await?;
        }

        if let Some(unit) = &self.unit {
            info!(%unit, "restarting service");

            let cmd = self.command("systemctl", ["restart", unit.as_str()]);

            self.run(cmd, &format!("systemctl restart {unit}")).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl PackageApplier for ArchiveApplier {
    #[instrument(skip(self))]
    async fn apply(&self, package: &Path, version_from: &str, version_to: &str) -> bool {
        info!("updating from {version_from} to {version_to}");

        match self.try_apply(package).await {
            Ok(()) => {
                info!("updated successfully to version {version_to}");

                true
            }
            Err(err) => {
                error!(
                    error = format!("{:#}", stable_eyre::Report::new(err)),
                    "couldn't apply the package"
                );

                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempdir::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::CompressionMethod;

    use super::*;

    fn write_package(dir: &Path, files: &[(&str, &str)]) -> PathBuf {
        let path = dir.join("package.zip");
        let file = File::create(&path).unwrap();

        let mut zip = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        for (name, content) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }

        zip.finish().unwrap();

        path
    }

    fn applier(scratch: PathBuf, install_script: bool) -> ArchiveApplier {
        ArchiveApplier {
            scratch,
            unit: None,
            install_script,
            sudo: false,
        }
    }

    #[test]
    fn should_build_from_config() {
        let config = OtaConfig {
            service_unit: Some(String::new()),
            ..Default::default()
        };

        let applier = ArchiveApplier::new(&config);

        assert_eq!(
            applier,
            ArchiveApplier {
                scratch: PathBuf::from("/tmp/ota_update"),
                unit: None,
                install_script: false,
                sudo: true,
            }
        );
    }

    #[test]
    fn should_extract_archive() {
        let tmp = TempDir::new("baske-extract").unwrap();
        let package = write_package(tmp.path(), &[("a.txt", "hello"), ("nested/b.txt", "world")]);
        let out = tmp.path().join("out");

        extract(&package, &out).unwrap();

        assert_eq!(std::fs::read_to_string(out.join("a.txt")).unwrap(), "hello");
        assert_eq!(
            std::fs::read_to_string(out.join("nested/b.txt")).unwrap(),
            "world"
        );
    }

    #[tokio::test]
    async fn apply_removes_scratch_directory() {
        let tmp = TempDir::new("baske-apply").unwrap();
        let package = write_package(tmp.path(), &[("fw.bin", "firmware")]);
        let scratch = tmp.path().join("scratch");

        let applier = applier(scratch.clone(), false);

        assert!(applier.apply(&package, "none", "2.0").await);
        assert!(!scratch.exists());
    }

    #[test]
    fn sudo_removal_runs_rm_as_root() {
        let cmd = sudo_remove_command(Path::new("/tmp/ota_update"));

        assert_eq!(cmd.get_program(), "sudo");
        assert_eq!(
            cmd.get_args().collect::<Vec<_>>(),
            ["rm", "-rf", "/tmp/ota_update"]
        );
    }

    #[tokio::test]
    async fn scratch_directory_is_removed_on_drop() {
        let tmp = TempDir::new("baske-scratch").unwrap();
        let path = tmp.path().join("scratch");

        let scratch = ScratchDir::create(&path, true).await.unwrap();
        std::fs::write(scratch.path().join("leftover"), "root").unwrap();
        assert!(path.exists());

        drop(scratch);
        assert!(!path.exists());

        // an already removed directory is not an error
        let scratch = ScratchDir::create(&path, true).await.unwrap();
        std::fs::remove_dir(&path).unwrap();
        scratch.remove().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn missing_package_fails() {
        let tmp = TempDir::new("baske-missing").unwrap();
        let scratch = tmp.path().join("scratch");

        let applier = applier(scratch.clone(), false);

        assert!(!applier.apply(&tmp.path().join("nope.zip"), "1.0", "2.0").await);
        assert!(!scratch.exists());
    }

    #[tokio::test]
    async fn invalid_archive_fails() {
        let tmp = TempDir::new("baske-invalid").unwrap();
        let package = tmp.path().join("package.zip");
        std::fs::write(&package, b"not a zip").unwrap();

        let applier = applier(tmp.path().join("scratch"), false);

        assert!(!applier.apply(&package, "1.0", "2.0").await);
    }

    #[tokio::test]
    async fn should_run_install_script() {
        let tmp = TempDir::new("baske-script").unwrap();
        let marker = tmp.path().join("installed");

        let script = format!("#!/bin/sh\necho done > '{}'\n", marker.display());
        let package = write_package(tmp.path(), &[(INSTALL_SCRIPT, &script)]);
        let scratch = tmp.path().join("scratch");

        assert!(applier(scratch.clone(), true).apply(&package, "1.0", "2.0").await);
        assert_eq!(std::fs::read_to_string(&marker).unwrap(), "done\n");
        assert!(!scratch.exists());

        // a failing script fails the update
        let failing = TempDir::new("baske-script-fail").unwrap();
        let package = write_package(failing.path(), &[(INSTALL_SCRIPT, "#!/bin/sh\nexit 1\n")]);
        let scratch = failing.path().join("scratch");

        assert!(!applier(scratch.clone(), true).apply(&package, "1.0", "2.0").await);
        assert!(!scratch.exists());

        // and so does a missing one
        let package = write_package(failing.path(), &[("fw.bin", "firmware")]);

        assert!(!applier(scratch, true).apply(&package, "1.0", "2.0").await);
    }
}
