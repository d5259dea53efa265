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

use baske_updater::Runtime;
use clap::Parser;
use stable_eyre::eyre::WrapErr;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::Cli;
use crate::config::read_options;

mod cli;
mod config;

async fn join_tasks(tasks: &mut JoinSet<stable_eyre::Result<()>>) -> stable_eyre::Result<()> {
    while let Some(res) = tasks.join_next().await {
        res.wrap_err("task panicked")??;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> stable_eyre::Result<()> {
    stable_eyre::install()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .try_init()?;

    let cli = Cli::parse();

    let options = read_options(cli).await?;

    let cancel = CancellationToken::new();
    let mut tasks = JoinSet::new();

    Runtime::start(&mut tasks, options, cancel.clone()).await?;

    let res = tokio::select! {
        res = tokio::signal::ctrl_c() => {
            info!("shutting down");

            res.wrap_err("couldn't listen for the shutdown signal")
        }
        res = join_tasks(&mut tasks) => res,
    };

    cancel.cancel();
    tasks.abort_all();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!(error = format!("{err:#}"), "task failed"),
            Err(err) if err.is_cancelled() => {}
            Err(err) => error!(error = %err, "task panicked"),
        }
    }

    res
}
