mod config;
mod run;

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use engine_logging::{engine_error, engine_info, LogDestination};
use log::LevelFilter;
use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, DEFAULT_CONFIG_PATH};

fn main() -> Result<()> {
    engine_logging::initialize(
        LogDestination::Both(PathBuf::from("./harvester.log")),
        LevelFilter::Info,
    );

    let config_path = env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = AppConfig::load(&config_path)?;
    engine_info!(
        "Loaded {:?}: {}/{} ({})",
        config_path,
        config.owner,
        config.repository,
        config.state
    );

    let token = env::var(&config.token_env)
        .ok()
        .filter(|token| !token.trim().is_empty());
    if token.is_none() {
        engine_info!(
            "{} is not set; requests are unauthenticated",
            config.token_env
        );
    }

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let summary = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                engine_info!("Interrupted; stopping after in-flight requests");
                on_signal.cancel();
            }
        });
        run::run(&config, token, cancel).await
    });

    match summary {
        Ok(summary) => {
            engine_info!(
                "Done: {} issues written to {:?}",
                summary.written,
                summary.output
            );
            Ok(())
        }
        Err(err) => {
            engine_error!("Harvest failed: {:#}", err);
            Err(err)
        }
    }
}
