// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use anyhow::Context;
use clap::Parser;
use crawl_orchestrator::app::{create_router, AppState, SERVICE_NAME, VERSION};
use crawl_orchestrator::models::settings::{
    CrawlerCommand, ExecutorSettings, DEFAULT_CEILING_SECS, DEFAULT_KILL_GRACE_SECS,
    DEFAULT_MAX_CAPTURE_BYTES, MAX_CEILING_SECS,
};
use crawl_orchestrator::services::credentials::{ConfigurationError, Secrets};
use crawl_orchestrator::services::executor::ProcessExecutor;
use crawl_orchestrator::services::logging::{init_tracing, mask_secret};
use crawl_orchestrator::services::translator::TranslatorLimits;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// HTTP service that runs an external crawler per request.
///
/// Secrets are read from DATASTORE_HOST, DATASTORE_API_KEY and
/// EXPECTED_API_KEY; the service refuses to start without them.
#[derive(Parser, Debug)]
#[command(name = "crawl-orchestrator", version = VERSION, about, long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
    bind: SocketAddr,

    /// Crawler command line; the config path is appended
    #[arg(long, env = "CRAWLER_COMMAND", default_value = "jruby bin/crawler crawl")]
    crawler_command: String,

    /// Working directory for the crawler (per-crawl temp dir if empty)
    #[arg(long, env = "CRAWLER_WORKDIR", default_value = "/crawler")]
    crawler_workdir: PathBuf,

    /// Hard ceiling on crawl duration in seconds
    #[arg(long, env = "CRAWL_CEILING_SECS", default_value_t = DEFAULT_CEILING_SECS)]
    ceiling_secs: u64,

    /// Seconds between SIGTERM and SIGKILL when a crawl overruns
    #[arg(long, env = "CRAWL_KILL_GRACE_SECS", default_value_t = DEFAULT_KILL_GRACE_SECS)]
    kill_grace_secs: u64,

    /// Bytes of each crawler output stream kept in memory
    #[arg(long, env = "CRAWL_MAX_CAPTURE_BYTES", default_value_t = DEFAULT_MAX_CAPTURE_BYTES)]
    max_capture_bytes: usize,
}

impl Cli {
    fn executor_settings(&self) -> Result<ExecutorSettings, ConfigurationError> {
        if self.kill_grace_secs > MAX_CEILING_SECS {
            return Err(ConfigurationError::Invalid(format!(
                "CRAWL_KILL_GRACE_SECS must be at most {}",
                MAX_CEILING_SECS
            )));
        }
        let working_dir = Some(self.crawler_workdir.clone())
            .filter(|dir| !dir.as_os_str().is_empty());
        let command = CrawlerCommand::parse(&self.crawler_command, working_dir)
            .ok_or_else(|| ConfigurationError::Invalid("CRAWLER_COMMAND must not be empty".into()))?;

        Ok(ExecutorSettings {
            command,
            kill_grace: Duration::from_secs(self.kill_grace_secs),
            max_capture_bytes: self.max_capture_bytes,
        })
    }

    fn limits(&self) -> Result<TranslatorLimits, ConfigurationError> {
        if self.ceiling_secs == 0 || self.ceiling_secs > MAX_CEILING_SECS {
            return Err(ConfigurationError::Invalid(format!(
                "CRAWL_CEILING_SECS must be between 1 and {}",
                MAX_CEILING_SECS
            )));
        }
        Ok(TranslatorLimits {
            ceiling_secs: self.ceiling_secs,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    // Fail fast: a missing secret must stop the service, not individual requests
    let secrets = Secrets::from_env().map_err(|e| {
        error!(error = %e, "Refusing to start");
        e
    })?;
    let settings = cli.executor_settings()?;
    let limits = cli.limits()?;

    info!(
        datastore_api_key = %mask_secret(&secrets.datastore_api_key),
        expected_api_key = %mask_secret(&secrets.expected_api_key),
        crawler = %settings.command.program,
        ceiling_secs = limits.ceiling_secs,
        "Configuration loaded"
    );

    let executor = Arc::new(ProcessExecutor::new(settings));
    let state = AppState::new(secrets, executor, limits);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cli.bind))?;

    info!("{} v{} listening on {}", SERVICE_NAME, VERSION, cli.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("crawl-orchestrator").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_default_limits() {
        let limits = cli(&[]).limits().unwrap();
        assert_eq!(limits.ceiling_secs, DEFAULT_CEILING_SECS);
    }

    #[test]
    fn test_zero_ceiling_rejected() {
        assert!(cli(&["--ceiling-secs", "0"]).limits().is_err());
    }

    #[test]
    fn test_oversized_ceiling_rejected() {
        let max = MAX_CEILING_SECS.to_string();
        assert!(cli(&["--ceiling-secs", &max]).limits().is_ok());

        let too_big = (MAX_CEILING_SECS + 1).to_string();
        assert!(cli(&["--ceiling-secs", &too_big]).limits().is_err());

        let absurd = u64::MAX.to_string();
        assert!(cli(&["--ceiling-secs", &absurd]).limits().is_err());
    }

    #[test]
    fn test_oversized_kill_grace_rejected() {
        let absurd = u64::MAX.to_string();
        assert!(cli(&["--kill-grace-secs", &absurd])
            .executor_settings()
            .is_err());
    }

    #[test]
    fn test_empty_crawler_command_rejected() {
        assert!(cli(&["--crawler-command", "  "]).executor_settings().is_err());
    }
}
