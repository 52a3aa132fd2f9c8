// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Supervised execution of the external crawler.
//!
//! Each crawl gets a fresh temp directory holding its config file and exactly
//! one child process. The child runs in its own process group so that on
//! timeout the whole tree can be signalled: SIGTERM first, SIGKILL after the
//! grace period. Dropping a `CrawlProcessHandle` before it finishes kills the
//! whole group and removes the temp directory, which covers handler
//! cancellation.

use crate::models::config::GeneratedConfig;
use crate::models::crawl::{CrawlRequest, CrawlResult, RawOutput};
use crate::models::settings::ExecutorSettings;
use crate::services::credentials::SECRET_ENV_VARS;
use crate::services::result_parser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tempfile::TempDir;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const CONFIG_FILE_NAME: &str = "crawl.yml";
const READ_CHUNK_BYTES: usize = 8 * 1024;
/// Deadline used when `now + timeout` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("failed to prepare crawl workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("failed to serialize crawler config: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("failed to launch crawler '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for crawler: {0}")]
    Wait(#[source] std::io::Error),
}

/// Capability interface over the external crawler so the gateway can run
/// against scripted stand-ins.
#[async_trait]
pub trait CrawlerBackend: Send + Sync {
    /// Run one crawl bound to `config`, for at most `timeout` plus the kill grace.
    async fn execute(
        &self,
        config: &GeneratedConfig,
        timeout: Duration,
    ) -> Result<RawOutput, ExecutionError>;

    /// Turn captured output into a structured result.
    fn parse(&self, raw: &RawOutput, request: &CrawlRequest) -> CrawlResult {
        result_parser::parse(raw, request)
    }
}

/// Runs the real crawler executable as a subprocess.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    settings: ExecutorSettings,
}

impl ProcessExecutor {
    pub fn new(settings: ExecutorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }
}

#[async_trait]
impl CrawlerBackend for ProcessExecutor {
    async fn execute(
        &self,
        config: &GeneratedConfig,
        timeout: Duration,
    ) -> Result<RawOutput, ExecutionError> {
        let workspace = tempfile::Builder::new()
            .prefix("crawl-")
            .tempdir()
            .map_err(ExecutionError::Workspace)?;
        let config_path = write_config(workspace.path(), config).await?;

        let handle = CrawlProcessHandle::spawn(&self.settings, workspace, &config_path, timeout)?;
        handle
            .wait(self.settings.kill_grace)
            .await
            .map_err(ExecutionError::Wait)
    }
}

/// Write the config where only this process can read it; it holds the
/// datastore credentials.
async fn write_config(dir: &Path, config: &GeneratedConfig) -> Result<PathBuf, ExecutionError> {
    let yaml = config.to_yaml()?;
    let path = dir.join(CONFIG_FILE_NAME);

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options
        .open(&path)
        .await
        .map_err(ExecutionError::Workspace)?;
    file.write_all(yaml.as_bytes())
        .await
        .map_err(ExecutionError::Workspace)?;
    file.flush().await.map_err(ExecutionError::Workspace)?;

    Ok(path)
}

/// One running crawler process and everything tied to its lifetime.
pub struct CrawlProcessHandle {
    child: Child,
    pid: Option<u32>,
    started_at: DateTime<Utc>,
    deadline: Instant,
    stdout: JoinHandle<String>,
    stderr: JoinHandle<String>,
    // Set once the whole group has been sent SIGKILL
    group_killed: bool,
    // Removed from disk when the handle is dropped
    _workspace: TempDir,
}

impl CrawlProcessHandle {
    fn spawn(
        settings: &ExecutorSettings,
        workspace: TempDir,
        config_path: &Path,
        timeout: Duration,
    ) -> Result<Self, ExecutionError> {
        let crawler = &settings.command;
        let working_dir = crawler
            .working_dir
            .clone()
            .unwrap_or_else(|| workspace.path().to_path_buf());

        let mut command = Command::new(&crawler.program);
        command
            .args(&crawler.args)
            .arg(config_path)
            .current_dir(&working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for var in SECRET_ENV_VARS {
            command.env_remove(var);
        }
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| ExecutionError::Spawn {
            program: crawler.program.clone(),
            source,
        })?;

        let cap = settings.max_capture_bytes;
        let stdout = spawn_reader(child.stdout.take(), cap);
        let stderr = spawn_reader(child.stderr.take(), cap);

        let handle = Self {
            pid: child.id(),
            child,
            started_at: Utc::now(),
            deadline: deadline_after(timeout),
            stdout,
            stderr,
            group_killed: false,
            _workspace: workspace,
        };

        info!(
            pid = ?handle.pid,
            timeout_secs = timeout.as_secs(),
            "Crawler process started"
        );

        Ok(handle)
    }

    /// Wait for the process until the deadline, terminating it if it overruns.
    async fn wait(mut self, grace: Duration) -> std::io::Result<RawOutput> {
        let (status, timed_out) =
            match tokio::time::timeout_at(self.deadline, self.child.wait()).await {
                Ok(status) => (status?, false),
                Err(_) => {
                    warn!(pid = ?self.pid, "Crawler exceeded its time budget, terminating");
                    (self.terminate(grace).await?, true)
                }
            };

        // Anything the crawler left behind in its group goes too
        signal_group(self.pid, GroupSignal::Kill);
        self.group_killed = true;

        let stdout = collect_output(&mut self.stdout, grace).await;
        let stderr = collect_output(&mut self.stderr, grace).await;

        let elapsed = Utc::now() - self.started_at;
        let exit_code = exit_code(status);
        info!(
            pid = ?self.pid,
            exit_code,
            timed_out,
            elapsed_ms = elapsed.num_milliseconds(),
            "Crawler process finished"
        );

        Ok(RawOutput {
            stdout,
            stderr,
            exit_code,
            timed_out,
            pid: self.pid,
        })
    }

    async fn terminate(&mut self, grace: Duration) -> std::io::Result<ExitStatus> {
        signal_group(self.pid, GroupSignal::Terminate);

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                warn!(pid = ?self.pid, "Crawler ignored SIGTERM, killing");
                signal_group(self.pid, GroupSignal::Kill);
                self.child.kill().await?;
                self.child.wait().await
            }
        }
    }
}

impl Drop for CrawlProcessHandle {
    /// Reached without `wait` finishing when the request future is dropped.
    /// `kill_on_drop` only covers the direct child, so the group is killed here.
    fn drop(&mut self) {
        if self.group_killed {
            return;
        }
        warn!(pid = ?self.pid, "Crawl abandoned before completion, killing process group");
        signal_group(self.pid, GroupSignal::Kill);
        self.group_killed = true;
        self.stdout.abort();
        self.stderr.abort();
    }
}

/// `Instant::now() + timeout`, saturating to a far deadline instead of panicking.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

#[derive(Debug, Clone, Copy)]
enum GroupSignal {
    Terminate,
    Kill,
}

#[cfg(unix)]
fn signal_group(pid: Option<u32>, signal: GroupSignal) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    let signal = match signal {
        GroupSignal::Terminate => Signal::SIGTERM,
        GroupSignal::Kill => Signal::SIGKILL,
    };
    // ESRCH just means the group is already gone
    if let Err(e) = killpg(Pid::from_raw(pid), signal) {
        debug!(pid, error = %e, "Process group signal not delivered");
    }
}

#[cfg(not(unix))]
fn signal_group(_pid: Option<u32>, _signal: GroupSignal) {}

fn spawn_reader<R>(stream: Option<R>, cap: usize) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        match stream {
            Some(stream) => read_tail(stream, cap).await,
            None => String::new(),
        }
    })
}

/// Read a stream to EOF keeping only the last `cap` bytes.
async fn read_tail<R: AsyncRead + Unpin>(mut reader: R, cap: usize) -> String {
    let mut buf = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK_BYTES];

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.len() > cap {
                    let excess = buf.len() - cap;
                    buf.drain(..excess);
                }
            }
            Err(e) => {
                debug!(error = %e, "Stopped reading crawler output");
                break;
            }
        }
    }

    String::from_utf8_lossy(&buf).into_owned()
}

async fn collect_output(reader: &mut JoinHandle<String>, grace: Duration) -> String {
    match tokio::time::timeout(grace, &mut *reader).await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!(error = %e, "Output reader task failed");
            String::new()
        }
        Err(_) => {
            warn!("Crawler output stream still open after exit, discarding");
            reader.abort();
            String::new()
        }
    }
}

/// Exit code, or the negated signal number for signal deaths.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}
