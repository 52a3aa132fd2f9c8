// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use std::path::PathBuf;
use std::time::Duration;

/// Default hard ceiling on crawler runtime.
pub const DEFAULT_CEILING_SECS: u64 = 3600;
/// Largest ceiling the service accepts (one week).
pub const MAX_CEILING_SECS: u64 = 7 * 24 * 3600;
/// Default time between SIGTERM and SIGKILL on timeout.
pub const DEFAULT_KILL_GRACE_SECS: u64 = 5;
/// Bytes of each output stream kept in memory. The summary lines are at the end,
/// so the tail is what matters.
pub const DEFAULT_MAX_CAPTURE_BYTES: usize = 1024 * 1024;

/// How to invoke the external crawler. The generated config path is appended
/// as the final argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlerCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory for the crawler; the per-request temp dir when `None`
    pub working_dir: Option<PathBuf>,
}

impl CrawlerCommand {
    /// Parse a whitespace-separated command line such as `jruby bin/crawler crawl`.
    /// Returns `None` for an empty command.
    pub fn parse(command_line: &str, working_dir: Option<PathBuf>) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            working_dir,
        })
    }
}

impl Default for CrawlerCommand {
    fn default() -> Self {
        Self {
            program: "jruby".to_string(),
            args: vec!["bin/crawler".to_string(), "crawl".to_string()],
            working_dir: Some(PathBuf::from("/crawler")),
        }
    }
}

/// Non-secret settings for the process executor.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub command: CrawlerCommand,
    pub kill_grace: Duration,
    pub max_capture_bytes: usize,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            command: CrawlerCommand::default(),
            kill_grace: Duration::from_secs(DEFAULT_KILL_GRACE_SECS),
            max_capture_bytes: DEFAULT_MAX_CAPTURE_BYTES,
        }
    }
}
