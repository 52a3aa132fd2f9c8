// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Conversion of crawl results into the public response.
//!
//! The crawler's own logs can contain the datastore host, its API key, local
//! paths and multi-line stack traces. None of those may reach the caller: a
//! failure is reported as an `ErrorCategory` plus at most one scrubbed,
//! truncated diagnostic line.

use crate::models::crawl::{
    CrawlResult, CrawlStats, CrawlStatus, ErrorCategory, PublicResponse, RawOutput,
};
use crate::services::credentials::Secrets;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

pub const REDACTED: &str = "[REDACTED]";
const PATH_PLACEHOLDER: &str = "[PATH]";
const MAX_MESSAGE_CHARS: usize = 200;

/// Lines that belong to a stack trace rather than a diagnostic message.
static STACK_FRAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\s+\S|\s*(?:at|from)\s|\s*\.\.\.\s*\d+\s+more|\s*Caused by:|\s*Traceback|\S+\.(?:rb|java|py):\d+:in\b)")
        .expect("valid regex")
});

/// Absolute Unix or Windows paths not part of a URL.
static FILESYSTEM_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(^|[\s'"(=\[])(?:/[\w.\-@+~]+)+/?|(^|[\s'"(=\[])[A-Za-z]:\\[^\s'"]*"#)
        .expect("valid regex")
});

/// Build the public response for a crawl.
pub fn sanitize(result: CrawlResult, raw: &RawOutput, secrets: &Secrets) -> PublicResponse {
    let needles = secret_needles(secrets);

    let (error_category, error_message) = if result.status == CrawlStatus::Success {
        (None, None)
    } else {
        let category = classify(raw);
        let message = diagnostic_message(raw, &needles)
            .unwrap_or_else(|| generic_message(result.status, result.return_code));
        (Some(category), Some(message))
    };

    let response = PublicResponse {
        status: result.status,
        return_code: result.return_code,
        output_index: result.output_index,
        domains_crawled: result.domains_crawled,
        stats: scrub_stats(result.stats, &needles),
        error_category,
        error_message,
    };

    enforce_no_secrets(response, &needles)
}

/// Strings that must never leave the service: every secret value, plus the
/// bare host name of the datastore URL.
fn secret_needles(secrets: &Secrets) -> Vec<String> {
    let mut needles: Vec<String> = secrets.values().iter().map(|s| s.to_string()).collect();

    if let Ok(url) = url::Url::parse(&secrets.datastore_host) {
        if let Some(host) = url.host_str() {
            needles.push(host.to_string());
        }
    }

    needles.retain(|n| !n.is_empty());
    // Longest first so a host inside a full URL does not leave URL fragments
    needles.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    needles.dedup();
    needles
}

fn redact_secrets(text: &str, needles: &[String]) -> String {
    needles
        .iter()
        .fold(text.to_string(), |acc, needle| acc.replace(needle.as_str(), REDACTED))
}

fn redact_paths(text: &str) -> String {
    FILESYSTEM_PATH
        .replace_all(text, |caps: &regex::Captures| {
            let prefix = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map_or("", |m| m.as_str());
            format!("{prefix}{PATH_PLACEHOLDER}")
        })
        .into_owned()
}

/// Coarse failure category from the exit state and whatever the crawler said.
pub fn classify(raw: &RawOutput) -> ErrorCategory {
    if raw.timed_out {
        return ErrorCategory::Timeout;
    }

    let text = format!("{}\n{}", raw.stderr, raw.stdout).to_lowercase();
    let mentions = |needles: &[&str]| needles.iter().any(|n| text.contains(n));

    if mentions(&[
        "security_exception",
        "unauthorized",
        "authentication failed",
        "status 401",
        "401 unauthorized",
        "403 forbidden",
    ]) {
        ErrorCategory::DatastoreAuthFailed
    } else if mentions(&[
        "connection refused",
        "failed to connect",
        "could not connect",
        "no route to host",
        "name or service not known",
        "unknown host",
        "connection timed out",
    ]) {
        ErrorCategory::DatastoreUnreachable
    } else if mentions(&[
        "invalid config",
        "configuration error",
        "config validation",
        "invalid crawl config",
    ]) {
        ErrorCategory::InvalidConfiguration
    } else {
        ErrorCategory::CrawlerFailure
    }
}

/// First meaningful line of stderr, scrubbed and truncated.
fn diagnostic_message(raw: &RawOutput, needles: &[String]) -> Option<String> {
    if raw.timed_out {
        return None;
    }

    let line = raw
        .stderr
        .lines()
        .find(|line| !line.trim().is_empty() && !STACK_FRAME.is_match(line))?;

    let scrubbed = redact_paths(&redact_secrets(line, needles));
    let collapsed = scrubbed.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }

    Some(truncate_chars(&collapsed, MAX_MESSAGE_CHARS))
}

fn generic_message(status: CrawlStatus, return_code: i32) -> String {
    match status {
        CrawlStatus::Timeout => "Crawler execution timed out".to_string(),
        _ => format!("Crawl failed with exit code {return_code}"),
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn scrub_stats(stats: CrawlStats, needles: &[String]) -> CrawlStats {
    let scrub = |value: Option<String>| value.map(|v| redact_secrets(&v, needles));
    CrawlStats {
        pages_visited: scrub(stats.pages_visited),
        documents_indexed: scrub(stats.documents_indexed),
        duration_seconds: scrub(stats.duration_seconds),
    }
}

fn contains_secret(text: &str, needles: &[String]) -> bool {
    needles.iter().any(|n| text.contains(n.as_str()))
}

/// Last check before the response leaves: scan every string field and redact
/// any that still carries a secret. A hit in the diagnostic line drops the
/// line entirely and keeps only the category.
fn enforce_no_secrets(mut response: PublicResponse, needles: &[String]) -> PublicResponse {
    let leaked = |text: &str| contains_secret(text, needles);

    if response.error_message.as_deref().is_some_and(leaked) {
        warn!("Secret found in crawl diagnostics after scrubbing, dropping message");
        response.error_message = None;
    }

    if leaked(&response.output_index) {
        response.output_index = REDACTED.to_string();
    }
    for domain in &mut response.domains_crawled {
        if leaked(domain) {
            *domain = REDACTED.to_string();
        }
    }
    for value in [
        &mut response.stats.pages_visited,
        &mut response.stats.documents_indexed,
        &mut response.stats.duration_seconds,
    ] {
        if value.as_deref().is_some_and(leaked) {
            *value = Some(REDACTED.to_string());
        }
    }

    response
}
