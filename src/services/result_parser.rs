// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Extraction of crawl statistics from crawler output.
//!
//! The summary format belongs to the crawler and changes between releases, so
//! matching is loose: either `Pages visited: 5` or `pages_visited=5` style, any
//! order, any surrounding log prefix. When a value appears more than once the
//! last one wins, since the final summary comes after progress lines.

use crate::models::crawl::{CrawlRequest, CrawlResult, CrawlStats, RawOutput};
use once_cell::sync::Lazy;
use regex::Regex;

// Commas stay in the value so grouped numbers like `1,234` survive; a single
// trailing separator comma is stripped in `last_capture`.
const VALUE: &str = r"\s*[:=]\s*([^\s;]+)";

static PAGES_VISITED: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)\bpages[ _]visited{VALUE}")).expect("valid regex"));

static DOCUMENTS_INDEXED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\bdocuments[ _](?:upserted|indexed){VALUE}"))
        .expect("valid regex")
});

static DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:crawl[ _]duration(?:\s*\([^)]*\))?|duration[ _]seconds){VALUE}"
    ))
    .expect("valid regex")
});

/// Build the result for one crawl from its captured output.
///
/// `domains_crawled` echoes the request; the output is not used to work out
/// which domains were reached.
pub fn parse(raw: &RawOutput, request: &CrawlRequest) -> CrawlResult {
    CrawlResult {
        status: raw.status(),
        return_code: raw.exit_code,
        output_index: request.output_index.clone(),
        domains_crawled: request.domain_urls(),
        stats: parse_stats(&raw.stdout),
    }
}

/// Pull the summary statistics out of crawler stdout. Values the crawler never
/// printed stay `None`.
pub fn parse_stats(stdout: &str) -> CrawlStats {
    let mut stats = CrawlStats::default();

    for line in stdout.lines() {
        if let Some(value) = last_capture(&PAGES_VISITED, line) {
            stats.pages_visited = Some(value);
        }
        if let Some(value) = last_capture(&DOCUMENTS_INDEXED, line) {
            stats.documents_indexed = Some(value);
        }
        if let Some(value) = last_capture(&DURATION, line) {
            stats.duration_seconds = Some(value);
        }
    }

    stats
}

fn last_capture(pattern: &Regex, line: &str) -> Option<String> {
    pattern
        .captures_iter(line)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| {
            let value = m.as_str();
            value.strip_suffix(',').unwrap_or(value).to_string()
        })
        .filter(|value| !value.is_empty())
}
