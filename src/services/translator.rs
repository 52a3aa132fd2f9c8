// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Translation of a `CrawlRequest` into the crawler's configuration document.

use crate::models::config::{DomainConfig, GeneratedConfig, OutputSink};
use crate::models::crawl::{CrawlRequest, CrawlRule, DomainSpec, RuleType};
use crate::models::settings::DEFAULT_CEILING_SECS;
use thiserror::Error;
use url::Url;

/// Longest index name the datastore accepts, in bytes.
const MAX_INDEX_NAME_BYTES: usize = 255;

/// Characters the datastore rejects in index names.
const FORBIDDEN_INDEX_CHARS: &[char] = &[
    '\\', '/', '*', '?', '"', '<', '>', '|', ' ', ',', '#', ':',
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("at least one domain is required")]
    NoDomains,

    #[error("domain url is required (domains[{index}])")]
    EmptyUrl { index: usize },

    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("output_index is required")]
    EmptyOutputIndex,

    #[error("invalid output_index: {0}")]
    InvalidOutputIndex(String),

    #[error("{field} must be a positive integer")]
    NotPositive { field: &'static str },

    #[error("invalid crawl rule (crawl_rules[{index}]): {reason}")]
    InvalidRule { index: usize, reason: String },

    #[error("user_agent must not contain control characters")]
    InvalidUserAgent,

    #[error("malformed request body: {0}")]
    MalformedBody(String),
}

/// Service-wide limits applied during translation.
#[derive(Debug, Clone, Copy)]
pub struct TranslatorLimits {
    /// Hard ceiling for `max_duration_seconds`
    pub ceiling_secs: u64,
}

impl Default for TranslatorLimits {
    fn default() -> Self {
        Self {
            ceiling_secs: DEFAULT_CEILING_SECS,
        }
    }
}

impl TranslatorLimits {
    /// Budget for one crawl: the request's value clamped to the ceiling.
    pub fn effective_duration(&self, requested: Option<u64>) -> u64 {
        requested
            .map(|secs| secs.min(self.ceiling_secs))
            .unwrap_or(self.ceiling_secs)
    }
}

/// Validate a request and build the crawler configuration for it.
///
/// The returned config carries no credentials; see `credentials::resolve`.
pub fn translate(
    request: &CrawlRequest,
    limits: &TranslatorLimits,
) -> Result<GeneratedConfig, ValidationError> {
    if request.domains.is_empty() {
        return Err(ValidationError::NoDomains);
    }

    let domains = request
        .domains
        .iter()
        .enumerate()
        .map(|(index, domain)| translate_domain(index, domain))
        .collect::<Result<Vec<_>, _>>()?;

    validate_output_index(&request.output_index)?;

    if let Some(rules) = &request.crawl_rules {
        for (index, rule) in rules.iter().enumerate() {
            validate_rule(index, rule)?;
        }
    }

    require_positive("max_crawl_depth", request.max_crawl_depth.map(u64::from))?;
    require_positive("max_duration_seconds", request.max_duration_seconds)?;
    require_positive("max_url_length", request.max_url_length.map(u64::from))?;

    if let Some(user_agent) = &request.user_agent {
        if user_agent.chars().any(char::is_control) {
            return Err(ValidationError::InvalidUserAgent);
        }
    }

    Ok(GeneratedConfig {
        domains,
        output_sink: OutputSink::Elasticsearch,
        output_index: request.output_index.clone(),
        crawl_rules: request.crawl_rules.clone(),
        extraction_rules: request.extraction_rules.clone(),
        max_crawl_depth: request.max_crawl_depth,
        max_duration_seconds: limits.effective_duration(request.max_duration_seconds),
        max_url_length: request.max_url_length,
        user_agent: request.user_agent.clone(),
        elasticsearch: None,
    })
}

fn translate_domain(index: usize, domain: &DomainSpec) -> Result<DomainConfig, ValidationError> {
    if domain.url.trim().is_empty() {
        return Err(ValidationError::EmptyUrl { index });
    }
    validate_http_url(&domain.url)?;

    for url in domain.seed_urls.iter().chain(&domain.sitemap_urls) {
        validate_http_url(url)?;
    }

    Ok(DomainConfig {
        url: domain.url.clone(),
        seed_urls: domain.seed_urls.clone(),
        sitemap_urls: domain.sitemap_urls.clone(),
    })
}

/// Accept only absolute `http`/`https` URLs with a host.
pub fn validate_http_url(raw: &str) -> Result<Url, ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let parsed = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(invalid("url has no host"));
    }

    Ok(parsed)
}

/// The index name becomes a datastore namespace, so it is checked against the
/// datastore's naming rules and anything resembling a path.
pub fn validate_output_index(index: &str) -> Result<(), ValidationError> {
    let invalid = |reason: &str| Err(ValidationError::InvalidOutputIndex(reason.to_string()));

    if index.is_empty() {
        return Err(ValidationError::EmptyOutputIndex);
    }
    if index.len() > MAX_INDEX_NAME_BYTES {
        return invalid("must be at most 255 bytes");
    }
    if index == "." || index == ".." || index.contains("..") {
        return invalid("must not contain '..'");
    }
    if index.chars().any(char::is_control) {
        return invalid("must not contain control characters");
    }
    if let Some(c) = index.chars().find(|c| FORBIDDEN_INDEX_CHARS.contains(c)) {
        return invalid(&format!("must not contain '{c}'"));
    }
    if index.starts_with(&['-', '_', '+'][..]) {
        return invalid("must not start with '-', '_' or '+'");
    }
    if index.chars().any(char::is_uppercase) {
        return invalid("must be lowercase");
    }

    Ok(())
}

fn validate_rule(index: usize, rule: &CrawlRule) -> Result<(), ValidationError> {
    if rule.pattern.is_empty() {
        return Err(ValidationError::InvalidRule {
            index,
            reason: "pattern must not be empty".to_string(),
        });
    }

    if rule.rule_type == RuleType::Regex {
        regex::Regex::new(&rule.pattern).map_err(|e| ValidationError::InvalidRule {
            index,
            reason: format!("pattern is not a valid regex: {e}"),
        })?;
    }

    Ok(())
}

fn require_positive(field: &'static str, value: Option<u64>) -> Result<(), ValidationError> {
    match value {
        Some(0) => Err(ValidationError::NotPositive { field }),
        _ => Ok(()),
    }
}
