// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============================================================================
// Inbound request
// ============================================================================

/// Request to run one crawl against the external crawler.
///
/// Deserialization only checks shape; semantic validation happens in
/// `services::translator::translate`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CrawlRequest {
    /// Domains to crawl, in order. At least one is required.
    pub domains: Vec<DomainSpec>,
    /// Destination index in the datastore
    pub output_index: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crawl_rules: Option<Vec<CrawlRule>>,
    /// Extraction rulesets, passed to the crawler as-is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<Object>>)]
    pub extraction_rules: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_crawl_depth: Option<u32>,
    /// Requested time budget; clamped to the service ceiling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_url_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl CrawlRequest {
    /// Domain URLs in request order.
    pub fn domain_urls(&self) -> Vec<String> {
        self.domains.iter().map(|d| d.url.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct DomainSpec {
    pub url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seed_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sitemap_urls: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RulePolicy {
    Allow,
    Deny,
}

/// How a crawl rule pattern is matched against a URL path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Begins,
    Ends,
    Contains,
    Regex,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CrawlRule {
    pub policy: RulePolicy,
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    pub pattern: String,
}

// ============================================================================
// Process output and results
// ============================================================================

/// Terminal classification of one crawl invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    Success,
    Error,
    Timeout,
}

impl CrawlStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrawlStatus::Success => "success",
            CrawlStatus::Error => "error",
            CrawlStatus::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything captured from one crawler process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, or the negated signal number when the process was killed
    pub exit_code: i32,
    pub timed_out: bool,
    pub pid: Option<u32>,
}

impl RawOutput {
    pub fn status(&self) -> CrawlStatus {
        if self.timed_out {
            CrawlStatus::Timeout
        } else if self.exit_code == 0 {
            CrawlStatus::Success
        } else {
            CrawlStatus::Error
        }
    }
}

/// Statistics as printed by the crawler. `None` means the crawler never
/// reported the value, which is not the same as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CrawlStats {
    pub pages_visited: Option<String>,
    pub documents_indexed: Option<String>,
    pub duration_seconds: Option<String>,
}

impl CrawlStats {
    pub fn is_empty(&self) -> bool {
        self.pages_visited.is_none()
            && self.documents_indexed.is_none()
            && self.duration_seconds.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlResult {
    pub status: CrawlStatus,
    pub return_code: i32,
    pub output_index: String,
    pub domains_crawled: Vec<String>,
    pub stats: CrawlStats,
}

// ============================================================================
// Outbound responses
// ============================================================================

/// Coarse failure classification exposed to callers instead of raw diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Timeout,
    DatastoreUnreachable,
    DatastoreAuthFailed,
    InvalidConfiguration,
    CrawlerFailure,
}

/// Sanitized crawl summary returned by `POST /crawl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PublicResponse {
    pub status: CrawlStatus,
    pub return_code: i32,
    pub output_index: String,
    pub domains_crawled: Vec<String>,
    pub stats: CrawlStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Body for every non-200 outcome of `POST /crawl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_request_deserializes() {
        let request: CrawlRequest = serde_json::from_str(
            r#"{"domains":[{"url":"https://example.com"}],"output_index":"test-1"}"#,
        )
        .unwrap();

        assert_eq!(request.domains.len(), 1);
        assert!(request.domains[0].seed_urls.is_empty());
        assert_eq!(request.output_index, "test-1");
        assert!(request.max_crawl_depth.is_none());
        assert!(request.crawl_rules.is_none());
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let result: Result<CrawlRequest, _> = serde_json::from_str(
            r#"{"domains":[{"url":"https://example.com"}],"output_index":"x","max_depth":3}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_output_index_is_rejected() {
        let result: Result<CrawlRequest, _> =
            serde_json::from_str(r#"{"domains":[{"url":"https://example.com"}]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_crawl_rule_uses_type_key() {
        let rule: CrawlRule =
            serde_json::from_str(r#"{"policy":"deny","type":"regex","pattern":".*\\.pdf$"}"#)
                .unwrap();
        assert_eq!(rule.policy, RulePolicy::Deny);
        assert_eq!(rule.rule_type, RuleType::Regex);
    }

    #[test]
    fn test_raw_output_status() {
        let mut raw = RawOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
            timed_out: false,
            pid: None,
        };
        assert_eq!(raw.status(), CrawlStatus::Success);

        raw.exit_code = 3;
        assert_eq!(raw.status(), CrawlStatus::Error);

        raw.timed_out = true;
        assert_eq!(raw.status(), CrawlStatus::Timeout);
    }

    #[test]
    fn test_unknown_stats_serialize_as_null() {
        let json = serde_json::to_value(CrawlStats::default()).unwrap();
        assert!(json["pages_visited"].is_null());
        assert!(json["documents_indexed"].is_null());
        assert!(json["duration_seconds"].is_null());
    }

    #[test]
    fn test_success_response_omits_error_fields() {
        let response = PublicResponse {
            status: CrawlStatus::Success,
            return_code: 0,
            output_index: "idx".to_string(),
            domains_crawled: vec![],
            stats: CrawlStats::default(),
            error_category: None,
            error_message: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("error_category").is_none());
        assert!(json.get("error_message").is_none());
        assert_eq!(json["status"], "success");
    }
}
