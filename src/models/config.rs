// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Configuration document handed to the external crawler.
//!
//! Field names follow the crawler's YAML config format. Optional fields that
//! the request left out are skipped so the crawler's own defaults apply.

use crate::models::crawl::CrawlRule;
use serde::Serialize;

/// Output sink the crawler writes documents to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputSink {
    Elasticsearch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainConfig {
    pub url: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub seed_urls: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sitemap_urls: Vec<String>,
}

/// Datastore connection block injected by the credential resolver.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct DatastoreConnection {
    pub host: String,
    pub api_key: String,
}

impl std::fmt::Debug for DatastoreConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatastoreConnection")
            .field("host", &"[REDACTED]")
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Per-request crawler configuration. Lives only as long as one crawl.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedConfig {
    pub domains: Vec<DomainConfig>,
    pub output_sink: OutputSink,
    pub output_index: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crawl_rules: Option<Vec<CrawlRule>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_rules: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_crawl_depth: Option<u32>,
    /// Effective budget after clamping to the service ceiling
    pub max_duration_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_url_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elasticsearch: Option<DatastoreConnection>,
}

impl GeneratedConfig {
    pub fn has_credentials(&self) -> bool {
        self.elasticsearch.is_some()
    }

    /// Serialize to the YAML document the crawler reads.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
