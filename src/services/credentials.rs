// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Process-wide secrets and their injection into crawler configs.

use crate::models::config::{DatastoreConnection, GeneratedConfig};
use std::env;
use thiserror::Error;

pub const DATASTORE_HOST_VAR: &str = "DATASTORE_HOST";
pub const DATASTORE_API_KEY_VAR: &str = "DATASTORE_API_KEY";
pub const EXPECTED_API_KEY_VAR: &str = "EXPECTED_API_KEY";

/// Names the same secrets had on the original deployment.
const LEGACY_DATASTORE_HOST_VAR: &str = "ELASTICSEARCH_HOST";
const LEGACY_DATASTORE_API_KEY_VAR: &str = "ELASTICSEARCH_API_KEY";
const LEGACY_EXPECTED_API_KEY_VAR: &str = "CRAWLER_API_KEY";

/// Variables stripped from the crawler's environment.
pub const SECRET_ENV_VARS: [&str; 6] = [
    DATASTORE_HOST_VAR,
    DATASTORE_API_KEY_VAR,
    EXPECTED_API_KEY_VAR,
    LEGACY_DATASTORE_HOST_VAR,
    LEGACY_DATASTORE_API_KEY_VAR,
    LEGACY_EXPECTED_API_KEY_VAR,
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("{0} environment variable must be set")]
    MissingSecret(&'static str),

    #[error("{0}")]
    Invalid(String),
}

/// Read-only secrets loaded once at service start.
#[derive(Clone, PartialEq, Eq)]
pub struct Secrets {
    pub datastore_host: String,
    pub datastore_api_key: String,
    pub expected_api_key: String,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("datastore_host", &"[REDACTED]")
            .field("datastore_api_key", &"[REDACTED]")
            .field("expected_api_key", &"[REDACTED]")
            .finish()
    }
}

impl Secrets {
    /// Load secrets from the process environment.
    /// Fails if any secret is missing or blank: the service must not start
    /// without a datastore or with authentication silently disabled.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load secrets through an arbitrary lookup, falling back to legacy names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |primary: &'static str, legacy: &str| {
            lookup(primary)
                .or_else(|| lookup(legacy))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigurationError::MissingSecret(primary))
        };

        Ok(Self {
            datastore_host: read(DATASTORE_HOST_VAR, LEGACY_DATASTORE_HOST_VAR)?,
            datastore_api_key: read(DATASTORE_API_KEY_VAR, LEGACY_DATASTORE_API_KEY_VAR)?,
            expected_api_key: read(EXPECTED_API_KEY_VAR, LEGACY_EXPECTED_API_KEY_VAR)?,
        })
    }

    /// Every secret value, for scanning outbound text.
    pub fn values(&self) -> [&str; 3] {
        [
            self.datastore_host.as_str(),
            self.datastore_api_key.as_str(),
            self.expected_api_key.as_str(),
        ]
    }
}

/// Return a copy of `config` with the datastore connection filled in.
/// The input stays credential-free so it can still be logged.
pub fn resolve(config: &GeneratedConfig, secrets: &Secrets) -> GeneratedConfig {
    GeneratedConfig {
        elasticsearch: Some(DatastoreConnection {
            host: secrets.datastore_host.clone(),
            api_key: secrets.datastore_api_key.clone(),
        }),
        ..config.clone()
    }
}
