// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Authentication helpers for Axum.
//!
//! Provides:
//! - `API_KEY_HEADER`: The header callers put their key in
//! - `AuthPolicy`: Pluggable check run before any crawl work
//! - `StaticApiKey`: Single shared-key policy
//! - `AuthError`: Error type for auth failures

use axum::http::{header, header::HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::crawl::ErrorResponse;

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Auth error responses.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing API key. Provide X-API-Key header.")]
    MissingKey,
    #[error("Invalid API key")]
    InvalidKey,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::MissingKey => StatusCode::UNAUTHORIZED,
            AuthError::InvalidKey => StatusCode::FORBIDDEN,
        };
        let mut response = (status, Json(ErrorResponse::new(self.to_string()))).into_response();
        if self == AuthError::MissingKey {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("ApiKey"));
        }
        response
    }
}

/// Decides whether a request may trigger a crawl. Swappable so that signed
/// tokens or per-caller keys can replace the shared key without touching the
/// crawl pipeline.
pub trait AuthPolicy: Send + Sync {
    fn authorize(&self, headers: &HeaderMap) -> Result<(), AuthError>;
}

/// Accepts exactly one shared key, compared by SHA-256 digest.
pub struct StaticApiKey {
    expected_digest: String,
}

impl StaticApiKey {
    pub fn new(expected_key: &str) -> Self {
        Self {
            expected_digest: hash_key(expected_key),
        }
    }
}

impl std::fmt::Debug for StaticApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticApiKey").finish_non_exhaustive()
    }
}

impl AuthPolicy for StaticApiKey {
    fn authorize(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let provided = extract_api_key(headers).ok_or(AuthError::MissingKey)?;
        if hash_key(provided) == self.expected_digest {
            Ok(())
        } else {
            Err(AuthError::InvalidKey)
        }
    }
}

/// Get the API key from the request headers. Blank values count as absent.
pub fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Hash a key so comparison time does not depend on where the keys differ.
fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}
