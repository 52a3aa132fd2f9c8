// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Logging setup and utilities for sensitive data masking.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "crawl_orchestrator=info";

/// Install the global tracing subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Mask a secret for logging.
/// Shows the first two characters and the length, hides the rest: "ab***(32 chars)"
pub fn mask_secret(secret: &str) -> String {
    let len = secret.chars().count();
    if len < 8 {
        // Too short to reveal any prefix
        return format!("***({} chars)", len);
    }
    let prefix: String = secret.chars().take(2).collect();
    format!("{}***({} chars)", prefix, len)
}
