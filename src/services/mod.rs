// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

pub mod auth_middleware;
pub mod credentials;
pub mod executor;
pub mod logging;
pub mod result_parser;
pub mod sanitizer;
pub mod translator;
