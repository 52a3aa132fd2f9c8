// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! HTTP-triggered orchestration of an external crawler process.

pub mod app;
pub mod models;
pub mod services;
