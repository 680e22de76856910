// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

pub mod api;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod graph;
pub mod media;
pub mod membership;
pub mod metrics;
pub mod models;
pub mod notify;
pub mod schema;
pub mod storage;
