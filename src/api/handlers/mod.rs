// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

pub mod connections;
pub mod groups;
pub mod health;
pub mod metrics;
pub mod posts;
pub mod round_tables;
pub mod subnets;
