// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! Group, subnet and round-table membership.
//!
//! Each kind pairs a membership row (role, moderator or ban flag) with
//! join requests or direct additions, and hides its roster from outsiders
//! the same way the relationship graph hides vetoed users.

pub mod groups;
pub mod round_tables;
pub mod subnets;

use crate::error::{Error, Result};
use crate::storage::Tx;

/// Rejects names that are blank after trimming; returns the trimmed name.
pub(crate) fn clean_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::bad_request("name must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// The user behind a join request or an addition must still be reachable.
pub(crate) async fn ensure_reachable(tx: &mut dyn Tx, user_id: i64) -> Result<()> {
    match tx.get_user(user_id).await? {
        Some(user) if user.is_reachable() => Ok(()),
        _ => Err(Error::not_found("User not found")),
    }
}
