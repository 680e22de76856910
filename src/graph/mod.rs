// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

pub mod adjacency;
pub mod lifecycle;
pub mod visibility;

use tracing::debug;

use crate::error::{Error, Result};
use crate::storage::Tx;

/// Fails with `NotFound` unless both users exist, are neither banned nor
/// hidden, and no block stands between them. The same answer covers every
/// cause so the caller learns nothing about which one applied.
pub(crate) async fn ensure_unvetoed(
    tx: &mut dyn Tx,
    a: i64,
    b: i64,
    disguise: &'static str,
) -> Result<()> {
    for id in [a, b] {
        match tx.get_user(id).await? {
            Some(user) if user.is_reachable() => {}
            _ => {
                debug!(user_id = id, "Vetoed: user missing, banned or hidden");
                return Err(Error::not_found(disguise));
            }
        }
    }

    if tx.is_blocked(a, b).await? {
        debug!(a, b, "Vetoed: block between users");
        return Err(Error::not_found(disguise));
    }

    Ok(())
}
