// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! The `user_connections` projection of the connection table.
//!
//! Every connection owns one adjacency row per direction it grants:
//! ACQUAINTANCE and STRANGER produce a row for each side, IS_FOLLOWING a
//! single follower → followed row. Rows are never patched; [`rewrite`]
//! deletes and regenerates the whole set inside the caller's transaction.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Connection, ConnectionType, NewUserConnection, UserConnection};
use crate::storage::{AdjacencyCursor, NeighborQuery, Store, Tx};

/// Adjacency rows implied by `connection` in its current type.
pub fn projection(connection: &Connection) -> Vec<NewUserConnection> {
    let forward = NewUserConnection {
        connection_id: connection.id,
        user_id: connection.requester_id,
        other_user_id: connection.requested_id,
        kind: connection.kind,
        created_at: connection.updated_at,
    };

    if connection.kind.is_bidirectional() {
        let backward = NewUserConnection {
            user_id: connection.requested_id,
            other_user_id: connection.requester_id,
            ..forward.clone()
        };
        vec![forward, backward]
    } else {
        vec![forward]
    }
}

/// Replaces the adjacency rows of `connection` with its current projection.
pub async fn rewrite(tx: &mut dyn Tx, connection: &Connection) -> Result<usize> {
    let removed = tx.delete_adjacency(connection.id).await?;
    let inserted = tx.insert_adjacency(&projection(connection)).await?;
    debug!(
        connection_id = connection.id,
        kind = %connection.kind,
        removed,
        inserted,
        "Rewrote adjacency"
    );
    Ok(inserted)
}

/// Highest-precedence type of the `user_id → other_user_id` row, if any.
pub async fn relationship_type(
    store: &dyn Store,
    user_id: i64,
    other_user_id: i64,
) -> Result<Option<ConnectionType>> {
    Ok(store.relationship_type(user_id, other_user_id).await?)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborPage {
    pub connections_list: Vec<UserConnection>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// One page of `user_id`'s adjacency, newest first.
pub async fn neighbors_of(
    store: &dyn Store,
    user_id: i64,
    kind: Option<ConnectionType>,
    cursor: Option<&str>,
    limit: usize,
) -> Result<NeighborPage> {
    let after = cursor.map(decode_cursor).transpose()?;
    let query = NeighborQuery {
        user_id,
        kind,
        after,
        limit,
    };
    let (rows, has_more) = store.neighbors_of(&query).await?;

    let next_cursor = if has_more {
        rows.last().map(|row| {
            encode_cursor(&AdjacencyCursor {
                created_at: row.created_at,
                other_user_id: row.other_user_id,
            })
        })
    } else {
        None
    };

    Ok(NeighborPage {
        connections_list: rows,
        next_cursor,
        has_more,
    })
}

pub fn encode_cursor(cursor: &AdjacencyCursor) -> String {
    let raw = format!(
        "{}:{}",
        cursor.created_at.timestamp_micros(),
        cursor.other_user_id
    );
    URL_SAFE_NO_PAD.encode(raw)
}

pub fn decode_cursor(encoded: &str) -> Result<AdjacencyCursor> {
    let invalid = || Error::bad_request("Invalid cursor");

    let bytes = URL_SAFE_NO_PAD.decode(encoded).map_err(|_| invalid())?;
    let raw = String::from_utf8(bytes).map_err(|_| invalid())?;
    let (micros, other) = raw.split_once(':').ok_or_else(invalid)?;

    let micros: i64 = micros.parse().map_err(|_| invalid())?;
    let other_user_id: i64 = other.parse().map_err(|_| invalid())?;
    let created_at: DateTime<Utc> = DateTime::from_timestamp_micros(micros).ok_or_else(invalid)?;

    Ok(AdjacencyCursor {
        created_at,
        other_user_id,
    })
}
