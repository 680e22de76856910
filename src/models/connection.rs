// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::{connection_requests, connections, user_connections};

text_enum! {
    /// Type of a materialized relationship between two users.
    pub enum ConnectionType {
        Acquaintance => "ACQUAINTANCE",
        Stranger => "STRANGER",
        IsFollowing => "IS_FOLLOWING",
    }
}

impl ConnectionType {
    /// Rank in the precedence policy, ACQUAINTANCE > STRANGER > IS_FOLLOWING.
    pub const fn precedence(self) -> u8 {
        match self {
            ConnectionType::Acquaintance => 3,
            ConnectionType::Stranger => 2,
            ConnectionType::IsFollowing => 1,
        }
    }

    /// Whether the adjacency projection holds a row for both users.
    pub const fn is_bidirectional(self) -> bool {
        match self {
            ConnectionType::Acquaintance | ConnectionType::Stranger => true,
            ConnectionType::IsFollowing => false,
        }
    }
}

text_enum! {
    /// Type named in a relationship request.
    pub enum RequestType {
        Acquaintance => "ACQUAINTANCE",
        Stranger => "STRANGER",
        #[serde(alias = "IS_FOLLOWING")]
        Follow => "FOLLOW",
    }
}

impl RequestType {
    /// Parses a client-supplied type; `IS_FOLLOWING` is accepted as a
    /// synonym of `FOLLOW`.
    pub fn from_wire(raw: &str) -> Result<Self, super::UnknownVariant> {
        match raw {
            "IS_FOLLOWING" => Ok(RequestType::Follow),
            other => other.parse(),
        }
    }

    /// Connection type an accepted request of this type materializes as.
    pub const fn materialize(self) -> ConnectionType {
        match self {
            RequestType::Acquaintance => ConnectionType::Acquaintance,
            RequestType::Stranger => ConnectionType::Stranger,
            RequestType::Follow => ConnectionType::IsFollowing,
        }
    }
}

text_enum! {
    /// Negotiation state of a [`ConnectionRequest`].
    pub enum RequestStatus {
        Pending => "PENDING",
        Accepted => "ACCEPTED",
        Declined => "DECLINED",
        Canceled => "CANCELED",
    }
}

/// Canonical undirected relationship record, unique per unordered pair.
///
/// `requester_id`/`requested_id` record who most recently changed the row;
/// `user_low`/`user_high` hold the same pair in ascending order and carry
/// the uniqueness constraint.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = connections)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: i64,
    pub requester_id: i64,
    pub requested_id: i64,
    pub user_low: i64,
    pub user_high: i64,
    pub kind: ConnectionType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// DTO for creating or re-typing the connection of a pair
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = connections)]
pub struct NewConnection {
    pub requester_id: i64,
    pub requested_id: i64,
    pub user_low: i64,
    pub user_high: i64,
    pub kind: ConnectionType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewConnection {
    pub fn new(requester_id: i64, requested_id: i64, kind: ConnectionType) -> Self {
        let (user_low, user_high) = ordered_pair(requester_id, requested_id);
        let now = super::now();
        Self {
            requester_id,
            requested_id,
            user_low,
            user_high,
            kind,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Adjacency projection row: `user_id` is connected to `other_user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = user_connections)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct UserConnection {
    pub id: i64,
    pub connection_id: i64,
    pub user_id: i64,
    pub other_user_id: i64,
    pub kind: ConnectionType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = user_connections)]
pub struct NewUserConnection {
    pub connection_id: i64,
    pub user_id: i64,
    pub other_user_id: i64,
    pub kind: ConnectionType,
    pub created_at: DateTime<Utc>,
}

/// Directed negotiation record, unique per ordered (requester, requested) pair.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = connection_requests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequest {
    pub id: i64,
    pub requester_id: i64,
    pub requested_id: i64,
    pub request_type: RequestType,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = connection_requests)]
pub struct NewConnectionRequest {
    pub requester_id: i64,
    pub requested_id: i64,
    pub request_type: RequestType,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl NewConnectionRequest {
    pub fn pending(requester_id: i64, requested_id: i64, request_type: RequestType) -> Self {
        Self {
            requester_id,
            requested_id,
            request_type,
            status: RequestStatus::Pending,
            created_at: super::now(),
            decided_at: None,
        }
    }
}

/// Returns the pair in ascending order.
pub fn ordered_pair(a: i64, b: i64) -> (i64, i64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
