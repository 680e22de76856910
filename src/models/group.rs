// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::{group_join_requests, group_members, groups};

text_enum! {
    pub enum GroupKind {
        Standard => "STANDARD",
        /// Single-owner group; nobody else can ask to join.
        Personal => "PERSONAL",
    }
}

text_enum! {
    #[derive(PartialOrd, Ord)]
    pub enum GroupRole {
        Member => "MEMBER",
        Admin => "ADMIN",
    }
}

text_enum! {
    /// State of a join request for a group or a round table.
    pub enum JoinStatus {
        Pending => "PENDING",
        Accepted => "ACCEPTED",
        Declined => "DECLINED",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = groups)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub kind: GroupKind,
    pub is_hidden: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = groups)]
pub struct NewGroup {
    pub owner_id: i64,
    pub name: String,
    pub kind: GroupKind,
    pub is_hidden: bool,
    pub created_at: DateTime<Utc>,
}

/// Group membership row. Banned members keep their row so they cannot
/// simply ask to join again.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = group_members)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub group_id: i64,
    pub user_id: i64,
    pub role: GroupRole,
    pub is_banned: bool,
    pub joined_at: DateTime<Utc>,
}

impl GroupMember {
    pub fn is_active(&self) -> bool {
        !self.is_banned
    }

    pub fn is_admin(&self) -> bool {
        !self.is_banned && self.role == GroupRole::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = group_join_requests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct GroupJoinRequest {
    pub id: i64,
    pub group_id: i64,
    pub user_id: i64,
    pub status: JoinStatus,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}
