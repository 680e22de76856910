// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::{subnet_members, subnets};

text_enum! {
    /// Subnet roles, ordered READER < CONTRIBUTOR < ADMIN.
    #[derive(PartialOrd, Ord)]
    pub enum SubNetRole {
        Reader => "READER",
        Contributor => "CONTRIBUTOR",
        Admin => "ADMIN",
    }
}

/// A user-curated audience. The owner is implicit and not counted in
/// `member_count`.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = subnets)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct SubNet {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub member_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = subnets)]
pub struct NewSubNet {
    pub owner_id: i64,
    pub name: String,
    pub member_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = subnet_members)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct SubNetMember {
    pub subnet_id: i64,
    pub user_id: i64,
    pub role: SubNetRole,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = subnet_members)]
pub struct NewSubNetMember {
    pub subnet_id: i64,
    pub user_id: i64,
    pub role: SubNetRole,
    pub added_at: DateTime<Utc>,
}
