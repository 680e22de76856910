// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::posts;

text_enum! {
    /// Audience class of a post.
    pub enum Visibility {
        Public => "PUBLIC",
        Connections => "CONNECTIONS",
        Acquaintances => "ACQUAINTANCES",
        Subnet => "SUBNET",
        Group => "GROUP",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = posts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub content: String,
    pub visibility: Visibility,
    pub subnet_id: Option<i64>,
    pub group_id: Option<i64>,
    pub media_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = posts)]
pub struct NewPost {
    pub author_id: i64,
    pub content: String,
    pub visibility: Visibility,
    pub subnet_id: Option<i64>,
    pub group_id: Option<i64>,
    pub media_key: Option<String>,
    pub created_at: DateTime<Utc>,
}
