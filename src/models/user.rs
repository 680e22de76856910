// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::users;

/// Account record. Owned by the identity service; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub is_banned: bool,
    pub is_hidden: bool,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Banned and hidden accounts take part in no relationship or
    /// membership operation; callers report them as absent.
    pub fn is_reachable(&self) -> bool {
        !self.is_banned && !self.is_hidden
    }
}
