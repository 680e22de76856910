// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! Caller identity. The upstream gateway authenticates the session and
//! forwards the user id in [`USER_ID_HEADER`].

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::debug;

use super::AppState;
use crate::error::Error;
use crate::models::User;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller, loaded from the store.
///
/// Rejects with 401 when the header is absent, malformed or names an
/// unknown user, and with 403 when the account is banned.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.0.id
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| Error::Unauthorized("Missing caller identity".to_string()))?;
        let user_id = raw
            .to_str()
            .ok()
            .and_then(|value| value.trim().parse::<i64>().ok())
            .ok_or_else(|| Error::Unauthorized("Invalid caller identity".to_string()))?;

        let user = state.store.get_user(user_id).await?.ok_or_else(|| {
            debug!(user_id, "Caller is not a known user");
            Error::Unauthorized("Unknown caller".to_string())
        })?;
        if user.is_banned {
            return Err(Error::forbidden("Account is banned"));
        }

        Ok(CurrentUser(user))
    }
}
