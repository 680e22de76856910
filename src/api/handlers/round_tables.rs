// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::api::routes::{ok, ApiResponse, ApiResult, Body, Id};
use crate::api::{AppState, CurrentUser};
use crate::error::Result;
use crate::membership::round_tables;
use crate::models::{RoundTable, RoundTableJoinRequest};

#[derive(Debug, Deserialize)]
pub struct CreateBody {
    pub name: String,
}

/// `POST /round-tables`
pub async fn create_round_table(
    State(state): State<AppState>,
    user: CurrentUser,
    Body(body): Body<CreateBody>,
) -> Result<(StatusCode, Json<ApiResponse<RoundTable>>)> {
    let table = round_tables::create_round_table(state.store.as_ref(), user.id(), &body.name).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(table))))
}

/// `POST /round-tables/:id/join`
pub async fn join(
    State(state): State<AppState>,
    user: CurrentUser,
    Id(round_table_id): Id<i64>,
) -> ApiResult<RoundTableJoinRequest> {
    ok(round_tables::request_join(state.store.as_ref(), round_table_id, user.id()).await?)
}

/// `GET /round-tables/:id/join-requests`
pub async fn list_join_requests(
    State(state): State<AppState>,
    user: CurrentUser,
    Id(round_table_id): Id<i64>,
) -> ApiResult<Vec<RoundTableJoinRequest>> {
    ok(round_tables::list_join_requests(state.store.as_ref(), round_table_id, user.id()).await?)
}

/// `POST /round-tables/:id/join-requests/:request_id/accept`
pub async fn accept_join_request(
    State(state): State<AppState>,
    user: CurrentUser,
    Id((round_table_id, request_id)): Id<(i64, i64)>,
) -> ApiResult<RoundTableJoinRequest> {
    ok(round_tables::decide_join_request(
        state.store.as_ref(),
        round_table_id,
        request_id,
        user.id(),
        true,
    )
    .await?)
}

/// `POST /round-tables/:id/join-requests/:request_id/decline`
pub async fn decline_join_request(
    State(state): State<AppState>,
    user: CurrentUser,
    Id((round_table_id, request_id)): Id<(i64, i64)>,
) -> ApiResult<RoundTableJoinRequest> {
    ok(round_tables::decide_join_request(
        state.store.as_ref(),
        round_table_id,
        request_id,
        user.id(),
        false,
    )
    .await?)
}
