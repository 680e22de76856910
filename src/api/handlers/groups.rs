// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use axum::{extract::State, http::StatusCode, Json};

use crate::api::routes::{ok, ApiResponse, ApiResult, Body, Id};
use crate::api::{AppState, CurrentUser};
use crate::error::Result;
use crate::membership::groups::{self, GroupDraft};
use crate::models::{Group, GroupJoinRequest, GroupMember};

/// `POST /groups`
pub async fn create_group(
    State(state): State<AppState>,
    user: CurrentUser,
    Body(draft): Body<GroupDraft>,
) -> Result<(StatusCode, Json<ApiResponse<Group>>)> {
    let group = groups::create_group(state.store.as_ref(), user.id(), draft).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(group))))
}

/// `POST /groups/:id/join`
pub async fn join_group(
    State(state): State<AppState>,
    user: CurrentUser,
    Id(group_id): Id<i64>,
) -> ApiResult<GroupJoinRequest> {
    ok(groups::request_join(state.store.as_ref(), group_id, user.id()).await?)
}

/// `GET /groups/:id/join-requests`
pub async fn list_join_requests(
    State(state): State<AppState>,
    user: CurrentUser,
    Id(group_id): Id<i64>,
) -> ApiResult<Vec<GroupJoinRequest>> {
    ok(groups::list_join_requests(state.store.as_ref(), group_id, user.id()).await?)
}

/// `POST /groups/:id/join-requests/:request_id/accept`
pub async fn accept_join_request(
    State(state): State<AppState>,
    user: CurrentUser,
    Id((group_id, request_id)): Id<(i64, i64)>,
) -> ApiResult<GroupJoinRequest> {
    ok(groups::decide_join_request(state.store.as_ref(), group_id, request_id, user.id(), true).await?)
}

/// `POST /groups/:id/join-requests/:request_id/decline`
pub async fn decline_join_request(
    State(state): State<AppState>,
    user: CurrentUser,
    Id((group_id, request_id)): Id<(i64, i64)>,
) -> ApiResult<GroupJoinRequest> {
    ok(groups::decide_join_request(state.store.as_ref(), group_id, request_id, user.id(), false).await?)
}

/// `GET /groups/:id/members`
pub async fn list_members(
    State(state): State<AppState>,
    user: CurrentUser,
    Id(group_id): Id<i64>,
) -> ApiResult<Vec<GroupMember>> {
    ok(groups::list_members(state.store.as_ref(), group_id, user.id()).await?)
}

/// `POST /groups/:id/members/:user_id/ban`
pub async fn ban_member(
    State(state): State<AppState>,
    user: CurrentUser,
    Id((group_id, member_id)): Id<(i64, i64)>,
) -> ApiResult<GroupMember> {
    ok(groups::ban_member(state.store.as_ref(), group_id, member_id, user.id()).await?)
}
