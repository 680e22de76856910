// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::api::routes::{ok, ApiResponse, ApiResult, Body, Id};
use crate::api::{AppState, CurrentUser};
use crate::error::Result;
use crate::membership::subnets::{self, AddMembers, AddOutcome, RemoveOutcome, Roster};
use crate::models::{SubNet, SubNetMember, SubNetRole};

#[derive(Debug, Deserialize)]
pub struct CreateBody {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RoleBody {
    pub role: SubNetRole,
}

/// `POST /subnets`
pub async fn create_subnet(
    State(state): State<AppState>,
    user: CurrentUser,
    Body(body): Body<CreateBody>,
) -> Result<(StatusCode, Json<ApiResponse<SubNet>>)> {
    let subnet = subnets::create_subnet(state.store.as_ref(), user.id(), &body.name).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(subnet))))
}

/// `POST /subnets/:id/members`
pub async fn add_members(
    State(state): State<AppState>,
    user: CurrentUser,
    Id(subnet_id): Id<i64>,
    Body(body): Body<AddMembers>,
) -> ApiResult<AddOutcome> {
    ok(subnets::add_members(state.store.as_ref(), subnet_id, user.id(), body).await?)
}

/// `DELETE /subnets/:id/members/:user_id`
pub async fn remove_member(
    State(state): State<AppState>,
    user: CurrentUser,
    Id((subnet_id, member_id)): Id<(i64, i64)>,
) -> ApiResult<RemoveOutcome> {
    ok(subnets::remove_member(state.store.as_ref(), subnet_id, user.id(), member_id).await?)
}

/// `PATCH /subnets/:id/members/:user_id`
pub async fn change_role(
    State(state): State<AppState>,
    user: CurrentUser,
    Id((subnet_id, member_id)): Id<(i64, i64)>,
    Body(body): Body<RoleBody>,
) -> ApiResult<SubNetMember> {
    ok(subnets::change_role(state.store.as_ref(), subnet_id, user.id(), member_id, body.role).await?)
}

/// `GET /subnets/:id/members`
pub async fn list_members(
    State(state): State<AppState>,
    user: CurrentUser,
    Id(subnet_id): Id<i64>,
) -> ApiResult<Roster> {
    ok(subnets::roster(state.store.as_ref(), subnet_id, user.id()).await?)
}
