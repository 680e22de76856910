// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use tracing::debug;

use crate::api::routes::{ok, ApiResponse, ApiResult, Body, Id, Params};
use crate::api::{AppState, CurrentUser};
use crate::error::{Error, Result};
use crate::graph::adjacency::{self, NeighborPage};
use crate::graph::lifecycle::{self, AcceptOutcome, DecisionOutcome, RemoveOutcome};
use crate::models::{ConnectionRequest, ConnectionType, RequestStatus, RequestType};
use crate::storage::RequestDirection;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBody {
    pub requested_id: i64,
    pub request_type: String,
}

#[derive(Debug, Deserialize)]
pub struct NeighborParams {
    pub cursor: Option<String>,
    pub limit: Option<usize>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RequestListParams {
    pub direction: Option<String>,
    pub status: Option<String>,
}

/// `POST /connections/request`
pub async fn request_connection(
    State(state): State<AppState>,
    user: CurrentUser,
    Body(body): Body<SubmitBody>,
) -> Result<(StatusCode, Json<ApiResponse<ConnectionRequest>>)> {
    let request_type = RequestType::from_wire(&body.request_type)
        .map_err(|e| Error::bad_request(e.to_string()))?;
    debug!(
        "Connection request from {} to {} ({})",
        user.id(),
        body.requested_id,
        request_type
    );

    let request = lifecycle::submit(
        state.store.as_ref(),
        &state.notifier,
        user.id(),
        body.requested_id,
        request_type,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(request))))
}

/// `POST /connections/:id/accept`
pub async fn accept_request(
    State(state): State<AppState>,
    user: CurrentUser,
    Id(request_id): Id<i64>,
) -> ApiResult<AcceptOutcome> {
    ok(lifecycle::accept(state.store.as_ref(), &state.notifier, request_id, user.id()).await?)
}

/// `POST /connections/:id/decline`
pub async fn decline_request(
    State(state): State<AppState>,
    user: CurrentUser,
    Id(request_id): Id<i64>,
) -> ApiResult<DecisionOutcome> {
    ok(lifecycle::decline(state.store.as_ref(), request_id, user.id()).await?)
}

/// `DELETE /connections/:id/cancel`
pub async fn cancel_request(
    State(state): State<AppState>,
    user: CurrentUser,
    Id(request_id): Id<i64>,
) -> ApiResult<DecisionOutcome> {
    ok(lifecycle::cancel(state.store.as_ref(), request_id, user.id()).await?)
}

/// `DELETE /connections/:id`, where the id is the other user.
pub async fn remove_connection(
    State(state): State<AppState>,
    user: CurrentUser,
    Id(other_user_id): Id<i64>,
) -> ApiResult<RemoveOutcome> {
    ok(lifecycle::remove(state.store.as_ref(), user.id(), other_user_id).await?)
}

/// `GET /connections?cursor&limit&type`
pub async fn list_connections(
    State(state): State<AppState>,
    user: CurrentUser,
    Params(params): Params<NeighborParams>,
) -> ApiResult<NeighborPage> {
    let kind = params
        .kind
        .as_deref()
        .map(str::parse::<ConnectionType>)
        .transpose()
        .map_err(|e| Error::bad_request(e.to_string()))?;
    let limit = state.feed.clamp(params.limit);

    ok(adjacency::neighbors_of(
        state.store.as_ref(),
        user.id(),
        kind,
        params.cursor.as_deref(),
        limit,
    )
    .await?)
}

/// `GET /connections/requests?direction&status`
pub async fn list_requests(
    State(state): State<AppState>,
    user: CurrentUser,
    Params(params): Params<RequestListParams>,
) -> ApiResult<Vec<ConnectionRequest>> {
    let direction = match params.direction.as_deref() {
        None | Some("incoming") => RequestDirection::Incoming,
        Some("outgoing") => RequestDirection::Outgoing,
        Some(other) => {
            return Err(Error::bad_request(format!("Invalid direction: {}", other)));
        }
    };
    let status = match params.status.as_deref() {
        None => RequestStatus::Pending,
        Some(raw) => raw
            .parse::<RequestStatus>()
            .map_err(|e| Error::bad_request(e.to_string()))?,
    };

    ok(lifecycle::list_requests(state.store.as_ref(), user.id(), direction, Some(status)).await?)
}
