// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::api::routes::{ok, ApiResponse, ApiResult, Body, Id, PageParams, Params};
use crate::api::{AppState, CurrentUser};
use crate::content::{self, FeedPage, MediaRead, PostDraft, PostView};
use crate::error::Result;
use crate::models::Post;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignBody {
    pub post_id: i64,
}

/// `POST /posts`
pub async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Body(draft): Body<PostDraft>,
) -> Result<(StatusCode, Json<ApiResponse<Post>>)> {
    let post = content::create_post(state.store.as_ref(), user.id(), draft).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(post))))
}

/// `GET /posts/:id`
pub async fn get_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Id(post_id): Id<i64>,
) -> ApiResult<PostView> {
    ok(content::get_post(state.store.as_ref(), user.id(), post_id).await?)
}

/// `GET /feed?cursor&limit`
pub async fn get_feed(
    State(state): State<AppState>,
    user: CurrentUser,
    Params(params): Params<PageParams>,
) -> ApiResult<FeedPage> {
    let limit = state.feed.clamp(params.limit);
    ok(content::feed(state.store.as_ref(), user.id(), params.cursor.as_deref(), limit).await?)
}

/// `POST /media/presign-read`
pub async fn presign_read(
    State(state): State<AppState>,
    user: CurrentUser,
    Body(body): Body<PresignBody>,
) -> ApiResult<MediaRead> {
    ok(content::presign_media_read(
        state.store.as_ref(),
        state.media.as_ref(),
        user.id(),
        body.post_id,
    )
    .await?)
}
