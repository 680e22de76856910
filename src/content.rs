// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! Posts and the read paths that go through the audience resolver: single
//! post, feed, and media read URLs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::graph::visibility::{self, Audience, Relation};
use crate::media::MediaSigner;
use crate::models::{self, NewPost, Post, SubNetRole, Visibility};
use crate::storage::{FeedQuery, Store};

/// Validated input of a new post.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDraft {
    pub content: String,
    pub visibility: Visibility,
    #[serde(default)]
    pub subnet_id: Option<i64>,
    #[serde(default)]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub media_key: Option<String>,
}

/// A post as one viewer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub relation: Relation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub posts: Vec<PostView>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRead {
    pub post_id: i64,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Publishes a post after checking that the author may write to the
/// audience it names.
pub async fn create_post(store: &dyn Store, author_id: i64, draft: PostDraft) -> Result<Post> {
    if draft.content.trim().is_empty() {
        return Err(Error::bad_request("content must not be empty"));
    }

    match (draft.visibility, draft.subnet_id, draft.group_id) {
        (Visibility::Subnet, Some(subnet_id), None) => {
            ensure_subnet_writer(store, subnet_id, author_id).await?;
        }
        (Visibility::Subnet, _, _) => {
            return Err(Error::bad_request(
                "SUBNET posts require subnetId and no groupId",
            ));
        }
        (Visibility::Group, None, Some(group_id)) => {
            ensure_group_writer(store, group_id, author_id).await?;
        }
        (Visibility::Group, _, _) => {
            return Err(Error::bad_request(
                "GROUP posts require groupId and no subnetId",
            ));
        }
        (_, None, None) => {}
        (visibility, _, _) => {
            return Err(Error::bad_request(format!(
                "{} posts cannot name a subnet or group",
                visibility
            )));
        }
    }

    let media_key = draft
        .media_key
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty());

    let mut tx = store.begin().await?;
    let post = tx
        .insert_post(&NewPost {
            author_id,
            content: draft.content,
            visibility: draft.visibility,
            subnet_id: draft.subnet_id,
            group_id: draft.group_id,
            media_key,
            created_at: models::now(),
        })
        .await?;
    tx.commit().await?;

    info!(post_id = post.id, author_id, visibility = %post.visibility, "Post created");
    Ok(post)
}

async fn ensure_subnet_writer(store: &dyn Store, subnet_id: i64, author_id: i64) -> Result<()> {
    let subnet = store
        .get_subnet(subnet_id)
        .await?
        .ok_or_else(|| Error::not_found("SubNet not found"))?;
    if subnet.owner_id == author_id {
        return Ok(());
    }

    match store.get_subnet_member(subnet_id, author_id).await? {
        Some(member) if member.role >= SubNetRole::Contributor => Ok(()),
        _ => Err(Error::forbidden(
            "Posting to this subnet requires the CONTRIBUTOR role",
        )),
    }
}

async fn ensure_group_writer(store: &dyn Store, group_id: i64, author_id: i64) -> Result<()> {
    if store.get_group(group_id).await?.is_none() {
        return Err(Error::not_found("Group not found"));
    }

    match store.get_group_member(group_id, author_id).await? {
        Some(member) if member.is_active() => Ok(()),
        _ => Err(Error::forbidden("Only group members can post to this group")),
    }
}

/// Loads a post for `viewer_id`, refusing it when the resolver denies.
pub async fn get_post(store: &dyn Store, viewer_id: i64, post_id: i64) -> Result<PostView> {
    let post = store
        .get_post(post_id)
        .await?
        .ok_or_else(|| Error::not_found("Post not found"))?;

    if !visibility::can_view(store, viewer_id, &post).await? {
        return Err(Error::forbidden("You do not have access to this post"));
    }

    let relation = visibility::relation_label(store, viewer_id, post.author_id).await?;
    Ok(PostView { post, relation })
}

/// One page of the viewer's feed, newest first.
///
/// Candidates are the viewer's own posts, posts by users the viewer has an
/// adjacency row towards, and posts in the viewer's subnets and groups.
/// Every candidate still goes through the resolver, so a candidate the
/// viewer may not read is skipped and the next batch is fetched.
pub async fn feed(
    store: &dyn Store,
    viewer_id: i64,
    cursor: Option<&str>,
    limit: usize,
) -> Result<FeedPage> {
    let limit = limit.max(1);
    let mut before = cursor.map(decode_feed_cursor).transpose()?;
    let mut audience = Audience::load(store, viewer_id).await?;

    let mut authors: Vec<i64> = audience.followed_authors().collect();
    authors.push(viewer_id);
    let subnet_ids: Vec<i64> = audience.subnet_ids().collect();
    let group_ids: Vec<i64> = audience.group_ids().collect();

    let mut visible: Vec<Post> = Vec::with_capacity(limit + 1);
    let mut skipped = 0usize;
    'fetch: loop {
        let batch = store
            .feed_candidates(&FeedQuery {
                authors: authors.clone(),
                subnet_ids: subnet_ids.clone(),
                group_ids: group_ids.clone(),
                before,
                limit,
            })
            .await?;
        let exhausted = batch.len() <= limit;

        for post in batch {
            before = Some(post.id);
            if audience.can_view(store, &post).await? {
                visible.push(post);
                if visible.len() > limit {
                    break 'fetch;
                }
            } else {
                skipped += 1;
            }
        }

        if exhausted {
            break;
        }
    }

    let has_more = visible.len() > limit;
    visible.truncate(limit);
    let next_cursor = if has_more {
        visible.last().map(|post| post.id.to_string())
    } else {
        None
    };
    debug!(viewer_id, returned = visible.len(), skipped, has_more, "Assembled feed page");

    let posts = visible
        .into_iter()
        .map(|post| PostView {
            relation: audience.relation(post.author_id),
            post,
        })
        .collect();

    Ok(FeedPage {
        posts,
        next_cursor,
        has_more,
    })
}

fn decode_feed_cursor(raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| Error::bad_request("Invalid cursor"))
}

/// Issues a read URL for a post's media when the viewer may read the post.
pub async fn presign_media_read(
    store: &dyn Store,
    signer: &dyn MediaSigner,
    viewer_id: i64,
    post_id: i64,
) -> Result<MediaRead> {
    let post = store
        .get_post(post_id)
        .await?
        .ok_or_else(|| Error::not_found("Post not found"))?;
    let media_key = post
        .media_key
        .as_deref()
        .ok_or_else(|| Error::not_found("Post has no media"))?;

    if !visibility::can_view(store, viewer_id, &post).await? {
        return Err(Error::forbidden("You do not have access to this media"));
    }

    let read = signer
        .presign_read(media_key)
        .map_err(|e| Error::Internal(format!("failed to presign media read: {}", e)))?;
    debug!(viewer_id, post_id, "Issued media read URL");

    Ok(MediaRead {
        post_id,
        url: read.url,
        expires_at: read.expires_at,
    })
}
