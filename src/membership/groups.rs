// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use serde::Deserialize;
use tracing::{debug, info};

use super::{clean_name, ensure_reachable};
use crate::error::{Conflict, Error, Result};
use crate::metrics;
use crate::models::{
    self, Group, GroupJoinRequest, GroupKind, GroupMember, GroupRole, JoinStatus, NewGroup,
};
use crate::storage::Store;

const GROUP_NOT_FOUND: &str = "Group not found";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDraft {
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: GroupKind,
    #[serde(default)]
    pub hidden: bool,
}

fn default_kind() -> GroupKind {
    GroupKind::Standard
}

fn is_admin(group: &Group, user_id: i64, member: Option<&GroupMember>) -> bool {
    group.owner_id == user_id || member.map_or(false, GroupMember::is_admin)
}

async fn load_group(store: &dyn Store, group_id: i64) -> Result<Group> {
    store
        .get_group(group_id)
        .await?
        .ok_or_else(|| Error::not_found(GROUP_NOT_FOUND))
}

/// Creates a group; the creator becomes its first ADMIN.
pub async fn create_group(store: &dyn Store, owner_id: i64, draft: GroupDraft) -> Result<Group> {
    let name = clean_name(&draft.name)?;

    let mut tx = store.begin().await?;
    let now = models::now();
    let group = tx
        .insert_group(&NewGroup {
            owner_id,
            name,
            kind: draft.kind,
            is_hidden: draft.hidden,
            created_at: now,
        })
        .await?;
    tx.insert_group_member(&GroupMember {
        group_id: group.id,
        user_id: owner_id,
        role: GroupRole::Admin,
        is_banned: false,
        joined_at: now,
    })
    .await?;
    tx.commit().await?;

    info!(group_id = group.id, owner_id, kind = %group.kind, "Group created");
    Ok(group)
}

/// Files a join request for `user_id`.
pub async fn request_join(store: &dyn Store, group_id: i64, user_id: i64) -> Result<GroupJoinRequest> {
    let result = request_join_inner(store, group_id, user_id).await;
    metrics::record_membership("group_join", &result);
    result
}

async fn request_join_inner(
    store: &dyn Store,
    group_id: i64,
    user_id: i64,
) -> Result<GroupJoinRequest> {
    let group = load_group(store, group_id).await?;

    if group.kind == GroupKind::Personal {
        return if group.owner_id == user_id {
            Err(Error::bad_request("You cannot join your own personal group"))
        } else {
            debug!(group_id, user_id, "Join refused: personal group");
            Err(Error::not_found(GROUP_NOT_FOUND))
        };
    }

    let mut tx = store.begin().await?;
    let member = tx.get_group_member(group_id, user_id).await?;
    match member {
        None if group.is_hidden => {
            debug!(group_id, user_id, "Join refused: hidden group");
            return Err(Error::not_found(GROUP_NOT_FOUND));
        }
        Some(member) if member.is_banned => {
            return Err(Error::forbidden("You are banned from this group"));
        }
        Some(_) => return Err(Conflict::AlreadyMember.into()),
        None => {}
    }

    if let Some(existing) = tx.find_group_join_request(group_id, user_id).await? {
        if existing.status == JoinStatus::Pending {
            return Err(Conflict::JoinAlreadyPending.into());
        }
    }

    let request = tx
        .upsert_group_join_request(group_id, user_id, models::now())
        .await?;
    tx.commit().await?;

    info!(request_id = request.id, group_id, user_id, "Group join requested");
    Ok(request)
}

/// Pending join requests; admins only.
pub async fn list_join_requests(
    store: &dyn Store,
    group_id: i64,
    actor_id: i64,
) -> Result<Vec<GroupJoinRequest>> {
    let group = load_group(store, group_id).await?;
    let member = store.get_group_member(group_id, actor_id).await?;

    if !is_admin(&group, actor_id, member.as_ref()) {
        return Err(outsider_error(&group, member.as_ref()));
    }
    Ok(store
        .list_group_join_requests(group_id, JoinStatus::Pending)
        .await?)
}

/// Hidden groups stay invisible to non-members; everyone else learns the
/// action is not theirs to take.
fn outsider_error(group: &Group, member: Option<&GroupMember>) -> Error {
    if group.is_hidden && !member.map_or(false, GroupMember::is_active) {
        Error::not_found(GROUP_NOT_FOUND)
    } else {
        Error::forbidden("Only group admins can do this")
    }
}

/// Accepts or declines a pending join request; admins only. Acceptance
/// adds the MEMBER row in the same transaction.
pub async fn decide_join_request(
    store: &dyn Store,
    group_id: i64,
    request_id: i64,
    actor_id: i64,
    accept: bool,
) -> Result<GroupJoinRequest> {
    let result = decide_join_request_inner(store, group_id, request_id, actor_id, accept).await;
    let operation = if accept { "group_accept" } else { "group_decline" };
    metrics::record_membership(operation, &result);
    result
}

async fn decide_join_request_inner(
    store: &dyn Store,
    group_id: i64,
    request_id: i64,
    actor_id: i64,
    accept: bool,
) -> Result<GroupJoinRequest> {
    let group = load_group(store, group_id).await?;

    let mut tx = store.begin().await?;
    let actor = tx.get_group_member(group_id, actor_id).await?;
    if !is_admin(&group, actor_id, actor.as_ref()) {
        return Err(outsider_error(&group, actor.as_ref()));
    }

    let request = tx
        .lock_group_join_request(request_id)
        .await?
        .filter(|r| r.group_id == group_id)
        .ok_or_else(|| Error::not_found("Join request not found"))?;
    if request.status != JoinStatus::Pending {
        return Err(Conflict::NotPending(request.status.as_str()).into());
    }

    let now = models::now();
    let status = if accept {
        ensure_reachable(tx.as_mut(), request.user_id).await?;
        let inserted = tx
            .insert_group_member(&GroupMember {
                group_id,
                user_id: request.user_id,
                role: GroupRole::Member,
                is_banned: false,
                joined_at: now,
            })
            .await?;
        if !inserted {
            return Err(Conflict::AlreadyMember.into());
        }
        JoinStatus::Accepted
    } else {
        JoinStatus::Declined
    };
    let request = tx
        .set_group_join_request_status(request.id, status, now)
        .await?;
    tx.commit().await?;

    info!(request_id, group_id, %status, "Group join request decided");
    Ok(request)
}

/// The roster as `viewer_id` may see it. Banned rows are only listed to
/// admins; hidden groups only to their members.
pub async fn list_members(store: &dyn Store, group_id: i64, viewer_id: i64) -> Result<Vec<GroupMember>> {
    let group = load_group(store, group_id).await?;
    let viewer = store.get_group_member(group_id, viewer_id).await?;
    let admin = is_admin(&group, viewer_id, viewer.as_ref());

    if group.is_hidden && !admin && !viewer.as_ref().map_or(false, GroupMember::is_active) {
        return Err(Error::not_found(GROUP_NOT_FOUND));
    }

    let members = store.list_group_members(group_id).await?;
    Ok(members
        .into_iter()
        .filter(|member| admin || member.is_active())
        .collect())
}

/// Bans `user_id` from the group; admins only, and never the owner. A
/// pending join request of the user is declined with it.
pub async fn ban_member(
    store: &dyn Store,
    group_id: i64,
    user_id: i64,
    actor_id: i64,
) -> Result<GroupMember> {
    let result = ban_member_inner(store, group_id, user_id, actor_id).await;
    metrics::record_membership("group_ban", &result);
    result
}

async fn ban_member_inner(
    store: &dyn Store,
    group_id: i64,
    user_id: i64,
    actor_id: i64,
) -> Result<GroupMember> {
    let group = load_group(store, group_id).await?;

    let mut tx = store.begin().await?;
    let actor = tx.get_group_member(group_id, actor_id).await?;
    if !is_admin(&group, actor_id, actor.as_ref()) {
        return Err(outsider_error(&group, actor.as_ref()));
    }
    if user_id == group.owner_id {
        return Err(Error::forbidden("The group owner cannot be banned"));
    }
    if user_id == actor_id {
        return Err(Error::bad_request("You cannot ban yourself"));
    }

    let now = models::now();
    let member = tx.ban_group_member(group_id, user_id, now).await?;
    if let Some(pending) = tx.find_group_join_request(group_id, user_id).await? {
        if pending.status == JoinStatus::Pending {
            tx.set_group_join_request_status(pending.id, JoinStatus::Declined, now)
                .await?;
        }
    }
    tx.commit().await?;

    info!(group_id, user_id, actor_id, "Group member banned");
    Ok(member)
}

#[cfg(test)]
mod tests {
    use tokio_test::assert_ok;

    use super::*;
    use crate::storage::MemoryStore;

    fn draft(kind: GroupKind, hidden: bool) -> GroupDraft {
        GroupDraft {
            name: "club".into(),
            kind,
            hidden,
        }
    }

    #[tokio::test]
    async fn join_flow_adds_a_member_on_accept() {
        let store = MemoryStore::new();
        let owner = store.insert_user("owner").await.id;
        let joiner = store.insert_user("joiner").await.id;
        let group = create_group(&store, owner, draft(GroupKind::Standard, false))
            .await
            .unwrap();

        let request = request_join(&store, group.id, joiner).await.unwrap();
        assert_eq!(request.status, JoinStatus::Pending);
        assert!(matches!(
            request_join(&store, group.id, joiner).await,
            Err(Error::Conflict(Conflict::JoinAlreadyPending))
        ));

        let pending = list_join_requests(&store, group.id, owner).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!(matches!(
            list_join_requests(&store, group.id, joiner).await,
            Err(Error::Forbidden(_))
        ));

        let decided = decide_join_request(&store, group.id, request.id, owner, true)
            .await
            .unwrap();
        assert_eq!(decided.status, JoinStatus::Accepted);
        assert!(decided.decided_at.is_some());
        assert!(matches!(
            decide_join_request(&store, group.id, request.id, owner, false).await,
            Err(Error::Conflict(Conflict::NotPending("ACCEPTED")))
        ));

        let members = list_members(&store, group.id, joiner).await.unwrap();
        assert_eq!(members.len(), 2);
        assert!(matches!(
            request_join(&store, group.id, joiner).await,
            Err(Error::Conflict(Conflict::AlreadyMember))
        ));
    }

    #[tokio::test]
    async fn accepting_a_request_for_an_existing_member_conflicts() {
        let store = MemoryStore::new();
        let owner = store.insert_user("owner").await.id;
        let joiner = store.insert_user("joiner").await.id;
        let group = create_group(&store, owner, draft(GroupKind::Standard, false))
            .await
            .unwrap();
        let request = request_join(&store, group.id, joiner).await.unwrap();

        // The membership row lands after the request was filed.
        let mut tx = store.begin().await.unwrap();
        tx.insert_group_member(&GroupMember {
            group_id: group.id,
            user_id: joiner,
            role: GroupRole::Member,
            is_banned: false,
            joined_at: models::now(),
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert!(matches!(
            decide_join_request(&store, group.id, request.id, owner, true).await,
            Err(Error::Conflict(Conflict::AlreadyMember))
        ));
        let pending = store
            .list_group_join_requests(group.id, JoinStatus::Pending)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn personal_groups_refuse_joins() {
        let store = MemoryStore::new();
        let owner = store.insert_user("owner").await.id;
        let other = store.insert_user("other").await.id;
        let group = create_group(&store, owner, draft(GroupKind::Personal, false))
            .await
            .unwrap();

        assert!(matches!(
            request_join(&store, group.id, other).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            request_join(&store, group.id, owner).await,
            Err(Error::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn hidden_groups_look_absent_to_outsiders() {
        let store = MemoryStore::new();
        let owner = store.insert_user("owner").await.id;
        let outsider = store.insert_user("outsider").await.id;
        let group = create_group(&store, owner, draft(GroupKind::Standard, true))
            .await
            .unwrap();

        assert!(matches!(
            request_join(&store, group.id, outsider).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            list_members(&store, group.id, outsider).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            list_join_requests(&store, group.id, outsider).await,
            Err(Error::NotFound(_))
        ));
        assert_ok!(list_members(&store, group.id, owner).await);
    }

    #[tokio::test]
    async fn bans_hide_the_row_and_block_rejoining() {
        let store = MemoryStore::new();
        let owner = store.insert_user("owner").await.id;
        let member = store.insert_user("member").await.id;
        let group = create_group(&store, owner, draft(GroupKind::Standard, false))
            .await
            .unwrap();
        let request = request_join(&store, group.id, member).await.unwrap();
        decide_join_request(&store, group.id, request.id, owner, true)
            .await
            .unwrap();

        assert!(matches!(
            ban_member(&store, group.id, owner, member).await,
            Err(Error::Forbidden(_))
        ));
        let banned = ban_member(&store, group.id, member, owner).await.unwrap();
        assert!(banned.is_banned);

        assert!(matches!(
            request_join(&store, group.id, member).await,
            Err(Error::Forbidden(_))
        ));

        let public_view = list_members(&store, group.id, member).await.unwrap();
        assert_eq!(public_view.len(), 1);
        let admin_view = list_members(&store, group.id, owner).await.unwrap();
        assert_eq!(admin_view.len(), 2);
    }

    #[tokio::test]
    async fn blank_names_are_rejected() {
        let store = MemoryStore::new();
        let owner = store.insert_user("owner").await.id;
        let err = create_group(
            &store,
            owner,
            GroupDraft {
                name: "   ".into(),
                kind: GroupKind::Standard,
                hidden: false,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }
}
