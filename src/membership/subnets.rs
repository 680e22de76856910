// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! Owner-curated audiences. Members are added directly by the owner or a
//! subnet ADMIN, never through join requests, and every candidate must
//! already share a connection with the owner.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::clean_name;
use crate::error::{Error, Result};
use crate::graph::ensure_unvetoed;
use crate::metrics;
use crate::models::{self, NewSubNet, NewSubNetMember, SubNet, SubNetMember, SubNetRole};
use crate::storage::{Store, Tx};

const SUBNET_NOT_FOUND: &str = "Subnet not found";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMembers {
    pub user_ids: Vec<i64>,
    #[serde(default = "default_role")]
    pub role: SubNetRole,
}

fn default_role() -> SubNetRole {
    SubNetRole::Reader
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOutcome {
    pub subnet_id: i64,
    /// Users that were not members before; repeats are skipped.
    pub added: Vec<i64>,
    pub member_count: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveOutcome {
    pub subnet_id: i64,
    pub user_id: i64,
    pub member_count: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Roster {
    pub subnet: SubNet,
    pub members: Vec<SubNetMember>,
}

/// What the acting user may do inside one subnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Standing {
    Owner,
    Admin,
    Member,
    Outsider,
}

impl Standing {
    fn manages(self) -> bool {
        matches!(self, Standing::Owner | Standing::Admin)
    }
}

async fn standing(tx: &mut dyn Tx, subnet: &SubNet, user_id: i64) -> Result<Standing> {
    if subnet.owner_id == user_id {
        return Ok(Standing::Owner);
    }
    Ok(match tx.get_subnet_member(subnet.id, user_id).await? {
        Some(member) if member.role == SubNetRole::Admin => Standing::Admin,
        Some(_) => Standing::Member,
        None => Standing::Outsider,
    })
}

/// Outsiders learn nothing about the subnet; members learn they lack the
/// role.
fn refuse(standing: Standing) -> Error {
    match standing {
        Standing::Outsider => Error::not_found(SUBNET_NOT_FOUND),
        _ => Error::forbidden("Only the subnet owner or an admin can do this"),
    }
}

async fn lock(tx: &mut dyn Tx, subnet_id: i64) -> Result<SubNet> {
    tx.lock_subnet(subnet_id)
        .await?
        .ok_or_else(|| Error::not_found(SUBNET_NOT_FOUND))
}

pub async fn create_subnet(store: &dyn Store, owner_id: i64, name: &str) -> Result<SubNet> {
    let name = clean_name(name)?;

    let mut tx = store.begin().await?;
    let subnet = tx
        .insert_subnet(&NewSubNet {
            owner_id,
            name,
            member_count: 0,
            created_at: models::now(),
        })
        .await?;
    tx.commit().await?;

    info!(subnet_id = subnet.id, owner_id, "Subnet created");
    Ok(subnet)
}

/// Adds users to a subnet with `request.role`.
///
/// Ids are deduplicated; users already present are skipped. Granting ADMIN
/// is reserved to the owner. The whole batch fails if any candidate has no
/// connection with the owner.
pub async fn add_members(
    store: &dyn Store,
    subnet_id: i64,
    actor_id: i64,
    request: AddMembers,
) -> Result<AddOutcome> {
    let result = add_members_inner(store, subnet_id, actor_id, request).await;
    metrics::record_membership("subnet_add", &result);
    result
}

async fn add_members_inner(
    store: &dyn Store,
    subnet_id: i64,
    actor_id: i64,
    request: AddMembers,
) -> Result<AddOutcome> {
    let mut candidates: Vec<i64> = Vec::with_capacity(request.user_ids.len());
    for id in request.user_ids {
        if !candidates.contains(&id) {
            candidates.push(id);
        }
    }
    if candidates.is_empty() {
        return Err(Error::bad_request("userIds must not be empty"));
    }

    let mut tx = store.begin().await?;
    let subnet = lock(tx.as_mut(), subnet_id).await?;
    let actor = standing(tx.as_mut(), &subnet, actor_id).await?;
    if !actor.manages() {
        return Err(refuse(actor));
    }
    if request.role == SubNetRole::Admin && actor != Standing::Owner {
        return Err(Error::forbidden("Only the subnet owner can grant ADMIN"));
    }
    if candidates.contains(&subnet.owner_id) {
        return Err(Error::bad_request("The subnet owner cannot be added as a member"));
    }

    for &candidate in &candidates {
        ensure_unvetoed(tx.as_mut(), subnet.owner_id, candidate, "User not found").await?;
        if tx.find_connection(subnet.owner_id, candidate).await?.is_none() {
            debug!(subnet_id, candidate, "Candidate has no connection with the owner");
            return Err(Error::bad_request(format!(
                "User {} has no connection with the subnet owner",
                candidate
            )));
        }
    }

    let now = models::now();
    let rows: Vec<NewSubNetMember> = candidates
        .iter()
        .map(|&user_id| NewSubNetMember {
            subnet_id,
            user_id,
            role: request.role,
            added_at: now,
        })
        .collect();
    let added = tx.insert_subnet_members(&rows).await?;
    let subnet = tx.recount_subnet_members(subnet_id).await?;
    tx.commit().await?;

    info!(
        subnet_id,
        added = added.len(),
        member_count = subnet.member_count,
        "Subnet members added"
    );
    Ok(AddOutcome {
        subnet_id,
        added,
        member_count: subnet.member_count,
    })
}

/// Removes a member. Managers may remove others, except that only the
/// owner removes an ADMIN; any member may remove themselves.
pub async fn remove_member(
    store: &dyn Store,
    subnet_id: i64,
    actor_id: i64,
    user_id: i64,
) -> Result<RemoveOutcome> {
    let result = remove_member_inner(store, subnet_id, actor_id, user_id).await;
    metrics::record_membership("subnet_remove", &result);
    result
}

async fn remove_member_inner(
    store: &dyn Store,
    subnet_id: i64,
    actor_id: i64,
    user_id: i64,
) -> Result<RemoveOutcome> {
    let mut tx = store.begin().await?;
    let subnet = lock(tx.as_mut(), subnet_id).await?;
    let actor = standing(tx.as_mut(), &subnet, actor_id).await?;

    if actor_id != user_id {
        if !actor.manages() {
            return Err(refuse(actor));
        }
        let target = standing(tx.as_mut(), &subnet, user_id).await?;
        if target == Standing::Admin && actor != Standing::Owner {
            return Err(Error::forbidden("Only the subnet owner can remove an admin"));
        }
    }
    if user_id == subnet.owner_id {
        return Err(Error::bad_request("The subnet owner is not a member"));
    }

    if !tx.delete_subnet_member(subnet_id, user_id).await? {
        return Err(Error::not_found("Member not found"));
    }
    let subnet = tx.recount_subnet_members(subnet_id).await?;
    tx.commit().await?;

    info!(subnet_id, user_id, actor_id, "Subnet member removed");
    Ok(RemoveOutcome {
        subnet_id,
        user_id,
        member_count: subnet.member_count,
    })
}

/// Changes a member's role. Same authority rules as [`add_members`].
pub async fn change_role(
    store: &dyn Store,
    subnet_id: i64,
    actor_id: i64,
    user_id: i64,
    role: SubNetRole,
) -> Result<SubNetMember> {
    let result = change_role_inner(store, subnet_id, actor_id, user_id, role).await;
    metrics::record_membership("subnet_role", &result);
    result
}

async fn change_role_inner(
    store: &dyn Store,
    subnet_id: i64,
    actor_id: i64,
    user_id: i64,
    role: SubNetRole,
) -> Result<SubNetMember> {
    let mut tx = store.begin().await?;
    let subnet = lock(tx.as_mut(), subnet_id).await?;
    let actor = standing(tx.as_mut(), &subnet, actor_id).await?;
    if !actor.manages() {
        return Err(refuse(actor));
    }
    if actor != Standing::Owner {
        let target = standing(tx.as_mut(), &subnet, user_id).await?;
        if role == SubNetRole::Admin || target == Standing::Admin {
            return Err(Error::forbidden("Only the subnet owner can change admin roles"));
        }
    }

    let member = tx
        .set_subnet_member_role(subnet_id, user_id, role)
        .await?
        .ok_or_else(|| Error::not_found("Member not found"))?;
    tx.recount_subnet_members(subnet_id).await?;
    tx.commit().await?;

    info!(subnet_id, user_id, %role, "Subnet role changed");
    Ok(member)
}

/// The subnet and its members; only the owner and members may look.
pub async fn roster(store: &dyn Store, subnet_id: i64, viewer_id: i64) -> Result<Roster> {
    let subnet = store
        .get_subnet(subnet_id)
        .await?
        .ok_or_else(|| Error::not_found(SUBNET_NOT_FOUND))?;

    if subnet.owner_id != viewer_id
        && store.get_subnet_member(subnet_id, viewer_id).await?.is_none()
    {
        return Err(Error::not_found(SUBNET_NOT_FOUND));
    }

    let members = store.list_subnet_members(subnet_id).await?;
    Ok(Roster { subnet, members })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::graph::lifecycle;
    use crate::models::RequestType;
    use crate::notify::{LogNotifier, Notifier};
    use crate::storage::MemoryStore;

    async fn connect(store: &MemoryStore, from: i64, to: i64) {
        let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
        let request = lifecycle::submit(store, &notifier, from, to, RequestType::Follow)
            .await
            .unwrap();
        lifecycle::accept(store, &notifier, request.id, to)
            .await
            .unwrap();
    }

    fn readers(ids: Vec<i64>) -> AddMembers {
        AddMembers {
            user_ids: ids,
            role: SubNetRole::Reader,
        }
    }

    #[tokio::test]
    async fn adding_requires_a_connection_with_the_owner() {
        let store = MemoryStore::new();
        let owner = store.insert_user("owner").await.id;
        let friend = store.insert_user("friend").await.id;
        let stranger = store.insert_user("stranger").await.id;
        connect(&store, friend, owner).await;
        let subnet = create_subnet(&store, owner, "inner circle").await.unwrap();

        let err = add_members(&store, subnet.id, owner, readers(vec![friend, stranger]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
        assert!(roster(&store, subnet.id, owner).await.unwrap().members.is_empty());

        let outcome = add_members(&store, subnet.id, owner, readers(vec![friend, friend]))
            .await
            .unwrap();
        assert_eq!(outcome.added, vec![friend]);
        assert_eq!(outcome.member_count, 1);

        let again = add_members(&store, subnet.id, owner, readers(vec![friend]))
            .await
            .unwrap();
        assert!(again.added.is_empty());
        assert_eq!(again.member_count, 1);
    }

    #[tokio::test]
    async fn owner_cannot_be_added() {
        let store = MemoryStore::new();
        let owner = store.insert_user("owner").await.id;
        let subnet = create_subnet(&store, owner, "mine").await.unwrap();
        assert!(matches!(
            add_members(&store, subnet.id, owner, readers(vec![owner])).await,
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            add_members(&store, subnet.id, owner, readers(vec![])).await,
            Err(Error::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn authority_and_self_removal() {
        let store = MemoryStore::new();
        let owner = store.insert_user("owner").await.id;
        let reader = store.insert_user("reader").await.id;
        let other = store.insert_user("other").await.id;
        let outsider = store.insert_user("outsider").await.id;
        connect(&store, reader, owner).await;
        connect(&store, other, owner).await;
        let subnet = create_subnet(&store, owner, "circle").await.unwrap();
        add_members(&store, subnet.id, owner, readers(vec![reader, other]))
            .await
            .unwrap();

        assert!(matches!(
            remove_member(&store, subnet.id, reader, other).await,
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            remove_member(&store, subnet.id, outsider, other).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            roster(&store, subnet.id, outsider).await,
            Err(Error::NotFound(_))
        ));

        let promoted = change_role(&store, subnet.id, owner, reader, SubNetRole::Contributor)
            .await
            .unwrap();
        assert_eq!(promoted.role, SubNetRole::Contributor);

        let left = remove_member(&store, subnet.id, reader, reader).await.unwrap();
        assert_eq!(left.member_count, 1);
        assert!(matches!(
            remove_member(&store, subnet.id, owner, reader).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn only_the_owner_grants_admin() {
        let store = MemoryStore::new();
        let owner = store.insert_user("owner").await.id;
        let admin = store.insert_user("admin").await.id;
        let friend = store.insert_user("friend").await.id;
        connect(&store, admin, owner).await;
        connect(&store, friend, owner).await;
        let subnet = create_subnet(&store, owner, "circle").await.unwrap();
        add_members(
            &store,
            subnet.id,
            owner,
            AddMembers {
                user_ids: vec![admin],
                role: SubNetRole::Admin,
            },
        )
        .await
        .unwrap();

        let outcome = add_members(&store, subnet.id, admin, readers(vec![friend]))
            .await
            .unwrap();
        assert_eq!(outcome.member_count, 2);
        assert!(matches!(
            change_role(&store, subnet.id, admin, friend, SubNetRole::Admin).await,
            Err(Error::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn blocked_candidates_look_absent() {
        let store = MemoryStore::new();
        let owner = store.insert_user("owner").await.id;
        let friend = store.insert_user("friend").await.id;
        connect(&store, friend, owner).await;
        store.insert_block(friend, owner).await;
        let subnet = create_subnet(&store, owner, "circle").await.unwrap();

        assert!(matches!(
            add_members(&store, subnet.id, owner, readers(vec![friend])).await,
            Err(Error::NotFound(_))
        ));
    }
}
