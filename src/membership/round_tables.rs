// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use tracing::info;

use super::{clean_name, ensure_reachable};
use crate::error::{Conflict, Error, Result};
use crate::metrics;
use crate::models::{self, JoinStatus, NewRoundTable, RoundTable, RoundTableJoinRequest, RoundTableMember};
use crate::storage::{Store, Tx};

const ROUND_TABLE_NOT_FOUND: &str = "Round table not found";

async fn load(store: &dyn Store, round_table_id: i64) -> Result<RoundTable> {
    store
        .get_round_table(round_table_id)
        .await?
        .ok_or_else(|| Error::not_found(ROUND_TABLE_NOT_FOUND))
}

async fn ensure_moderator(tx: &mut dyn Tx, round_table_id: i64, user_id: i64) -> Result<()> {
    match tx.get_round_table_member(round_table_id, user_id).await? {
        Some(member) if member.is_moderator => Ok(()),
        _ => Err(Error::forbidden("Only moderators can manage join requests")),
    }
}

/// Creates a round table; the creator joins it as a moderator.
pub async fn create_round_table(store: &dyn Store, owner_id: i64, name: &str) -> Result<RoundTable> {
    let name = clean_name(name)?;

    let mut tx = store.begin().await?;
    let now = models::now();
    let table = tx
        .insert_round_table(&NewRoundTable {
            owner_id,
            name,
            created_at: now,
        })
        .await?;
    tx.insert_round_table_member(&RoundTableMember {
        round_table_id: table.id,
        user_id: owner_id,
        is_moderator: true,
        joined_at: now,
    })
    .await?;
    tx.commit().await?;

    info!(round_table_id = table.id, owner_id, "Round table created");
    Ok(table)
}

pub async fn request_join(
    store: &dyn Store,
    round_table_id: i64,
    user_id: i64,
) -> Result<RoundTableJoinRequest> {
    let result = request_join_inner(store, round_table_id, user_id).await;
    metrics::record_membership("round_table_join", &result);
    result
}

async fn request_join_inner(
    store: &dyn Store,
    round_table_id: i64,
    user_id: i64,
) -> Result<RoundTableJoinRequest> {
    load(store, round_table_id).await?;

    let mut tx = store.begin().await?;
    if tx
        .get_round_table_member(round_table_id, user_id)
        .await?
        .is_some()
    {
        return Err(Conflict::AlreadyMember.into());
    }
    if let Some(existing) = tx.find_round_table_join_request(round_table_id, user_id).await? {
        if existing.status == JoinStatus::Pending {
            return Err(Conflict::JoinAlreadyPending.into());
        }
    }

    let request = tx
        .upsert_round_table_join_request(round_table_id, user_id, models::now())
        .await?;
    tx.commit().await?;

    info!(request_id = request.id, round_table_id, user_id, "Round table join requested");
    Ok(request)
}

/// Pending join requests; moderators only.
pub async fn list_join_requests(
    store: &dyn Store,
    round_table_id: i64,
    actor_id: i64,
) -> Result<Vec<RoundTableJoinRequest>> {
    load(store, round_table_id).await?;
    match store.get_round_table_member(round_table_id, actor_id).await? {
        Some(member) if member.is_moderator => {}
        _ => return Err(Error::forbidden("Only moderators can manage join requests")),
    }
    Ok(store
        .list_round_table_join_requests(round_table_id, JoinStatus::Pending)
        .await?)
}

/// Accepts or declines a pending request; moderators only. Accepted users
/// join as regular members.
pub async fn decide_join_request(
    store: &dyn Store,
    round_table_id: i64,
    request_id: i64,
    actor_id: i64,
    accept: bool,
) -> Result<RoundTableJoinRequest> {
    let result = decide_inner(store, round_table_id, request_id, actor_id, accept).await;
    let operation = if accept {
        "round_table_accept"
    } else {
        "round_table_decline"
    };
    metrics::record_membership(operation, &result);
    result
}

async fn decide_inner(
    store: &dyn Store,
    round_table_id: i64,
    request_id: i64,
    actor_id: i64,
    accept: bool,
) -> Result<RoundTableJoinRequest> {
    load(store, round_table_id).await?;

    let mut tx = store.begin().await?;
    ensure_moderator(tx.as_mut(), round_table_id, actor_id).await?;

    let request = tx
        .lock_round_table_join_request(request_id)
        .await?
        .filter(|r| r.round_table_id == round_table_id)
        .ok_or_else(|| Error::not_found("Join request not found"))?;
    if request.status != JoinStatus::Pending {
        return Err(Conflict::NotPending(request.status.as_str()).into());
    }

    let now = models::now();
    let status = if accept {
        ensure_reachable(tx.as_mut(), request.user_id).await?;
        let inserted = tx
            .insert_round_table_member(&RoundTableMember {
                round_table_id,
                user_id: request.user_id,
                is_moderator: false,
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
        .set_round_table_join_request_status(request.id, status, now)
        .await?;
    tx.commit().await?;

    info!(request_id, round_table_id, %status, "Round table join request decided");
    Ok(request)
}

#[cfg(test)]
mod tests {
    use tokio_test::assert_err;

    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn accepting_a_request_for_an_existing_member_conflicts() {
        let store = MemoryStore::new();
        let owner = store.insert_user("host").await.id;
        let guest = store.insert_user("guest").await.id;
        let table = create_round_table(&store, owner, "weekly").await.unwrap();
        let request = request_join(&store, table.id, guest).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.insert_round_table_member(&RoundTableMember {
            round_table_id: table.id,
            user_id: guest,
            is_moderator: false,
            joined_at: models::now(),
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert!(matches!(
            decide_join_request(&store, table.id, request.id, owner, true).await,
            Err(Error::Conflict(Conflict::AlreadyMember))
        ));
        let pending = store
            .list_round_table_join_requests(table.id, JoinStatus::Pending)
            .await
            .unwrap();
        assert_eq!(pending, vec![request]);
    }

    #[tokio::test]
    async fn moderators_decide_join_requests() {
        let store = MemoryStore::new();
        let owner = store.insert_user("host").await.id;
        let guest = store.insert_user("guest").await.id;
        let table = create_round_table(&store, owner, "weekly").await.unwrap();

        let request = request_join(&store, table.id, guest).await.unwrap();
        assert!(matches!(
            request_join(&store, table.id, guest).await,
            Err(Error::Conflict(Conflict::JoinAlreadyPending))
        ));
        assert!(matches!(
            list_join_requests(&store, table.id, guest).await,
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            decide_join_request(&store, table.id, request.id, guest, true).await,
            Err(Error::Forbidden(_))
        ));

        let pending = list_join_requests(&store, table.id, owner).await.unwrap();
        assert_eq!(pending, vec![request.clone()]);

        let accepted = decide_join_request(&store, table.id, request.id, owner, true)
            .await
            .unwrap();
        assert_eq!(accepted.status, JoinStatus::Accepted);

        assert!(matches!(
            request_join(&store, table.id, guest).await,
            Err(Error::Conflict(Conflict::AlreadyMember))
        ));
        // Regular members do not moderate.
        assert!(matches!(
            list_join_requests(&store, table.id, guest).await,
            Err(Error::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn declined_requests_can_be_refiled() {
        let store = MemoryStore::new();
        let owner = store.insert_user("host").await.id;
        let guest = store.insert_user("guest").await.id;
        let table = create_round_table(&store, owner, "weekly").await.unwrap();

        let request = request_join(&store, table.id, guest).await.unwrap();
        let declined = decide_join_request(&store, table.id, request.id, owner, false)
            .await
            .unwrap();
        assert_eq!(declined.status, JoinStatus::Declined);
        assert_err!(decide_join_request(&store, table.id, request.id, owner, true).await);

        let again = request_join(&store, table.id, guest).await.unwrap();
        assert_eq!(again.id, request.id);
        assert_eq!(again.status, JoinStatus::Pending);
    }

    #[tokio::test]
    async fn unknown_tables_are_not_found() {
        let store = MemoryStore::new();
        let user = store.insert_user("someone").await.id;
        assert!(matches!(
            request_join(&store, 404, user).await,
            Err(Error::NotFound(_))
        ));
    }
}
