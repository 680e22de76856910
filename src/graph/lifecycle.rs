// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! Relationship request lifecycle.
//!
//! Requests move `PENDING → {ACCEPTED, DECLINED, CANCELED}`; a new submit
//! for the same ordered pair resets the row to `PENDING`. Only acceptance
//! touches the connection table, and it rewrites the pair's adjacency rows
//! in the same transaction.
//!
//! Connection types follow the precedence ACQUAINTANCE > STRANGER >
//! IS_FOLLOWING. Upgrades are STRANGER → ACQUAINTANCE and IS_FOLLOWING →
//! STRANGER | ACQUAINTANCE; nothing ever moves down.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::{adjacency, ensure_unvetoed};
use crate::error::{Conflict, Error, Result};
use crate::metrics;
use crate::models::{
    self, ConnectionRequest, ConnectionType, NewConnection, NewConnectionRequest, RequestStatus,
    RequestType,
};
use crate::notify::{self, Notification, Notifier};
use crate::storage::{RequestDirection, Store};

const REQUEST_NOT_FOUND: &str = "Connection request not found";
const USER_NOT_FOUND: &str = "User not found";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptOutcome {
    pub request_id: i64,
    pub connection_id: i64,
    #[serde(rename = "type")]
    pub kind: ConnectionType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionOutcome {
    pub request_id: i64,
    pub status: RequestStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveOutcome {
    pub deleted_connection_id: i64,
    pub other_user_id: i64,
}

/// Whether a request of type `requested` may target a pair whose current
/// connection type is `existing`.
pub fn check_precedence(
    existing: Option<ConnectionType>,
    requested: RequestType,
) -> std::result::Result<(), Conflict> {
    let Some(existing) = existing else {
        return Ok(());
    };

    let allowed = match existing {
        ConnectionType::Acquaintance => false,
        ConnectionType::Stranger => requested == RequestType::Acquaintance,
        ConnectionType::IsFollowing => {
            matches!(requested, RequestType::Acquaintance | RequestType::Stranger)
        }
    };

    match (allowed, existing, requested) {
        (true, _, _) => Ok(()),
        (false, ConnectionType::Acquaintance, RequestType::Acquaintance) => {
            Err(Conflict::AlreadyAcquainted)
        }
        (false, existing, requested) => Err(Conflict::Precedence {
            existing,
            requested,
        }),
    }
}

/// Opens (or reopens) a request from `requester_id` to `requested_id`.
pub async fn submit(
    store: &dyn Store,
    notifier: &Arc<dyn Notifier>,
    requester_id: i64,
    requested_id: i64,
    request_type: RequestType,
) -> Result<ConnectionRequest> {
    let result = submit_request(store, requester_id, requested_id, request_type).await;
    metrics::record_relationship("submit", &result);

    let request = result?;
    notify::dispatch(
        notifier.clone(),
        requested_id,
        Notification::ConnectionRequested {
            request_id: request.id,
            requester_id,
            request_type,
        },
    );
    Ok(request)
}

async fn submit_request(
    store: &dyn Store,
    requester_id: i64,
    requested_id: i64,
    request_type: RequestType,
) -> Result<ConnectionRequest> {
    if requester_id == requested_id {
        return Err(Error::bad_request(
            "Cannot send a connection request to yourself",
        ));
    }

    let mut tx = store.begin().await?;
    ensure_unvetoed(tx.as_mut(), requester_id, requested_id, USER_NOT_FOUND).await?;

    let existing = tx.find_connection(requester_id, requested_id).await?;
    if let Err(conflict) = check_precedence(existing.as_ref().map(|c| c.kind), request_type) {
        debug!(requester_id, requested_id, %request_type, "Request rejected: {}", conflict);
        return Err(conflict.into());
    }

    let request = tx
        .upsert_request(&NewConnectionRequest::pending(
            requester_id,
            requested_id,
            request_type,
        ))
        .await?;
    tx.commit().await?;

    info!(
        request_id = request.id,
        requester_id,
        requested_id,
        %request_type,
        "Connection request submitted"
    );
    Ok(request)
}

/// Accepts a pending request on behalf of its target and materializes the
/// connection.
pub async fn accept(
    store: &dyn Store,
    notifier: &Arc<dyn Notifier>,
    request_id: i64,
    acting_user_id: i64,
) -> Result<AcceptOutcome> {
    let result = accept_request(store, request_id, acting_user_id).await;
    metrics::record_relationship("accept", &result);

    let (outcome, requester_id) = result?;
    notify::dispatch(
        notifier.clone(),
        requester_id,
        Notification::ConnectionAccepted {
            request_id,
            accepted_by: acting_user_id,
            connection_type: outcome.kind,
        },
    );
    Ok(outcome)
}

async fn accept_request(
    store: &dyn Store,
    request_id: i64,
    acting_user_id: i64,
) -> Result<(AcceptOutcome, i64)> {
    let mut tx = store.begin().await?;
    let request = tx
        .lock_request(request_id)
        .await?
        .ok_or_else(|| Error::not_found(REQUEST_NOT_FOUND))?;

    if request.requested_id != acting_user_id {
        return Err(Error::forbidden(
            "Only the requested user can accept this request",
        ));
    }
    ensure_unvetoed(
        tx.as_mut(),
        request.requester_id,
        request.requested_id,
        REQUEST_NOT_FOUND,
    )
    .await?;
    if request.status != RequestStatus::Pending {
        return Err(Conflict::NotPending(request.status.as_str()).into());
    }

    // Another request for the pair may have been accepted since this one
    // was submitted, or be committing right now; the pair lock orders us
    // after it.
    let existing = tx
        .lock_connection(request.requester_id, request.requested_id)
        .await?;
    check_precedence(existing.as_ref().map(|c| c.kind), request.request_type)?;

    let kind = request.request_type.materialize();
    tx.set_request_status(request.id, RequestStatus::Accepted, models::now())
        .await?;
    let connection = tx
        .save_connection(&NewConnection::new(
            request.requester_id,
            request.requested_id,
            kind,
        ))
        .await?;
    adjacency::rewrite(tx.as_mut(), &connection).await?;
    tx.commit().await?;

    info!(
        request_id,
        connection_id = connection.id,
        %kind,
        "Connection request accepted"
    );
    Ok((
        AcceptOutcome {
            request_id,
            connection_id: connection.id,
            kind,
        },
        request.requester_id,
    ))
}

/// Declines a pending request; only its target may do so.
pub async fn decline(
    store: &dyn Store,
    request_id: i64,
    acting_user_id: i64,
) -> Result<DecisionOutcome> {
    let result = close_request(store, request_id, acting_user_id, RequestStatus::Declined).await;
    metrics::record_relationship("decline", &result);
    result
}

/// Withdraws a pending request; only its requester may do so.
pub async fn cancel(
    store: &dyn Store,
    request_id: i64,
    acting_user_id: i64,
) -> Result<DecisionOutcome> {
    let result = close_request(store, request_id, acting_user_id, RequestStatus::Canceled).await;
    metrics::record_relationship("cancel", &result);
    result
}

async fn close_request(
    store: &dyn Store,
    request_id: i64,
    acting_user_id: i64,
    status: RequestStatus,
) -> Result<DecisionOutcome> {
    let mut tx = store.begin().await?;
    let request = tx
        .lock_request(request_id)
        .await?
        .ok_or_else(|| Error::not_found(REQUEST_NOT_FOUND))?;

    let (actor, refusal) = match status {
        RequestStatus::Canceled => (
            request.requester_id,
            "Only the requester can cancel this request",
        ),
        _ => (
            request.requested_id,
            "Only the requested user can decline this request",
        ),
    };
    if actor != acting_user_id {
        return Err(Error::forbidden(refusal));
    }

    ensure_unvetoed(
        tx.as_mut(),
        request.requester_id,
        request.requested_id,
        REQUEST_NOT_FOUND,
    )
    .await?;
    if request.status != RequestStatus::Pending {
        return Err(Conflict::NotPending(request.status.as_str()).into());
    }

    let updated = tx
        .set_request_status(request.id, status, models::now())
        .await?;
    tx.commit().await?;

    info!(request_id, %status, "Connection request closed");
    Ok(DecisionOutcome {
        request_id,
        status: updated.status,
    })
}

/// Deletes the connection between the two users together with its
/// adjacency rows. Either party may remove it.
pub async fn remove(
    store: &dyn Store,
    acting_user_id: i64,
    other_user_id: i64,
) -> Result<RemoveOutcome> {
    let result = remove_connection(store, acting_user_id, other_user_id).await;
    metrics::record_relationship("remove", &result);
    result
}

async fn remove_connection(
    store: &dyn Store,
    acting_user_id: i64,
    other_user_id: i64,
) -> Result<RemoveOutcome> {
    let mut tx = store.begin().await?;
    let connection = tx
        .lock_connection(acting_user_id, other_user_id)
        .await?
        .ok_or_else(|| Error::not_found("Connection not found"))?;

    tx.delete_adjacency(connection.id).await?;
    tx.delete_connection(connection.id).await?;
    tx.commit().await?;

    info!(
        connection_id = connection.id,
        acting_user_id, other_user_id, "Connection removed"
    );
    Ok(RemoveOutcome {
        deleted_connection_id: connection.id,
        other_user_id,
    })
}

/// The caller's requests in one direction, newest first. Requests whose
/// counterpart is currently vetoed are left out.
pub async fn list_requests(
    store: &dyn Store,
    user_id: i64,
    direction: RequestDirection,
    status: Option<RequestStatus>,
) -> Result<Vec<ConnectionRequest>> {
    let requests = store.list_requests(user_id, direction, status).await?;

    let mut visible = Vec::with_capacity(requests.len());
    for request in requests {
        let other = match direction {
            RequestDirection::Incoming => request.requester_id,
            RequestDirection::Outgoing => request.requested_id,
        };
        let reachable = store
            .get_user(other)
            .await?
            .map_or(false, |user| user.is_reachable());
        if reachable && !store.is_blocked(user_id, other).await? {
            visible.push(request);
        }
    }
    Ok(visible)
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::notify::{ChannelNotifier, LogNotifier};
    use crate::storage::MemoryStore;

    fn log_notifier() -> Arc<dyn Notifier> {
        Arc::new(LogNotifier)
    }

    async fn users(store: &MemoryStore) -> (i64, i64) {
        let a = store.insert_user("alice").await;
        let b = store.insert_user("bob").await;
        (a.id, b.id)
    }

    async fn connect(store: &MemoryStore, from: i64, to: i64, kind: RequestType) -> AcceptOutcome {
        let notifier = log_notifier();
        let request = submit(store, &notifier, from, to, kind).await.unwrap();
        accept(store, &notifier, request.id, to).await.unwrap()
    }

    #[test]
    fn precedence_table() {
        use ConnectionType as C;
        use RequestType as R;

        for requested in [R::Acquaintance, R::Stranger, R::Follow] {
            assert_ok!(check_precedence(None, requested));
        }

        assert_eq!(
            check_precedence(Some(C::Acquaintance), R::Acquaintance),
            Err(Conflict::AlreadyAcquainted)
        );
        for requested in [R::Stranger, R::Follow] {
            assert!(matches!(
                check_precedence(Some(C::Acquaintance), requested),
                Err(Conflict::Precedence { .. })
            ));
        }

        assert_ok!(check_precedence(Some(C::Stranger), R::Acquaintance));
        assert_err!(check_precedence(Some(C::Stranger), R::Stranger));
        assert_err!(check_precedence(Some(C::Stranger), R::Follow));

        assert_ok!(check_precedence(Some(C::IsFollowing), R::Acquaintance));
        assert_ok!(check_precedence(Some(C::IsFollowing), R::Stranger));
        assert_err!(check_precedence(Some(C::IsFollowing), R::Follow));
    }

    #[tokio::test]
    async fn submit_to_fresh_pair_is_pending_for_every_type() {
        let store = MemoryStore::new();
        let notifier = log_notifier();
        for kind in [RequestType::Acquaintance, RequestType::Stranger, RequestType::Follow] {
            let a = store.insert_user(&format!("a-{}", kind)).await;
            let b = store.insert_user(&format!("b-{}", kind)).await;
            let request = submit(&store, &notifier, a.id, b.id, kind).await.unwrap();
            assert_eq!(request.status, RequestStatus::Pending);
            assert_eq!(request.request_type, kind);
            assert!(request.decided_at.is_none());
        }
        assert_eq!(store.connection_count().await, 0);
    }

    #[tokio::test]
    async fn self_requests_are_bad_requests() {
        let store = MemoryStore::new();
        let (a, _) = users(&store).await;
        let err = submit(&store, &log_notifier(), a, a, RequestType::Stranger)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[tokio::test]
    async fn banned_hidden_and_blocked_targets_look_absent() {
        let store = MemoryStore::new();
        let notifier = log_notifier();
        let (a, b) = users(&store).await;
        let c = store.insert_user("carol").await.id;
        let d = store.insert_user("dave").await.id;
        store.set_banned(b, true).await;
        store.set_hidden(c, true).await;
        store.insert_block(d, a).await;

        for target in [b, c, d, 9_999] {
            let err = submit(&store, &notifier, a, target, RequestType::Stranger)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::NotFound(_)), "target {}", target);
        }
    }

    #[tokio::test]
    async fn acquaintance_blocks_every_further_request() {
        let store = MemoryStore::new();
        let notifier = log_notifier();
        let (a, b) = users(&store).await;
        connect(&store, a, b, RequestType::Acquaintance).await;

        for (from, to) in [(a, b), (b, a)] {
            for kind in [RequestType::Acquaintance, RequestType::Stranger, RequestType::Follow] {
                let err = submit(&store, &notifier, from, to, kind).await.unwrap_err();
                assert!(matches!(err, Error::Conflict(_)));
            }
        }
        let repeat = submit(&store, &notifier, a, b, RequestType::Acquaintance)
            .await
            .unwrap_err();
        assert!(matches!(repeat, Error::Conflict(Conflict::AlreadyAcquainted)));
    }

    #[tokio::test]
    async fn follow_then_upgrade_rewrites_direction() {
        let store = MemoryStore::new();
        let notifier = log_notifier();
        let (a, b) = users(&store).await;

        let follow = connect(&store, a, b, RequestType::Follow).await;
        assert_eq!(follow.kind, ConnectionType::IsFollowing);
        let rows = store.adjacency_for_connection(follow.connection_id).await;
        assert_eq!(rows.len(), 1);
        assert_eq!((rows[0].user_id, rows[0].other_user_id), (a, b));

        let refollow = submit(&store, &notifier, b, a, RequestType::Follow)
            .await
            .unwrap_err();
        assert!(matches!(refollow, Error::Conflict(Conflict::Precedence { .. })));

        let stranger = connect(&store, b, a, RequestType::Stranger).await;
        assert_eq!(stranger.connection_id, follow.connection_id);
        let rows = store.adjacency_for_connection(follow.connection_id).await;
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.kind == ConnectionType::Stranger));

        assert_err!(submit(&store, &notifier, a, b, RequestType::Stranger).await);
        connect(&store, a, b, RequestType::Acquaintance).await;
        assert_eq!(store.connection_count().await, 1);
    }

    #[tokio::test]
    async fn only_the_target_accepts_and_only_once() {
        let store = MemoryStore::new();
        let notifier = log_notifier();
        let (a, b) = users(&store).await;
        let request = submit(&store, &notifier, a, b, RequestType::Stranger)
            .await
            .unwrap();

        let err = accept(&store, &notifier, request.id, a).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let outcome = accept(&store, &notifier, request.id, b).await.unwrap();
        let rows = store.adjacency_for_connection(outcome.connection_id).await;

        let again = accept(&store, &notifier, request.id, b).await.unwrap_err();
        assert!(matches!(again, Error::Conflict(Conflict::NotPending("ACCEPTED"))));
        assert_eq!(store.adjacency_for_connection(outcome.connection_id).await, rows);
    }

    #[tokio::test]
    async fn resubmit_overwrites_the_same_row() {
        let store = MemoryStore::new();
        let notifier = log_notifier();
        let (a, b) = users(&store).await;

        let first = submit(&store, &notifier, a, b, RequestType::Follow).await.unwrap();
        assert_ok!(decline(&store, first.id, b).await);
        let second = submit(&store, &notifier, a, b, RequestType::Stranger)
            .await
            .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.status, RequestStatus::Pending);
        assert!(second.created_at >= first.created_at);
        assert!(second.decided_at.is_none());

        let rows = store.requests_between(a, b).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].request_type, RequestType::Stranger);
    }

    #[tokio::test]
    async fn decline_and_cancel_are_restricted_to_their_party() {
        let store = MemoryStore::new();
        let notifier = log_notifier();
        let (a, b) = users(&store).await;
        let request = submit(&store, &notifier, a, b, RequestType::Stranger)
            .await
            .unwrap();

        assert!(matches!(
            decline(&store, request.id, a).await,
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            cancel(&store, request.id, b).await,
            Err(Error::Forbidden(_))
        ));

        let canceled = cancel(&store, request.id, a).await.unwrap();
        assert_eq!(canceled.status, RequestStatus::Canceled);
        assert!(matches!(
            decline(&store, request.id, b).await,
            Err(Error::Conflict(Conflict::NotPending("CANCELED")))
        ));
    }

    #[tokio::test]
    async fn a_block_makes_pending_requests_unreachable() {
        let store = MemoryStore::new();
        let notifier = log_notifier();
        let (a, b) = users(&store).await;
        let request = submit(&store, &notifier, a, b, RequestType::Stranger)
            .await
            .unwrap();
        store.insert_block(a, b).await;

        assert!(matches!(
            accept(&store, &notifier, request.id, b).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(decline(&store, request.id, b).await, Err(Error::NotFound(_))));
        assert!(matches!(cancel(&store, request.id, a).await, Err(Error::NotFound(_))));
        assert!(matches!(
            submit(&store, &notifier, a, b, RequestType::Stranger).await,
            Err(Error::NotFound(_))
        ));
        assert!(list_requests(&store, b, RequestDirection::Incoming, None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn banning_or_hiding_either_party_makes_pending_requests_unreachable() {
        for hide in [false, true] {
            for veto_target in [false, true] {
                let store = MemoryStore::new();
                let notifier = log_notifier();
                let (a, b) = users(&store).await;
                let request = submit(&store, &notifier, a, b, RequestType::Acquaintance)
                    .await
                    .unwrap();

                let vetoed = if veto_target { b } else { a };
                if hide {
                    store.set_hidden(vetoed, true).await;
                } else {
                    store.set_banned(vetoed, true).await;
                }

                assert!(matches!(
                    accept(&store, &notifier, request.id, b).await,
                    Err(Error::NotFound(_))
                ));
                assert!(matches!(decline(&store, request.id, b).await, Err(Error::NotFound(_))));
                assert!(matches!(cancel(&store, request.id, a).await, Err(Error::NotFound(_))));

                let rows = store.requests_between(a, b).await;
                assert_eq!(rows[0].status, RequestStatus::Pending);
                assert_eq!(store.connection_count().await, 0);
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_accepts_never_downgrade_the_pair() {
        for _ in 0..32 {
            let store = Arc::new(MemoryStore::new());
            let notifier = log_notifier();
            let (a, b) = users(&store).await;
            let acquaintance = submit(store.as_ref(), &notifier, a, b, RequestType::Acquaintance)
                .await
                .unwrap();
            let stranger = submit(store.as_ref(), &notifier, b, a, RequestType::Stranger)
                .await
                .unwrap();

            let upgrade = tokio::spawn({
                let (store, notifier) = (store.clone(), notifier.clone());
                async move { accept(store.as_ref(), &notifier, acquaintance.id, b).await }
            });
            let downgrade = tokio::spawn({
                let (store, notifier) = (store.clone(), notifier.clone());
                async move { accept(store.as_ref(), &notifier, stranger.id, a).await }
            });
            let upgrade = upgrade.await.unwrap();
            let downgrade = downgrade.await.unwrap();

            // STRANGER then ACQUAINTANCE is a legal upgrade; the reverse order
            // must reject the STRANGER accept.
            let acquainted = assert_ok!(upgrade);
            assert_eq!(acquainted.kind, ConnectionType::Acquaintance);
            match downgrade {
                Ok(outcome) => assert_eq!(outcome.connection_id, acquainted.connection_id),
                Err(err) => assert!(matches!(err, Error::Conflict(Conflict::Precedence { .. }))),
            }

            let connection = store.find_connection(a, b).await.unwrap().unwrap();
            assert_eq!(connection.kind, ConnectionType::Acquaintance);
            assert_eq!(store.connection_count().await, 1);
            for (from, to) in [(a, b), (b, a)] {
                assert_eq!(
                    store.relationship_type(from, to).await.unwrap(),
                    Some(ConnectionType::Acquaintance)
                );
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_accepts_of_one_request_succeed_once() {
        for _ in 0..32 {
            let store = Arc::new(MemoryStore::new());
            let notifier = log_notifier();
            let (a, b) = users(&store).await;
            let request_id = submit(store.as_ref(), &notifier, a, b, RequestType::Stranger)
                .await
                .unwrap()
                .id;

            let attempts: Vec<_> = (0..2)
                .map(|_| {
                    let (store, notifier) = (store.clone(), notifier.clone());
                    tokio::spawn(async move { accept(store.as_ref(), &notifier, request_id, b).await })
                })
                .collect();
            let mut accepted = 0;
            for attempt in attempts {
                match attempt.await.unwrap() {
                    Ok(_) => accepted += 1,
                    Err(err) => assert!(matches!(
                        err,
                        Error::Conflict(Conflict::NotPending("ACCEPTED"))
                    )),
                }
            }
            assert_eq!(accepted, 1);
            assert_eq!(store.connection_count().await, 1);
        }
    }

    #[tokio::test]
    async fn accept_rechecks_precedence() {
        let store = MemoryStore::new();
        let notifier = log_notifier();
        let (a, b) = users(&store).await;

        let from_a = submit(&store, &notifier, a, b, RequestType::Stranger).await.unwrap();
        let from_b = submit(&store, &notifier, b, a, RequestType::Stranger).await.unwrap();
        assert_ok!(accept(&store, &notifier, from_a.id, b).await);

        let err = accept(&store, &notifier, from_b.id, a).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(Conflict::Precedence { .. })));
        let still_pending = store.requests_between(b, a).await;
        assert_eq!(still_pending[0].status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn remove_deletes_connection_and_adjacency() {
        let store = MemoryStore::new();
        let (a, b) = users(&store).await;
        let outcome = connect(&store, a, b, RequestType::Acquaintance).await;

        let removed = remove(&store, b, a).await.unwrap();
        assert_eq!(removed.deleted_connection_id, outcome.connection_id);
        assert_eq!(removed.other_user_id, a);
        assert!(store.adjacency_for_connection(outcome.connection_id).await.is_empty());
        assert_eq!(store.connection_count().await, 0);

        assert!(matches!(remove(&store, a, b).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn submit_notifies_the_target() {
        let store = MemoryStore::new();
        let (a, b) = users(&store).await;
        let (notifier, mut receiver) = ChannelNotifier::new();
        let notifier: Arc<dyn Notifier> = Arc::new(notifier);

        let request = submit(&store, &notifier, a, b, RequestType::Follow).await.unwrap();
        let (recipient, notification) = receiver.recv().await.unwrap();
        assert_eq!(recipient, b);
        assert_eq!(
            notification,
            Notification::ConnectionRequested {
                request_id: request.id,
                requester_id: a,
                request_type: RequestType::Follow,
            }
        );
    }
}
