// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! In-memory storage implementation.
//!
//! All data lives in RAM behind a [`RwLock`] and is lost when the process
//! exits. A [`Tx`] holds the write guard for its whole lifetime together
//! with a snapshot of the state taken at `begin`; dropping it uncommitted
//! restores the snapshot, so a failed unit of work leaves nothing behind.
//! Holding the guard also serializes every writer, which is what
//! [`Tx::lock_connection`] relies on. Use this for tests and ephemeral
//! deployments.
//!
//! Users and blocks are owned by other services in production; the seeding
//! helpers on [`MemoryStore`] stand in for them.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use super::{FeedQuery, NeighborQuery, RequestDirection, Store, StorageError, Tx};
use crate::models::{
    self, connection::ordered_pair, Connection, ConnectionRequest, ConnectionType, Group,
    GroupJoinRequest, GroupMember, GroupRole, JoinStatus, NewConnection, NewConnectionRequest,
    NewGroup, NewPost, NewRoundTable, NewSubNet, NewSubNetMember, NewUserConnection, Post,
    RequestStatus, RoundTable, RoundTableJoinRequest, RoundTableMember, SubNet, SubNetMember,
    SubNetRole, User, UserConnection,
};

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct State {
    last_id: i64,
    users: BTreeMap<i64, User>,
    blocks: HashSet<(i64, i64)>,
    connections: BTreeMap<i64, Connection>,
    adjacency: BTreeMap<i64, UserConnection>,
    requests: BTreeMap<i64, ConnectionRequest>,
    posts: BTreeMap<i64, Post>,
    groups: BTreeMap<i64, Group>,
    group_members: BTreeMap<(i64, i64), GroupMember>,
    group_join_requests: BTreeMap<i64, GroupJoinRequest>,
    subnets: BTreeMap<i64, SubNet>,
    subnet_members: BTreeMap<(i64, i64), SubNetMember>,
    round_tables: BTreeMap<i64, RoundTable>,
    round_table_members: BTreeMap<(i64, i64), RoundTableMember>,
    round_table_join_requests: BTreeMap<i64, RoundTableJoinRequest>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn is_blocked(&self, a: i64, b: i64) -> bool {
        self.blocks.contains(&(a, b)) || self.blocks.contains(&(b, a))
    }

    fn find_connection(&self, a: i64, b: i64) -> Option<Connection> {
        let (low, high) = ordered_pair(a, b);
        self.connections
            .values()
            .find(|c| c.user_low == low && c.user_high == high)
            .cloned()
    }

    fn relationship_type(&self, user_id: i64, other_user_id: i64) -> Option<ConnectionType> {
        self.adjacency
            .values()
            .filter(|row| row.user_id == user_id && row.other_user_id == other_user_id)
            .map(|row| row.kind)
            .max_by_key(|kind| kind.precedence())
    }

    fn neighbors_of(&self, query: &NeighborQuery) -> (Vec<UserConnection>, bool) {
        let mut rows: Vec<UserConnection> = self
            .adjacency
            .values()
            .filter(|row| row.user_id == query.user_id)
            .filter(|row| query.kind.map_or(true, |kind| row.kind == kind))
            .filter(|row| match query.after {
                Some(cursor) => {
                    row.created_at < cursor.created_at
                        || (row.created_at == cursor.created_at
                            && row.other_user_id > cursor.other_user_id)
                }
                None => true,
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(a.other_user_id.cmp(&b.other_user_id))
        });
        let has_more = rows.len() > query.limit;
        rows.truncate(query.limit);
        (rows, has_more)
    }

    fn group_member(&self, group_id: i64, user_id: i64) -> Option<GroupMember> {
        self.group_members.get(&(group_id, user_id)).cloned()
    }

    fn subnet_member(&self, subnet_id: i64, user_id: i64) -> Option<SubNetMember> {
        self.subnet_members.get(&(subnet_id, user_id)).cloned()
    }

    fn round_table_member(&self, round_table_id: i64, user_id: i64) -> Option<RoundTableMember> {
        self.round_table_members
            .get(&(round_table_id, user_id))
            .cloned()
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Thread-safe, in-memory implementation of [`Store`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an account the way the identity service would.
    pub async fn insert_user(&self, username: &str) -> User {
        let mut state = self.inner.write().await;
        let id = state.next_id();
        let user = User {
            id,
            username: username.to_string(),
            is_banned: false,
            is_hidden: false,
            is_private: false,
            created_at: models::now(),
        };
        state.users.insert(id, user.clone());
        user
    }

    pub async fn set_banned(&self, user_id: i64, banned: bool) {
        if let Some(user) = self.inner.write().await.users.get_mut(&user_id) {
            user.is_banned = banned;
        }
    }

    pub async fn set_hidden(&self, user_id: i64, hidden: bool) {
        if let Some(user) = self.inner.write().await.users.get_mut(&user_id) {
            user.is_hidden = hidden;
        }
    }

    pub async fn insert_block(&self, blocker_id: i64, blocked_id: i64) {
        self.inner.write().await.blocks.insert((blocker_id, blocked_id));
    }

    pub async fn remove_block(&self, blocker_id: i64, blocked_id: i64) {
        self.inner
            .write()
            .await
            .blocks
            .remove(&(blocker_id, blocked_id));
    }

    /// Adjacency rows currently materialized for a connection.
    pub async fn adjacency_for_connection(&self, connection_id: i64) -> Vec<UserConnection> {
        self.inner
            .read()
            .await
            .adjacency
            .values()
            .filter(|row| row.connection_id == connection_id)
            .cloned()
            .collect()
    }

    /// Every request row for the ordered pair.
    pub async fn requests_between(&self, requester_id: i64, requested_id: i64) -> Vec<ConnectionRequest> {
        self.inner
            .read()
            .await
            .requests
            .values()
            .filter(|r| r.requester_id == requester_id && r.requested_id == requested_id)
            .cloned()
            .collect()
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn Tx>, StorageError> {
        let guard = Arc::clone(&self.inner).write_owned().await;
        let snapshot = (*guard).clone();
        Ok(Box::new(MemoryTx {
            state: guard,
            snapshot: Some(snapshot),
        }))
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, StorageError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn is_blocked(&self, a: i64, b: i64) -> Result<bool, StorageError> {
        Ok(self.inner.read().await.is_blocked(a, b))
    }

    async fn find_connection(&self, a: i64, b: i64) -> Result<Option<Connection>, StorageError> {
        Ok(self.inner.read().await.find_connection(a, b))
    }

    async fn relationship_type(
        &self,
        user_id: i64,
        other_user_id: i64,
    ) -> Result<Option<ConnectionType>, StorageError> {
        Ok(self
            .inner
            .read()
            .await
            .relationship_type(user_id, other_user_id))
    }

    async fn neighbors_of(
        &self,
        query: &NeighborQuery,
    ) -> Result<(Vec<UserConnection>, bool), StorageError> {
        Ok(self.inner.read().await.neighbors_of(query))
    }

    async fn all_neighbors(&self, user_id: i64) -> Result<Vec<UserConnection>, StorageError> {
        Ok(self
            .inner
            .read()
            .await
            .adjacency
            .values()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_requests(
        &self,
        user_id: i64,
        direction: RequestDirection,
        status: Option<RequestStatus>,
    ) -> Result<Vec<ConnectionRequest>, StorageError> {
        let state = self.inner.read().await;
        let mut requests: Vec<ConnectionRequest> = state
            .requests
            .values()
            .filter(|r| match direction {
                RequestDirection::Incoming => r.requested_id == user_id,
                RequestDirection::Outgoing => r.requester_id == user_id,
            })
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(requests)
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>, StorageError> {
        Ok(self.inner.read().await.posts.get(&id).cloned())
    }

    async fn feed_candidates(&self, query: &FeedQuery) -> Result<Vec<Post>, StorageError> {
        let state = self.inner.read().await;
        let upper = query.before.unwrap_or(i64::MAX);
        Ok(state
            .posts
            .range(..upper)
            .rev()
            .map(|(_, post)| post)
            .filter(|post| {
                query.authors.contains(&post.author_id)
                    || post.subnet_id.map_or(false, |id| query.subnet_ids.contains(&id))
                    || post.group_id.map_or(false, |id| query.group_ids.contains(&id))
            })
            .take(query.limit + 1)
            .cloned()
            .collect())
    }

    async fn get_group(&self, id: i64) -> Result<Option<Group>, StorageError> {
        Ok(self.inner.read().await.groups.get(&id).cloned())
    }

    async fn get_group_member(
        &self,
        group_id: i64,
        user_id: i64,
    ) -> Result<Option<GroupMember>, StorageError> {
        Ok(self.inner.read().await.group_member(group_id, user_id))
    }

    async fn list_group_members(&self, group_id: i64) -> Result<Vec<GroupMember>, StorageError> {
        let state = self.inner.read().await;
        let mut members: Vec<GroupMember> = state
            .group_members
            .range((group_id, i64::MIN)..=(group_id, i64::MAX))
            .map(|(_, m)| m.clone())
            .collect();
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.user_id.cmp(&b.user_id)));
        Ok(members)
    }

    async fn list_group_join_requests(
        &self,
        group_id: i64,
        status: JoinStatus,
    ) -> Result<Vec<GroupJoinRequest>, StorageError> {
        Ok(self
            .inner
            .read()
            .await
            .group_join_requests
            .values()
            .filter(|r| r.group_id == group_id && r.status == status)
            .cloned()
            .collect())
    }

    async fn group_ids_for(&self, user_id: i64) -> Result<Vec<i64>, StorageError> {
        Ok(self
            .inner
            .read()
            .await
            .group_members
            .values()
            .filter(|m| m.user_id == user_id && m.is_active())
            .map(|m| m.group_id)
            .collect())
    }

    async fn get_subnet(&self, id: i64) -> Result<Option<SubNet>, StorageError> {
        Ok(self.inner.read().await.subnets.get(&id).cloned())
    }

    async fn get_subnet_member(
        &self,
        subnet_id: i64,
        user_id: i64,
    ) -> Result<Option<SubNetMember>, StorageError> {
        Ok(self.inner.read().await.subnet_member(subnet_id, user_id))
    }

    async fn list_subnet_members(&self, subnet_id: i64) -> Result<Vec<SubNetMember>, StorageError> {
        let state = self.inner.read().await;
        let mut members: Vec<SubNetMember> = state
            .subnet_members
            .range((subnet_id, i64::MIN)..=(subnet_id, i64::MAX))
            .map(|(_, m)| m.clone())
            .collect();
        members.sort_by(|a, b| a.added_at.cmp(&b.added_at).then(a.user_id.cmp(&b.user_id)));
        Ok(members)
    }

    async fn subnet_ids_for(&self, user_id: i64) -> Result<Vec<i64>, StorageError> {
        let state = self.inner.read().await;
        let mut ids: Vec<i64> = state
            .subnets
            .values()
            .filter(|s| s.owner_id == user_id)
            .map(|s| s.id)
            .chain(
                state
                    .subnet_members
                    .values()
                    .filter(|m| m.user_id == user_id)
                    .map(|m| m.subnet_id),
            )
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    async fn get_round_table(&self, id: i64) -> Result<Option<RoundTable>, StorageError> {
        Ok(self.inner.read().await.round_tables.get(&id).cloned())
    }

    async fn get_round_table_member(
        &self,
        round_table_id: i64,
        user_id: i64,
    ) -> Result<Option<RoundTableMember>, StorageError> {
        Ok(self
            .inner
            .read()
            .await
            .round_table_member(round_table_id, user_id))
    }

    async fn list_round_table_join_requests(
        &self,
        round_table_id: i64,
        status: JoinStatus,
    ) -> Result<Vec<RoundTableJoinRequest>, StorageError> {
        Ok(self
            .inner
            .read()
            .await
            .round_table_join_requests
            .values()
            .filter(|r| r.round_table_id == round_table_id && r.status == status)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MemoryTx
// ---------------------------------------------------------------------------

/// Unit of work over [`MemoryStore`]; serializes with every other writer.
pub struct MemoryTx {
    state: OwnedRwLockWriteGuard<State>,
    snapshot: Option<State>,
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.state = snapshot;
        }
    }
}

#[async_trait]
impl Tx for MemoryTx {
    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let mut tx = self;
        tx.snapshot = None;
        Ok(())
    }

    async fn get_user(&mut self, id: i64) -> Result<Option<User>, StorageError> {
        Ok(self.state.users.get(&id).cloned())
    }

    async fn is_blocked(&mut self, a: i64, b: i64) -> Result<bool, StorageError> {
        Ok(self.state.is_blocked(a, b))
    }

    async fn find_connection(
        &mut self,
        a: i64,
        b: i64,
    ) -> Result<Option<Connection>, StorageError> {
        Ok(self.state.find_connection(a, b))
    }

    async fn lock_connection(
        &mut self,
        a: i64,
        b: i64,
    ) -> Result<Option<Connection>, StorageError> {
        // The write guard already excludes every other transaction.
        Ok(self.state.find_connection(a, b))
    }

    async fn lock_request(&mut self, id: i64) -> Result<Option<ConnectionRequest>, StorageError> {
        Ok(self.state.requests.get(&id).cloned())
    }

    async fn upsert_request(
        &mut self,
        request: &NewConnectionRequest,
    ) -> Result<ConnectionRequest, StorageError> {
        let existing = self
            .state
            .requests
            .values_mut()
            .find(|r| {
                r.requester_id == request.requester_id && r.requested_id == request.requested_id
            });
        if let Some(row) = existing {
            row.request_type = request.request_type;
            row.status = request.status;
            row.created_at = request.created_at;
            row.decided_at = request.decided_at;
            return Ok(row.clone());
        }

        let id = self.state.next_id();
        let row = ConnectionRequest {
            id,
            requester_id: request.requester_id,
            requested_id: request.requested_id,
            request_type: request.request_type,
            status: request.status,
            created_at: request.created_at,
            decided_at: request.decided_at,
        };
        self.state.requests.insert(id, row.clone());
        Ok(row)
    }

    async fn set_request_status(
        &mut self,
        id: i64,
        status: RequestStatus,
        decided_at: DateTime<Utc>,
    ) -> Result<ConnectionRequest, StorageError> {
        let row = self
            .state
            .requests
            .get_mut(&id)
            .ok_or(StorageError::NotFound)?;
        row.status = status;
        row.decided_at = Some(decided_at);
        Ok(row.clone())
    }

    async fn save_connection(
        &mut self,
        connection: &NewConnection,
    ) -> Result<Connection, StorageError> {
        let existing = self
            .state
            .connections
            .values_mut()
            .find(|c| c.user_low == connection.user_low && c.user_high == connection.user_high);
        if let Some(row) = existing {
            if connection.kind.precedence() <= row.kind.precedence() {
                return Err(StorageError::Conflict(format!(
                    "connection {} is already {}",
                    row.id, row.kind
                )));
            }
            row.requester_id = connection.requester_id;
            row.requested_id = connection.requested_id;
            row.kind = connection.kind;
            row.updated_at = connection.updated_at;
            return Ok(row.clone());
        }

        let id = self.state.next_id();
        let row = Connection {
            id,
            requester_id: connection.requester_id,
            requested_id: connection.requested_id,
            user_low: connection.user_low,
            user_high: connection.user_high,
            kind: connection.kind,
            created_at: connection.created_at,
            updated_at: connection.updated_at,
        };
        self.state.connections.insert(id, row.clone());
        Ok(row)
    }

    async fn delete_connection(&mut self, id: i64) -> Result<(), StorageError> {
        self.state
            .connections
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::NotFound)?;
        // Mirrors the ON DELETE CASCADE of the adjacency table.
        self.state.adjacency.retain(|_, row| row.connection_id != id);
        Ok(())
    }

    async fn delete_adjacency(&mut self, connection_id: i64) -> Result<usize, StorageError> {
        let before = self.state.adjacency.len();
        self.state
            .adjacency
            .retain(|_, row| row.connection_id != connection_id);
        Ok(before - self.state.adjacency.len())
    }

    async fn insert_adjacency(&mut self, rows: &[NewUserConnection]) -> Result<usize, StorageError> {
        let mut inserted = 0;
        for new_row in rows {
            let present = self.state.adjacency.values().any(|row| {
                row.user_id == new_row.user_id
                    && row.other_user_id == new_row.other_user_id
                    && row.kind == new_row.kind
            });
            if present {
                continue;
            }
            let id = self.state.next_id();
            self.state.adjacency.insert(
                id,
                UserConnection {
                    id,
                    connection_id: new_row.connection_id,
                    user_id: new_row.user_id,
                    other_user_id: new_row.other_user_id,
                    kind: new_row.kind,
                    created_at: new_row.created_at,
                },
            );
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn insert_post(&mut self, post: &NewPost) -> Result<Post, StorageError> {
        let id = self.state.next_id();
        let row = Post {
            id,
            author_id: post.author_id,
            content: post.content.clone(),
            visibility: post.visibility,
            subnet_id: post.subnet_id,
            group_id: post.group_id,
            media_key: post.media_key.clone(),
            created_at: post.created_at,
        };
        self.state.posts.insert(id, row.clone());
        Ok(row)
    }

    async fn insert_group(&mut self, group: &NewGroup) -> Result<Group, StorageError> {
        let id = self.state.next_id();
        let row = Group {
            id,
            owner_id: group.owner_id,
            name: group.name.clone(),
            kind: group.kind,
            is_hidden: group.is_hidden,
            created_at: group.created_at,
        };
        self.state.groups.insert(id, row.clone());
        Ok(row)
    }

    async fn get_group_member(
        &mut self,
        group_id: i64,
        user_id: i64,
    ) -> Result<Option<GroupMember>, StorageError> {
        Ok(self.state.group_member(group_id, user_id))
    }

    async fn insert_group_member(&mut self, member: &GroupMember) -> Result<bool, StorageError> {
        let key = (member.group_id, member.user_id);
        if self.state.group_members.contains_key(&key) {
            return Ok(false);
        }
        self.state.group_members.insert(key, member.clone());
        Ok(true)
    }

    async fn ban_group_member(
        &mut self,
        group_id: i64,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<GroupMember, StorageError> {
        let row = self
            .state
            .group_members
            .entry((group_id, user_id))
            .or_insert_with(|| GroupMember {
                group_id,
                user_id,
                role: GroupRole::Member,
                is_banned: true,
                joined_at: at,
            });
        row.is_banned = true;
        Ok(row.clone())
    }

    async fn lock_group_join_request(
        &mut self,
        id: i64,
    ) -> Result<Option<GroupJoinRequest>, StorageError> {
        Ok(self.state.group_join_requests.get(&id).cloned())
    }

    async fn find_group_join_request(
        &mut self,
        group_id: i64,
        user_id: i64,
    ) -> Result<Option<GroupJoinRequest>, StorageError> {
        Ok(self
            .state
            .group_join_requests
            .values()
            .find(|r| r.group_id == group_id && r.user_id == user_id)
            .cloned())
    }

    async fn upsert_group_join_request(
        &mut self,
        group_id: i64,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<GroupJoinRequest, StorageError> {
        if let Some(row) = self
            .state
            .group_join_requests
            .values_mut()
            .find(|r| r.group_id == group_id && r.user_id == user_id)
        {
            row.status = JoinStatus::Pending;
            row.created_at = at;
            row.decided_at = None;
            return Ok(row.clone());
        }
        let id = self.state.next_id();
        let row = GroupJoinRequest {
            id,
            group_id,
            user_id,
            status: JoinStatus::Pending,
            created_at: at,
            decided_at: None,
        };
        self.state.group_join_requests.insert(id, row.clone());
        Ok(row)
    }

    async fn set_group_join_request_status(
        &mut self,
        id: i64,
        status: JoinStatus,
        decided_at: DateTime<Utc>,
    ) -> Result<GroupJoinRequest, StorageError> {
        let row = self
            .state
            .group_join_requests
            .get_mut(&id)
            .ok_or(StorageError::NotFound)?;
        row.status = status;
        row.decided_at = Some(decided_at);
        Ok(row.clone())
    }

    async fn insert_subnet(&mut self, subnet: &NewSubNet) -> Result<SubNet, StorageError> {
        let id = self.state.next_id();
        let row = SubNet {
            id,
            owner_id: subnet.owner_id,
            name: subnet.name.clone(),
            member_count: subnet.member_count,
            created_at: subnet.created_at,
        };
        self.state.subnets.insert(id, row.clone());
        Ok(row)
    }

    async fn lock_subnet(&mut self, id: i64) -> Result<Option<SubNet>, StorageError> {
        Ok(self.state.subnets.get(&id).cloned())
    }

    async fn get_subnet_member(
        &mut self,
        subnet_id: i64,
        user_id: i64,
    ) -> Result<Option<SubNetMember>, StorageError> {
        Ok(self.state.subnet_member(subnet_id, user_id))
    }

    async fn insert_subnet_members(
        &mut self,
        rows: &[NewSubNetMember],
    ) -> Result<Vec<i64>, StorageError> {
        let mut added = Vec::new();
        for row in rows {
            let key = (row.subnet_id, row.user_id);
            if self.state.subnet_members.contains_key(&key) {
                continue;
            }
            self.state.subnet_members.insert(
                key,
                SubNetMember {
                    subnet_id: row.subnet_id,
                    user_id: row.user_id,
                    role: row.role,
                    added_at: row.added_at,
                },
            );
            added.push(row.user_id);
        }
        Ok(added)
    }

    async fn delete_subnet_member(
        &mut self,
        subnet_id: i64,
        user_id: i64,
    ) -> Result<bool, StorageError> {
        Ok(self
            .state
            .subnet_members
            .remove(&(subnet_id, user_id))
            .is_some())
    }

    async fn set_subnet_member_role(
        &mut self,
        subnet_id: i64,
        user_id: i64,
        role: SubNetRole,
    ) -> Result<Option<SubNetMember>, StorageError> {
        Ok(self
            .state
            .subnet_members
            .get_mut(&(subnet_id, user_id))
            .map(|member| {
                member.role = role;
                member.clone()
            }))
    }

    async fn recount_subnet_members(&mut self, subnet_id: i64) -> Result<SubNet, StorageError> {
        let count = self
            .state
            .subnet_members
            .range((subnet_id, i64::MIN)..=(subnet_id, i64::MAX))
            .count();
        let subnet = self
            .state
            .subnets
            .get_mut(&subnet_id)
            .ok_or(StorageError::NotFound)?;
        subnet.member_count = i32::try_from(count)
            .map_err(|_| StorageError::Internal("member count overflow".into()))?;
        Ok(subnet.clone())
    }

    async fn insert_round_table(
        &mut self,
        table: &NewRoundTable,
    ) -> Result<RoundTable, StorageError> {
        let id = self.state.next_id();
        let row = RoundTable {
            id,
            owner_id: table.owner_id,
            name: table.name.clone(),
            created_at: table.created_at,
        };
        self.state.round_tables.insert(id, row.clone());
        Ok(row)
    }

    async fn get_round_table_member(
        &mut self,
        round_table_id: i64,
        user_id: i64,
    ) -> Result<Option<RoundTableMember>, StorageError> {
        Ok(self.state.round_table_member(round_table_id, user_id))
    }

    async fn insert_round_table_member(
        &mut self,
        member: &RoundTableMember,
    ) -> Result<bool, StorageError> {
        let key = (member.round_table_id, member.user_id);
        if self.state.round_table_members.contains_key(&key) {
            return Ok(false);
        }
        self.state.round_table_members.insert(key, member.clone());
        Ok(true)
    }

    async fn lock_round_table_join_request(
        &mut self,
        id: i64,
    ) -> Result<Option<RoundTableJoinRequest>, StorageError> {
        Ok(self.state.round_table_join_requests.get(&id).cloned())
    }

    async fn find_round_table_join_request(
        &mut self,
        round_table_id: i64,
        user_id: i64,
    ) -> Result<Option<RoundTableJoinRequest>, StorageError> {
        Ok(self
            .state
            .round_table_join_requests
            .values()
            .find(|r| r.round_table_id == round_table_id && r.user_id == user_id)
            .cloned())
    }

    async fn upsert_round_table_join_request(
        &mut self,
        round_table_id: i64,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<RoundTableJoinRequest, StorageError> {
        if let Some(row) = self
            .state
            .round_table_join_requests
            .values_mut()
            .find(|r| r.round_table_id == round_table_id && r.user_id == user_id)
        {
            row.status = JoinStatus::Pending;
            row.created_at = at;
            row.decided_at = None;
            return Ok(row.clone());
        }
        let id = self.state.next_id();
        let row = RoundTableJoinRequest {
            id,
            round_table_id,
            user_id,
            status: JoinStatus::Pending,
            created_at: at,
            decided_at: None,
        };
        self.state.round_table_join_requests.insert(id, row.clone());
        Ok(row)
    }

    async fn set_round_table_join_request_status(
        &mut self,
        id: i64,
        status: JoinStatus,
        decided_at: DateTime<Utc>,
    ) -> Result<RoundTableJoinRequest, StorageError> {
        let row = self
            .state
            .round_table_join_requests
            .get_mut(&id)
            .ok_or(StorageError::NotFound)?;
        row.status = status;
        row.decided_at = Some(decided_at);
        Ok(row.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RequestType;

    #[tokio::test]
    async fn dropped_tx_discards_writes() {
        let store = MemoryStore::new();
        let a = store.insert_user("a").await;
        let b = store.insert_user("b").await;

        {
            let mut tx = store.begin().await.unwrap();
            let conn = tx
                .save_connection(&NewConnection::new(a.id, b.id, ConnectionType::Stranger))
                .await
                .unwrap();
            tx.insert_adjacency(&[NewUserConnection {
                connection_id: conn.id,
                user_id: a.id,
                other_user_id: b.id,
                kind: ConnectionType::Stranger,
                created_at: models::now(),
            }])
            .await
            .unwrap();
            // Dropped without commit.
        }

        assert_eq!(store.connection_count().await, 0);
        assert_eq!(store.relationship_type(a.id, b.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn committed_tx_is_visible() {
        let store = MemoryStore::new();
        let a = store.insert_user("a").await;
        let b = store.insert_user("b").await;

        let mut tx = store.begin().await.unwrap();
        tx.upsert_request(&NewConnectionRequest::pending(a.id, b.id, RequestType::Stranger))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let rows = store.requests_between(a.id, b.id).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn connections_only_move_up_in_precedence() {
        let store = MemoryStore::new();
        let a = store.insert_user("a").await;
        let b = store.insert_user("b").await;

        let mut tx = store.begin().await.unwrap();
        let stranger = tx
            .save_connection(&NewConnection::new(a.id, b.id, ConnectionType::Stranger))
            .await
            .unwrap();
        for kind in [ConnectionType::Stranger, ConnectionType::IsFollowing] {
            assert!(matches!(
                tx.save_connection(&NewConnection::new(b.id, a.id, kind)).await,
                Err(StorageError::Conflict(_))
            ));
        }
        let upgraded = tx
            .save_connection(&NewConnection::new(b.id, a.id, ConnectionType::Acquaintance))
            .await
            .unwrap();
        assert_eq!(upgraded.id, stranger.id);
        assert_eq!(upgraded.requester_id, b.id);

        let locked = tx.lock_connection(a.id, b.id).await.unwrap().unwrap();
        assert_eq!(locked.kind, ConnectionType::Acquaintance);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn adjacency_insert_is_set_membership() {
        let store = MemoryStore::new();
        let a = store.insert_user("a").await;
        let b = store.insert_user("b").await;

        let mut tx = store.begin().await.unwrap();
        let conn = tx
            .save_connection(&NewConnection::new(a.id, b.id, ConnectionType::IsFollowing))
            .await
            .unwrap();
        let row = NewUserConnection {
            connection_id: conn.id,
            user_id: a.id,
            other_user_id: b.id,
            kind: ConnectionType::IsFollowing,
            created_at: models::now(),
        };
        assert_eq!(tx.insert_adjacency(&[row.clone()]).await.unwrap(), 1);
        assert_eq!(tx.insert_adjacency(&[row]).await.unwrap(), 0);
        tx.commit().await.unwrap();

        assert_eq!(store.adjacency_for_connection(conn.id).await.len(), 1);
    }

    #[tokio::test]
    async fn blocks_apply_in_both_directions() {
        let store = MemoryStore::new();
        let a = store.insert_user("a").await;
        let b = store.insert_user("b").await;
        store.insert_block(a.id, b.id).await;

        assert!(store.is_blocked(a.id, b.id).await.unwrap());
        assert!(store.is_blocked(b.id, a.id).await.unwrap());

        store.remove_block(a.id, b.id).await;
        assert!(!store.is_blocked(b.id, a.id).await.unwrap());
    }
}
