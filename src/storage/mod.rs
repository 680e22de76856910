// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! Persistence contract for the relationship graph and membership records.
//!
//! Reads go through [`Store`]; every mutation goes through a [`Tx`] unit of
//! work obtained from [`Store::begin`], which either commits as one block or
//! is dropped and leaves nothing behind. Business rules live in the `graph`,
//! `content` and `membership` modules; storage enforces uniqueness keys and
//! never lets a connection move down in precedence.
//!
//! | Type | When to use |
//! |------|-------------|
//! | [`MemoryStore`](memory::MemoryStore) | Tests and `STORAGE_BACKEND=memory` |
//! | [`Database`](crate::db::Database) | Production Postgres |

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    Connection, ConnectionRequest, ConnectionType, Group, GroupJoinRequest, GroupMember,
    JoinStatus, NewConnection, NewConnectionRequest, NewGroup, NewPost, NewRoundTable, NewSubNet,
    NewSubNetMember, NewUserConnection, Post, RequestStatus, RoundTable, RoundTableJoinRequest,
    RoundTableMember, SubNet, SubNetMember, SubNetRole, User, UserConnection,
};

pub use memory::MemoryStore;

/// Errors that storage operations can return.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested row does not exist.
    #[error("not found")]
    NotFound,

    /// A uniqueness key was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An unexpected failure in the backend or the connection pool.
    #[error("internal storage error: {0}")]
    Internal(String),
}

/// Keyset position inside a user's adjacency list, which is ordered by
/// `(created_at DESC, other_user_id ASC)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjacencyCursor {
    pub created_at: DateTime<Utc>,
    pub other_user_id: i64,
}

/// Query for [`Store::neighbors_of`].
#[derive(Debug, Clone)]
pub struct NeighborQuery {
    pub user_id: i64,
    pub kind: Option<ConnectionType>,
    pub after: Option<AdjacencyCursor>,
    pub limit: usize,
}

/// Which side of a request the caller is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDirection {
    Incoming,
    Outgoing,
}

/// Candidate selection for feed assembly. A post matches when any of the
/// three lists names its author, subnet or group.
#[derive(Debug, Clone, Default)]
pub struct FeedQuery {
    pub authors: Vec<i64>,
    pub subnet_ids: Vec<i64>,
    pub group_ids: Vec<i64>,
    /// Only posts with `id < before` when set.
    pub before: Option<i64>,
    pub limit: usize,
}

/// Read handle over the relational store.
///
/// Implementations are shared behind an `Arc<dyn Store>` and must not hold
/// any per-request state.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Opens a unit of work. Nothing written through it is visible to other
    /// readers until [`Tx::commit`].
    async fn begin(&self) -> Result<Box<dyn Tx>, StorageError>;

    /// Cheap liveness probe used by the health endpoint.
    async fn ping(&self) -> Result<(), StorageError>;

    // --- Users and blocks ----------------------------------------------------

    async fn get_user(&self, id: i64) -> Result<Option<User>, StorageError>;

    /// `true` when a block exists in either direction between `a` and `b`.
    async fn is_blocked(&self, a: i64, b: i64) -> Result<bool, StorageError>;

    // --- Graph ---------------------------------------------------------------

    /// The connection of the unordered pair, if any.
    async fn find_connection(&self, a: i64, b: i64) -> Result<Option<Connection>, StorageError>;

    /// Type of the adjacency row `user_id → other_user_id`, if one exists.
    async fn relationship_type(
        &self,
        user_id: i64,
        other_user_id: i64,
    ) -> Result<Option<ConnectionType>, StorageError>;

    /// One page of a user's adjacency rows plus whether more rows follow.
    async fn neighbors_of(
        &self,
        query: &NeighborQuery,
    ) -> Result<(Vec<UserConnection>, bool), StorageError>;

    /// Every adjacency row of `user_id`, unordered. Used by feed assembly.
    async fn all_neighbors(&self, user_id: i64) -> Result<Vec<UserConnection>, StorageError>;

    /// Requests where `user_id` is the target (incoming) or the requester
    /// (outgoing), newest first.
    async fn list_requests(
        &self,
        user_id: i64,
        direction: RequestDirection,
        status: Option<RequestStatus>,
    ) -> Result<Vec<ConnectionRequest>, StorageError>;

    // --- Content -------------------------------------------------------------

    async fn get_post(&self, id: i64) -> Result<Option<Post>, StorageError>;

    /// Candidate posts ordered by `id` descending, at most `limit + 1` rows.
    async fn feed_candidates(&self, query: &FeedQuery) -> Result<Vec<Post>, StorageError>;

    // --- Groups --------------------------------------------------------------

    async fn get_group(&self, id: i64) -> Result<Option<Group>, StorageError>;

    async fn get_group_member(
        &self,
        group_id: i64,
        user_id: i64,
    ) -> Result<Option<GroupMember>, StorageError>;

    async fn list_group_members(&self, group_id: i64) -> Result<Vec<GroupMember>, StorageError>;

    async fn list_group_join_requests(
        &self,
        group_id: i64,
        status: JoinStatus,
    ) -> Result<Vec<GroupJoinRequest>, StorageError>;

    /// Groups where `user_id` holds a non-banned membership.
    async fn group_ids_for(&self, user_id: i64) -> Result<Vec<i64>, StorageError>;

    // --- Subnets -------------------------------------------------------------

    async fn get_subnet(&self, id: i64) -> Result<Option<SubNet>, StorageError>;

    async fn get_subnet_member(
        &self,
        subnet_id: i64,
        user_id: i64,
    ) -> Result<Option<SubNetMember>, StorageError>;

    async fn list_subnet_members(&self, subnet_id: i64) -> Result<Vec<SubNetMember>, StorageError>;

    /// Subnets `user_id` owns or belongs to.
    async fn subnet_ids_for(&self, user_id: i64) -> Result<Vec<i64>, StorageError>;

    // --- Round tables --------------------------------------------------------

    async fn get_round_table(&self, id: i64) -> Result<Option<RoundTable>, StorageError>;

    async fn get_round_table_member(
        &self,
        round_table_id: i64,
        user_id: i64,
    ) -> Result<Option<RoundTableMember>, StorageError>;

    async fn list_round_table_join_requests(
        &self,
        round_table_id: i64,
        status: JoinStatus,
    ) -> Result<Vec<RoundTableJoinRequest>, StorageError>;
}

/// A unit of work: the bounded set of reads and writes a single lifecycle
/// operation performs, applied atomically by [`Tx::commit`].
///
/// Dropping a `Tx` without committing discards every write made through it.
#[async_trait]
pub trait Tx: Send {
    async fn commit(self: Box<Self>) -> Result<(), StorageError>;

    // --- Reads under the transaction ----------------------------------------

    async fn get_user(&mut self, id: i64) -> Result<Option<User>, StorageError>;

    async fn is_blocked(&mut self, a: i64, b: i64) -> Result<bool, StorageError>;

    async fn find_connection(&mut self, a: i64, b: i64)
        -> Result<Option<Connection>, StorageError>;

    /// Reads the pair's connection after taking an exclusive lock on the
    /// unordered pair. Held until the transaction ends; a second writer of
    /// the same pair waits here and then sees the first one's commit.
    async fn lock_connection(
        &mut self,
        a: i64,
        b: i64,
    ) -> Result<Option<Connection>, StorageError>;

    // --- Relationship requests ----------------------------------------------

    /// Loads a request and holds it until the transaction ends, so two
    /// concurrent deciders cannot both observe it as pending.
    async fn lock_request(&mut self, id: i64) -> Result<Option<ConnectionRequest>, StorageError>;

    /// Inserts the request, or overwrites type, status and timestamps of the
    /// existing row for the same ordered pair.
    async fn upsert_request(
        &mut self,
        request: &NewConnectionRequest,
    ) -> Result<ConnectionRequest, StorageError>;

    async fn set_request_status(
        &mut self,
        id: i64,
        status: RequestStatus,
        decided_at: DateTime<Utc>,
    ) -> Result<ConnectionRequest, StorageError>;

    // --- Connections and adjacency ------------------------------------------

    /// Creates the pair's connection, or re-types the existing one in place
    /// (keeping its id and `created_at`). Only a type of strictly higher
    /// precedence replaces an existing one; anything else is
    /// [`StorageError::Conflict`].
    async fn save_connection(
        &mut self,
        connection: &NewConnection,
    ) -> Result<Connection, StorageError>;

    async fn delete_connection(&mut self, id: i64) -> Result<(), StorageError>;

    /// Removes every adjacency row of a connection; returns how many went.
    async fn delete_adjacency(&mut self, connection_id: i64) -> Result<usize, StorageError>;

    /// Set-membership insert keyed by `(user_id, other_user_id, kind)`;
    /// rows already present are left untouched.
    async fn insert_adjacency(&mut self, rows: &[NewUserConnection]) -> Result<usize, StorageError>;

    // --- Content -------------------------------------------------------------

    async fn insert_post(&mut self, post: &NewPost) -> Result<Post, StorageError>;

    // --- Groups --------------------------------------------------------------

    async fn insert_group(&mut self, group: &NewGroup) -> Result<Group, StorageError>;

    async fn get_group_member(
        &mut self,
        group_id: i64,
        user_id: i64,
    ) -> Result<Option<GroupMember>, StorageError>;

    /// Inserts a membership row; returns `false` when the user already had one.
    async fn insert_group_member(&mut self, member: &GroupMember) -> Result<bool, StorageError>;

    /// Marks the user banned, creating the row when they were not a member.
    async fn ban_group_member(
        &mut self,
        group_id: i64,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<GroupMember, StorageError>;

    async fn lock_group_join_request(
        &mut self,
        id: i64,
    ) -> Result<Option<GroupJoinRequest>, StorageError>;

    async fn find_group_join_request(
        &mut self,
        group_id: i64,
        user_id: i64,
    ) -> Result<Option<GroupJoinRequest>, StorageError>;

    /// Creates a pending request or resets the existing row for the pair to
    /// pending.
    async fn upsert_group_join_request(
        &mut self,
        group_id: i64,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<GroupJoinRequest, StorageError>;

    async fn set_group_join_request_status(
        &mut self,
        id: i64,
        status: JoinStatus,
        decided_at: DateTime<Utc>,
    ) -> Result<GroupJoinRequest, StorageError>;

    // --- Subnets -------------------------------------------------------------

    async fn insert_subnet(&mut self, subnet: &NewSubNet) -> Result<SubNet, StorageError>;

    /// Loads the subnet and holds it until the transaction ends.
    async fn lock_subnet(&mut self, id: i64) -> Result<Option<SubNet>, StorageError>;

    async fn get_subnet_member(
        &mut self,
        subnet_id: i64,
        user_id: i64,
    ) -> Result<Option<SubNetMember>, StorageError>;

    /// Inserts the rows that are not already present and returns the user
    /// ids actually added.
    async fn insert_subnet_members(
        &mut self,
        rows: &[NewSubNetMember],
    ) -> Result<Vec<i64>, StorageError>;

    async fn delete_subnet_member(&mut self, subnet_id: i64, user_id: i64)
        -> Result<bool, StorageError>;

    async fn set_subnet_member_role(
        &mut self,
        subnet_id: i64,
        user_id: i64,
        role: SubNetRole,
    ) -> Result<Option<SubNetMember>, StorageError>;

    /// Recomputes the denormalized `member_count` from membership rows and
    /// returns the updated subnet.
    async fn recount_subnet_members(&mut self, subnet_id: i64) -> Result<SubNet, StorageError>;

    // --- Round tables --------------------------------------------------------

    async fn insert_round_table(&mut self, table: &NewRoundTable)
        -> Result<RoundTable, StorageError>;

    async fn get_round_table_member(
        &mut self,
        round_table_id: i64,
        user_id: i64,
    ) -> Result<Option<RoundTableMember>, StorageError>;

    async fn insert_round_table_member(
        &mut self,
        member: &RoundTableMember,
    ) -> Result<bool, StorageError>;

    async fn lock_round_table_join_request(
        &mut self,
        id: i64,
    ) -> Result<Option<RoundTableJoinRequest>, StorageError>;

    async fn find_round_table_join_request(
        &mut self,
        round_table_id: i64,
        user_id: i64,
    ) -> Result<Option<RoundTableJoinRequest>, StorageError>;

    async fn upsert_round_table_join_request(
        &mut self,
        round_table_id: i64,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<RoundTableJoinRequest, StorageError>;

    async fn set_round_table_join_request_status(
        &mut self,
        id: i64,
        status: JoinStatus,
        decided_at: DateTime<Utc>,
    ) -> Result<RoundTableJoinRequest, StorageError>;
}
