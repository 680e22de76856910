// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! Postgres implementation of [`Store`] and [`Tx`] on top of `diesel-async`.
//!
//! Query bodies live in [`queries`] and take a bare connection, so the pooled
//! read path and the transactional path run the exact same SQL. A [`PgTx`]
//! owns one pooled connection with an open transaction; row locks taken by
//! `lock_request` are `SELECT ... FOR UPDATE`. A connection row may not
//! exist yet when two accepts race, so `lock_connection` serializes on a
//! transaction-scoped advisory lock keyed by the ordered pair instead.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::{AnsiTransactionManager, AsyncPgConnection, TransactionManager};
use tracing::error;

use super::{FeedQuery, NeighborQuery, RequestDirection, Store, StorageError, Tx};
use crate::db::{Database, DbConnection, DbPoolError};
use crate::models::{
    Connection, ConnectionRequest, ConnectionType, Group, GroupJoinRequest, GroupMember,
    JoinStatus, NewConnection, NewConnectionRequest, NewGroup, NewPost, NewRoundTable, NewSubNet,
    NewSubNetMember, NewUserConnection, Post, RequestStatus, RoundTable, RoundTableJoinRequest,
    RoundTableMember, SubNet, SubNetMember, SubNetRole, User, UserConnection,
};

impl From<DieselError> for StorageError {
    fn from(e: DieselError) -> Self {
        match e {
            DieselError::NotFound => StorageError::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StorageError::Conflict(info.message().to_string())
            }
            other => StorageError::Internal(other.to_string()),
        }
    }
}

impl From<DbPoolError> for StorageError {
    fn from(e: DbPoolError) -> Self {
        StorageError::Internal(format!("failed to get database connection: {}", e))
    }
}

mod queries {
    use chrono::{DateTime, Utc};
    use diesel::dsl::exists;
    use diesel::prelude::*;
    use diesel::sql_types::Text;
    use diesel::upsert::excluded;
    use diesel_async::{AsyncPgConnection, RunQueryDsl};

    use crate::models::connection::ordered_pair;
    use crate::models::{
        Connection, ConnectionRequest, ConnectionType, Group, GroupJoinRequest, GroupMember,
        GroupRole, JoinStatus, NewConnection, NewConnectionRequest, NewGroup, NewPost,
        NewRoundTable, NewSubNet, NewSubNetMember, NewUserConnection, Post, RequestStatus,
        RoundTable, RoundTableJoinRequest, RoundTableMember, SubNet, SubNetMember, SubNetRole,
        User, UserConnection,
    };
    use crate::schema::{
        blocks, connection_requests, connections, group_join_requests, group_members, groups,
        posts, round_table_join_requests, round_table_members, round_tables, subnet_members,
        subnets, user_connections, users,
    };
    use crate::storage::{FeedQuery, NeighborQuery, RequestDirection};

    type Conn = AsyncPgConnection;

    pub async fn ping(conn: &mut Conn) -> QueryResult<usize> {
        diesel::sql_query("SELECT 1").execute(conn).await
    }

    // --- Users and blocks ----------------------------------------------------

    pub async fn get_user(conn: &mut Conn, id: i64) -> QueryResult<Option<User>> {
        users::table
            .find(id)
            .select(User::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn is_blocked(conn: &mut Conn, a: i64, b: i64) -> QueryResult<bool> {
        diesel::select(exists(
            blocks::table.filter(
                blocks::blocker_id
                    .eq(a)
                    .and(blocks::blocked_id.eq(b))
                    .or(blocks::blocker_id.eq(b).and(blocks::blocked_id.eq(a))),
            ),
        ))
        .get_result(conn)
        .await
    }

    // --- Graph ---------------------------------------------------------------

    pub async fn find_connection(conn: &mut Conn, a: i64, b: i64) -> QueryResult<Option<Connection>> {
        let (low, high) = ordered_pair(a, b);
        connections::table
            .filter(connections::user_low.eq(low))
            .filter(connections::user_high.eq(high))
            .select(Connection::as_select())
            .first(conn)
            .await
            .optional()
    }

    /// Blocks until no other transaction holds the pair, then reads its row.
    /// Both ids are hashed into the single-key form of the advisory lock.
    pub async fn lock_connection(
        conn: &mut Conn,
        a: i64,
        b: i64,
    ) -> QueryResult<Option<Connection>> {
        let (low, high) = ordered_pair(a, b);
        diesel::sql_query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind::<Text, _>(format!("connections:{}:{}", low, high))
            .execute(conn)
            .await?;
        find_connection(conn, a, b).await
    }

    pub async fn relationship_type(
        conn: &mut Conn,
        user_id: i64,
        other_user_id: i64,
    ) -> QueryResult<Option<ConnectionType>> {
        let kinds: Vec<ConnectionType> = user_connections::table
            .filter(user_connections::user_id.eq(user_id))
            .filter(user_connections::other_user_id.eq(other_user_id))
            .select(user_connections::kind)
            .load(conn)
            .await?;
        Ok(kinds.into_iter().max_by_key(|kind| kind.precedence()))
    }

    pub async fn neighbors_of(
        conn: &mut Conn,
        query: &NeighborQuery,
    ) -> QueryResult<(Vec<UserConnection>, bool)> {
        let mut statement = user_connections::table
            .filter(user_connections::user_id.eq(query.user_id))
            .select(UserConnection::as_select())
            .into_boxed();

        if let Some(kind) = query.kind {
            statement = statement.filter(user_connections::kind.eq(kind));
        }
        if let Some(cursor) = query.after {
            statement = statement.filter(
                user_connections::created_at.lt(cursor.created_at).or(user_connections::created_at
                    .eq(cursor.created_at)
                    .and(user_connections::other_user_id.gt(cursor.other_user_id))),
            );
        }

        let mut rows: Vec<UserConnection> = statement
            .order((
                user_connections::created_at.desc(),
                user_connections::other_user_id.asc(),
            ))
            .limit(query.limit as i64 + 1)
            .load(conn)
            .await?;

        let has_more = rows.len() > query.limit;
        rows.truncate(query.limit);
        Ok((rows, has_more))
    }

    pub async fn all_neighbors(conn: &mut Conn, user_id: i64) -> QueryResult<Vec<UserConnection>> {
        user_connections::table
            .filter(user_connections::user_id.eq(user_id))
            .select(UserConnection::as_select())
            .load(conn)
            .await
    }

    pub async fn lock_request(conn: &mut Conn, id: i64) -> QueryResult<Option<ConnectionRequest>> {
        connection_requests::table
            .find(id)
            .select(ConnectionRequest::as_select())
            .for_update()
            .first(conn)
            .await
            .optional()
    }

    pub async fn list_requests(
        conn: &mut Conn,
        user_id: i64,
        direction: RequestDirection,
        status: Option<RequestStatus>,
    ) -> QueryResult<Vec<ConnectionRequest>> {
        let mut statement = connection_requests::table
            .select(ConnectionRequest::as_select())
            .into_boxed();

        statement = match direction {
            RequestDirection::Incoming => {
                statement.filter(connection_requests::requested_id.eq(user_id))
            }
            RequestDirection::Outgoing => {
                statement.filter(connection_requests::requester_id.eq(user_id))
            }
        };
        if let Some(status) = status {
            statement = statement.filter(connection_requests::status.eq(status));
        }

        statement
            .order((
                connection_requests::created_at.desc(),
                connection_requests::id.desc(),
            ))
            .load(conn)
            .await
    }

    pub async fn upsert_request(
        conn: &mut Conn,
        request: &NewConnectionRequest,
    ) -> QueryResult<ConnectionRequest> {
        diesel::insert_into(connection_requests::table)
            .values(request)
            .on_conflict((
                connection_requests::requester_id,
                connection_requests::requested_id,
            ))
            .do_update()
            .set((
                connection_requests::request_type.eq(excluded(connection_requests::request_type)),
                connection_requests::status.eq(excluded(connection_requests::status)),
                connection_requests::created_at.eq(excluded(connection_requests::created_at)),
                connection_requests::decided_at.eq(excluded(connection_requests::decided_at)),
            ))
            .returning(ConnectionRequest::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn set_request_status(
        conn: &mut Conn,
        id: i64,
        status: RequestStatus,
        decided_at: DateTime<Utc>,
    ) -> QueryResult<ConnectionRequest> {
        diesel::update(connection_requests::table.find(id))
            .set((
                connection_requests::status.eq(status),
                connection_requests::decided_at.eq(Some(decided_at)),
            ))
            .returning(ConnectionRequest::as_returning())
            .get_result(conn)
            .await
    }

    /// Re-types the pair's row only when it currently holds a lower type.
    /// With no such row the plain insert either creates the connection or
    /// hits the pair's unique key, so a downgrade surfaces as a conflict.
    pub async fn save_connection(
        conn: &mut Conn,
        connection: &NewConnection,
    ) -> QueryResult<Connection> {
        let outranked: Vec<ConnectionType> = ConnectionType::ALL
            .iter()
            .copied()
            .filter(|kind| kind.precedence() < connection.kind.precedence())
            .collect();

        let upgraded = diesel::update(
            connections::table
                .filter(connections::user_low.eq(connection.user_low))
                .filter(connections::user_high.eq(connection.user_high))
                .filter(connections::kind.eq_any(outranked)),
        )
        .set((
            connections::requester_id.eq(connection.requester_id),
            connections::requested_id.eq(connection.requested_id),
            connections::kind.eq(connection.kind),
            connections::updated_at.eq(connection.updated_at),
        ))
        .returning(Connection::as_returning())
        .get_result(conn)
        .await
        .optional()?;
        if let Some(row) = upgraded {
            return Ok(row);
        }

        diesel::insert_into(connections::table)
            .values(connection)
            .returning(Connection::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn delete_connection(conn: &mut Conn, id: i64) -> QueryResult<usize> {
        diesel::delete(connections::table.find(id))
            .execute(conn)
            .await
    }

    pub async fn delete_adjacency(conn: &mut Conn, connection_id: i64) -> QueryResult<usize> {
        diesel::delete(
            user_connections::table.filter(user_connections::connection_id.eq(connection_id)),
        )
        .execute(conn)
        .await
    }

    pub async fn insert_adjacency(conn: &mut Conn, rows: &[NewUserConnection]) -> QueryResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        diesel::insert_into(user_connections::table)
            .values(rows)
            .on_conflict((
                user_connections::user_id,
                user_connections::other_user_id,
                user_connections::kind,
            ))
            .do_nothing()
            .execute(conn)
            .await
    }

    // --- Content -------------------------------------------------------------

    pub async fn get_post(conn: &mut Conn, id: i64) -> QueryResult<Option<Post>> {
        posts::table
            .find(id)
            .select(Post::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn feed_candidates(conn: &mut Conn, query: &FeedQuery) -> QueryResult<Vec<Post>> {
        let mut statement = posts::table
            .filter(
                posts::author_id
                    .eq_any(query.authors.clone())
                    .or(posts::subnet_id
                        .assume_not_null()
                        .eq_any(query.subnet_ids.clone()))
                    .or(posts::group_id
                        .assume_not_null()
                        .eq_any(query.group_ids.clone())),
            )
            .select(Post::as_select())
            .into_boxed();

        if let Some(before) = query.before {
            statement = statement.filter(posts::id.lt(before));
        }

        statement
            .order(posts::id.desc())
            .limit(query.limit as i64 + 1)
            .load(conn)
            .await
    }

    pub async fn insert_post(conn: &mut Conn, post: &NewPost) -> QueryResult<Post> {
        diesel::insert_into(posts::table)
            .values(post)
            .returning(Post::as_returning())
            .get_result(conn)
            .await
    }

    // --- Groups --------------------------------------------------------------

    pub async fn get_group(conn: &mut Conn, id: i64) -> QueryResult<Option<Group>> {
        groups::table
            .find(id)
            .select(Group::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn insert_group(conn: &mut Conn, group: &NewGroup) -> QueryResult<Group> {
        diesel::insert_into(groups::table)
            .values(group)
            .returning(Group::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn get_group_member(
        conn: &mut Conn,
        group_id: i64,
        user_id: i64,
    ) -> QueryResult<Option<GroupMember>> {
        group_members::table
            .find((group_id, user_id))
            .select(GroupMember::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn list_group_members(conn: &mut Conn, group_id: i64) -> QueryResult<Vec<GroupMember>> {
        group_members::table
            .filter(group_members::group_id.eq(group_id))
            .select(GroupMember::as_select())
            .order((group_members::joined_at.asc(), group_members::user_id.asc()))
            .load(conn)
            .await
    }

    pub async fn group_ids_for(conn: &mut Conn, user_id: i64) -> QueryResult<Vec<i64>> {
        group_members::table
            .filter(group_members::user_id.eq(user_id))
            .filter(group_members::is_banned.eq(false))
            .select(group_members::group_id)
            .load(conn)
            .await
    }

    pub async fn insert_group_member(conn: &mut Conn, member: &GroupMember) -> QueryResult<bool> {
        let inserted = diesel::insert_into(group_members::table)
            .values(member)
            .on_conflict((group_members::group_id, group_members::user_id))
            .do_nothing()
            .execute(conn)
            .await?;
        Ok(inserted > 0)
    }

    pub async fn ban_group_member(
        conn: &mut Conn,
        group_id: i64,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> QueryResult<GroupMember> {
        let row = GroupMember {
            group_id,
            user_id,
            role: GroupRole::Member,
            is_banned: true,
            joined_at: at,
        };
        diesel::insert_into(group_members::table)
            .values(&row)
            .on_conflict((group_members::group_id, group_members::user_id))
            .do_update()
            .set(group_members::is_banned.eq(true))
            .returning(GroupMember::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn list_group_join_requests(
        conn: &mut Conn,
        group_id: i64,
        status: JoinStatus,
    ) -> QueryResult<Vec<GroupJoinRequest>> {
        group_join_requests::table
            .filter(group_join_requests::group_id.eq(group_id))
            .filter(group_join_requests::status.eq(status))
            .select(GroupJoinRequest::as_select())
            .order(group_join_requests::created_at.asc())
            .load(conn)
            .await
    }

    pub async fn lock_group_join_request(
        conn: &mut Conn,
        id: i64,
    ) -> QueryResult<Option<GroupJoinRequest>> {
        group_join_requests::table
            .find(id)
            .select(GroupJoinRequest::as_select())
            .for_update()
            .first(conn)
            .await
            .optional()
    }

    pub async fn find_group_join_request(
        conn: &mut Conn,
        group_id: i64,
        user_id: i64,
    ) -> QueryResult<Option<GroupJoinRequest>> {
        group_join_requests::table
            .filter(group_join_requests::group_id.eq(group_id))
            .filter(group_join_requests::user_id.eq(user_id))
            .select(GroupJoinRequest::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn upsert_group_join_request(
        conn: &mut Conn,
        group_id: i64,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> QueryResult<GroupJoinRequest> {
        diesel::insert_into(group_join_requests::table)
            .values((
                group_join_requests::group_id.eq(group_id),
                group_join_requests::user_id.eq(user_id),
                group_join_requests::status.eq(JoinStatus::Pending),
                group_join_requests::created_at.eq(at),
            ))
            .on_conflict((group_join_requests::group_id, group_join_requests::user_id))
            .do_update()
            .set((
                group_join_requests::status.eq(JoinStatus::Pending),
                group_join_requests::created_at.eq(at),
                group_join_requests::decided_at.eq(None::<DateTime<Utc>>),
            ))
            .returning(GroupJoinRequest::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn set_group_join_request_status(
        conn: &mut Conn,
        id: i64,
        status: JoinStatus,
        decided_at: DateTime<Utc>,
    ) -> QueryResult<GroupJoinRequest> {
        diesel::update(group_join_requests::table.find(id))
            .set((
                group_join_requests::status.eq(status),
                group_join_requests::decided_at.eq(Some(decided_at)),
            ))
            .returning(GroupJoinRequest::as_returning())
            .get_result(conn)
            .await
    }

    // --- Subnets -------------------------------------------------------------

    pub async fn get_subnet(conn: &mut Conn, id: i64) -> QueryResult<Option<SubNet>> {
        subnets::table
            .find(id)
            .select(SubNet::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn lock_subnet(conn: &mut Conn, id: i64) -> QueryResult<Option<SubNet>> {
        subnets::table
            .find(id)
            .select(SubNet::as_select())
            .for_update()
            .first(conn)
            .await
            .optional()
    }

    pub async fn insert_subnet(conn: &mut Conn, subnet: &NewSubNet) -> QueryResult<SubNet> {
        diesel::insert_into(subnets::table)
            .values(subnet)
            .returning(SubNet::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn get_subnet_member(
        conn: &mut Conn,
        subnet_id: i64,
        user_id: i64,
    ) -> QueryResult<Option<SubNetMember>> {
        subnet_members::table
            .find((subnet_id, user_id))
            .select(SubNetMember::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn list_subnet_members(conn: &mut Conn, subnet_id: i64) -> QueryResult<Vec<SubNetMember>> {
        subnet_members::table
            .filter(subnet_members::subnet_id.eq(subnet_id))
            .select(SubNetMember::as_select())
            .order((subnet_members::added_at.asc(), subnet_members::user_id.asc()))
            .load(conn)
            .await
    }

    pub async fn subnet_ids_for(conn: &mut Conn, user_id: i64) -> QueryResult<Vec<i64>> {
        let mut ids: Vec<i64> = subnets::table
            .filter(subnets::owner_id.eq(user_id))
            .select(subnets::id)
            .load(conn)
            .await?;
        let member_of: Vec<i64> = subnet_members::table
            .filter(subnet_members::user_id.eq(user_id))
            .select(subnet_members::subnet_id)
            .load(conn)
            .await?;
        ids.extend(member_of);
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    pub async fn insert_subnet_members(
        conn: &mut Conn,
        rows: &[NewSubNetMember],
    ) -> QueryResult<Vec<i64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        // RETURNING only yields the rows the conflict clause let through.
        diesel::insert_into(subnet_members::table)
            .values(rows)
            .on_conflict((subnet_members::subnet_id, subnet_members::user_id))
            .do_nothing()
            .returning(subnet_members::user_id)
            .get_results(conn)
            .await
    }

    pub async fn delete_subnet_member(
        conn: &mut Conn,
        subnet_id: i64,
        user_id: i64,
    ) -> QueryResult<bool> {
        let deleted = diesel::delete(subnet_members::table.find((subnet_id, user_id)))
            .execute(conn)
            .await?;
        Ok(deleted > 0)
    }

    pub async fn set_subnet_member_role(
        conn: &mut Conn,
        subnet_id: i64,
        user_id: i64,
        role: SubNetRole,
    ) -> QueryResult<Option<SubNetMember>> {
        diesel::update(subnet_members::table.find((subnet_id, user_id)))
            .set(subnet_members::role.eq(role))
            .returning(SubNetMember::as_returning())
            .get_result(conn)
            .await
            .optional()
    }

    pub async fn recount_subnet_members(conn: &mut Conn, subnet_id: i64) -> QueryResult<SubNet> {
        let count: i64 = subnet_members::table
            .filter(subnet_members::subnet_id.eq(subnet_id))
            .count()
            .get_result(conn)
            .await?;
        let count = i32::try_from(count).map_err(|e| {
            diesel::result::Error::SerializationError(Box::new(e))
        })?;
        diesel::update(subnets::table.find(subnet_id))
            .set(subnets::member_count.eq(count))
            .returning(SubNet::as_returning())
            .get_result(conn)
            .await
    }

    // --- Round tables --------------------------------------------------------

    pub async fn get_round_table(conn: &mut Conn, id: i64) -> QueryResult<Option<RoundTable>> {
        round_tables::table
            .find(id)
            .select(RoundTable::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn insert_round_table(conn: &mut Conn, table: &NewRoundTable) -> QueryResult<RoundTable> {
        diesel::insert_into(round_tables::table)
            .values(table)
            .returning(RoundTable::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn get_round_table_member(
        conn: &mut Conn,
        round_table_id: i64,
        user_id: i64,
    ) -> QueryResult<Option<RoundTableMember>> {
        round_table_members::table
            .find((round_table_id, user_id))
            .select(RoundTableMember::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn insert_round_table_member(
        conn: &mut Conn,
        member: &RoundTableMember,
    ) -> QueryResult<bool> {
        let inserted = diesel::insert_into(round_table_members::table)
            .values(member)
            .on_conflict((
                round_table_members::round_table_id,
                round_table_members::user_id,
            ))
            .do_nothing()
            .execute(conn)
            .await?;
        Ok(inserted > 0)
    }

    pub async fn list_round_table_join_requests(
        conn: &mut Conn,
        round_table_id: i64,
        status: JoinStatus,
    ) -> QueryResult<Vec<RoundTableJoinRequest>> {
        round_table_join_requests::table
            .filter(round_table_join_requests::round_table_id.eq(round_table_id))
            .filter(round_table_join_requests::status.eq(status))
            .select(RoundTableJoinRequest::as_select())
            .order(round_table_join_requests::created_at.asc())
            .load(conn)
            .await
    }

    pub async fn lock_round_table_join_request(
        conn: &mut Conn,
        id: i64,
    ) -> QueryResult<Option<RoundTableJoinRequest>> {
        round_table_join_requests::table
            .find(id)
            .select(RoundTableJoinRequest::as_select())
            .for_update()
            .first(conn)
            .await
            .optional()
    }

    pub async fn find_round_table_join_request(
        conn: &mut Conn,
        round_table_id: i64,
        user_id: i64,
    ) -> QueryResult<Option<RoundTableJoinRequest>> {
        round_table_join_requests::table
            .filter(round_table_join_requests::round_table_id.eq(round_table_id))
            .filter(round_table_join_requests::user_id.eq(user_id))
            .select(RoundTableJoinRequest::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn upsert_round_table_join_request(
        conn: &mut Conn,
        round_table_id: i64,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> QueryResult<RoundTableJoinRequest> {
        diesel::insert_into(round_table_join_requests::table)
            .values((
                round_table_join_requests::round_table_id.eq(round_table_id),
                round_table_join_requests::user_id.eq(user_id),
                round_table_join_requests::status.eq(JoinStatus::Pending),
                round_table_join_requests::created_at.eq(at),
            ))
            .on_conflict((
                round_table_join_requests::round_table_id,
                round_table_join_requests::user_id,
            ))
            .do_update()
            .set((
                round_table_join_requests::status.eq(JoinStatus::Pending),
                round_table_join_requests::created_at.eq(at),
                round_table_join_requests::decided_at.eq(None::<DateTime<Utc>>),
            ))
            .returning(RoundTableJoinRequest::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn set_round_table_join_request_status(
        conn: &mut Conn,
        id: i64,
        status: JoinStatus,
        decided_at: DateTime<Utc>,
    ) -> QueryResult<RoundTableJoinRequest> {
        diesel::update(round_table_join_requests::table.find(id))
            .set((
                round_table_join_requests::status.eq(status),
                round_table_join_requests::decided_at.eq(Some(decided_at)),
            ))
            .returning(RoundTableJoinRequest::as_returning())
            .get_result(conn)
            .await
    }
}

// ---------------------------------------------------------------------------
// Store impl
// ---------------------------------------------------------------------------

#[async_trait]
impl Store for Database {
    async fn begin(&self) -> Result<Box<dyn Tx>, StorageError> {
        let mut conn = self.get_connection().await?;
        <AnsiTransactionManager as TransactionManager<AsyncPgConnection>>::begin_transaction(
            &mut *conn,
        )
        .await?;
        Ok(Box::new(PgTx { conn }))
    }

    async fn ping(&self) -> Result<(), StorageError> {
        let mut conn = self.get_connection().await?;
        queries::ping(&mut conn).await?;
        Ok(())
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, StorageError> {
        let mut conn = self.get_connection().await?;
        Ok(queries::get_user(&mut conn, id).await?)
    }

    async fn is_blocked(&self, a: i64, b: i64) -> Result<bool, StorageError> {
        let mut conn = self.get_connection().await?;
        Ok(queries::is_blocked(&mut conn, a, b).await?)
    }

    async fn find_connection(&self, a: i64, b: i64) -> Result<Option<Connection>, StorageError> {
        let mut conn = self.get_connection().await?;
        Ok(queries::find_connection(&mut conn, a, b).await?)
    }

    async fn relationship_type(
        &self,
        user_id: i64,
        other_user_id: i64,
    ) -> Result<Option<ConnectionType>, StorageError> {
        let mut conn = self.get_connection().await?;
        Ok(queries::relationship_type(&mut conn, user_id, other_user_id).await?)
    }

    async fn neighbors_of(
        &self,
        query: &NeighborQuery,
    ) -> Result<(Vec<UserConnection>, bool), StorageError> {
        let mut conn = self.get_connection().await?;
        Ok(queries::neighbors_of(&mut conn, query).await?)
    }

    async fn all_neighbors(&self, user_id: i64) -> Result<Vec<UserConnection>, StorageError> {
        let mut conn = self.get_connection().await?;
        Ok(queries::all_neighbors(&mut conn, user_id).await?)
    }

    async fn list_requests(
        &self,
        user_id: i64,
        direction: RequestDirection,
        status: Option<RequestStatus>,
    ) -> Result<Vec<ConnectionRequest>, StorageError> {
        let mut conn = self.get_connection().await?;
        Ok(queries::list_requests(&mut conn, user_id, direction, status).await?)
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>, StorageError> {
        let mut conn = self.get_connection().await?;
        Ok(queries::get_post(&mut conn, id).await?)
    }

    async fn feed_candidates(&self, query: &FeedQuery) -> Result<Vec<Post>, StorageError> {
        let mut conn = self.get_connection().await?;
        Ok(queries::feed_candidates(&mut conn, query).await?)
    }

    async fn get_group(&self, id: i64) -> Result<Option<Group>, StorageError> {
        let mut conn = self.get_connection().await?;
        Ok(queries::get_group(&mut conn, id).await?)
    }

    async fn get_group_member(
        &self,
        group_id: i64,
        user_id: i64,
    ) -> Result<Option<GroupMember>, StorageError> {
        let mut conn = self.get_connection().await?;
        Ok(queries::get_group_member(&mut conn, group_id, user_id).await?)
    }

    async fn list_group_members(&self, group_id: i64) -> Result<Vec<GroupMember>, StorageError> {
        let mut conn = self.get_connection().await?;
        Ok(queries::list_group_members(&mut conn, group_id).await?)
    }

    async fn list_group_join_requests(
        &self,
        group_id: i64,
        status: JoinStatus,
    ) -> Result<Vec<GroupJoinRequest>, StorageError> {
        let mut conn = self.get_connection().await?;
        Ok(queries::list_group_join_requests(&mut conn, group_id, status).await?)
    }

    async fn group_ids_for(&self, user_id: i64) -> Result<Vec<i64>, StorageError> {
        let mut conn = self.get_connection().await?;
        Ok(queries::group_ids_for(&mut conn, user_id).await?)
    }

    async fn get_subnet(&self, id: i64) -> Result<Option<SubNet>, StorageError> {
        let mut conn = self.get_connection().await?;
        Ok(queries::get_subnet(&mut conn, id).await?)
    }

    async fn get_subnet_member(
        &self,
        subnet_id: i64,
        user_id: i64,
    ) -> Result<Option<SubNetMember>, StorageError> {
        let mut conn = self.get_connection().await?;
        Ok(queries::get_subnet_member(&mut conn, subnet_id, user_id).await?)
    }

    async fn list_subnet_members(&self, subnet_id: i64) -> Result<Vec<SubNetMember>, StorageError> {
        let mut conn = self.get_connection().await?;
        Ok(queries::list_subnet_members(&mut conn, subnet_id).await?)
    }

    async fn subnet_ids_for(&self, user_id: i64) -> Result<Vec<i64>, StorageError> {
        let mut conn = self.get_connection().await?;
        Ok(queries::subnet_ids_for(&mut conn, user_id).await?)
    }

    async fn get_round_table(&self, id: i64) -> Result<Option<RoundTable>, StorageError> {
        let mut conn = self.get_connection().await?;
        Ok(queries::get_round_table(&mut conn, id).await?)
    }

    async fn get_round_table_member(
        &self,
        round_table_id: i64,
        user_id: i64,
    ) -> Result<Option<RoundTableMember>, StorageError> {
        let mut conn = self.get_connection().await?;
        Ok(queries::get_round_table_member(&mut conn, round_table_id, user_id).await?)
    }

    async fn list_round_table_join_requests(
        &self,
        round_table_id: i64,
        status: JoinStatus,
    ) -> Result<Vec<RoundTableJoinRequest>, StorageError> {
        let mut conn = self.get_connection().await?;
        Ok(queries::list_round_table_join_requests(&mut conn, round_table_id, status).await?)
    }
}

// ---------------------------------------------------------------------------
// PgTx
// ---------------------------------------------------------------------------

/// Open transaction on one pooled connection.
///
/// Dropped without commit, the connection goes back to the pool with its
/// transaction manager still in-transaction; the pool treats that connection
/// as broken and discards it, which aborts the transaction server-side.
pub struct PgTx {
    conn: DbConnection,
}

impl PgTx {
    fn conn(&mut self) -> &mut AsyncPgConnection {
        &mut self.conn
    }
}

#[async_trait]
impl Tx for PgTx {
    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let mut tx = self;
        <AnsiTransactionManager as TransactionManager<AsyncPgConnection>>::commit_transaction(
            tx.conn(),
        )
        .await
        .map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            StorageError::from(e)
        })
    }

    async fn get_user(&mut self, id: i64) -> Result<Option<User>, StorageError> {
        Ok(queries::get_user(self.conn(), id).await?)
    }

    async fn is_blocked(&mut self, a: i64, b: i64) -> Result<bool, StorageError> {
        Ok(queries::is_blocked(self.conn(), a, b).await?)
    }

    async fn find_connection(
        &mut self,
        a: i64,
        b: i64,
    ) -> Result<Option<Connection>, StorageError> {
        Ok(queries::find_connection(self.conn(), a, b).await?)
    }

    async fn lock_connection(
        &mut self,
        a: i64,
        b: i64,
    ) -> Result<Option<Connection>, StorageError> {
        Ok(queries::lock_connection(self.conn(), a, b).await?)
    }

    async fn lock_request(&mut self, id: i64) -> Result<Option<ConnectionRequest>, StorageError> {
        Ok(queries::lock_request(self.conn(), id).await?)
    }

    async fn upsert_request(
        &mut self,
        request: &NewConnectionRequest,
    ) -> Result<ConnectionRequest, StorageError> {
        Ok(queries::upsert_request(self.conn(), request).await?)
    }

    async fn set_request_status(
        &mut self,
        id: i64,
        status: RequestStatus,
        decided_at: DateTime<Utc>,
    ) -> Result<ConnectionRequest, StorageError> {
        Ok(queries::set_request_status(self.conn(), id, status, decided_at).await?)
    }

    async fn save_connection(
        &mut self,
        connection: &NewConnection,
    ) -> Result<Connection, StorageError> {
        Ok(queries::save_connection(self.conn(), connection).await?)
    }

    async fn delete_connection(&mut self, id: i64) -> Result<(), StorageError> {
        match queries::delete_connection(self.conn(), id).await? {
            0 => Err(StorageError::NotFound),
            _ => Ok(()),
        }
    }

    async fn delete_adjacency(&mut self, connection_id: i64) -> Result<usize, StorageError> {
        Ok(queries::delete_adjacency(self.conn(), connection_id).await?)
    }

    async fn insert_adjacency(&mut self, rows: &[NewUserConnection]) -> Result<usize, StorageError> {
        Ok(queries::insert_adjacency(self.conn(), rows).await?)
    }

    async fn insert_post(&mut self, post: &NewPost) -> Result<Post, StorageError> {
        Ok(queries::insert_post(self.conn(), post).await?)
    }

    async fn insert_group(&mut self, group: &NewGroup) -> Result<Group, StorageError> {
        Ok(queries::insert_group(self.conn(), group).await?)
    }

    async fn get_group_member(
        &mut self,
        group_id: i64,
        user_id: i64,
    ) -> Result<Option<GroupMember>, StorageError> {
        Ok(queries::get_group_member(self.conn(), group_id, user_id).await?)
    }

    async fn insert_group_member(&mut self, member: &GroupMember) -> Result<bool, StorageError> {
        Ok(queries::insert_group_member(self.conn(), member).await?)
    }

    async fn ban_group_member(
        &mut self,
        group_id: i64,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<GroupMember, StorageError> {
        Ok(queries::ban_group_member(self.conn(), group_id, user_id, at).await?)
    }

    async fn lock_group_join_request(
        &mut self,
        id: i64,
    ) -> Result<Option<GroupJoinRequest>, StorageError> {
        Ok(queries::lock_group_join_request(self.conn(), id).await?)
    }

    async fn find_group_join_request(
        &mut self,
        group_id: i64,
        user_id: i64,
    ) -> Result<Option<GroupJoinRequest>, StorageError> {
        Ok(queries::find_group_join_request(self.conn(), group_id, user_id).await?)
    }

    async fn upsert_group_join_request(
        &mut self,
        group_id: i64,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<GroupJoinRequest, StorageError> {
        Ok(queries::upsert_group_join_request(self.conn(), group_id, user_id, at).await?)
    }

    async fn set_group_join_request_status(
        &mut self,
        id: i64,
        status: JoinStatus,
        decided_at: DateTime<Utc>,
    ) -> Result<GroupJoinRequest, StorageError> {
        Ok(queries::set_group_join_request_status(self.conn(), id, status, decided_at).await?)
    }

    async fn insert_subnet(&mut self, subnet: &NewSubNet) -> Result<SubNet, StorageError> {
        Ok(queries::insert_subnet(self.conn(), subnet).await?)
    }

    async fn lock_subnet(&mut self, id: i64) -> Result<Option<SubNet>, StorageError> {
        Ok(queries::lock_subnet(self.conn(), id).await?)
    }

    async fn get_subnet_member(
        &mut self,
        subnet_id: i64,
        user_id: i64,
    ) -> Result<Option<SubNetMember>, StorageError> {
        Ok(queries::get_subnet_member(self.conn(), subnet_id, user_id).await?)
    }

    async fn insert_subnet_members(
        &mut self,
        rows: &[NewSubNetMember],
    ) -> Result<Vec<i64>, StorageError> {
        Ok(queries::insert_subnet_members(self.conn(), rows).await?)
    }

    async fn delete_subnet_member(
        &mut self,
        subnet_id: i64,
        user_id: i64,
    ) -> Result<bool, StorageError> {
        Ok(queries::delete_subnet_member(self.conn(), subnet_id, user_id).await?)
    }

    async fn set_subnet_member_role(
        &mut self,
        subnet_id: i64,
        user_id: i64,
        role: SubNetRole,
    ) -> Result<Option<SubNetMember>, StorageError> {
        Ok(queries::set_subnet_member_role(self.conn(), subnet_id, user_id, role).await?)
    }

    async fn recount_subnet_members(&mut self, subnet_id: i64) -> Result<SubNet, StorageError> {
        Ok(queries::recount_subnet_members(self.conn(), subnet_id).await?)
    }

    async fn insert_round_table(
        &mut self,
        table: &NewRoundTable,
    ) -> Result<RoundTable, StorageError> {
        Ok(queries::insert_round_table(self.conn(), table).await?)
    }

    async fn get_round_table_member(
        &mut self,
        round_table_id: i64,
        user_id: i64,
    ) -> Result<Option<RoundTableMember>, StorageError> {
        Ok(queries::get_round_table_member(self.conn(), round_table_id, user_id).await?)
    }

    async fn insert_round_table_member(
        &mut self,
        member: &RoundTableMember,
    ) -> Result<bool, StorageError> {
        Ok(queries::insert_round_table_member(self.conn(), member).await?)
    }

    async fn lock_round_table_join_request(
        &mut self,
        id: i64,
    ) -> Result<Option<RoundTableJoinRequest>, StorageError> {
        Ok(queries::lock_round_table_join_request(self.conn(), id).await?)
    }

    async fn find_round_table_join_request(
        &mut self,
        round_table_id: i64,
        user_id: i64,
    ) -> Result<Option<RoundTableJoinRequest>, StorageError> {
        Ok(queries::find_round_table_join_request(self.conn(), round_table_id, user_id).await?)
    }

    async fn upsert_round_table_join_request(
        &mut self,
        round_table_id: i64,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<RoundTableJoinRequest, StorageError> {
        Ok(queries::upsert_round_table_join_request(self.conn(), round_table_id, user_id, at).await?)
    }

    async fn set_round_table_join_request_status(
        &mut self,
        id: i64,
        status: JoinStatus,
        decided_at: DateTime<Utc>,
    ) -> Result<RoundTableJoinRequest, StorageError> {
        Ok(
            queries::set_round_table_join_request_status(self.conn(), id, status, decided_at)
                .await?,
        )
    }
}
