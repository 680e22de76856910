// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use diesel::allow_tables_to_appear_in_same_query;
use diesel::joinable;
use diesel::table;

table! {
    users (id) {
        id -> Int8,
        username -> Varchar,
        is_banned -> Bool,
        is_hidden -> Bool,
        is_private -> Bool,
        created_at -> Timestamptz,
    }
}

table! {
    blocks (blocker_id, blocked_id) {
        blocker_id -> Int8,
        blocked_id -> Int8,
        created_at -> Timestamptz,
    }
}

table! {
    connections (id) {
        id -> Int8,
        requester_id -> Int8,
        requested_id -> Int8,
        user_low -> Int8,
        user_high -> Int8,
        kind -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    user_connections (id) {
        id -> Int8,
        connection_id -> Int8,
        user_id -> Int8,
        other_user_id -> Int8,
        kind -> Varchar,
        created_at -> Timestamptz,
    }
}

table! {
    connection_requests (id) {
        id -> Int8,
        requester_id -> Int8,
        requested_id -> Int8,
        request_type -> Varchar,
        status -> Varchar,
        created_at -> Timestamptz,
        decided_at -> Nullable<Timestamptz>,
    }
}

table! {
    groups (id) {
        id -> Int8,
        owner_id -> Int8,
        name -> Varchar,
        kind -> Varchar,
        is_hidden -> Bool,
        created_at -> Timestamptz,
    }
}

table! {
    group_members (group_id, user_id) {
        group_id -> Int8,
        user_id -> Int8,
        role -> Varchar,
        is_banned -> Bool,
        joined_at -> Timestamptz,
    }
}

table! {
    group_join_requests (id) {
        id -> Int8,
        group_id -> Int8,
        user_id -> Int8,
        status -> Varchar,
        created_at -> Timestamptz,
        decided_at -> Nullable<Timestamptz>,
    }
}

table! {
    subnets (id) {
        id -> Int8,
        owner_id -> Int8,
        name -> Varchar,
        member_count -> Int4,
        created_at -> Timestamptz,
    }
}

table! {
    subnet_members (subnet_id, user_id) {
        subnet_id -> Int8,
        user_id -> Int8,
        role -> Varchar,
        added_at -> Timestamptz,
    }
}

table! {
    round_tables (id) {
        id -> Int8,
        owner_id -> Int8,
        name -> Varchar,
        created_at -> Timestamptz,
    }
}

table! {
    round_table_members (round_table_id, user_id) {
        round_table_id -> Int8,
        user_id -> Int8,
        is_moderator -> Bool,
        joined_at -> Timestamptz,
    }
}

table! {
    round_table_join_requests (id) {
        id -> Int8,
        round_table_id -> Int8,
        user_id -> Int8,
        status -> Varchar,
        created_at -> Timestamptz,
        decided_at -> Nullable<Timestamptz>,
    }
}

table! {
    posts (id) {
        id -> Int8,
        author_id -> Int8,
        content -> Text,
        visibility -> Varchar,
        subnet_id -> Nullable<Int8>,
        group_id -> Nullable<Int8>,
        media_key -> Nullable<Varchar>,
        created_at -> Timestamptz,
    }
}

joinable!(user_connections -> connections (connection_id));
joinable!(group_members -> groups (group_id));
joinable!(subnet_members -> subnets (subnet_id));
joinable!(round_table_members -> round_tables (round_table_id));

allow_tables_to_appear_in_same_query!(
    users,
    blocks,
    connections,
    user_connections,
    connection_requests,
    groups,
    group_members,
    group_join_requests,
    subnets,
    subnet_members,
    round_tables,
    round_table_members,
    round_table_join_requests,
    posts,
);
