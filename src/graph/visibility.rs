// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! Audience resolution for content reads.
//!
//! [`decide`] is the single rule table. [`can_view`] gathers the facts it
//! needs for one post with point queries; [`Audience`] preloads them for a
//! viewer so a feed page can be filtered without a query per item.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::metrics;
use crate::models::{ConnectionType, Post, Visibility};
use crate::storage::Store;

/// What the resolver knows about the viewer's standing towards one post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudienceFacts {
    /// A block exists between viewer and author in either direction.
    pub blocked: bool,
    /// Type of the viewer → author adjacency row.
    pub relationship: Option<ConnectionType>,
    /// Viewer owns or belongs to the post's subnet.
    pub in_subnet: bool,
    /// Viewer holds a non-banned membership of the post's group.
    pub in_group: bool,
}

/// The audience rule table.
pub fn decide(viewer_id: i64, post: &Post, facts: &AudienceFacts) -> bool {
    if viewer_id == post.author_id {
        return true;
    }
    if facts.blocked {
        return false;
    }

    match post.visibility {
        Visibility::Public => true,
        Visibility::Connections => facts.relationship.is_some(),
        Visibility::Acquaintances => facts.relationship == Some(ConnectionType::Acquaintance),
        Visibility::Subnet => post.subnet_id.is_some() && facts.in_subnet,
        Visibility::Group => post.group_id.is_some() && facts.in_group,
    }
}

/// Whether `viewer_id` may read `post`.
pub async fn can_view(store: &dyn Store, viewer_id: i64, post: &Post) -> Result<bool> {
    let facts = if viewer_id == post.author_id {
        AudienceFacts::default()
    } else {
        load_facts(store, viewer_id, post).await?
    };

    let allowed = decide(viewer_id, post, &facts);
    metrics::record_visibility(allowed);
    if !allowed {
        debug!(viewer_id, post_id = post.id, visibility = %post.visibility, "Post hidden from viewer");
    }
    Ok(allowed)
}

async fn load_facts(store: &dyn Store, viewer_id: i64, post: &Post) -> Result<AudienceFacts> {
    let mut facts = AudienceFacts {
        blocked: store.is_blocked(viewer_id, post.author_id).await?,
        ..AudienceFacts::default()
    };
    if facts.blocked {
        return Ok(facts);
    }

    match post.visibility {
        Visibility::Public => {}
        Visibility::Connections | Visibility::Acquaintances => {
            facts.relationship = store.relationship_type(viewer_id, post.author_id).await?;
        }
        Visibility::Subnet => {
            if let Some(subnet_id) = post.subnet_id {
                facts.in_subnet = match store.get_subnet(subnet_id).await? {
                    Some(subnet) if subnet.owner_id == viewer_id => true,
                    Some(_) => store.get_subnet_member(subnet_id, viewer_id).await?.is_some(),
                    None => false,
                };
            }
        }
        Visibility::Group => {
            if let Some(group_id) = post.group_id {
                facts.in_group = store
                    .get_group_member(group_id, viewer_id)
                    .await?
                    .map_or(false, |member| member.is_active());
            }
        }
    }
    Ok(facts)
}

/// Display label of the viewer's tie to an author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Relation {
    #[serde(rename = "SELF")]
    Author,
    #[serde(rename = "ACQUAINTANCE")]
    Acquaintance,
    #[serde(rename = "STRANGER")]
    Stranger,
    #[serde(rename = "FOLLOWING")]
    Following,
    #[serde(rename = "NONE")]
    None,
}

impl Relation {
    pub fn from_relationship(relationship: Option<ConnectionType>) -> Self {
        match relationship {
            Some(ConnectionType::Acquaintance) => Relation::Acquaintance,
            Some(ConnectionType::Stranger) => Relation::Stranger,
            Some(ConnectionType::IsFollowing) => Relation::Following,
            None => Relation::None,
        }
    }
}

/// Label for a single post read; independent of the access decision.
pub async fn relation_label(store: &dyn Store, viewer_id: i64, author_id: i64) -> Result<Relation> {
    if viewer_id == author_id {
        return Ok(Relation::Author);
    }
    let relationship = store.relationship_type(viewer_id, author_id).await?;
    Ok(Relation::from_relationship(relationship))
}

/// A viewer's adjacency and memberships, loaded once per feed page.
#[derive(Debug, Clone)]
pub struct Audience {
    pub viewer_id: i64,
    relationships: HashMap<i64, ConnectionType>,
    subnet_ids: HashSet<i64>,
    group_ids: HashSet<i64>,
    blocked: HashMap<i64, bool>,
}

impl Audience {
    pub async fn load(store: &dyn Store, viewer_id: i64) -> Result<Self> {
        let (neighbors, subnet_ids, group_ids) = futures::try_join!(
            store.all_neighbors(viewer_id),
            store.subnet_ids_for(viewer_id),
            store.group_ids_for(viewer_id),
        )?;

        let mut relationships: HashMap<i64, ConnectionType> = HashMap::new();
        for row in neighbors {
            relationships
                .entry(row.other_user_id)
                .and_modify(|kind| {
                    if row.kind.precedence() > kind.precedence() {
                        *kind = row.kind;
                    }
                })
                .or_insert(row.kind);
        }

        Ok(Self {
            viewer_id,
            relationships,
            subnet_ids: subnet_ids.into_iter().collect(),
            group_ids: group_ids.into_iter().collect(),
            blocked: HashMap::new(),
        })
    }

    /// Users the viewer holds an adjacency row towards.
    pub fn followed_authors(&self) -> impl Iterator<Item = i64> + '_ {
        self.relationships.keys().copied()
    }

    pub fn subnet_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.subnet_ids.iter().copied()
    }

    pub fn group_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.group_ids.iter().copied()
    }

    pub fn relation(&self, author_id: i64) -> Relation {
        if author_id == self.viewer_id {
            return Relation::Author;
        }
        Relation::from_relationship(self.relationships.get(&author_id).copied())
    }

    /// Same decision as [`can_view`], answered from the preloaded sets.
    /// Block lookups are cached per author.
    pub async fn can_view(&mut self, store: &dyn Store, post: &Post) -> Result<bool> {
        let blocked = if post.author_id == self.viewer_id {
            false
        } else if let Some(blocked) = self.blocked.get(&post.author_id) {
            *blocked
        } else {
            let blocked = store.is_blocked(self.viewer_id, post.author_id).await?;
            self.blocked.insert(post.author_id, blocked);
            blocked
        };

        let facts = AudienceFacts {
            blocked,
            relationship: self.relationships.get(&post.author_id).copied(),
            in_subnet: post
                .subnet_id
                .map_or(false, |id| self.subnet_ids.contains(&id)),
            in_group: post
                .group_id
                .map_or(false, |id| self.group_ids.contains(&id)),
        };

        let allowed = decide(self.viewer_id, post, &facts);
        metrics::record_visibility(allowed);
        Ok(allowed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tracing_test::traced_test;

    use super::*;
    use crate::graph::lifecycle;
    use crate::models::{self, GroupMember, GroupRole, NewGroup, NewPost, NewSubNet, RequestType};
    use crate::models::{GroupKind, NewSubNetMember, SubNetRole};
    use crate::notify::{LogNotifier, Notifier};
    use crate::storage::{MemoryStore, Tx};

    fn post(author_id: i64, visibility: Visibility) -> Post {
        Post {
            id: 1,
            author_id,
            content: "hello".into(),
            visibility,
            subnet_id: None,
            group_id: None,
            media_key: None,
            created_at: models::now(),
        }
    }

    async fn connect(store: &MemoryStore, from: i64, to: i64, kind: RequestType) {
        let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
        let request = lifecycle::submit(store, &notifier, from, to, kind).await.unwrap();
        lifecycle::accept(store, &notifier, request.id, to).await.unwrap();
    }

    #[test]
    fn rule_table() {
        let author = 1;
        let viewer = 2;
        let none = AudienceFacts::default();
        let stranger = AudienceFacts {
            relationship: Some(ConnectionType::Stranger),
            ..none
        };
        let acquaintance = AudienceFacts {
            relationship: Some(ConnectionType::Acquaintance),
            ..none
        };

        assert!(decide(viewer, &post(author, Visibility::Public), &none));
        assert!(decide(author, &post(author, Visibility::Acquaintances), &none));

        assert!(!decide(viewer, &post(author, Visibility::Connections), &none));
        assert!(decide(viewer, &post(author, Visibility::Connections), &stranger));

        assert!(!decide(viewer, &post(author, Visibility::Acquaintances), &none));
        assert!(!decide(viewer, &post(author, Visibility::Acquaintances), &stranger));
        assert!(decide(viewer, &post(author, Visibility::Acquaintances), &acquaintance));

        let blocked = AudienceFacts {
            blocked: true,
            ..acquaintance
        };
        assert!(!decide(viewer, &post(author, Visibility::Public), &blocked));

        // A SUBNET or GROUP post without its id is unreachable for others.
        let member = AudienceFacts {
            in_subnet: true,
            in_group: true,
            ..none
        };
        assert!(!decide(viewer, &post(author, Visibility::Subnet), &member));
        assert!(!decide(viewer, &post(author, Visibility::Group), &member));
    }

    #[tokio::test]
    async fn follow_grants_connections_view_to_the_follower_only() {
        let store = MemoryStore::new();
        let author = store.insert_user("author").await.id;
        let follower = store.insert_user("follower").await.id;
        connect(&store, follower, author, RequestType::Follow).await;

        let by_author = post(author, Visibility::Connections);
        assert!(can_view(&store, follower, &by_author).await.unwrap());

        let by_follower = post(follower, Visibility::Connections);
        assert!(!can_view(&store, author, &by_follower).await.unwrap());

        assert_eq!(
            relation_label(&store, follower, author).await.unwrap(),
            Relation::Following
        );
        assert_eq!(
            relation_label(&store, author, follower).await.unwrap(),
            Relation::None
        );
        assert_eq!(
            relation_label(&store, author, author).await.unwrap(),
            Relation::Author
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn blocks_hide_public_posts() {
        let store = MemoryStore::new();
        let author = store.insert_user("author").await.id;
        let viewer = store.insert_user("viewer").await.id;
        store.insert_block(author, viewer).await;

        let public = post(author, Visibility::Public);
        assert!(!can_view(&store, viewer, &public).await.unwrap());
        assert!(logs_contain("Post hidden from viewer"));

        store.remove_block(author, viewer).await;
        assert!(can_view(&store, viewer, &public).await.unwrap());
    }

    #[tokio::test]
    async fn subnet_and_group_membership_grant_access() {
        let store = MemoryStore::new();
        let owner = store.insert_user("owner").await.id;
        let reader = store.insert_user("reader").await.id;
        let outsider = store.insert_user("outsider").await.id;
        let banned = store.insert_user("banned").await.id;

        let mut tx = store.begin().await.unwrap();
        let subnet = tx
            .insert_subnet(&NewSubNet {
                owner_id: owner,
                name: "inner circle".into(),
                member_count: 0,
                created_at: models::now(),
            })
            .await
            .unwrap();
        tx.insert_subnet_members(&[NewSubNetMember {
            subnet_id: subnet.id,
            user_id: reader,
            role: SubNetRole::Reader,
            added_at: models::now(),
        }])
        .await
        .unwrap();
        let group = tx
            .insert_group(&NewGroup {
                owner_id: owner,
                name: "club".into(),
                kind: GroupKind::Standard,
                is_hidden: false,
                created_at: models::now(),
            })
            .await
            .unwrap();
        for (user_id, is_banned) in [(reader, false), (banned, true)] {
            tx.insert_group_member(&GroupMember {
                group_id: group.id,
                user_id,
                role: GroupRole::Member,
                is_banned,
                joined_at: models::now(),
            })
            .await
            .unwrap();
        }
        let subnet_post = tx
            .insert_post(&NewPost {
                author_id: owner,
                content: "subnet only".into(),
                visibility: Visibility::Subnet,
                subnet_id: Some(subnet.id),
                group_id: None,
                media_key: None,
                created_at: models::now(),
            })
            .await
            .unwrap();
        let group_post = tx
            .insert_post(&NewPost {
                author_id: owner,
                content: "group only".into(),
                visibility: Visibility::Group,
                subnet_id: None,
                group_id: Some(group.id),
                media_key: None,
                created_at: models::now(),
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert!(can_view(&store, reader, &subnet_post).await.unwrap());
        assert!(!can_view(&store, outsider, &subnet_post).await.unwrap());
        assert!(can_view(&store, reader, &group_post).await.unwrap());
        assert!(!can_view(&store, banned, &group_post).await.unwrap());
        assert!(!can_view(&store, outsider, &group_post).await.unwrap());

        // The preloaded audience answers the same way.
        for viewer in [reader, outsider, banned] {
            let mut audience = Audience::load(&store, viewer).await.unwrap();
            for item in [&subnet_post, &group_post] {
                assert_eq!(
                    audience.can_view(&store, item).await.unwrap(),
                    can_view(&store, viewer, item).await.unwrap()
                );
            }
        }
    }

    #[tokio::test]
    async fn acquaintances_posts_need_an_acquaintance() {
        let store = MemoryStore::new();
        let author = store.insert_user("author").await.id;
        let friend = store.insert_user("friend").await.id;
        let stranger = store.insert_user("stranger").await.id;
        connect(&store, friend, author, RequestType::Acquaintance).await;
        connect(&store, stranger, author, RequestType::Stranger).await;

        let item = post(author, Visibility::Acquaintances);
        assert!(can_view(&store, friend, &item).await.unwrap());
        assert!(!can_view(&store, stranger, &item).await.unwrap());

        let audience = Audience::load(&store, author).await.unwrap();
        assert_eq!(audience.relation(friend), Relation::Acquaintance);
        assert_eq!(audience.relation(stranger), Relation::Stranger);
        assert_eq!(audience.relation(author), Relation::Author);
    }
}
