// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, SubsecRound, Utc};

/// Declares a closed enumeration that is stored as `TEXT` in Postgres and
/// travels as its SCREAMING_SNAKE_CASE name over the wire.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            serde::Serialize,
            serde::Deserialize,
            diesel::AsExpression,
            diesel::FromSqlRow,
        )]
        #[diesel(sql_type = diesel::sql_types::Text)]
        $vis enum $name {
            $($(#[$vmeta])* #[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::models::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err($crate::models::UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl diesel::serialize::ToSql<diesel::sql_types::Text, diesel::pg::Pg> for $name {
            fn to_sql<'b>(
                &'b self,
                out: &mut diesel::serialize::Output<'b, '_, diesel::pg::Pg>,
            ) -> diesel::serialize::Result {
                use std::io::Write;
                out.write_all(self.as_str().as_bytes())?;
                Ok(diesel::serialize::IsNull::No)
            }
        }

        impl diesel::deserialize::FromSql<diesel::sql_types::Text, diesel::pg::Pg> for $name {
            fn from_sql(bytes: diesel::pg::PgValue<'_>) -> diesel::deserialize::Result<Self> {
                let raw = <String as diesel::deserialize::FromSql<
                    diesel::sql_types::Text,
                    diesel::pg::Pg,
                >>::from_sql(bytes)?;
                Ok(raw.parse::<$name>()?)
            }
        }
    };
}

pub mod connection;
pub mod group;
pub mod post;
pub mod round_table;
pub mod subnet;
pub mod user;

pub use connection::{
    Connection, ConnectionRequest, ConnectionType, NewConnection, NewConnectionRequest,
    NewUserConnection, RequestStatus, RequestType, UserConnection,
};
pub use group::{Group, GroupJoinRequest, GroupKind, GroupMember, GroupRole, JoinStatus, NewGroup};
pub use post::{NewPost, Post, Visibility};
pub use round_table::{NewRoundTable, RoundTable, RoundTableJoinRequest, RoundTableMember};
pub use subnet::{NewSubNet, NewSubNetMember, SubNet, SubNetMember, SubNetRole};
pub use user::User;

/// A stored or submitted value that does not name any variant of the
/// enumeration it was parsed into.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Current time truncated to the microsecond precision Postgres keeps, so
/// timestamps compare identically no matter which store produced them.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
