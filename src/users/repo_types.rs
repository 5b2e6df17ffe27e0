use std::{fmt, str::FromStr};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Normal,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Normal => "Normal",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role {0:?}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(Role::Admin),
            "Normal" => Ok(Role::Normal),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// User record as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    /// Trimmed and lowercased.
    pub email: String,
    pub age: i32,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub dob: Option<Date>,
    pub date_created: OffsetDateTime,
    pub last_updated: OffsetDateTime,
    pub active_status: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserImage {
    pub content_type: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserFilter {
    All,
    ActiveOnly,
}

/// Row shape of the `users` table, minus the image columns.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    pub email: String,
    pub age: i32,
    pub password_hash: String,
    pub dob: Option<Date>,
    pub date_created: OffsetDateTime,
    pub last_updated: OffsetDateTime,
    pub active_status: bool,
}

impl TryFrom<UserRow> for User {
    type Error = UnknownRole;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            name: r.name,
            role: r.role.parse()?,
            email: r.email,
            age: r.age,
            password_hash: r.password_hash,
            dob: r.dob,
            date_created: r.date_created,
            last_updated: r.last_updated,
            active_status: r.active_status,
        })
    }
}
