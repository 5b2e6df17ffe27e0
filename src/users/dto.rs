use std::fmt;

use serde::{
    de::{value::MapAccessDeserializer, MapAccess, Visitor},
    Deserialize, Deserializer, Serialize,
};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{repo_types::{Role, User}, services::format_dob};

/// Body of `POST /user` and `PUT /user/:id`. Every field is optional so
/// that missing values surface as validation errors (create) or keep the
/// stored value (update).
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UserPayload {
    pub name: Option<String>,
    pub role: Option<String>,
    pub email: Option<String>,
    pub age: Option<i64>,
    pub password: Option<String>,
    pub dob: Option<String>,
}

/// Request body wrapper that only accepts a JSON object. The derived
/// [`UserPayload`] deserializer would also take a positional array.
#[derive(Debug)]
pub struct UserForm(pub UserPayload);

impl<'de> Deserialize<'de> for UserForm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ObjectVisitor;

        impl<'de> Visitor<'de> for ObjectVisitor {
            type Value = UserForm;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a user object")
            }

            fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<UserForm, A::Error> {
                UserPayload::deserialize(MapAccessDeserializer::new(map)).map(UserForm)
            }
        }

        deserializer.deserialize_map(ObjectVisitor)
    }
}

/// Public view of a user; never carries the password hash or image bytes.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    pub email: String,
    pub age: i32,
    pub dob: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub date_created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
    pub active_status: bool,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            role: u.role,
            email: u.email,
            age: u.age,
            dob: u.dob.and_then(format_dob),
            date_created: u.date_created,
            last_updated: u.last_updated,
            active_status: u.active_status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SavedUserResponse {
    pub message: &'static str,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct StatusChangeResponse {
    pub message: &'static str,
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
