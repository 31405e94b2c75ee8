use serde::{Deserialize, Deserializer, Serialize};

use crate::users::dto::UserFields;

/// A user as the remote API represents it.
///
/// Only the fields mirrored locally are kept; anything else the API sends
/// (`address`, `company`, ...) is dropped on decode. Missing or null content
/// fields decode as empty strings so local validation can report them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUserPayload {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub username: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub phone: String,
    #[serde(default)]
    pub website: Option<String>,
}

impl RemoteUserPayload {
    /// Content fields only; the remote id is left behind.
    pub fn into_fields(self) -> UserFields {
        UserFields {
            name: self.name,
            username: self.username,
            email: self.email,
            phone: self.phone,
            website: self.website,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
