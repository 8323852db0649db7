pub mod store;

pub use store::{SessionStore, SESSION_KEY};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role level attached to a user profile.
///
/// Unrecognized role strings fall back to `User`, the non-elevated level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RoleLevel {
    #[default]
    User,
    Admin,
    SuperAdmin,
}

impl RoleLevel {
    /// Elevated roles are never restricted by the menu tree.
    pub fn is_elevated(self) -> bool {
        matches!(self, RoleLevel::Admin | RoleLevel::SuperAdmin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RoleLevel::User => "User",
            RoleLevel::Admin => "Admin",
            RoleLevel::SuperAdmin => "Super Admin",
        }
    }

    pub fn parse(value: &str) -> Self {
        let normalized: String = value
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "admin" => RoleLevel::Admin,
            "superadmin" => RoleLevel::SuperAdmin,
            _ => RoleLevel::User,
        }
    }
}

impl From<String> for RoleLevel {
    fn from(value: String) -> Self {
        RoleLevel::parse(&value)
    }
}

impl From<RoleLevel> for String {
    fn from(role: RoleLevel) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for RoleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(alias = "display_name", alias = "full_name")]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "role_level", alias = "roleLevel")]
    pub role: RoleLevel,
}

// Backends send ids as strings or as integer keys; both are opaque here
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Unsigned(u64),
        Signed(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(id) => id,
        RawId::Unsigned(id) => id.to_string(),
        RawId::Signed(id) => id.to_string(),
    })
}

/// Token pair plus cached profile for the current user agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub profile: Option<UserProfile>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// Role used for gating; an absent profile counts as non-elevated.
    pub fn role(&self) -> RoleLevel {
        self.profile.as_ref().map(|p| p.role).unwrap_or_default()
    }

    /// Identity the menu cache is keyed on.
    pub fn user_id(&self) -> Option<&str> {
        self.profile.as_ref().map(|p| p.id.as_str())
    }
}
