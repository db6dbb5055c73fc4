//! Access levels of a user on a realm.

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Access a user holds on a realm.
///
/// Levels are totally ordered: `None < Read < Write < Owner < Admin`. A level
/// grants every level below it, so an owner can write and a writer can read.
/// `Admin` is never stored; it is implied for admin users on every realm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessLevel {
    #[default]
    None,
    Read,
    #[serde(alias = "realmReadWrite")]
    Write,
    #[serde(alias = "realmOwner")]
    Owner,
    Admin,
}

impl AccessLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Read => "read",
            Self::Write => "write",
            Self::Owner => "owner",
            Self::Admin => "admin",
        }
    }

    /// Returns `true` if this level grants `requested`.
    #[must_use]
    pub fn has_access(self, requested: AccessLevel) -> bool {
        self >= requested
    }
}

impl TryFrom<&str> for AccessLevel {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "none" => Ok(Self::None),
            "read" => Ok(Self::Read),
            "write" | "realmReadWrite" => Ok(Self::Write),
            "owner" | "realmOwner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            other => Err(EngineError::Validation(format!(
                "invalid access level: {other}"
            ))),
        }
    }
}
