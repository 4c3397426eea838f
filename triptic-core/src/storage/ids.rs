//! Type-safe ID newtypes for storage entities
//!
//! Jobs are keyed by random UUIDs. Asset groups and playlists are keyed by
//! operator-chosen names, so they share the same newtype shape without `new()`.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{Result, TripticError};

/// Shared body for string-backed identifiers
macro_rules! string_newtype {
    ($name:ident) => {
        impl $name {
            /// Create from an existing string (for loading from DB)
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Get the inner string value
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner string
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        #[cfg(feature = "rusqlite")]
        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                value.as_str().map(|s| Self(s.to_string()))
            }
        }

        #[cfg(feature = "rusqlite")]
        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::Borrowed(
                    rusqlite::types::ValueRef::Text(self.0.as_bytes()),
                ))
            }
        }
    };
}

/// Define a randomly generated UUID identifier
macro_rules! define_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        string_newtype!($name);
    };
}

/// Define a name-based identifier chosen by the operator
macro_rules! define_name {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        string_newtype!($name);
    };
}

define_id!(JobId, "Unique identifier for a generation job");

define_name!(
    AssetGroupId,
    "Identifier of an asset group, a path-like name such as `animals/cat`"
);
define_name!(PlaylistId, "Name of a playlist");

impl AssetGroupId {
    /// Parse and validate an operator-supplied asset group name.
    ///
    /// Names are trimmed, must be non-empty, and may contain at most one `/`
    /// separating two non-empty segments.
    pub fn parse(raw: &str) -> Result<Self> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(TripticError::InvalidInput(
                "asset group name must not be empty".to_string(),
            ));
        }
        let segments: Vec<&str> = name.split('/').collect();
        if segments.len() > 2 {
            return Err(TripticError::InvalidInput(format!(
                "invalid asset group name '{}': at most one '/' is allowed",
                name
            )));
        }
        if segments.iter().any(|s| s.trim().is_empty()) {
            return Err(TripticError::InvalidInput(format!(
                "invalid asset group name '{}': empty path segment",
                name
            )));
        }
        Ok(Self(name.to_string()))
    }

    /// The theme part of a `theme/subject` name, if any
    pub fn theme(&self) -> Option<&str> {
        self.0.split_once('/').map(|(theme, _)| theme)
    }
}

impl PlaylistId {
    /// Parse and validate a playlist name (trimmed, non-empty)
    pub fn parse(raw: &str) -> Result<Self> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(TripticError::InvalidInput(
                "playlist name must not be empty".to_string(),
            ));
        }
        Ok(Self(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_creation() {
        let id1 = JobId::new();
        let id2 = JobId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_id_display() {
        let id = AssetGroupId::from_string("animals/cat");
        assert_eq!(format!("{}", id), "animals/cat");
    }

    #[test]
    fn test_id_serde() {
        let id = PlaylistId::from_string("letters");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"letters\"");

        let parsed: PlaylistId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_asset_group_parse() {
        assert_eq!(AssetGroupId::parse("  cyberdoc3 ").unwrap().as_str(), "cyberdoc3");
        let nested = AssetGroupId::parse("art/jazz").unwrap();
        assert_eq!(nested.theme(), Some("art"));
        assert_eq!(AssetGroupId::parse("solo").unwrap().theme(), None);

        assert!(AssetGroupId::parse("").is_err());
        assert!(AssetGroupId::parse("a/b/c").is_err());
        assert!(AssetGroupId::parse("/jazz").is_err());
        assert!(AssetGroupId::parse("art/").is_err());
    }

    #[test]
    fn test_playlist_parse() {
        assert!(PlaylistId::parse("   ").is_err());
        assert_eq!(PlaylistId::parse(" animals ").unwrap().as_str(), "animals");
    }
}
