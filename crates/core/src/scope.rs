//! Access scopes for authorization.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Token scopes for authorization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Upload chapter audio.
    Upload,
    /// Edit chapters (rename, reorder, delete).
    Editor,
    /// Full access (reprocess, encoding reports, raw object delete).
    Admin,
}

impl Scope {
    /// Parse from string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "upload" => Ok(Self::Upload),
            "editor" => Ok(Self::Editor),
            "admin" => Ok(Self::Admin),
            _ => Err(crate::Error::InvalidScope(s.to_string())),
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Editor => "editor",
            Self::Admin => "admin",
        }
    }

    /// Check if this scope implies another scope.
    pub fn implies(&self, other: &Self) -> bool {
        match self {
            Self::Admin => true,
            Self::Editor => matches!(other, Self::Editor | Self::Upload),
            Self::Upload => matches!(other, Self::Upload),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
