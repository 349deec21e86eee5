//! Faculty model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A unique identifier for a faculty member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FacultyId(Uuid);

impl FacultyId {
    /// Create a new unique faculty ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for FacultyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FacultyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FacultyId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A faculty member who owns sections and submits attendance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Faculty {
    /// Unique identifier
    pub id: FacultyId,
    /// Display name
    pub full_name: String,
    /// Contact email (stored in lowercase)
    pub email: String,
    /// Inactive faculty are rejected during sync validation
    pub active: bool,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl Faculty {
    /// Create a new active faculty member
    ///
    /// The email is automatically converted to lowercase.
    #[must_use]
    pub fn new(full_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: FacultyId::new(),
            full_name: full_name.into(),
            email: email.into().to_lowercase(),
            active: true,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}
