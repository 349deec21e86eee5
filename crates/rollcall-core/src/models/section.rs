//! Section model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::FacultyId;

/// A unique identifier for a section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectionId(Uuid);

impl SectionId {
    /// Create a new unique section ID
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

impl Default for SectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SectionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A class section owned by exactly one faculty member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    /// Unique identifier
    pub id: SectionId,
    /// Display name (e.g. "CS-101 A")
    pub name: String,
    /// Owning faculty member
    pub faculty_id: FacultyId,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl Section {
    /// Create a new section owned by the given faculty member
    #[must_use]
    pub fn new(name: impl Into<String>, faculty_id: FacultyId) -> Self {
        Self {
            id: SectionId::new(),
            name: name.into(),
            faculty_id,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}
