//! Student model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::SectionId;

/// A unique identifier for a student, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StudentId(Uuid);

impl StudentId {
    /// Create a new unique student ID using UUID v7
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

impl Default for StudentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StudentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A student enrolled in exactly one section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    /// Unique identifier
    pub id: StudentId,
    /// Display name
    pub full_name: String,
    /// Section the student belongs to
    pub section_id: SectionId,
    /// Inactive students are rejected during sync validation
    pub active: bool,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl Student {
    /// Create a new active student in the given section
    #[must_use]
    pub fn new(full_name: impl Into<String>, section_id: SectionId) -> Self {
        Self {
            id: StudentId::new(),
            full_name: full_name.into(),
            section_id,
            active: true,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_student_id_unique() {
        let id1 = StudentId::new();
        let id2 = StudentId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_student_id_parse() {
        let id = StudentId::new();
        let parsed: StudentId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_student_new_is_active() {
        let student = Student::new("Ada Lovelace", SectionId::new());
        assert!(student.active);
        assert!(student.created_at > 0);
    }
}
