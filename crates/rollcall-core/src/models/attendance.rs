//! Attendance ledger model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

use super::{FacultyId, SectionId, StudentId};

/// A unique identifier for a ledger entry, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Create a new unique entry ID using UUID v7
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

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Observed attendance status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    /// Wire/database string form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            other => Err(Error::InvalidInput(format!(
                "status must be `present` or `absent`, got `{other}`"
            ))),
        }
    }
}

/// Provenance of an attendance observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMethod {
    /// Recorded by the face-recognition pipeline
    Ml,
    /// Entered by the faculty member
    Manual,
}

impl CaptureMethod {
    /// Wire/database string form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ml => "ml",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for CaptureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptureMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ml" => Ok(Self::Ml),
            "manual" => Ok(Self::Manual),
            other => Err(Error::InvalidInput(format!(
                "captureMethod must be `ml` or `manual`, got `{other}`"
            ))),
        }
    }
}

/// A persisted attendance ledger entry
///
/// At most one entry exists per (`student_id`, `date`) pair; that pair is the
/// conflict key for sync reconciliation. Entries are created on first sync and
/// updated in place on subsequent syncs for the same key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    /// Server-generated surrogate identifier
    pub id: EntryId,
    pub student_id: StudentId,
    pub faculty_id: FacultyId,
    pub section_id: SectionId,
    /// Calendar date of the observation (conflict key, UTC)
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub capture_method: CaptureMethod,
    /// Server-assigned timestamp of the last write (Unix ms)
    pub synced_at: i64,
}

impl AttendanceEntry {
    /// Create a fresh ledger entry from an observation timestamp
    ///
    /// The conflict-key date is the UTC calendar day of `observed_at`;
    /// `synced_at` is set to now.
    #[must_use]
    pub fn new(
        student_id: StudentId,
        faculty_id: FacultyId,
        section_id: SectionId,
        observed_at: DateTime<Utc>,
        status: AttendanceStatus,
        capture_method: CaptureMethod,
    ) -> Self {
        Self {
            id: EntryId::new(),
            student_id,
            faculty_id,
            section_id,
            date: observed_at.date_naive(),
            status,
            capture_method,
            synced_at: Utc::now().timestamp_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        assert_eq!(
            "present".parse::<AttendanceStatus>().unwrap(),
            AttendanceStatus::Present
        );
        assert_eq!(AttendanceStatus::Absent.as_str(), "absent");
        assert!("late".parse::<AttendanceStatus>().is_err());
    }

    #[test]
    fn test_capture_method_round_trip() {
        assert_eq!("ml".parse::<CaptureMethod>().unwrap(), CaptureMethod::Ml);
        assert_eq!(CaptureMethod::Manual.as_str(), "manual");
        assert!("auto".parse::<CaptureMethod>().is_err());
    }

    #[test]
    fn test_entry_date_is_utc_day_of_observation() {
        let observed_at: DateTime<Utc> = "2026-03-14T23:59:00Z".parse().unwrap();
        let entry = AttendanceEntry::new(
            StudentId::new(),
            FacultyId::new(),
            SectionId::new(),
            observed_at,
            AttendanceStatus::Present,
            CaptureMethod::Ml,
        );
        assert_eq!(entry.date, "2026-03-14".parse::<NaiveDate>().unwrap());
        assert!(entry.synced_at > 0);
    }
}
