//! Attendance record wire and validated forms
//!
//! [`RawAttendanceRecord`] is what clients actually send: every field is
//! optional and untyped, because offline queues on old app versions produce
//! all sorts of shapes. [`ValidatedRecord`] is what the committer accepts;
//! it can only be produced by the validator, so commit-stage code never sees
//! unchecked input.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::models::{AttendanceStatus, CaptureMethod, FacultyId, SectionId, StudentId};

/// One client-submitted attendance record, pre-validation
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAttendanceRecord {
    /// Client-local queue identifier, echoed back in failure reports;
    /// never persisted
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub faculty_id: Option<String>,
    #[serde(default)]
    pub section_id: Option<String>,
    /// RFC 3339 timestamp of the observation (client clock)
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub capture_method: Option<String>,
    /// How many times the client has already retried this record
    #[serde(default)]
    pub retry_count: Option<i64>,
}

/// A record that passed validation and is ready to commit
#[derive(Debug, Clone)]
pub struct ValidatedRecord {
    /// Client-local identifier carried through for error echoing
    pub client_id: Option<i64>,
    pub student_id: StudentId,
    pub faculty_id: FacultyId,
    pub section_id: SectionId,
    /// Observation time as submitted (client clock)
    pub observed_at: DateTime<Utc>,
    /// UTC calendar day of `observed_at` — the conflict key date
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub capture_method: CaptureMethod,
    /// Non-fatal annotations (late sync past the retention horizon, ...)
    pub warnings: Vec<String>,
}
