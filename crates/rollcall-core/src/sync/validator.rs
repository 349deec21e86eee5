//! Per-record validation

use chrono::{DateTime, Utc};
use std::str::FromStr;

use crate::db::RosterRepository;
use crate::error::Error;
use crate::models::{AttendanceStatus, CaptureMethod, FacultyId, SectionId, StudentId};
use crate::util::{compact_text, normalize_text_option};

use super::record::{RawAttendanceRecord, ValidatedRecord};

/// Classifies each submitted record as acceptable or rejected, independent of
/// the other records in the batch.
///
/// Validation proceeds in classes — shape, then roster references, then
/// temporal bounds — short-circuiting between classes but collecting every
/// applicable error within one, so a client gets actionable feedback in a
/// single round trip.
#[derive(Debug, Clone, Copy)]
pub struct RecordValidator {
    retention_days: i64,
}

impl RecordValidator {
    /// Uniform "too old" horizon applied to late offline syncs
    pub const DEFAULT_RETENTION_DAYS: i64 = 30;

    /// Create a validator with the given retention horizon in days
    #[must_use]
    pub const fn new(retention_days: i64) -> Self {
        Self { retention_days }
    }

    /// Validate one record against the roster
    ///
    /// Returns the typed record on success (possibly carrying warnings), or
    /// the full list of validation errors. Store-level lookup failures are
    /// converted into a record error rather than propagated.
    pub async fn validate<R: RosterRepository>(
        &self,
        raw: &RawAttendanceRecord,
        roster: &R,
    ) -> Result<ValidatedRecord, Vec<String>> {
        // Shape: everything parseable, independent of server state
        let mut errors = Vec::new();

        let student_id: Option<StudentId> =
            parse_id(raw.student_id.clone(), "studentId", &mut errors);
        let faculty_id: Option<FacultyId> =
            parse_id(raw.faculty_id.clone(), "facultyId", &mut errors);
        let section_id: Option<SectionId> =
            parse_id(raw.section_id.clone(), "sectionId", &mut errors);

        let observed_at: Option<DateTime<Utc>> = match normalize_text_option(raw.timestamp.clone())
        {
            None => {
                errors.push("timestamp is required".to_string());
                None
            }
            Some(value) => match value.parse() {
                Ok(parsed) => Some(parsed),
                Err(_) => {
                    errors.push(format!(
                        "timestamp `{value}` is not a valid RFC 3339 datetime"
                    ));
                    None
                }
            },
        };

        let status: Option<AttendanceStatus> = parse_enum(raw.status.clone(), "status", &mut errors);
        let capture_method: Option<CaptureMethod> =
            parse_enum(raw.capture_method.clone(), "captureMethod", &mut errors);

        // Every None above pushed a shape error; any shape failure
        // disqualifies the record from further checks
        let (
            Some(student_id),
            Some(faculty_id),
            Some(section_id),
            Some(observed_at),
            Some(status),
            Some(capture_method),
        ) = (
            student_id,
            faculty_id,
            section_id,
            observed_at,
            status,
            capture_method,
        )
        else {
            return Err(errors);
        };

        // References: all submitted ids must resolve and agree with each other
        let student = match roster.find_student(&student_id).await {
            Ok(student) => student,
            Err(error) => return Err(vec![lookup_failure(&error)]),
        };
        let faculty = match roster.find_faculty(&faculty_id).await {
            Ok(faculty) => faculty,
            Err(error) => return Err(vec![lookup_failure(&error)]),
        };
        let section = match roster.find_section(&section_id).await {
            Ok(section) => section,
            Err(error) => return Err(vec![lookup_failure(&error)]),
        };

        match &student {
            None => errors.push("studentId does not reference a known student".to_string()),
            Some(student) if !student.active => {
                errors.push("studentId references an inactive student".to_string());
            }
            Some(_) => {}
        }
        match &faculty {
            None => errors.push("facultyId does not reference a known faculty member".to_string()),
            Some(faculty) if !faculty.active => {
                errors.push("facultyId references an inactive faculty member".to_string());
            }
            Some(_) => {}
        }
        if section.is_none() {
            errors.push("sectionId does not reference a known section".to_string());
        }

        if let Some(student) = &student {
            if student.section_id != section_id {
                errors.push("studentId does not belong to the submitted sectionId".to_string());
            }
        }
        if let Some(section) = &section {
            if section.faculty_id != faculty_id {
                errors.push("sectionId is not owned by the submitted facultyId".to_string());
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        // Temporal bounds: future observations are always rejected; late ones
        // past the retention horizon are accepted with a warning so legitimate
        // offline backlogs aren't lost
        let now = Utc::now();
        if observed_at > now {
            return Err(vec![format!(
                "timestamp `{}` is in the future",
                observed_at.to_rfc3339()
            )]);
        }

        let mut warnings = Vec::new();
        let age_days = (now - observed_at).num_days();
        if age_days > self.retention_days {
            warnings.push(format!(
                "timestamp is {age_days} days old, past the {}-day retention horizon; accepted as a late sync",
                self.retention_days
            ));
        }

        Ok(ValidatedRecord {
            client_id: raw.id,
            student_id,
            faculty_id,
            section_id,
            observed_at,
            date: observed_at.date_naive(),
            status,
            capture_method,
            warnings,
        })
    }
}

impl Default for RecordValidator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RETENTION_DAYS)
    }
}

fn parse_id<T: FromStr>(value: Option<String>, field: &str, errors: &mut Vec<String>) -> Option<T> {
    let Some(value) = normalize_text_option(value) else {
        errors.push(format!("{field} must be a non-empty string"));
        return None;
    };
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            errors.push(format!("{field} `{value}` is not a valid UUID"));
            None
        }
    }
}

fn parse_enum<T: FromStr<Err = Error>>(
    value: Option<String>,
    field: &str,
    errors: &mut Vec<String>,
) -> Option<T> {
    let Some(value) = normalize_text_option(value) else {
        errors.push(format!("{field} is required"));
        return None;
    };
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(Error::InvalidInput(message)) => {
            errors.push(message);
            None
        }
        Err(error) => {
            errors.push(error.to_string());
            None
        }
    }
}

fn lookup_failure(error: &Error) -> String {
    format!(
        "reference lookup failed: {}",
        compact_text(&error.to_string())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, SqliteRosterRepository};
    use crate::models::{AttendanceStatus, CaptureMethod, Faculty, Section, Student};
    use chrono::Duration;

    async fn setup() -> (Database, Faculty, Section, Student) {
        let db = Database::open_in_memory().await.unwrap();
        let roster = SqliteRosterRepository::new(db.connection());

        let faculty = Faculty::new("Grace Hopper", "grace@school.edu");
        roster.insert_faculty(&faculty).await.unwrap();
        let section = Section::new("CS-101 A", faculty.id);
        roster.insert_section(&section).await.unwrap();
        let student = Student::new("Ada Lovelace", section.id);
        roster.insert_student(&student).await.unwrap();

        (db, faculty, section, student)
    }

    fn valid_raw(faculty: &Faculty, section: &Section, student: &Student) -> RawAttendanceRecord {
        RawAttendanceRecord {
            id: Some(7),
            student_id: Some(student.id.as_str()),
            faculty_id: Some(faculty.id.as_str()),
            section_id: Some(section.id.as_str()),
            timestamp: Some((Utc::now() - Duration::hours(1)).to_rfc3339()),
            status: Some("present".to_string()),
            capture_method: Some("ml".to_string()),
            retry_count: None,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_valid_record_passes() {
        let (db, faculty, section, student) = setup().await;
        let roster = SqliteRosterRepository::new(db.connection());
        let validator = RecordValidator::default();

        let validated = validator
            .validate(&valid_raw(&faculty, &section, &student), &roster)
            .await
            .unwrap();

        assert_eq!(validated.client_id, Some(7));
        assert_eq!(validated.student_id, student.id);
        assert_eq!(validated.status, AttendanceStatus::Present);
        assert_eq!(validated.capture_method, CaptureMethod::Ml);
        assert_eq!(validated.date, validated.observed_at.date_naive());
        assert!(validated.warnings.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shape_errors_are_collected() {
        let (db, _, _, _) = setup().await;
        let roster = SqliteRosterRepository::new(db.connection());
        let validator = RecordValidator::default();

        let raw = RawAttendanceRecord {
            student_id: Some("  ".to_string()),
            status: Some("late".to_string()),
            ..Default::default()
        };

        let errors = validator.validate(&raw, &roster).await.unwrap_err();
        assert!(errors.iter().any(|e| e.contains("studentId")));
        assert!(errors.iter().any(|e| e.contains("facultyId")));
        assert!(errors.iter().any(|e| e.contains("sectionId")));
        assert!(errors.iter().any(|e| e.contains("timestamp")));
        assert!(errors.iter().any(|e| e.contains("status")));
        assert!(errors.iter().any(|e| e.contains("captureMethod")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dangling_student_rejected() {
        let (db, faculty, section, student) = setup().await;
        let roster = SqliteRosterRepository::new(db.connection());
        let validator = RecordValidator::default();

        let mut raw = valid_raw(&faculty, &section, &student);
        raw.student_id = Some(crate::models::StudentId::new().as_str());

        let errors = validator.validate(&raw, &roster).await.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("studentId"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_inactive_student_rejected() {
        let (db, faculty, section, student) = setup().await;
        let roster = SqliteRosterRepository::new(db.connection());
        roster.deactivate_student(&student.id).await.unwrap();
        let validator = RecordValidator::default();

        let errors = validator
            .validate(&valid_raw(&faculty, &section, &student), &roster)
            .await
            .unwrap_err();
        assert!(errors.iter().any(|e| e.contains("inactive student")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_section_faculty_mismatch_rejected() {
        let (db, faculty, section, student) = setup().await;
        let roster = SqliteRosterRepository::new(db.connection());

        // A second faculty member who does not own the section
        let other = Faculty::new("Alan Turing", "alan@school.edu");
        roster.insert_faculty(&other).await.unwrap();

        let mut raw = valid_raw(&faculty, &section, &student);
        raw.faculty_id = Some(other.id.as_str());

        let validator = RecordValidator::default();
        let errors = validator.validate(&raw, &roster).await.unwrap_err();
        assert!(errors.iter().any(|e| e.contains("not owned")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_student_section_mismatch_rejected() {
        let (db, faculty, section, student) = setup().await;
        let roster = SqliteRosterRepository::new(db.connection());

        let other = Section::new("CS-101 B", faculty.id);
        roster.insert_section(&other).await.unwrap();

        let mut raw = valid_raw(&faculty, &section, &student);
        raw.section_id = Some(other.id.as_str());

        let validator = RecordValidator::default();
        let errors = validator.validate(&raw, &roster).await.unwrap_err();
        assert!(errors.iter().any(|e| e.contains("does not belong")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_future_timestamp_rejected() {
        let (db, faculty, section, student) = setup().await;
        let roster = SqliteRosterRepository::new(db.connection());
        let validator = RecordValidator::default();

        let mut raw = valid_raw(&faculty, &section, &student);
        raw.timestamp = Some((Utc::now() + Duration::days(365)).to_rfc3339());

        let errors = validator.validate(&raw, &roster).await.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("future"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_old_timestamp_accepted_with_warning() {
        let (db, faculty, section, student) = setup().await;
        let roster = SqliteRosterRepository::new(db.connection());
        let validator = RecordValidator::default();

        let mut raw = valid_raw(&faculty, &section, &student);
        raw.timestamp = Some((Utc::now() - Duration::days(45)).to_rfc3339());

        let validated = validator.validate(&raw, &roster).await.unwrap();
        assert_eq!(validated.warnings.len(), 1);
        assert!(validated.warnings[0].contains("retention horizon"));
    }
}
