//! Attendance ledger persistence

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use chrono::NaiveDate;
use libsql::{params, Connection, Row};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::{
    AttendanceEntry, AttendanceStatus, CaptureMethod, FacultyId, SectionId, StudentId,
};

/// Write-side ledger interface used by the sync committer
///
/// Every method may fail with a store-level error (constraint violation,
/// connectivity); callers convert those into per-record failures.
#[allow(async_fn_in_trait)]
pub trait AttendanceLedger {
    /// Fetch the ledger entry at a (student, date) conflict key
    async fn find_entry(
        &self,
        student_id: &StudentId,
        date: NaiveDate,
    ) -> Result<Option<AttendanceEntry>>;

    /// Insert a fresh ledger entry
    ///
    /// Fails with a unique-constraint violation when an entry for the same
    /// (student, date) key was inserted concurrently.
    async fn insert_entry(&self, entry: &AttendanceEntry) -> Result<()>;

    /// Overwrite the mutable fields of an existing entry (last write wins)
    ///
    /// The entry's identifier and calendar date never change; `synced_at` is
    /// refreshed to now.
    async fn update_entry(
        &self,
        student_id: &StudentId,
        date: NaiveDate,
        update: LedgerUpdate,
    ) -> Result<AttendanceEntry>;
}

/// Fields overwritten when a sync resolves a conflict in place
#[derive(Debug, Clone, Copy)]
pub struct LedgerUpdate {
    pub status: AttendanceStatus,
    pub capture_method: CaptureMethod,
    pub faculty_id: FacultyId,
    pub section_id: SectionId,
}

/// Filter for the read-side history query
#[derive(Debug, Clone)]
pub struct HistoryFilter {
    pub student_id: StudentId,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: usize,
    pub offset: usize,
}

/// A ledger entry joined with display names for the history endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRow {
    #[serde(flatten)]
    pub entry: AttendanceEntry,
    pub student_name: String,
    pub section_name: String,
}

/// `SQLite` implementation of the attendance ledger
pub struct SqliteAttendanceLedger<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteAttendanceLedger<'a> {
    /// Create a new ledger with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Paginated ledger history for one student, newest first
    pub async fn history(&self, filter: &HistoryFilter) -> Result<Vec<HistoryRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT a.id, a.student_id, a.faculty_id, a.section_id, a.date,
                        a.status, a.capture_method, a.synced_at,
                        st.full_name, se.name
                 FROM attendance a
                 JOIN students st ON st.id = a.student_id
                 JOIN sections se ON se.id = a.section_id
                 WHERE a.student_id = ?1
                   AND (?2 IS NULL OR a.date >= ?2)
                   AND (?3 IS NULL OR a.date <= ?3)
                 ORDER BY a.date DESC, a.synced_at DESC
                 LIMIT ?4 OFFSET ?5",
                params![
                    filter.student_id.as_str(),
                    filter.from.map(|date| date.to_string()),
                    filter.to.map(|date| date.to_string()),
                    filter.limit as i64,
                    filter.offset as i64
                ],
            )
            .await?;

        let mut history = Vec::new();
        while let Some(row) = rows.next().await? {
            history.push(HistoryRow {
                entry: parse_entry(&row)?,
                student_name: row.get(8)?,
                section_name: row.get(9)?,
            });
        }
        Ok(history)
    }
}

impl AttendanceLedger for SqliteAttendanceLedger<'_> {
    async fn find_entry(
        &self,
        student_id: &StudentId,
        date: NaiveDate,
    ) -> Result<Option<AttendanceEntry>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, student_id, faculty_id, section_id, date,
                        status, capture_method, synced_at
                 FROM attendance
                 WHERE student_id = ?1 AND date = ?2",
                params![student_id.as_str(), date.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(parse_entry(&row)?)),
            None => Ok(None),
        }
    }

    async fn insert_entry(&self, entry: &AttendanceEntry) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO attendance
                     (id, student_id, faculty_id, section_id, date,
                      status, capture_method, synced_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    entry.id.as_str(),
                    entry.student_id.as_str(),
                    entry.faculty_id.as_str(),
                    entry.section_id.as_str(),
                    entry.date.to_string(),
                    entry.status.as_str(),
                    entry.capture_method.as_str(),
                    entry.synced_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn update_entry(
        &self,
        student_id: &StudentId,
        date: NaiveDate,
        update: LedgerUpdate,
    ) -> Result<AttendanceEntry> {
        let now = chrono::Utc::now().timestamp_millis();

        let rows = self
            .conn
            .execute(
                "UPDATE attendance
                 SET status = ?1, capture_method = ?2, faculty_id = ?3,
                     section_id = ?4, synced_at = ?5
                 WHERE student_id = ?6 AND date = ?7",
                params![
                    update.status.as_str(),
                    update.capture_method.as_str(),
                    update.faculty_id.as_str(),
                    update.section_id.as_str(),
                    now,
                    student_id.as_str(),
                    date.to_string()
                ],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!(
                "no ledger entry for student {student_id} on {date}"
            )));
        }

        self.find_entry(student_id, date).await?.ok_or_else(|| {
            Error::NotFound(format!("no ledger entry for student {student_id} on {date}"))
        })
    }
}

fn parse_entry(row: &Row) -> Result<AttendanceEntry> {
    let id: String = row.get(0)?;
    let student_id: String = row.get(1)?;
    let faculty_id: String = row.get(2)?;
    let section_id: String = row.get(3)?;
    let date: String = row.get(4)?;
    let status: String = row.get(5)?;
    let capture_method: String = row.get(6)?;

    Ok(AttendanceEntry {
        id: id
            .parse()
            .map_err(|_| Error::Database(format!("invalid entry id in row: {id}")))?,
        student_id: student_id
            .parse()
            .map_err(|_| Error::Database(format!("invalid student id in row: {student_id}")))?,
        faculty_id: faculty_id
            .parse()
            .map_err(|_| Error::Database(format!("invalid faculty id in row: {faculty_id}")))?,
        section_id: section_id
            .parse()
            .map_err(|_| Error::Database(format!("invalid section id in row: {section_id}")))?,
        date: date
            .parse()
            .map_err(|_| Error::Database(format!("invalid date in row: {date}")))?,
        status: status.parse()?,
        capture_method: capture_method.parse()?,
        synced_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, SqliteRosterRepository};
    use crate::models::{Faculty, Section, Student};
    use chrono::Utc;

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

    fn entry_for(
        faculty: &Faculty,
        section: &Section,
        student: &Student,
        status: AttendanceStatus,
    ) -> AttendanceEntry {
        AttendanceEntry::new(
            student.id,
            faculty.id,
            section.id,
            Utc::now(),
            status,
            CaptureMethod::Manual,
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_insert_and_find_entry() {
        let (db, faculty, section, student) = setup().await;
        let ledger = SqliteAttendanceLedger::new(db.connection());

        let entry = entry_for(&faculty, &section, &student, AttendanceStatus::Present);
        ledger.insert_entry(&entry).await.unwrap();

        let fetched = ledger
            .find_entry(&student.id, entry.date)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched, entry);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_entry_preserves_id_and_date() {
        let (db, faculty, section, student) = setup().await;
        let ledger = SqliteAttendanceLedger::new(db.connection());

        let entry = entry_for(&faculty, &section, &student, AttendanceStatus::Absent);
        ledger.insert_entry(&entry).await.unwrap();

        let updated = ledger
            .update_entry(
                &student.id,
                entry.date,
                LedgerUpdate {
                    status: AttendanceStatus::Present,
                    capture_method: CaptureMethod::Ml,
                    faculty_id: faculty.id,
                    section_id: section.id,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.id, entry.id);
        assert_eq!(updated.date, entry.date);
        assert_eq!(updated.status, AttendanceStatus::Present);
        assert_eq!(updated.capture_method, CaptureMethod::Ml);
        assert!(updated.synced_at >= entry.synced_at);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_missing_entry_is_not_found() {
        let (db, faculty, section, student) = setup().await;
        let ledger = SqliteAttendanceLedger::new(db.connection());

        let missing = ledger
            .update_entry(
                &student.id,
                "2026-01-05".parse().unwrap(),
                LedgerUpdate {
                    status: AttendanceStatus::Present,
                    capture_method: CaptureMethod::Manual,
                    faculty_id: faculty.id,
                    section_id: section.id,
                },
            )
            .await;
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_duplicate_key_insert_rejected() {
        let (db, faculty, section, student) = setup().await;
        let ledger = SqliteAttendanceLedger::new(db.connection());

        let entry = entry_for(&faculty, &section, &student, AttendanceStatus::Present);
        ledger.insert_entry(&entry).await.unwrap();

        let mut duplicate = entry_for(&faculty, &section, &student, AttendanceStatus::Absent);
        duplicate.date = entry.date;
        assert!(ledger.insert_entry(&duplicate).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_history_newest_first_with_range() {
        let (db, faculty, section, student) = setup().await;
        let ledger = SqliteAttendanceLedger::new(db.connection());

        for (day, status) in [
            ("2026-03-02", AttendanceStatus::Present),
            ("2026-03-03", AttendanceStatus::Absent),
            ("2026-03-04", AttendanceStatus::Present),
        ] {
            let mut entry = entry_for(&faculty, &section, &student, status);
            entry.date = day.parse().unwrap();
            ledger.insert_entry(&entry).await.unwrap();
        }

        let rows = ledger
            .history(&HistoryFilter {
                student_id: student.id,
                from: None,
                to: None,
                limit: 10,
                offset: 0,
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].entry.date, "2026-03-04".parse().unwrap());
        assert_eq!(rows[0].student_name, "Ada Lovelace");
        assert_eq!(rows[0].section_name, "CS-101 A");

        let bounded = ledger
            .history(&HistoryFilter {
                student_id: student.id,
                from: Some("2026-03-03".parse().unwrap()),
                to: Some("2026-03-03".parse().unwrap()),
                limit: 10,
                offset: 0,
            })
            .await
            .unwrap();
        assert_eq!(bounded.len(), 1);
        assert_eq!(bounded[0].entry.status, AttendanceStatus::Absent);
    }
}
