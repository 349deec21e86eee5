//! Reference-store lookups and roster CRUD

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use crate::error::{Error, Result};
use crate::models::{Faculty, FacultyId, Section, SectionId, Student, StudentId};
use libsql::{params, Connection, Row};

/// Read-side reference store consulted during sync validation
///
/// The sync subsystem never mutates these tables; it only resolves submitted
/// identifiers against them.
#[allow(async_fn_in_trait)]
pub trait RosterRepository {
    /// Look up a student by ID
    async fn find_student(&self, id: &StudentId) -> Result<Option<Student>>;

    /// Look up a faculty member by ID
    async fn find_faculty(&self, id: &FacultyId) -> Result<Option<Faculty>>;

    /// Look up a section by ID
    async fn find_section(&self, id: &SectionId) -> Result<Option<Section>>;
}

/// Partial update for a student row
#[derive(Debug, Clone, Default)]
pub struct StudentUpdate {
    pub full_name: Option<String>,
    pub section_id: Option<SectionId>,
}

/// `SQLite` implementation of the roster tables
pub struct SqliteRosterRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteRosterRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a new faculty member
    pub async fn insert_faculty(&self, faculty: &Faculty) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO faculty (id, full_name, email, active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    faculty.id.as_str(),
                    faculty.full_name.clone(),
                    faculty.email.clone(),
                    i64::from(faculty.active),
                    faculty.created_at
                ],
            )
            .await?;
        Ok(())
    }

    /// Insert a new section
    pub async fn insert_section(&self, section: &Section) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO sections (id, name, faculty_id, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    section.id.as_str(),
                    section.name.clone(),
                    section.faculty_id.as_str(),
                    section.created_at
                ],
            )
            .await?;
        Ok(())
    }

    /// List sections, newest first
    pub async fn list_sections(&self, limit: usize, offset: usize) -> Result<Vec<Section>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, faculty_id, created_at
                 FROM sections
                 ORDER BY created_at DESC
                 LIMIT ?1 OFFSET ?2",
                params![limit as i64, offset as i64],
            )
            .await?;

        let mut sections = Vec::new();
        while let Some(row) = rows.next().await? {
            sections.push(parse_section(&row)?);
        }
        Ok(sections)
    }

    /// Insert a new student
    pub async fn insert_student(&self, student: &Student) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO students (id, full_name, section_id, active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    student.id.as_str(),
                    student.full_name.clone(),
                    student.section_id.as_str(),
                    i64::from(student.active),
                    student.created_at
                ],
            )
            .await?;
        Ok(())
    }

    /// Apply a partial update to a student
    pub async fn update_student(&self, id: &StudentId, update: StudentUpdate) -> Result<Student> {
        let Some(mut student) = self.find_student(id).await? else {
            return Err(Error::NotFound(id.to_string()));
        };

        if let Some(full_name) = update.full_name {
            student.full_name = full_name;
        }
        if let Some(section_id) = update.section_id {
            student.section_id = section_id;
        }

        self.conn
            .execute(
                "UPDATE students SET full_name = ?1, section_id = ?2 WHERE id = ?3",
                params![
                    student.full_name.clone(),
                    student.section_id.as_str(),
                    id.as_str()
                ],
            )
            .await?;

        Ok(student)
    }

    /// Mark a student inactive
    ///
    /// Inactive students are excluded from list results and rejected by sync
    /// validation; their ledger history is kept.
    pub async fn deactivate_student(&self, id: &StudentId) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE students SET active = 0 WHERE id = ?1 AND active = 1",
                params![id.as_str()],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// List active students, optionally filtered by section, newest first
    pub async fn list_students(
        &self,
        section: Option<&SectionId>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Student>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, full_name, section_id, active, created_at
                 FROM students
                 WHERE active = 1 AND (?1 IS NULL OR section_id = ?1)
                 ORDER BY created_at DESC
                 LIMIT ?2 OFFSET ?3",
                params![
                    section.map(SectionId::as_str),
                    limit as i64,
                    offset as i64
                ],
            )
            .await?;

        let mut students = Vec::new();
        while let Some(row) = rows.next().await? {
            students.push(parse_student(&row)?);
        }
        Ok(students)
    }
}

impl RosterRepository for SqliteRosterRepository<'_> {
    async fn find_student(&self, id: &StudentId) -> Result<Option<Student>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, full_name, section_id, active, created_at
                 FROM students WHERE id = ?1",
                params![id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(parse_student(&row)?)),
            None => Ok(None),
        }
    }

    async fn find_faculty(&self, id: &FacultyId) -> Result<Option<Faculty>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, full_name, email, active, created_at
                 FROM faculty WHERE id = ?1",
                params![id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(parse_faculty(&row)?)),
            None => Ok(None),
        }
    }

    async fn find_section(&self, id: &SectionId) -> Result<Option<Section>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, faculty_id, created_at
                 FROM sections WHERE id = ?1",
                params![id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(parse_section(&row)?)),
            None => Ok(None),
        }
    }
}

fn parse_student(row: &Row) -> Result<Student> {
    let id: String = row.get(0)?;
    let section_id: String = row.get(2)?;
    Ok(Student {
        id: id
            .parse()
            .map_err(|_| Error::Database(format!("invalid student id in row: {id}")))?,
        full_name: row.get(1)?,
        section_id: section_id
            .parse()
            .map_err(|_| Error::Database(format!("invalid section id in row: {section_id}")))?,
        active: row.get::<i32>(3)? != 0,
        created_at: row.get(4)?,
    })
}

fn parse_faculty(row: &Row) -> Result<Faculty> {
    let id: String = row.get(0)?;
    Ok(Faculty {
        id: id
            .parse()
            .map_err(|_| Error::Database(format!("invalid faculty id in row: {id}")))?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        active: row.get::<i32>(3)? != 0,
        created_at: row.get(4)?,
    })
}

fn parse_section(row: &Row) -> Result<Section> {
    let id: String = row.get(0)?;
    let faculty_id: String = row.get(2)?;
    Ok(Section {
        id: id
            .parse()
            .map_err(|_| Error::Database(format!("invalid section id in row: {id}")))?,
        name: row.get(1)?,
        faculty_id: faculty_id
            .parse()
            .map_err(|_| Error::Database(format!("invalid faculty id in row: {faculty_id}")))?,
        created_at: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    async fn seed_roster(repo: &SqliteRosterRepository<'_>) -> (Faculty, Section, Student) {
        let faculty = Faculty::new("Grace Hopper", "grace@school.edu");
        repo.insert_faculty(&faculty).await.unwrap();

        let section = Section::new("CS-101 A", faculty.id);
        repo.insert_section(&section).await.unwrap();

        let student = Student::new("Ada Lovelace", section.id);
        repo.insert_student(&student).await.unwrap();

        (faculty, section, student)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_insert_and_find() {
        let db = setup().await;
        let repo = SqliteRosterRepository::new(db.connection());
        let (faculty, section, student) = seed_roster(&repo).await;

        let fetched = repo.find_student(&student.id).await.unwrap().unwrap();
        assert_eq!(fetched, student);

        let fetched = repo.find_faculty(&faculty.id).await.unwrap().unwrap();
        assert_eq!(fetched, faculty);

        let fetched = repo.find_section(&section.id).await.unwrap().unwrap();
        assert_eq!(fetched, section);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_find_missing_returns_none() {
        let db = setup().await;
        let repo = SqliteRosterRepository::new(db.connection());

        assert!(repo
            .find_student(&StudentId::new())
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .find_faculty(&FacultyId::new())
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .find_section(&SectionId::new())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_student() {
        let db = setup().await;
        let repo = SqliteRosterRepository::new(db.connection());
        let (_, _, student) = seed_roster(&repo).await;

        let updated = repo
            .update_student(
                &student.id,
                StudentUpdate {
                    full_name: Some("Ada King".to_string()),
                    section_id: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.full_name, "Ada King");
        assert_eq!(updated.section_id, student.section_id);

        let fetched = repo.find_student(&student.id).await.unwrap().unwrap();
        assert_eq!(fetched.full_name, "Ada King");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_deactivate_student() {
        let db = setup().await;
        let repo = SqliteRosterRepository::new(db.connection());
        let (_, section, student) = seed_roster(&repo).await;

        repo.deactivate_student(&student.id).await.unwrap();

        // Still resolvable by ID (history joins need it), but inactive
        let fetched = repo.find_student(&student.id).await.unwrap().unwrap();
        assert!(!fetched.active);

        // Excluded from listings
        let listed = repo.list_students(Some(&section.id), 10, 0).await.unwrap();
        assert!(listed.is_empty());

        // Deactivating twice is an error
        assert!(repo.deactivate_student(&student.id).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_students_filters_by_section() {
        let db = setup().await;
        let repo = SqliteRosterRepository::new(db.connection());
        let (faculty, section, _) = seed_roster(&repo).await;

        let other = Section::new("CS-101 B", faculty.id);
        repo.insert_section(&other).await.unwrap();
        repo.insert_student(&Student::new("Alan Turing", other.id))
            .await
            .unwrap();

        let all = repo.list_students(None, 10, 0).await.unwrap();
        assert_eq!(all.len(), 2);

        let filtered = repo.list_students(Some(&section.id), 10, 0).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].full_name, "Ada Lovelace");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_duplicate_faculty_email_rejected() {
        let db = setup().await;
        let repo = SqliteRosterRepository::new(db.connection());

        repo.insert_faculty(&Faculty::new("A", "same@school.edu"))
            .await
            .unwrap();
        let dup = repo
            .insert_faculty(&Faculty::new("B", "Same@School.edu"))
            .await;
        assert!(dup.is_err());
    }
}
