//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }
    if version < 2 {
        migrate_v2(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    // Check if schema_version table exists
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Migration to version 1: reference tables (faculty, sections, students)
async fn migrate_v1(conn: &Connection) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    // Using a transaction for atomicity

    conn.execute("BEGIN TRANSACTION", ()).await?;

    let statements = [
        // Schema version tracking
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        // Faculty table
        "CREATE TABLE IF NOT EXISTS faculty (
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL
        )",
        // Sections table
        "CREATE TABLE IF NOT EXISTS sections (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            faculty_id TEXT NOT NULL REFERENCES faculty(id),
            created_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_sections_faculty ON sections(faculty_id)",
        // Students table
        "CREATE TABLE IF NOT EXISTS students (
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            section_id TEXT NOT NULL REFERENCES sections(id),
            active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_students_section ON students(section_id)",
        "CREATE INDEX IF NOT EXISTS idx_students_active ON students(active)",
        // Record migration version
        "INSERT INTO schema_version (version) VALUES (1)",
    ];

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: attendance ledger with the (student, date) conflict key
async fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    let statements = [
        "CREATE TABLE IF NOT EXISTS attendance (
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL REFERENCES students(id),
            faculty_id TEXT NOT NULL REFERENCES faculty(id),
            section_id TEXT NOT NULL REFERENCES sections(id),
            date TEXT NOT NULL,
            status TEXT NOT NULL,
            capture_method TEXT NOT NULL,
            synced_at INTEGER NOT NULL
        )",
        // One ledger slot per (student, calendar date); sync reconciliation
        // relies on this constraint to catch insert races
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_attendance_student_date
            ON attendance(student_id, date)",
        "CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance(date DESC)",
        "CREATE INDEX IF NOT EXISTS idx_attendance_section_date ON attendance(section_id, date)",
        "INSERT INTO schema_version (version) VALUES (2)",
    ];

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    async fn setup() -> Connection {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        db.connect().unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations_idempotent() {
        let conn = setup().await;
        run(&conn).await.unwrap();
        run(&conn).await.unwrap(); // Should not fail

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_attendance_unique_constraint() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        conn.execute(
            "INSERT INTO faculty (id, full_name, email, active, created_at)
             VALUES ('f1', 'F', 'f@school.edu', 1, 0)",
            (),
        )
        .await
        .unwrap();
        conn.execute(
            "INSERT INTO sections (id, name, faculty_id, created_at)
             VALUES ('c1', 'CS-101', 'f1', 0)",
            (),
        )
        .await
        .unwrap();
        conn.execute(
            "INSERT INTO students (id, full_name, section_id, active, created_at)
             VALUES ('s1', 'S', 'c1', 1, 0)",
            (),
        )
        .await
        .unwrap();

        conn.execute(
            "INSERT INTO attendance (id, student_id, faculty_id, section_id, date, status, capture_method, synced_at)
             VALUES ('e1', 's1', 'f1', 'c1', '2026-03-02', 'present', 'ml', 0)",
            (),
        )
        .await
        .unwrap();

        // Second row for the same (student, date) must violate the unique index
        let dup = conn
            .execute(
                "INSERT INTO attendance (id, student_id, faculty_id, section_id, date, status, capture_method, synced_at)
                 VALUES ('e2', 's1', 'f1', 'c1', '2026-03-02', 'absent', 'manual', 0)",
                (),
            )
            .await;
        assert!(dup.is_err());
    }
}
