//! Batch commit with per-record isolation

#![allow(clippy::cast_possible_wrap)] // batch indexes fit well inside i64

use std::time::Duration;

use libsql::Connection;

use crate::db::{AttendanceLedger, LedgerUpdate, SqliteAttendanceLedger, SqliteRosterRepository};
use crate::error::Result;
use crate::models::AttendanceEntry;
use crate::util::compact_text;

use super::record::{RawAttendanceRecord, ValidatedRecord};
use super::report::SyncReport;
use super::validator::RecordValidator;

/// Everything the sync endpoint returns: the per-record outcome report plus
/// the ledger entries as committed
#[derive(Debug)]
pub struct SyncOutcome {
    pub report: SyncReport,
    pub entries: Vec<AttendanceEntry>,
}

/// Applies a batch of client-submitted records to the attendance ledger
///
/// Records are processed in submission order, each validated and committed in
/// its own transaction: a validation failure, store error, or commit timeout
/// converts that record into a failure entry and processing continues with
/// the next one. There is deliberately no batch-wide transaction — rolling
/// back every sibling because one record is bad would change the failure
/// semantics clients rely on for retry.
pub struct SyncReconciler<'a> {
    conn: &'a Connection,
    validator: RecordValidator,
    commit_timeout: Duration,
}

impl<'a> SyncReconciler<'a> {
    /// Default bound on a single record's commit
    pub const DEFAULT_COMMIT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Create a reconciler with default validation and timeout settings
    #[must_use]
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            validator: RecordValidator::default(),
            commit_timeout: Self::DEFAULT_COMMIT_TIMEOUT,
        }
    }

    /// Override the retention horizon used by validation
    #[must_use]
    pub const fn with_retention_days(mut self, retention_days: i64) -> Self {
        self.validator = RecordValidator::new(retention_days);
        self
    }

    /// Override the per-record commit timeout
    #[must_use]
    pub const fn with_commit_timeout(mut self, timeout: Duration) -> Self {
        self.commit_timeout = timeout;
        self
    }

    /// Validate and commit a batch
    ///
    /// Never fails as a whole: every per-record error is captured in the
    /// report. Callers enforce the batch size bound before getting here.
    pub async fn sync_batch(&self, records: &[RawAttendanceRecord]) -> SyncOutcome {
        let roster = SqliteRosterRepository::new(self.conn);
        let ledger = SqliteAttendanceLedger::new(self.conn);

        let mut report = SyncReport::new(records.len());
        let mut entries = Vec::new();

        for (index, raw) in records.iter().enumerate() {
            let record_id = raw.id.unwrap_or(index as i64);
            let retry_count = raw.retry_count.unwrap_or(0);

            let validated = match self.validator.validate(raw, &roster).await {
                Ok(validated) => validated,
                Err(errors) => {
                    report.record_failure(record_id, retry_count, errors.join("; "));
                    continue;
                }
            };

            for warning in &validated.warnings {
                tracing::warn!(record = record_id, "{warning}");
            }

            match tokio::time::timeout(
                self.commit_timeout,
                self.commit_one(&ledger, &validated),
            )
            .await
            {
                Err(_) => {
                    // The commit future was dropped mid-flight; make sure no
                    // transaction is left open on the shared connection
                    self.conn.execute("ROLLBACK", ()).await.ok();
                    report.record_failure(
                        record_id,
                        retry_count,
                        format!(
                            "commit timed out after {}ms",
                            self.commit_timeout.as_millis()
                        ),
                    );
                }
                Ok(Err(error)) => {
                    report.record_failure(
                        record_id,
                        retry_count,
                        compact_text(&error.to_string()),
                    );
                }
                Ok(Ok((entry, overwrote))) => {
                    if overwrote {
                        tracing::warn!(
                            record = record_id,
                            date = %entry.date,
                            "Existing ledger entry overwritten (last write wins)"
                        );
                    }
                    report.record_synced();
                    entries.push(entry);
                }
            }
        }

        debug_assert!(report.totals_consistent());
        SyncOutcome { report, entries }
    }

    /// Commit one validated record inside its own transaction
    ///
    /// Returns the resulting ledger entry and whether an existing entry was
    /// overwritten.
    async fn commit_one(
        &self,
        ledger: &SqliteAttendanceLedger<'_>,
        record: &ValidatedRecord,
    ) -> Result<(AttendanceEntry, bool)> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        match Self::apply(ledger, record).await {
            Ok(committed) => {
                if let Err(error) = self.conn.execute("COMMIT", ()).await {
                    self.conn.execute("ROLLBACK", ()).await.ok();
                    return Err(error.into());
                }
                Ok(committed)
            }
            Err(error) => {
                self.conn.execute("ROLLBACK", ()).await.ok();
                Err(error)
            }
        }
    }

    /// Insert-or-update at the (student, date) conflict key
    async fn apply(
        ledger: &SqliteAttendanceLedger<'_>,
        record: &ValidatedRecord,
    ) -> Result<(AttendanceEntry, bool)> {
        match ledger.find_entry(&record.student_id, record.date).await? {
            None => {
                // First sync for this key; a concurrent insert racing us will
                // surface as a unique-constraint error and become a
                // retryable per-record failure
                let entry = AttendanceEntry::new(
                    record.student_id,
                    record.faculty_id,
                    record.section_id,
                    record.observed_at,
                    record.status,
                    record.capture_method,
                );
                ledger.insert_entry(&entry).await?;
                Ok((entry, false))
            }
            Some(_) => {
                // Last write observed by the server wins; no client-timestamp
                // comparison, the identifier and date stay put
                let entry = ledger
                    .update_entry(
                        &record.student_id,
                        record.date,
                        LedgerUpdate {
                            status: record.status,
                            capture_method: record.capture_method,
                            faculty_id: record.faculty_id,
                            section_id: record.section_id,
                        },
                    )
                    .await?;
                Ok((entry, true))
            }
        }
    }
}
