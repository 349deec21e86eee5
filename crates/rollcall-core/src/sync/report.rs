//! Sync result contract

use serde::{Deserialize, Serialize};

/// One failed record with enough detail for the client to decide whether a
/// resubmit can succeed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    /// Client-local record id when submitted, batch index otherwise
    pub record_id: i64,
    /// Joined validation errors, or the underlying store/timeout message
    pub error: String,
    /// Echo of the client's retry counter for this record
    pub retry_count: i64,
    /// When the failure was recorded server-side (Unix ms)
    pub timestamp: i64,
}

/// Outcome counts for one sync batch
///
/// Partial failure is a first-class outcome: the transport-level call
/// succeeds whenever the batch shape was acceptable, and per-record failures
/// are reported here instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Size of the input batch
    pub total_records: usize,
    /// Records durably committed
    pub synced_records: usize,
    /// Records rejected by validation or failed during commit
    pub failed_records: usize,
    /// One entry per failed record
    pub errors: Vec<SyncFailure>,
}

impl SyncReport {
    /// Start a report for a batch of the given size
    #[must_use]
    pub const fn new(total_records: usize) -> Self {
        Self {
            total_records,
            synced_records: 0,
            failed_records: 0,
            errors: Vec::new(),
        }
    }

    /// Count one committed record
    pub fn record_synced(&mut self) {
        self.synced_records += 1;
    }

    /// Count one failed record with its error detail
    pub fn record_failure(&mut self, record_id: i64, retry_count: i64, error: String) {
        self.failed_records += 1;
        self.errors.push(SyncFailure {
            record_id,
            error,
            retry_count,
            timestamp: chrono::Utc::now().timestamp_millis(),
        });
    }

    /// Every record in the batch is accounted for as either synced or failed,
    /// and each failure carries an error entry
    #[must_use]
    pub fn totals_consistent(&self) -> bool {
        self.synced_records + self.failed_records == self.total_records
            && self.errors.len() == self.failed_records
    }
}
