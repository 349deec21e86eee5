//! Attendance sync reconciliation
//!
//! Mobile clients queue attendance records while offline and upload them in
//! bounded batches. Each record is validated independently (shape, roster
//! references, temporal bounds), then committed in its own transaction against
//! the ledger's (student, calendar date) conflict key: first sync inserts,
//! later syncs update in place and the last write observed by the server wins.
//! One record's failure never aborts its siblings; the caller gets a
//! [`SyncReport`] with per-record error detail so it can resubmit only the
//! failed subset.

mod reconciler;
mod record;
mod report;
mod validator;

pub use reconciler::{SyncOutcome, SyncReconciler};
pub use record::{RawAttendanceRecord, ValidatedRecord};
pub use report::{SyncFailure, SyncReport};
pub use validator::RecordValidator;
