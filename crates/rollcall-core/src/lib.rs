//! rollcall-core - Core library for Rollcall
//!
//! This crate contains the shared models, database layer, and the attendance
//! sync reconciliation subsystem used by the REST backend.

pub mod db;
pub mod error;
pub mod models;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{AttendanceEntry, AttendanceStatus, CaptureMethod};
pub use sync::{RawAttendanceRecord, SyncReconciler, SyncReport};
