//! Database layer for Rollcall

mod attendance_repository;
mod connection;
mod migrations;
mod roster_repository;

pub use attendance_repository::{
    AttendanceLedger, HistoryFilter, HistoryRow, LedgerUpdate, SqliteAttendanceLedger,
};
pub use connection::Database;
pub use libsql::Connection;
pub use roster_repository::{RosterRepository, SqliteRosterRepository, StudentUpdate};
