//! Data models for Rollcall

mod attendance;
mod faculty;
mod section;
mod student;

pub use attendance::{AttendanceEntry, AttendanceStatus, CaptureMethod, EntryId};
pub use faculty::{Faculty, FacultyId};
pub use section::{Section, SectionId};
pub use student::{Student, StudentId};
