//! Activity log: append-only structured record of every agent action.
//!
//! - **Types**: the immutable [`ActivityRecord`] row and its status values
//! - **Tracker**: concurrency-safe CSV persistence with size-based rotation
//! - **Filter**: the read-only view the UI layers on top of the log

mod filter;
mod tracker;
mod types;

pub use filter::{ActivityFilter, TimeWindow, TypeCategory};
pub use tracker::{ActivityLog, DEFAULT_MAX_FILE_SIZE_BYTES, LOG_FILE_NAME};
pub use types::{ActivityRecord, ActivityStatus};
