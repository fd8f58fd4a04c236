//! Stable exit codes for the capture CLI.

use crate::core::types::TaskStatus;

/// Task succeeded or a listing command completed.
pub const OK: i32 = 0;
/// Invalid input/config, or the task status is `FAILED`.
pub const FAILED: i32 = 1;
/// A step hit an unrecoverable error; a partial manifest was written.
pub const PARTIAL: i32 = 2;
/// The global task timeout fired; a partial manifest was written.
pub const TIMED_OUT: i32 = 3;

pub fn for_status(status: TaskStatus) -> i32 {
    match status {
        TaskStatus::Success => OK,
        TaskStatus::Partial => PARTIAL,
        TaskStatus::TimedOut => TIMED_OUT,
        TaskStatus::Failed => FAILED,
    }
}
