//! Shared time budget helpers for deadline-bounded orchestration.

use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::time::Instant;

/// Return the remaining time budget until the provided deadline.
pub fn remaining_budget(deadline: Instant) -> Result<Duration> {
    let remaining = deadline
        .checked_duration_since(Instant::now())
        .unwrap_or(Duration::from_secs(0));
    if remaining.is_zero() {
        return Err(anyhow!("task deadline exceeded"));
    }
    Ok(remaining)
}

pub fn deadline_passed(deadline: Instant) -> bool {
    Instant::now() >= deadline
}
