// src/engine/submission.rs

// Closing a live attempt, by the student or by the system.

use chrono::{DateTime, Utc};

use crate::{
    engine::navigator,
    error::AppError,
    models::attempt::{Attempt, AttemptStatus},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitKind {
    /// Student pressed submit.
    Manual,
    /// Timeout or scheduler.
    Auto,
}

/// Moves an in-progress attempt to `submitted` / `auto_submitted` and locks
/// every section. Does not score.
pub fn close_attempt(attempt: &mut Attempt, kind: SubmitKind, now: DateTime<Utc>) -> Result<(), AppError> {
    if attempt.status != AttemptStatus::InProgress {
        return Err(AppError::NotFound("No in-progress attempt found".to_string()));
    }

    attempt.status = match kind {
        SubmitKind::Manual => AttemptStatus::Submitted,
        SubmitKind::Auto => AttemptStatus::AutoSubmitted,
    };
    attempt.submitted_at = Some(now);
    navigator::lock_all(attempt, now);
    Ok(())
}
