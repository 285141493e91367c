// src/engine/navigator.rs

// Strict, time-bound section progression for section-timed tests.

use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        attempt::{Attempt, AttemptStatus, SectionProgress, SectionState, SectionStatus, SectionStatusResponse},
        test::TestDefinition,
    },
};

fn elapsed_secs(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    (to - from).num_seconds().max(0) as u64
}

/// Builds the progress skeleton, one entry per test section.
///
/// In section-timed mode only section 0 is activated; elsewhere every
/// section is open from the start.
pub fn init_sections(test: &TestDefinition, now: DateTime<Utc>) -> Vec<SectionProgress> {
    let timed = test.is_section_timed();
    (0..test.sections.len())
        .map(|i| SectionProgress {
            section_index: i,
            started_at: if !timed || i == 0 { Some(now) } else { None },
            completed_at: None,
            time_spent: 0,
            is_locked: false,
        })
        .collect()
}

fn lock_section(section: &mut SectionProgress, now: DateTime<Utc>) {
    if section.is_locked {
        return;
    }
    if let Some(started) = section.started_at {
        section.time_spent = elapsed_secs(started, now);
    }
    section.is_locked = true;
    section.completed_at.get_or_insert(now);
}

/// Locks the current section and activates `next`.
///
/// `next` must be exactly `current_section_index + 1`; the previous section is
/// locked even if its own time limit was not used up.
pub fn start_section(
    attempt: &mut Attempt,
    test: &TestDefinition,
    next: usize,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if !test.is_section_timed() {
        return Err(AppError::BadRequest(
            "Section navigation is only available in section-timed tests".to_string(),
        ));
    }
    if attempt.status != AttemptStatus::InProgress {
        return Err(AppError::BadRequest("Attempt is no longer in progress".to_string()));
    }
    if next != attempt.current_section_index + 1 {
        return Err(AppError::BadRequest(format!(
            "Cannot start section {}: sections must be taken in order (current is {})",
            next, attempt.current_section_index
        )));
    }
    if next >= attempt.sections.len() {
        return Err(AppError::BadRequest(format!("Section {} does not exist", next)));
    }

    let current = attempt.current_section_index;
    lock_section(&mut attempt.sections[current], now);

    let section = &mut attempt.sections[next];
    section.started_at = Some(now);
    attempt.current_section_index = next;
    Ok(())
}

/// Rejects answers that target anything but the active, unlocked section
/// in section-timed mode. Other modes accept any section.
pub fn ensure_answerable(
    attempt: &Attempt,
    test: &TestDefinition,
    section_index: usize,
) -> Result<(), AppError> {
    if !test.is_section_timed() {
        return Ok(());
    }
    let section = attempt
        .sections
        .get(section_index)
        .ok_or_else(|| AppError::BadRequest(format!("Section {} does not exist", section_index)))?;

    if section.is_locked {
        return Err(AppError::BadRequest(format!("Section {} is locked", section_index)));
    }
    if section_index != attempt.current_section_index || section.started_at.is_none() {
        return Err(AppError::BadRequest(format!(
            "Section {} is not the active section",
            section_index
        )));
    }
    Ok(())
}

/// Locks every section, backfilling `completed_at` where missing.
pub fn lock_all(attempt: &mut Attempt, now: DateTime<Utc>) {
    for section in &mut attempt.sections {
        lock_section(section, now);
    }
}

/// Seconds left on the whole-test clock, or `None` if the test is untimed.
pub fn time_remaining(attempt: &Attempt, test: &TestDefinition, now: DateTime<Utc>) -> Option<i64> {
    let minutes = test.duration_minutes?;
    let deadline = attempt.started_at + chrono::Duration::minutes(minutes as i64);
    Some((deadline - now).num_seconds().max(0))
}

/// Wall-clock derived view of every section.
pub fn section_status(attempt: &Attempt, test: &TestDefinition, now: DateTime<Utc>) -> SectionStatusResponse {
    let sections = attempt
        .sections
        .iter()
        .map(|p| {
            let def = test.sections.get(p.section_index);
            let time_limit_minutes = def.and_then(|d| d.time_limit_minutes);

            let state = if p.is_locked {
                SectionState::Locked
            } else if p.started_at.is_some() {
                SectionState::Active
            } else {
                SectionState::NotStarted
            };

            let time_remaining = match (state, p.started_at, time_limit_minutes) {
                (SectionState::Active, Some(started), Some(limit)) => {
                    let used = elapsed_secs(started, now) as i64;
                    Some((limit as i64 * 60 - used).max(0))
                }
                _ => None,
            };

            SectionStatus {
                section_index: p.section_index,
                name: def.map(|d| d.name.clone()).unwrap_or_default(),
                state,
                started_at: p.started_at,
                completed_at: p.completed_at,
                time_spent: match (state, p.started_at) {
                    (SectionState::Active, Some(started)) => elapsed_secs(started, now),
                    _ => p.time_spent,
                },
                time_limit_minutes,
                time_remaining,
                expired: time_remaining == Some(0),
            }
        })
        .collect();

    SectionStatusResponse {
        current_section_index: attempt.current_section_index,
        sections,
    }
}
