// src/engine/journal.rs

// Upsert semantics for answers and review flags on a live attempt.

use chrono::{DateTime, Utc};

use crate::{
    engine::navigator,
    error::AppError,
    models::{
        attempt::{AnswerEntry, Attempt, AttemptStatus},
        question::Question,
        test::TestDefinition,
    },
};

fn ensure_live(attempt: &Attempt) -> Result<(), AppError> {
    if attempt.status != AttemptStatus::InProgress {
        return Err(AppError::BadRequest("Attempt is no longer in progress".to_string()));
    }
    Ok(())
}

fn section_for(test: &TestDefinition, question_id: &str) -> Result<usize, AppError> {
    test.section_of(question_id)
        .ok_or_else(|| AppError::NotFound(format!("Question {} is not part of this test", question_id)))
}

fn stub(question: &Question, section_index: usize) -> AnswerEntry {
    AnswerEntry {
        question_id: question.id.clone(),
        section_index,
        answer: None,
        is_correct: None,
        marks_awarded: None,
        max_marks: question.marks,
        time_spent: 0,
        flagged: false,
        answered_at: None,
        feedback: None,
    }
}

/// Records `payload` for `question`.
///
/// A new entry captures `max_marks` from the question as it is now. An
/// existing entry only has its payload and timestamp replaced; grading
/// fields are left untouched. Last write wins.
pub fn record_answer(
    attempt: &mut Attempt,
    test: &TestDefinition,
    question: &Question,
    payload: serde_json::Value,
    time_spent: Option<u64>,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    ensure_live(attempt)?;
    let section_index = section_for(test, &question.id)?;
    navigator::ensure_answerable(attempt, test, section_index)?;

    let idx = match attempt.answers.iter().position(|a| a.question_id == question.id) {
        Some(idx) => idx,
        None => {
            attempt.answers.push(stub(question, section_index));
            attempt.answers.len() - 1
        }
    };
    let entry = &mut attempt.answers[idx];

    entry.answer = Some(payload);
    entry.answered_at = Some(now);
    entry.time_spent += time_spent.unwrap_or(0);

    attempt.auto_saved_at = Some(now);
    Ok(())
}

/// Sets or clears the review flag, creating an empty entry to carry it if needed.
pub fn flag_question(
    attempt: &mut Attempt,
    test: &TestDefinition,
    question: &Question,
    flagged: bool,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    ensure_live(attempt)?;
    let section_index = section_for(test, &question.id)?;
    navigator::ensure_answerable(attempt, test, section_index)?;

    match attempt.answer_mut(&question.id) {
        Some(entry) => entry.flagged = flagged,
        None => {
            let mut entry = stub(question, section_index);
            entry.flagged = flagged;
            attempt.answers.push(entry);
        }
    }

    attempt.auto_saved_at = Some(now);
    Ok(())
}
