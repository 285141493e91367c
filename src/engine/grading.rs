// src/engine/grading.rs

// Manual grading of subjective answers and the finalization gate.

use std::collections::HashMap;

use crate::{
    error::AppError,
    models::{
        attempt::{AnswerEntry, Attempt},
        grading::{UngradedAnswer, UngradedFilter, UngradedQuestionGroup},
        question::Question,
        test::TestDefinition,
    },
};

/// Awards `marks` to `entry`. Marks must lie in `0..=max_marks`.
pub fn apply_grade(entry: &mut AnswerEntry, marks: f64, feedback: Option<String>) -> Result<(), AppError> {
    if !marks.is_finite() || marks < 0.0 || marks > entry.max_marks {
        return Err(AppError::BadRequest(format!(
            "Marks must be between 0 and {} for question {}",
            entry.max_marks, entry.question_id
        )));
    }
    entry.marks_awarded = Some(marks);
    entry.is_correct = Some(marks > 0.0);
    entry.feedback = feedback;
    Ok(())
}

fn is_pending(entry: &AnswerEntry, questions: &HashMap<String, Question>) -> bool {
    entry.marks_awarded.is_none()
        && questions
            .get(&entry.question_id)
            .is_some_and(|q| q.question_type.is_subjective())
}

/// The first attempt still holding an unmarked subjective answer.
pub fn first_blocking<'a>(attempts: &'a [Attempt], questions: &HashMap<String, Question>) -> Option<&'a Attempt> {
    attempts
        .iter()
        .find(|a| a.answers.iter().any(|e| is_pending(e, questions)))
}

/// Groups every unmarked subjective answer under its question, in the
/// test's authored question order.
pub fn ungraded_groups(
    test: &TestDefinition,
    attempts: &[Attempt],
    questions: &HashMap<String, Question>,
    filter: &UngradedFilter,
) -> Vec<UngradedQuestionGroup> {
    let mut groups = Vec::new();

    for (section_index, section) in test.sections.iter().enumerate() {
        if filter.section_index.is_some_and(|s| s != section_index) {
            continue;
        }
        for qid in &section.question_ids {
            if filter.question_id.as_ref().is_some_and(|f| f != qid) {
                continue;
            }
            let Some(question) = questions.get(qid) else {
                continue;
            };
            if !question.question_type.is_subjective() {
                continue;
            }

            let answers: Vec<UngradedAnswer> = attempts
                .iter()
                .filter_map(|a| {
                    let entry = a.answer(qid)?;
                    entry.marks_awarded.is_none().then(|| UngradedAnswer {
                        attempt_id: a.id.clone(),
                        student_id: a.student_id.clone(),
                        answer: entry.answer.clone(),
                        answered_at: entry.answered_at,
                        max_marks: entry.max_marks,
                    })
                })
                .collect();

            if !answers.is_empty() {
                groups.push(UngradedQuestionGroup {
                    question_id: qid.clone(),
                    question_type: question.question_type,
                    content: question.content.clone(),
                    section_index,
                    answers,
                });
            }
        }
    }

    groups
}
