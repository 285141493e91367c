// src/engine/evaluation.rs

// Machine marking of objective answers once an attempt is closed.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;

use crate::models::{
    attempt::{AnswerEntry, Attempt},
    question::{Question, QuestionType},
    test::TestDefinition,
};

const DEFAULT_TOLERANCE: f64 = 1e-9;

fn as_index(v: &Value) -> Option<usize> {
    match v {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Maps a displayed option position back to the authored index.
fn authored(position: usize, order: Option<&Vec<usize>>) -> Option<usize> {
    match order {
        Some(order) => order.get(position).copied(),
        None => Some(position),
    }
}

fn index_set(v: &Value) -> Option<BTreeSet<usize>> {
    match v {
        Value::Array(items) => items.iter().map(as_index).collect(),
        other => as_index(other).map(|i| BTreeSet::from([i])),
    }
}

/// Whether `payload` matches the key of `question`. `None` when the question
/// carries no usable key.
fn is_correct(question: &Question, payload: &Value, order: Option<&Vec<usize>>) -> Option<bool> {
    let key = question.correct_answer.as_ref()?;

    let verdict = match question.question_type {
        QuestionType::TrueFalse if key.is_boolean() => payload.as_bool() == key.as_bool(),
        QuestionType::SingleChoice | QuestionType::TrueFalse => {
            let chosen = as_index(payload).and_then(|p| authored(p, order));
            chosen.is_some() && chosen == as_index(key)
        }
        QuestionType::MultipleChoice => {
            let chosen: Option<BTreeSet<usize>> = index_set(payload)
                .and_then(|set| set.into_iter().map(|p| authored(p, order)).collect());
            chosen.is_some() && chosen == index_set(key)
        }
        QuestionType::Numerical => match (as_number(payload), as_number(key)) {
            (Some(given), Some(expected)) => {
                (given - expected).abs() <= question.tolerance.unwrap_or(DEFAULT_TOLERANCE)
            }
            _ => false,
        },
        QuestionType::FillBlank => {
            let given = payload.as_str().map(|s| s.trim().to_lowercase());
            let accepted: Vec<String> = match key {
                Value::Array(items) => items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(|s| s.trim().to_lowercase())
                    .collect(),
                Value::String(s) => vec![s.trim().to_lowercase()],
                _ => vec![],
            };
            given.is_some_and(|g| accepted.contains(&g))
        }
        _ => return None,
    };
    Some(verdict)
}

fn is_blank(payload: Option<&Value>) -> bool {
    match payload {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        _ => false,
    }
}

/// Marks a closed attempt.
///
/// * Questions never touched get an empty entry worth 0.
/// * Blank answers score 0 and stay `is_correct = None`.
/// * Answered objective questions are compared with their key.
/// * Answered subjective questions are left for a human grader.
///
/// Entries that already carry `marks_awarded` are not re-marked.
pub fn evaluate_attempt(attempt: &mut Attempt, test: &TestDefinition, questions: &HashMap<String, Question>) {
    for qid in attempt.question_order.clone() {
        if attempt.answer(&qid).is_some() {
            continue;
        }
        let (Some(q), Some(section_index)) = (questions.get(&qid), test.section_of(&qid)) else {
            continue;
        };
        attempt.answers.push(AnswerEntry {
            question_id: qid.clone(),
            section_index,
            answer: None,
            is_correct: None,
            marks_awarded: None,
            max_marks: q.marks,
            time_spent: 0,
            flagged: false,
            answered_at: None,
            feedback: None,
        });
    }

    let option_orders = attempt.option_orders.clone();
    for entry in attempt.answers.iter_mut() {
        if entry.marks_awarded.is_some() {
            continue;
        }
        if is_blank(entry.answer.as_ref()) {
            entry.marks_awarded = Some(0.0);
            continue;
        }
        let Some(q) = questions.get(&entry.question_id) else {
            continue;
        };
        if q.question_type.is_subjective() {
            continue;
        }
        let Some(payload) = entry.answer.as_ref() else {
            continue;
        };
        if let Some(correct) = is_correct(q, payload, option_orders.get(&q.id)) {
            entry.is_correct = Some(correct);
            entry.marks_awarded = Some(if correct { entry.max_marks } else { 0.0 });
        }
    }
}
