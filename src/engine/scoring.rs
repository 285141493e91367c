// src/engine/scoring.rs

// Section, subject and overall scoring of an attempt. Pure; rank and
// percentile are left empty for the ranking pass.

use std::collections::{BTreeMap, HashMap};

use crate::models::{
    attempt::{AnswerEntry, Attempt, AttemptResult, SectionScore, SubjectScore},
    question::Question,
    test::TestDefinition,
};

const UNKNOWN_SUBJECT: &str = "unknown";

/// `obtained / total` as a percentage rounded to two decimals; 0 when `total` is 0.
pub fn percentage(obtained: f64, total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    (obtained / total * 10000.0).round() / 100.0
}

/// Fixed grade bands.
pub fn grade_for(percentage: f64) -> &'static str {
    match percentage {
        p if p >= 90.0 => "A+",
        p if p >= 80.0 => "A",
        p if p >= 70.0 => "B",
        p if p >= 60.0 => "C",
        p if p >= 50.0 => "D",
        _ => "F",
    }
}

#[derive(Default, Clone, Copy)]
struct Tally {
    total: f64,
    obtained: f64,
}

impl Tally {
    fn add(&mut self, entry: &AnswerEntry) {
        self.total += entry.max_marks;
        self.obtained += entry.marks_awarded.unwrap_or(0.0);
    }
}

/// Scores `attempt` against `test`. Unmarked answers count as 0.
pub fn compute_result(
    attempt: &Attempt,
    test: &TestDefinition,
    questions: &HashMap<String, Question>,
    default_passing_score: f64,
) -> AttemptResult {
    let mut overall = Tally::default();
    let mut sections = vec![Tally::default(); test.sections.len()];
    let mut subjects: BTreeMap<String, Tally> = BTreeMap::new();
    let mut objective_marks = 0.0;
    let mut subjective_marks = 0.0;

    for entry in &attempt.answers {
        overall.add(entry);
        if let Some(tally) = sections.get_mut(entry.section_index) {
            tally.add(entry);
        }

        let question = questions.get(&entry.question_id);
        let subject = question
            .and_then(|q| q.subject_id.clone())
            .unwrap_or_else(|| UNKNOWN_SUBJECT.to_string());
        subjects.entry(subject).or_default().add(entry);

        let awarded = entry.marks_awarded.unwrap_or(0.0);
        if question.is_some_and(|q| q.question_type.is_subjective()) {
            subjective_marks += awarded;
        } else {
            objective_marks += awarded;
        }
    }

    let overall_pct = percentage(overall.obtained, overall.total);
    let passing_score = test.passing_score.unwrap_or(default_passing_score);

    AttemptResult {
        total_marks: overall.total,
        marks_obtained: overall.obtained,
        percentage: overall_pct,
        grade: grade_for(overall_pct).to_string(),
        rank: None,
        percentile: None,
        section_scores: sections
            .into_iter()
            .enumerate()
            .map(|(i, t)| SectionScore {
                section_index: i,
                total_marks: t.total,
                marks_obtained: t.obtained,
                percentage: percentage(t.obtained, t.total),
            })
            .collect(),
        subject_scores: subjects
            .into_iter()
            .map(|(subject_id, t)| SubjectScore {
                subject_id,
                total_marks: t.total,
                marks_obtained: t.obtained,
                percentage: percentage(t.obtained, t.total),
            })
            .collect(),
        objective_marks,
        subjective_marks,
        is_passing: overall_pct >= passing_score,
    }
}
