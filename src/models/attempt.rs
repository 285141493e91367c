// src/models/attempt.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::question::PublicQuestion;

/// Lifecycle of an attempt. Only ever advances:
/// `in_progress -> submitted | auto_submitted -> graded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    AutoSubmitted,
    Graded,
}

impl AttemptStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Submitted => "submitted",
            AttemptStatus::AutoSubmitted => "auto_submitted",
            AttemptStatus::Graded => "graded",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in_progress" => Some(AttemptStatus::InProgress),
            "submitted" => Some(AttemptStatus::Submitted),
            "auto_submitted" => Some(AttemptStatus::AutoSubmitted),
            "graded" => Some(AttemptStatus::Graded),
            _ => None,
        }
    }

    /// Submitted by the student or by the system, awaiting finalization.
    pub fn is_closed_ungraded(self) -> bool {
        matches!(self, AttemptStatus::Submitted | AttemptStatus::AutoSubmitted)
    }
}

/// One answer (or flag stub) recorded against a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerEntry {
    pub question_id: String,
    pub section_index: usize,
    /// Raw payload. Choice questions carry displayed option positions.
    pub answer: Option<serde_json::Value>,
    pub is_correct: Option<bool>,
    pub marks_awarded: Option<f64>,
    /// Captured when the entry is created; never updated afterwards.
    pub max_marks: f64,
    /// Seconds.
    #[serde(default)]
    pub time_spent: u64,
    #[serde(default)]
    pub flagged: bool,
    pub answered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub feedback: Option<String>,
}

/// Per-section progress. Not started while `started_at` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionProgress {
    pub section_index: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Seconds.
    #[serde(default)]
    pub time_spent: u64,
    #[serde(default)]
    pub is_locked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionScore {
    pub section_index: usize,
    pub total_marks: f64,
    pub marks_obtained: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectScore {
    pub subject_id: String,
    pub total_marks: f64,
    pub marks_obtained: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptResult {
    pub total_marks: f64,
    pub marks_obtained: f64,
    pub percentage: f64,
    pub grade: String,
    pub rank: Option<u32>,
    pub percentile: Option<f64>,
    pub section_scores: Vec<SectionScore>,
    pub subject_scores: Vec<SubjectScore>,
    pub objective_marks: f64,
    pub subjective_marks: f64,
    pub is_passing: bool,
}

/// The attempt aggregate: one student's try at one test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: String,
    pub test_id: String,
    pub student_id: String,
    #[serde(default)]
    pub org_id: Option<String>,
    /// 1-based, strictly increasing per (student, test).
    pub attempt_number: u32,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub current_section_index: usize,
    pub sections: Vec<SectionProgress>,
    pub answers: Vec<AnswerEntry>,
    /// Full permutation of the test's question ids, fixed at creation.
    pub question_order: Vec<String>,
    /// question id -> permutation of authored option indices.
    #[serde(default)]
    pub option_orders: HashMap<String, Vec<usize>>,
    pub result: Option<AttemptResult>,
    pub graded_by: Option<String>,
    pub graded_at: Option<DateTime<Utc>>,
    pub auto_saved_at: Option<DateTime<Utc>>,
}

impl Attempt {
    pub fn answer(&self, question_id: &str) -> Option<&AnswerEntry> {
        self.answers.iter().find(|a| a.question_id == question_id)
    }

    pub fn answer_mut(&mut self, question_id: &str) -> Option<&mut AnswerEntry> {
        self.answers.iter_mut().find(|a| a.question_id == question_id)
    }
}

/// Query parameters for listing a test's attempts.
#[derive(Debug, Deserialize)]
pub struct AttemptListParams {
    pub status: Option<AttemptStatus>,
    /// Number of items to return (default: 50, max: 200).
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Compact row for grader listings.
#[derive(Debug, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub id: String,
    pub student_id: String,
    pub attempt_number: u32,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub marks_obtained: Option<f64>,
    pub percentage: Option<f64>,
    pub grade: Option<String>,
    pub rank: Option<u32>,
}

impl From<&Attempt> for AttemptSummary {
    fn from(a: &Attempt) -> Self {
        Self {
            id: a.id.clone(),
            student_id: a.student_id.clone(),
            attempt_number: a.attempt_number,
            status: a.status,
            started_at: a.started_at,
            submitted_at: a.submitted_at,
            marks_obtained: a.result.as_ref().map(|r| r.marks_obtained),
            percentage: a.result.as_ref().map(|r| r.percentage),
            grade: a.result.as_ref().map(|r| r.grade.clone()),
            rank: a.result.as_ref().and_then(|r| r.rank),
        }
    }
}

/// Live view of an attempt with its questions, as returned to the student.
#[derive(Debug, Serialize, Deserialize)]
pub struct AttemptStateResponse {
    pub attempt: Attempt,
    pub questions: Vec<PublicQuestion>,
    /// Seconds left on the whole-test clock, if the test is timed.
    pub time_remaining: Option<i64>,
    pub expired: bool,
}

/// Timing view of one section.
#[derive(Debug, Serialize, Deserialize)]
pub struct SectionStatus {
    pub section_index: usize,
    pub name: String,
    pub state: SectionState,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub time_spent: u64,
    pub time_limit_minutes: Option<u32>,
    pub time_remaining: Option<i64>,
    pub expired: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionState {
    NotStarted,
    Active,
    Locked,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SectionStatusResponse {
    pub current_section_index: usize,
    pub sections: Vec<SectionStatus>,
}

/// DTO for recording an answer.
#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub question_id: String,
    pub answer: serde_json::Value,
    /// Seconds spent since the previous save of this question.
    pub time_spent: Option<u64>,
}

/// DTO for flagging a question for review.
#[derive(Debug, Deserialize)]
pub struct FlagQuestionRequest {
    pub question_id: String,
    #[serde(default = "default_flagged")]
    pub flagged: bool,
}

fn default_flagged() -> bool {
    true
}
