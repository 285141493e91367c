// src/models/grading.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::question::QuestionType;

/// Query parameters narrowing the ungraded queue.
#[derive(Debug, Default, Deserialize)]
pub struct UngradedFilter {
    pub section_index: Option<usize>,
    pub question_id: Option<String>,
}

/// One student's pending answer to a subjective question.
#[derive(Debug, Serialize, Deserialize)]
pub struct UngradedAnswer {
    pub attempt_id: String,
    pub student_id: String,
    pub answer: Option<serde_json::Value>,
    pub answered_at: Option<DateTime<Utc>>,
    pub max_marks: f64,
}

/// Pending answers grouped under the question they answer.
#[derive(Debug, Serialize, Deserialize)]
pub struct UngradedQuestionGroup {
    pub question_id: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub content: String,
    pub section_index: usize,
    pub answers: Vec<UngradedAnswer>,
}

/// DTO for grading a single answer.
#[derive(Debug, Deserialize, Validate)]
pub struct GradeAnswerRequest {
    pub marks: f64,
    #[validate(length(max = 5000))]
    pub feedback: Option<String>,
}

/// One tuple in a bulk grading request. Validated on its own so a bad
/// tuple is skipped without failing the batch.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BulkGradeItem {
    pub attempt_id: String,
    pub marks: f64,
    #[validate(length(max = 5000))]
    pub feedback: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BulkGradeRequest {
    #[validate(length(min = 1, max = 1000))]
    pub grades: Vec<BulkGradeItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkGradeResponse {
    pub graded: usize,
}

/// Outcome of a successful finalization.
#[derive(Debug, Serialize, Deserialize)]
pub struct FinalizeResponse {
    pub test_id: String,
    /// Attempts moved to `graded` by this call.
    pub graded: usize,
    /// Attempts on the test that were already `graded` before this call,
    /// from any earlier finalization, and were left untouched.
    pub skipped: usize,
    /// Size of the ranked population.
    pub ranked: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RankResponse {
    pub test_id: String,
    pub ranked: usize,
}
