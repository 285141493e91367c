// src/models/test.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery mode of a test. Decides the access window rules and whether
/// sections are navigated strictly in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestMode {
    LiveMock,
    AnytimeMock,
    Practice,
    SectionTimed,
    Classroom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Draft,
    Scheduled,
    Live,
    Completed,
    Archived,
}

/// One ordered block of questions, optionally with its own time limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionDef {
    pub name: String,
    pub question_ids: Vec<String>,
    #[serde(default)]
    pub time_limit_minutes: Option<u32>,
}

/// Read-only view of a test definition as authored elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestDefinition {
    pub id: String,
    #[serde(default)]
    pub org_id: Option<String>,
    pub title: String,
    pub mode: TestMode,
    pub status: TestStatus,

    /// Scheduling window (live mocks).
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Earliest start for anytime mocks.
    #[serde(default)]
    pub available_from: Option<DateTime<Utc>>,
    /// Whole-test duration. `None` means untimed.
    #[serde(default)]
    pub duration_minutes: Option<u32>,

    pub sections: Vec<SectionDef>,

    #[serde(default)]
    pub assigned_student_ids: Vec<String>,
    #[serde(default)]
    pub assigned_class_ids: Vec<String>,
    #[serde(default)]
    pub is_public: bool,

    #[serde(default)]
    pub requires_manual_grading: bool,
    #[serde(default)]
    pub passing_score: Option<f64>,
    #[serde(default)]
    pub randomize_questions: bool,
    #[serde(default)]
    pub randomize_options: bool,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl TestDefinition {
    pub fn is_section_timed(&self) -> bool {
        self.mode == TestMode::SectionTimed
    }

    /// All question ids in authored order, section after section.
    pub fn all_question_ids(&self) -> Vec<String> {
        self.sections
            .iter()
            .flat_map(|s| s.question_ids.iter().cloned())
            .collect()
    }

    /// Index of the section owning `question_id`, if any.
    pub fn section_of(&self, question_id: &str) -> Option<usize> {
        self.sections
            .iter()
            .position(|s| s.question_ids.iter().any(|q| q == question_id))
    }
}
