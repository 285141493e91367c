// src/models/question.rs

use serde::{Deserialize, Serialize};

/// Question types that need a human grader.
pub const SUBJECTIVE_TYPES: [QuestionType; 4] = [
    QuestionType::ShortAnswer,
    QuestionType::LongAnswer,
    QuestionType::CreativeWriting,
    QuestionType::Essay,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    TrueFalse,
    Numerical,
    FillBlank,
    ShortAnswer,
    LongAnswer,
    CreativeWriting,
    Essay,
}

impl QuestionType {
    pub fn is_subjective(self) -> bool {
        SUBJECTIVE_TYPES.contains(&self)
    }

    /// Types whose options are presented to the student and may be shuffled.
    pub fn has_options(self) -> bool {
        matches!(
            self,
            QuestionType::SingleChoice | QuestionType::MultipleChoice | QuestionType::TrueFalse
        )
    }
}

/// Question metadata as stored in the question bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,

    #[serde(rename = "type")]
    pub question_type: QuestionType,

    /// The text content of the question.
    pub content: String,

    /// Option labels in authored order. Empty for free-response types.
    #[serde(default)]
    pub options: Vec<String>,

    /// Authored option index (or indices) for choice types, the value for
    /// numerical and fill-in types. Absent for subjective types.
    #[serde(default)]
    pub correct_answer: Option<serde_json::Value>,

    /// Accepted absolute error for numerical questions.
    #[serde(default)]
    pub tolerance: Option<f64>,

    #[serde(default)]
    pub solution: Option<String>,

    pub marks: f64,

    #[serde(default)]
    pub subject_id: Option<String>,
}

/// DTO for sending a question to a student (no answer key, no solution,
/// options already in the attempt's stored order).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub content: String,
    pub options: Vec<String>,
    pub marks: f64,
    pub section_index: usize,
}

impl PublicQuestion {
    /// Strips the answer key and renders options through `option_order`.
    pub fn from_question(q: &Question, option_order: Option<&Vec<usize>>, section_index: usize) -> Self {
        let options = match option_order {
            Some(order) => order
                .iter()
                .filter_map(|&i| q.options.get(i).cloned())
                .collect(),
            None => q.options.clone(),
        };

        Self {
            id: q.id.clone(),
            question_type: q.question_type,
            content: q.content.clone(),
            options,
            marks: q.marks,
            section_index,
        }
    }
}
