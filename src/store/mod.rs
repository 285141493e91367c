// src/store/mod.rs

// Storage ports.
//
// The attempt aggregate is owned by `AttemptStore`. Test definitions,
// questions and class membership are read-only collaborators; performance
// counters and analytics requests are write-only side channels.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    engine::ranking::RankedAttempt,
    error::AppError,
    models::{
        attempt::{Attempt, AttemptStatus},
        question::Question,
        test::TestDefinition,
    },
};

#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Inserts a new attempt. Fails with `Conflict` if the
    /// (test, student, attempt number) slot is already taken.
    async fn insert(&self, attempt: &Attempt) -> Result<(), AppError>;

    /// Overwrites the stored aggregate. Last write wins.
    async fn save(&self, attempt: &Attempt) -> Result<(), AppError>;

    async fn find(&self, attempt_id: &str) -> Result<Option<Attempt>, AppError>;

    async fn find_in_progress(&self, test_id: &str, student_id: &str) -> Result<Option<Attempt>, AppError>;

    async fn count_for_student(&self, test_id: &str, student_id: &str) -> Result<u32, AppError>;

    /// Every attempt on `test_id` whose status is in `statuses`.
    async fn list_for_test(&self, test_id: &str, statuses: &[AttemptStatus]) -> Result<Vec<Attempt>, AppError>;

    /// One page of a test's attempts, newest first.
    async fn page_for_test(
        &self,
        test_id: &str,
        status: Option<AttemptStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Attempt>, AppError>;

    /// Writes rank and percentile onto each attempt's result in one batch.
    async fn save_rankings(&self, rankings: &[RankedAttempt]) -> Result<(), AppError>;
}

#[async_trait]
pub trait TestCatalog: Send + Sync {
    async fn get_test(&self, test_id: &str) -> Result<Option<TestDefinition>, AppError>;
}

#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// Missing ids are silently absent from the result.
    async fn get_questions(&self, question_ids: &[String]) -> Result<Vec<Question>, AppError>;
}

#[async_trait]
pub trait ClassDirectory: Send + Sync {
    async fn classes_of(&self, student_id: &str) -> Result<Vec<String>, AppError>;
}

/// Rolling per-question counters owned by the question bank.
#[async_trait]
pub trait PerformanceLedger: Send + Sync {
    async fn record_outcome(&self, question_id: &str, correct: bool, at: DateTime<Utc>) -> Result<(), AppError>;
}

/// Asks the analytics side to recompute a student's snapshot.
#[async_trait]
pub trait AnalyticsNotifier: Send + Sync {
    async fn request_recompute(&self, student_id: &str, test_id: &str) -> Result<(), AppError>;
}
