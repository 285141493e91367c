// src/store/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    engine::ranking::RankedAttempt,
    error::AppError,
    models::{
        attempt::{Attempt, AttemptStatus},
        question::Question,
        test::TestDefinition,
    },
    store::{AnalyticsNotifier, AttemptStore, ClassDirectory, PerformanceLedger, QuestionBank, TestCatalog},
};

/// Rolling counters kept per question.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionPerformance {
    pub total_attempts: u64,
    pub correct_attempts: u64,
    pub last_attempted_at: Option<DateTime<Utc>>,
}

/// In-process implementation of every storage port, for tests and local runs.
#[derive(Default)]
pub struct MemoryStore {
    attempts: RwLock<HashMap<String, Attempt>>,
    tests: RwLock<HashMap<String, TestDefinition>>,
    questions: RwLock<HashMap<String, Question>>,
    classes: RwLock<HashMap<String, Vec<String>>>,
    performance: RwLock<HashMap<String, QuestionPerformance>>,
    analytics: RwLock<Vec<(String, String)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_test(&self, test: TestDefinition) {
        self.tests.write().await.insert(test.id.clone(), test);
    }

    pub async fn put_question(&self, question: Question) {
        self.questions.write().await.insert(question.id.clone(), question);
    }

    pub async fn add_class_member(&self, class_id: &str, student_id: &str) {
        self.classes
            .write()
            .await
            .entry(student_id.to_string())
            .or_default()
            .push(class_id.to_string());
    }

    pub async fn performance(&self, question_id: &str) -> Option<QuestionPerformance> {
        self.performance.read().await.get(question_id).cloned()
    }

    /// (student, test) pairs queued for analytics, in request order.
    pub async fn analytics_requests(&self) -> Vec<(String, String)> {
        self.analytics.read().await.clone()
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn insert(&self, attempt: &Attempt) -> Result<(), AppError> {
        let mut attempts = self.attempts.write().await;
        let taken = attempts.values().any(|a| {
            a.test_id == attempt.test_id
                && a.student_id == attempt.student_id
                && a.attempt_number == attempt.attempt_number
        });
        if taken || attempts.contains_key(&attempt.id) {
            return Err(AppError::Conflict(format!(
                "Attempt {} for this test already exists",
                attempt.attempt_number
            )));
        }
        attempts.insert(attempt.id.clone(), attempt.clone());
        Ok(())
    }

    async fn save(&self, attempt: &Attempt) -> Result<(), AppError> {
        let mut attempts = self.attempts.write().await;
        match attempts.get_mut(&attempt.id) {
            Some(stored) => {
                *stored = attempt.clone();
                Ok(())
            }
            None => Err(AppError::NotFound("Attempt not found".to_string())),
        }
    }

    async fn find(&self, attempt_id: &str) -> Result<Option<Attempt>, AppError> {
        Ok(self.attempts.read().await.get(attempt_id).cloned())
    }

    async fn find_in_progress(&self, test_id: &str, student_id: &str) -> Result<Option<Attempt>, AppError> {
        Ok(self
            .attempts
            .read()
            .await
            .values()
            .filter(|a| {
                a.test_id == test_id && a.student_id == student_id && a.status == AttemptStatus::InProgress
            })
            .max_by_key(|a| a.attempt_number)
            .cloned())
    }

    async fn count_for_student(&self, test_id: &str, student_id: &str) -> Result<u32, AppError> {
        Ok(self
            .attempts
            .read()
            .await
            .values()
            .filter(|a| a.test_id == test_id && a.student_id == student_id)
            .count() as u32)
    }

    async fn list_for_test(&self, test_id: &str, statuses: &[AttemptStatus]) -> Result<Vec<Attempt>, AppError> {
        let mut found: Vec<Attempt> = self
            .attempts
            .read()
            .await
            .values()
            .filter(|a| a.test_id == test_id && statuses.contains(&a.status))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn page_for_test(
        &self,
        test_id: &str,
        status: Option<AttemptStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Attempt>, AppError> {
        let mut found: Vec<Attempt> = self
            .attempts
            .read()
            .await
            .values()
            .filter(|a| a.test_id == test_id && status.is_none_or(|s| a.status == s))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.started_at.cmp(&a.started_at).then_with(|| a.id.cmp(&b.id)));
        Ok(found
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn save_rankings(&self, rankings: &[RankedAttempt]) -> Result<(), AppError> {
        let mut attempts = self.attempts.write().await;
        for ranked in rankings {
            if let Some(result) = attempts
                .get_mut(&ranked.attempt_id)
                .and_then(|a| a.result.as_mut())
            {
                result.rank = Some(ranked.rank);
                result.percentile = Some(ranked.percentile);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TestCatalog for MemoryStore {
    async fn get_test(&self, test_id: &str) -> Result<Option<TestDefinition>, AppError> {
        Ok(self.tests.read().await.get(test_id).cloned())
    }
}

#[async_trait]
impl QuestionBank for MemoryStore {
    async fn get_questions(&self, question_ids: &[String]) -> Result<Vec<Question>, AppError> {
        let questions = self.questions.read().await;
        Ok(question_ids
            .iter()
            .filter_map(|id| questions.get(id).cloned())
            .collect())
    }
}

#[async_trait]
impl ClassDirectory for MemoryStore {
    async fn classes_of(&self, student_id: &str) -> Result<Vec<String>, AppError> {
        Ok(self.classes.read().await.get(student_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl PerformanceLedger for MemoryStore {
    async fn record_outcome(&self, question_id: &str, correct: bool, at: DateTime<Utc>) -> Result<(), AppError> {
        let mut performance = self.performance.write().await;
        let counters = performance.entry(question_id.to_string()).or_default();
        counters.total_attempts += 1;
        if correct {
            counters.correct_attempts += 1;
        }
        counters.last_attempted_at = Some(at);
        Ok(())
    }
}

#[async_trait]
impl AnalyticsNotifier for MemoryStore {
    async fn request_recompute(&self, student_id: &str, test_id: &str) -> Result<(), AppError> {
        self.analytics
            .write()
            .await
            .push((student_id.to_string(), test_id.to_string()));
        Ok(())
    }
}
