// src/services/mod.rs

// Load → pure transform → persist pipelines behind the HTTP handlers.
//
// Every mutation reads the aggregate, changes it in memory through the
// `engine` functions and writes it back. There is no version check, so
// two writers racing on the same attempt end with the later write.

pub mod grading;
pub mod session;
pub mod submission;

use std::{collections::HashMap, sync::Arc};

use rand::{SeedableRng, rngs::StdRng};
use tokio::sync::Mutex;

use crate::{
    config::Config,
    error::AppError,
    models::{attempt::Attempt, question::Question, test::TestDefinition},
    store::{AnalyticsNotifier, AttemptStore, ClassDirectory, PerformanceLedger, QuestionBank, TestCatalog},
    utils::jwt::Claims,
};

/// Who is calling, as far as the engine cares.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: String,
    pub org_id: Option<String>,
    pub is_grader: bool,
}

impl From<&Claims> for Actor {
    fn from(claims: &Claims) -> Self {
        Self {
            user_id: claims.sub.clone(),
            org_id: claims.org.clone(),
            is_grader: claims.is_grader(),
        }
    }
}

/// Tunables that are not part of a test definition.
#[derive(Debug, Clone, Copy)]
pub struct Defaults {
    pub passing_score: f64,
    pub max_attempts: u32,
}

impl From<&Config> for Defaults {
    fn from(config: &Config) -> Self {
        Self {
            passing_score: config.default_passing_score,
            max_attempts: config.default_max_attempts,
        }
    }
}

pub struct AssessmentService {
    attempts: Arc<dyn AttemptStore>,
    tests: Arc<dyn TestCatalog>,
    questions: Arc<dyn QuestionBank>,
    classes: Arc<dyn ClassDirectory>,
    performance: Arc<dyn PerformanceLedger>,
    analytics: Arc<dyn AnalyticsNotifier>,
    rng: Mutex<StdRng>,
    defaults: Defaults,
}

impl AssessmentService {
    /// Wires every port to one store implementation.
    pub fn from_store<S>(store: Arc<S>, defaults: Defaults) -> Self
    where
        S: AttemptStore
            + TestCatalog
            + QuestionBank
            + ClassDirectory
            + PerformanceLedger
            + AnalyticsNotifier
            + 'static,
    {
        Self {
            attempts: store.clone(),
            tests: store.clone(),
            questions: store.clone(),
            classes: store.clone(),
            performance: store.clone(),
            analytics: store,
            rng: Mutex::new(StdRng::from_entropy()),
            defaults,
        }
    }

    /// Replaces the shuffle source, e.g. with a seeded generator.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    async fn load_test(&self, test_id: &str) -> Result<TestDefinition, AppError> {
        self.tests
            .get_test(test_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Test {} not found", test_id)))
    }

    async fn load_attempt(&self, attempt_id: &str) -> Result<Attempt, AppError> {
        self.attempts
            .find(attempt_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))
    }

    /// Loads an attempt for reading: the owner, or a grader of the test's organization.
    async fn load_readable(&self, attempt_id: &str, actor: &Actor) -> Result<(Attempt, TestDefinition), AppError> {
        let attempt = self.load_attempt(attempt_id).await?;
        let test = self.load_test(&attempt.test_id).await?;
        if attempt.student_id != actor.user_id {
            if !actor.is_grader {
                return Err(AppError::Forbidden("This attempt belongs to another student".to_string()));
            }
            ensure_same_org(&test, actor)?;
        }
        Ok((attempt, test))
    }

    /// Loads an attempt for mutation. Only the student taking it may change it.
    async fn load_own(&self, attempt_id: &str, actor: &Actor) -> Result<(Attempt, TestDefinition), AppError> {
        let attempt = self.load_attempt(attempt_id).await?;
        if attempt.student_id != actor.user_id {
            return Err(AppError::Forbidden("Only the student taking this attempt may change it".to_string()));
        }
        let test = self.load_test(&attempt.test_id).await?;
        Ok((attempt, test))
    }

    async fn question_map(&self, ids: &[String]) -> Result<HashMap<String, Question>, AppError> {
        Ok(self
            .questions
            .get_questions(ids)
            .await?
            .into_iter()
            .map(|q| (q.id.clone(), q))
            .collect())
    }
}

/// Graders only act on tests of their own organization.
fn ensure_same_org(test: &TestDefinition, actor: &Actor) -> Result<(), AppError> {
    match (&test.org_id, &actor.org_id) {
        (Some(test_org), Some(actor_org)) if test_org != actor_org => Err(AppError::Forbidden(
            "Test belongs to another organization".to_string(),
        )),
        _ => Ok(()),
    }
}
