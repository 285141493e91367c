// src/services/submission.rs

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    engine::{
        evaluation, scoring,
        submission::{self, SubmitKind},
    },
    error::AppError,
    models::{
        attempt::{Attempt, AttemptSummary},
        test::TestDefinition,
    },
    services::{Actor, AssessmentService, ensure_same_org},
};

#[derive(Debug, Serialize, Deserialize)]
pub struct AutoSubmitResponse {
    pub submitted: bool,
    /// The attempt closed by this call, if there was one to close.
    pub attempt_id: Option<String>,
}

impl AssessmentService {
    /// Manual submission. 404 unless the attempt is still in progress.
    pub async fn submit_test(&self, attempt_id: &str, actor: &Actor) -> Result<AttemptSummary, AppError> {
        let (mut attempt, test) = self.load_own(attempt_id, actor).await?;

        submission::close_attempt(&mut attempt, SubmitKind::Manual, Utc::now())?;
        self.mark_and_score(&mut attempt, &test).await?;
        self.attempts.save(&attempt).await?;

        tracing::info!("Attempt {} submitted by student {}", attempt.id, attempt.student_id);
        Ok(AttemptSummary::from(&attempt))
    }

    /// System-triggered submission of the student's live attempt on `test_id`.
    ///
    /// Succeeds silently when there is nothing to close, so a timer firing
    /// after a manual submit (or firing twice) is never an error. Closing
    /// another student's attempt takes a grader of the test's organization.
    pub async fn auto_submit(
        &self,
        test_id: &str,
        student_id: &str,
        actor: &Actor,
    ) -> Result<AutoSubmitResponse, AppError> {
        if student_id != actor.user_id {
            if !actor.is_grader {
                return Err(AppError::Forbidden(
                    "Only graders may submit for another student".to_string(),
                ));
            }
            ensure_same_org(&self.load_test(test_id).await?, actor)?;
        }

        let Some(mut attempt) = self.attempts.find_in_progress(test_id, student_id).await? else {
            tracing::debug!("Auto-submit for student {} on test {}: nothing in progress", student_id, test_id);
            return Ok(AutoSubmitResponse {
                submitted: true,
                attempt_id: None,
            });
        };
        let test = self.load_test(test_id).await?;

        if submission::close_attempt(&mut attempt, SubmitKind::Auto, Utc::now()).is_err() {
            return Ok(AutoSubmitResponse {
                submitted: true,
                attempt_id: None,
            });
        }
        self.mark_and_score(&mut attempt, &test).await?;
        self.attempts.save(&attempt).await?;

        tracing::info!("Attempt {} auto-submitted for student {}", attempt.id, student_id);
        Ok(AutoSubmitResponse {
            submitted: true,
            attempt_id: Some(attempt.id),
        })
    }

    /// Downstream of closing: machine-mark objective answers, then compute
    /// a result. Ungraded subjective answers count as 0 until finalization.
    async fn mark_and_score(&self, attempt: &mut Attempt, test: &TestDefinition) -> Result<(), AppError> {
        let questions = self.question_map(&attempt.question_order).await?;
        evaluation::evaluate_attempt(attempt, test, &questions);
        attempt.result = Some(scoring::compute_result(
            attempt,
            test,
            &questions,
            self.defaults.passing_score,
        ));
        Ok(())
    }
}
