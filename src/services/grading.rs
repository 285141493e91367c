// src/services/grading.rs

use std::sync::Arc;

use chrono::Utc;
use validator::Validate;

use crate::{
    engine::{grading, ranking, scoring},
    error::AppError,
    models::{
        attempt::{AnswerEntry, Attempt, AttemptListParams, AttemptStatus, AttemptSummary},
        grading::{
            BulkGradeRequest, FinalizeResponse, GradeAnswerRequest, RankResponse, UngradedFilter,
            UngradedQuestionGroup,
        },
        test::TestDefinition,
    },
    services::{Actor, AssessmentService, ensure_same_org},
    store::AnalyticsNotifier,
    utils::html::clean_html,
};

const CLOSED: [AttemptStatus; 2] = [AttemptStatus::Submitted, AttemptStatus::AutoSubmitted];

/// Statuses whose results make up the ranked population.
fn ranked_statuses(test: &TestDefinition) -> &'static [AttemptStatus] {
    if test.requires_manual_grading {
        &[AttemptStatus::Graded]
    } else {
        &CLOSED
    }
}

fn ensure_manual(test: &TestDefinition) -> Result<(), AppError> {
    if !test.requires_manual_grading {
        return Err(AppError::BadRequest(format!(
            "Test {} is machine graded and has no manual grading step",
            test.id
        )));
    }
    Ok(())
}

/// An attempt can take grades only between submission and finalization.
fn ensure_gradable(attempt: &Attempt) -> Result<(), AppError> {
    match attempt.status {
        AttemptStatus::InProgress => Err(AppError::BadRequest(format!(
            "Attempt {} is still in progress",
            attempt.id
        ))),
        AttemptStatus::Graded => Err(AppError::BadRequest(format!(
            "Attempt {} has already been finalized",
            attempt.id
        ))),
        AttemptStatus::Submitted | AttemptStatus::AutoSubmitted => Ok(()),
    }
}

impl AssessmentService {
    pub async fn get_ungraded_answers(
        &self,
        test_id: &str,
        actor: &Actor,
        filter: UngradedFilter,
    ) -> Result<Vec<UngradedQuestionGroup>, AppError> {
        let test = self.load_test(test_id).await?;
        ensure_same_org(&test, actor)?;

        let attempts = self.attempts.list_for_test(test_id, &CLOSED).await?;
        let questions = self.question_map(&test.all_question_ids()).await?;
        Ok(grading::ungraded_groups(&test, &attempts, &questions, &filter))
    }

    pub async fn grade_answer(
        &self,
        attempt_id: &str,
        question_id: &str,
        actor: &Actor,
        req: GradeAnswerRequest,
    ) -> Result<AnswerEntry, AppError> {
        if let Err(validation_errors) = req.validate() {
            return Err(AppError::BadRequest(validation_errors.to_string()));
        }

        let mut attempt = self.load_attempt(attempt_id).await?;
        let test = self.load_test(&attempt.test_id).await?;
        ensure_same_org(&test, actor)?;
        ensure_manual(&test)?;
        ensure_gradable(&attempt)?;

        let entry = attempt
            .answer_mut(question_id)
            .ok_or_else(|| AppError::NotFound(format!("No answer to question {} in this attempt", question_id)))?;
        grading::apply_grade(entry, req.marks, req.feedback.as_deref().map(clean_html))?;
        let graded = entry.clone();

        self.attempts.save(&attempt).await?;
        tracing::info!(
            "Answer {} on attempt {} graded {} by {}",
            question_id,
            attempt_id,
            req.marks,
            actor.user_id
        );
        Ok(graded)
    }

    /// Grades one question across many attempts. Tuples that fail validation,
    /// name a missing or closed-off attempt or answer, or carry out-of-range
    /// marks are skipped; only the number of applied grades is reported.
    pub async fn bulk_grade_question(
        &self,
        test_id: &str,
        question_id: &str,
        actor: &Actor,
        req: BulkGradeRequest,
    ) -> Result<usize, AppError> {
        if let Err(validation_errors) = req.validate() {
            return Err(AppError::BadRequest(validation_errors.to_string()));
        }

        let test = self.load_test(test_id).await?;
        ensure_same_org(&test, actor)?;
        ensure_manual(&test)?;

        let mut graded = 0;
        for item in req.grades {
            if let Err(validation_errors) = item.validate() {
                tracing::warn!("Bulk grade: attempt {} skipped: {}", item.attempt_id, validation_errors);
                continue;
            }
            let Some(mut attempt) = self.attempts.find(&item.attempt_id).await? else {
                tracing::warn!("Bulk grade: attempt {} not found, skipped", item.attempt_id);
                continue;
            };
            if attempt.test_id != test_id || ensure_gradable(&attempt).is_err() {
                tracing::warn!("Bulk grade: attempt {} not gradable here, skipped", item.attempt_id);
                continue;
            }
            let Some(entry) = attempt.answer_mut(question_id) else {
                tracing::warn!(
                    "Bulk grade: attempt {} has no answer to {}, skipped",
                    item.attempt_id,
                    question_id
                );
                continue;
            };
            let feedback = item.feedback.as_deref().map(clean_html);
            if let Err(e) = grading::apply_grade(entry, item.marks, feedback) {
                tracing::warn!("Bulk grade: attempt {} skipped: {}", item.attempt_id, e);
                continue;
            }

            self.attempts.save(&attempt).await?;
            graded += 1;
        }

        tracing::info!(
            "Bulk graded question {} on test {}: {} applied by {}",
            question_id,
            test_id,
            graded,
            actor.user_id
        );
        Ok(graded)
    }

    /// Re-scores every submitted attempt into `graded`, ranks the test and
    /// updates per-question counters.
    ///
    /// Fails before touching anything if a subjective answer is unmarked.
    /// Attempts already `graded` by an interrupted earlier call are not
    /// re-scored or re-counted; ranking always covers the whole graded set.
    pub async fn finalize_grading(&self, test_id: &str, actor: &Actor) -> Result<FinalizeResponse, AppError> {
        let test = self.load_test(test_id).await?;
        ensure_same_org(&test, actor)?;
        ensure_manual(&test)?;

        let pending = self.attempts.list_for_test(test_id, &CLOSED).await?;
        if pending.is_empty() {
            return Err(AppError::BadRequest(format!(
                "Test {} has no submitted attempts to finalize",
                test_id
            )));
        }

        let questions = self.question_map(&test.all_question_ids()).await?;
        if let Some(blocking) = grading::first_blocking(&pending, &questions) {
            return Err(AppError::BadRequest(format!(
                "Attempt {} still has ungraded answers",
                blocking.id
            )));
        }

        let skipped = self
            .attempts
            .list_for_test(test_id, &[AttemptStatus::Graded])
            .await?
            .len();

        let now = Utc::now();
        let mut finalized = Vec::with_capacity(pending.len());
        for mut attempt in pending {
            attempt.result = Some(scoring::compute_result(
                &attempt,
                &test,
                &questions,
                self.defaults.passing_score,
            ));
            attempt.status = AttemptStatus::Graded;
            attempt.graded_by = Some(actor.user_id.clone());
            attempt.graded_at = Some(now);
            self.attempts.save(&attempt).await?;
            finalized.push(attempt);
        }

        let ranked = self.rank_population(&test).await?;

        for attempt in &finalized {
            for entry in &attempt.answers {
                let Some(correct) = entry.is_correct else {
                    continue;
                };
                if let Err(e) = self.performance.record_outcome(&entry.question_id, correct, now).await {
                    tracing::warn!("Failed to update performance for question {}: {}", entry.question_id, e);
                }
            }
        }

        let students: Vec<String> = finalized.iter().map(|a| a.student_id.clone()).collect();
        spawn_analytics(self.analytics.clone(), students, test_id.to_string());

        tracing::info!(
            "Finalized grading for test {}: {} graded, {} previously graded, {} ranked",
            test_id,
            finalized.len(),
            skipped,
            ranked
        );

        Ok(FinalizeResponse {
            test_id: test_id.to_string(),
            graded: finalized.len(),
            skipped,
            ranked,
        })
    }

    /// Recomputes ranks and percentiles for the whole population on demand.
    pub async fn rank_test(&self, test_id: &str, actor: &Actor) -> Result<RankResponse, AppError> {
        let test = self.load_test(test_id).await?;
        ensure_same_org(&test, actor)?;
        let ranked = self.rank_population(&test).await?;
        Ok(RankResponse {
            test_id: test_id.to_string(),
            ranked,
        })
    }

    async fn rank_population(&self, test: &TestDefinition) -> Result<usize, AppError> {
        let population = self.attempts.list_for_test(&test.id, ranked_statuses(test)).await?;
        let rankings = ranking::rank_attempts(&population);
        self.attempts.save_rankings(&rankings).await?;
        Ok(rankings.len())
    }

    pub async fn list_attempts(
        &self,
        test_id: &str,
        actor: &Actor,
        params: AttemptListParams,
    ) -> Result<Vec<AttemptSummary>, AppError> {
        let test = self.load_test(test_id).await?;
        ensure_same_org(&test, actor)?;

        let limit = params.limit.unwrap_or(50).clamp(1, 200);
        let offset = params.offset.unwrap_or(0).max(0);
        let attempts = self
            .attempts
            .page_for_test(test_id, params.status, limit, offset)
            .await?;
        Ok(attempts.iter().map(AttemptSummary::from).collect())
    }
}

/// Best-effort, fire-and-forget analytics recompute per graded student.
fn spawn_analytics(notifier: Arc<dyn AnalyticsNotifier>, students: Vec<String>, test_id: String) {
    tokio::spawn(async move {
        for student_id in students {
            if let Err(e) = notifier.request_recompute(&student_id, &test_id).await {
                tracing::warn!("Analytics recompute request for student {} failed: {}", student_id, e);
            }
        }
    });
}
