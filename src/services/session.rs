// src/services/session.rs

use chrono::{DateTime, Utc};

use crate::{
    engine::{journal, navigator, randomize},
    error::AppError,
    models::{
        attempt::{
            AnswerEntry, Attempt, AttemptResult, AttemptStateResponse, AttemptStatus, FlagQuestionRequest,
            SectionStatusResponse, SubmitAnswerRequest,
        },
        question::PublicQuestion,
        test::{TestDefinition, TestMode, TestStatus},
    },
    services::{Actor, AssessmentService},
};

/// Whether `start_attempt` created a new attempt or resumed a live one.
pub struct StartOutcome {
    pub created: bool,
    pub state: AttemptStateResponse,
}

/// Checks the mode-specific access window.
pub fn check_window(test: &TestDefinition, now: DateTime<Utc>) -> Result<(), AppError> {
    let open = match test.mode {
        TestMode::LiveMock => {
            test.status == TestStatus::Live
                && test.start_time.is_none_or(|s| now >= s)
                && test.end_time.is_none_or(|e| now <= e)
        }
        TestMode::AnytimeMock => {
            matches!(test.status, TestStatus::Live | TestStatus::Scheduled)
                && test.available_from.is_none_or(|from| now >= from)
        }
        TestMode::Practice => matches!(test.status, TestStatus::Live | TestStatus::Completed),
        TestMode::SectionTimed | TestMode::Classroom => test.status == TestStatus::Live,
    };

    if open {
        Ok(())
    } else {
        Err(AppError::BadRequest("Test is not open for attempts right now".to_string()))
    }
}

/// Direct assignment, class assignment, or a public test.
pub fn is_assigned(test: &TestDefinition, student_id: &str, student_classes: &[String]) -> bool {
    test.is_public
        || test.assigned_student_ids.iter().any(|s| s == student_id)
        || test
            .assigned_class_ids
            .iter()
            .any(|c| student_classes.contains(c))
}

impl AssessmentService {
    /// Opens (or resumes) the actor's attempt on `test_id`.
    pub async fn start_attempt(&self, test_id: &str, actor: &Actor) -> Result<StartOutcome, AppError> {
        let test = self.load_test(test_id).await?;
        let now = Utc::now();

        check_window(&test, now)?;

        let classes = self.classes.classes_of(&actor.user_id).await?;
        if !is_assigned(&test, &actor.user_id, &classes) {
            return Err(AppError::Forbidden("You are not assigned to this test".to_string()));
        }

        if let Some(live) = self.attempts.find_in_progress(test_id, &actor.user_id).await? {
            tracing::info!("Resuming attempt {} for student {}", live.id, actor.user_id);
            let state = self.render_state(live, &test, now).await?;
            return Ok(StartOutcome { created: false, state });
        }

        let used = self.attempts.count_for_student(test_id, &actor.user_id).await?;
        let max_attempts = test.max_attempts.unwrap_or(self.defaults.max_attempts);
        if used >= max_attempts {
            return Err(AppError::BadRequest(format!(
                "Maximum attempts reached ({} of {})",
                used, max_attempts
            )));
        }

        let questions = self.question_map(&test.all_question_ids()).await?;
        let orderings = {
            let mut rng = self.rng.lock().await;
            randomize::build_orderings(&test, &questions, &mut *rng)
        };

        let attempt = Attempt {
            id: uuid::Uuid::new_v4().to_string(),
            test_id: test.id.clone(),
            student_id: actor.user_id.clone(),
            org_id: actor.org_id.clone().or_else(|| test.org_id.clone()),
            attempt_number: used + 1,
            status: AttemptStatus::InProgress,
            started_at: now,
            submitted_at: None,
            current_section_index: 0,
            sections: navigator::init_sections(&test, now),
            answers: Vec::new(),
            question_order: orderings.question_order,
            option_orders: orderings.option_orders,
            result: None,
            graded_by: None,
            graded_at: None,
            auto_saved_at: None,
        };

        self.attempts.insert(&attempt).await?;
        tracing::info!(
            "Started attempt {} (#{}) on test {} for student {}",
            attempt.id,
            attempt.attempt_number,
            test.id,
            actor.user_id
        );

        let state = self.render_state(attempt, &test, now).await?;
        Ok(StartOutcome { created: true, state })
    }

    /// Attempt plus its questions in the stored order, answer keys stripped.
    async fn render_state(
        &self,
        attempt: Attempt,
        test: &TestDefinition,
        now: DateTime<Utc>,
    ) -> Result<AttemptStateResponse, AppError> {
        let questions = self.question_map(&attempt.question_order).await?;
        let public = attempt
            .question_order
            .iter()
            .filter_map(|qid| {
                let q = questions.get(qid)?;
                let section_index = test.section_of(qid)?;
                Some(PublicQuestion::from_question(q, attempt.option_orders.get(qid), section_index))
            })
            .collect();

        let time_remaining = if attempt.status == AttemptStatus::InProgress {
            navigator::time_remaining(&attempt, test, now)
        } else {
            None
        };

        Ok(AttemptStateResponse {
            attempt,
            questions: public,
            time_remaining,
            expired: time_remaining == Some(0),
        })
    }

    pub async fn get_attempt_state(&self, attempt_id: &str, actor: &Actor) -> Result<AttemptStateResponse, AppError> {
        let (attempt, test) = self.load_readable(attempt_id, actor).await?;
        self.render_state(attempt, &test, Utc::now()).await
    }

    pub async fn submit_answer(
        &self,
        attempt_id: &str,
        actor: &Actor,
        req: SubmitAnswerRequest,
    ) -> Result<AnswerEntry, AppError> {
        let (mut attempt, test) = self.load_own(attempt_id, actor).await?;
        let question = self
            .question_map(std::slice::from_ref(&req.question_id))
            .await?
            .remove(&req.question_id)
            .ok_or_else(|| AppError::NotFound(format!("Question {} not found", req.question_id)))?;

        journal::record_answer(&mut attempt, &test, &question, req.answer, req.time_spent, Utc::now())?;
        self.attempts.save(&attempt).await?;

        attempt
            .answer(&req.question_id)
            .cloned()
            .ok_or_else(|| AppError::InternalServerError("answer missing after save".to_string()))
    }

    pub async fn flag_question(
        &self,
        attempt_id: &str,
        actor: &Actor,
        req: FlagQuestionRequest,
    ) -> Result<AnswerEntry, AppError> {
        let (mut attempt, test) = self.load_own(attempt_id, actor).await?;
        let question = self
            .question_map(std::slice::from_ref(&req.question_id))
            .await?
            .remove(&req.question_id)
            .ok_or_else(|| AppError::NotFound(format!("Question {} not found", req.question_id)))?;

        journal::flag_question(&mut attempt, &test, &question, req.flagged, Utc::now())?;
        self.attempts.save(&attempt).await?;

        attempt
            .answer(&req.question_id)
            .cloned()
            .ok_or_else(|| AppError::InternalServerError("flag missing after save".to_string()))
    }

    pub async fn start_section(
        &self,
        attempt_id: &str,
        actor: &Actor,
        section_index: usize,
    ) -> Result<SectionStatusResponse, AppError> {
        let (mut attempt, test) = self.load_own(attempt_id, actor).await?;
        let now = Utc::now();

        navigator::start_section(&mut attempt, &test, section_index, now)?;
        self.attempts.save(&attempt).await?;
        tracing::info!("Attempt {} moved to section {}", attempt.id, section_index);

        Ok(navigator::section_status(&attempt, &test, now))
    }

    pub async fn get_section_status(&self, attempt_id: &str, actor: &Actor) -> Result<SectionStatusResponse, AppError> {
        let (attempt, test) = self.load_readable(attempt_id, actor).await?;
        Ok(navigator::section_status(&attempt, &test, Utc::now()))
    }

    pub async fn get_result(&self, attempt_id: &str, actor: &Actor) -> Result<AttemptResult, AppError> {
        let (attempt, _) = self.load_readable(attempt_id, actor).await?;
        attempt
            .result
            .ok_or_else(|| AppError::NotFound("Result is not available yet".to_string()))
    }
}
