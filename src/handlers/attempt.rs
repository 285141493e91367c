// src/handlers/attempt.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    error::AppError,
    models::attempt::{FlagQuestionRequest, SubmitAnswerRequest},
    services::{Actor, AssessmentService},
    utils::jwt::Claims,
};

/// Starts a new attempt, or resumes the student's live one.
///
/// Returns 201 with the attempt and its sanitized questions when created,
/// 200 when resuming.
pub async fn start_attempt(
    State(service): State<Arc<AssessmentService>>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = service.start_attempt(&test_id, &Actor::from(&claims)).await?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome.state)))
}

/// Current state of an attempt, questions in their stored order.
pub async fn get_attempt_state(
    State(service): State<Arc<AssessmentService>>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let state = service.get_attempt_state(&attempt_id, &Actor::from(&claims)).await?;
    Ok(Json(state))
}

/// Saves (or overwrites) the answer to one question.
pub async fn submit_answer(
    State(service): State<Arc<AssessmentService>>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<String>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let entry = service
        .submit_answer(&attempt_id, &Actor::from(&claims), req)
        .await?;
    Ok(Json(entry))
}

/// Flags or unflags a question for review.
pub async fn flag_question(
    State(service): State<Arc<AssessmentService>>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<String>,
    Json(req): Json<FlagQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let entry = service
        .flag_question(&attempt_id, &Actor::from(&claims), req)
        .await?;
    Ok(Json(entry))
}

/// Locks the current section and opens the next one (section-timed tests).
pub async fn start_section(
    State(service): State<Arc<AssessmentService>>,
    Extension(claims): Extension<Claims>,
    Path((attempt_id, section_index)): Path<(String, usize)>,
) -> Result<impl IntoResponse, AppError> {
    let status = service
        .start_section(&attempt_id, &Actor::from(&claims), section_index)
        .await?;
    Ok(Json(status))
}

pub async fn get_section_status(
    State(service): State<Arc<AssessmentService>>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let status = service
        .get_section_status(&attempt_id, &Actor::from(&claims))
        .await?;
    Ok(Json(status))
}

/// Manual submission by the student.
pub async fn submit_test(
    State(service): State<Arc<AssessmentService>>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let summary = service.submit_test(&attempt_id, &Actor::from(&claims)).await?;
    Ok(Json(summary))
}

/// Query parameters for auto-submit. Graders (or a scheduler holding a
/// grader token) may close another student's attempt.
#[derive(Debug, Default, Deserialize)]
pub struct AutoSubmitParams {
    pub student_id: Option<String>,
}

/// System-triggered submission. Always reports `submitted: true`.
pub async fn auto_submit(
    State(service): State<Arc<AssessmentService>>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<String>,
    Query(params): Query<AutoSubmitParams>,
) -> Result<impl IntoResponse, AppError> {
    let actor = Actor::from(&claims);
    let student_id = params.student_id.unwrap_or_else(|| actor.user_id.clone());

    let response = service.auto_submit(&test_id, &student_id, &actor).await?;
    Ok(Json(response))
}

/// Scored result. 404 while the attempt is still in progress.
pub async fn get_result(
    State(service): State<Arc<AssessmentService>>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let result = service.get_result(&attempt_id, &Actor::from(&claims)).await?;
    Ok(Json(result))
}
