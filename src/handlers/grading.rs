// src/handlers/grading.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::{
        attempt::AttemptListParams,
        grading::{BulkGradeRequest, BulkGradeResponse, GradeAnswerRequest, UngradedFilter},
    },
    services::{Actor, AssessmentService},
    utils::jwt::Claims,
};

/// Lists subjective answers awaiting a grade, grouped by question.
/// Grader only.
pub async fn get_ungraded_answers(
    State(service): State<Arc<AssessmentService>>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<String>,
    Query(filter): Query<UngradedFilter>,
) -> Result<impl IntoResponse, AppError> {
    let groups = service
        .get_ungraded_answers(&test_id, &Actor::from(&claims), filter)
        .await?;
    Ok(Json(groups))
}

/// Grades one answer.
/// Grader only.
pub async fn grade_answer(
    State(service): State<Arc<AssessmentService>>,
    Extension(claims): Extension<Claims>,
    Path((attempt_id, question_id)): Path<(String, String)>,
    Json(req): Json<GradeAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let entry = service
        .grade_answer(&attempt_id, &question_id, &Actor::from(&claims), req)
        .await?;
    Ok(Json(entry))
}

/// Grades one question across many attempts; bad tuples are skipped.
/// Grader only.
pub async fn bulk_grade_question(
    State(service): State<Arc<AssessmentService>>,
    Extension(claims): Extension<Claims>,
    Path((test_id, question_id)): Path<(String, String)>,
    Json(req): Json<BulkGradeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let graded = service
        .bulk_grade_question(&test_id, &question_id, &Actor::from(&claims), req)
        .await?;
    Ok(Json(BulkGradeResponse { graded }))
}

/// Finalizes grading for a test: re-score, mark graded, rank.
/// Grader only.
pub async fn finalize_grading(
    State(service): State<Arc<AssessmentService>>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = service.finalize_grading(&test_id, &Actor::from(&claims)).await?;
    Ok(Json(outcome))
}

/// Recomputes ranks and percentiles for a test.
/// Grader only.
pub async fn rank_test(
    State(service): State<Arc<AssessmentService>>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = service.rank_test(&test_id, &Actor::from(&claims)).await?;
    Ok(Json(outcome))
}

/// Pages through a test's attempts.
/// Grader only.
pub async fn list_attempts(
    State(service): State<Arc<AssessmentService>>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<String>,
    Query(params): Query<AttemptListParams>,
) -> Result<impl IntoResponse, AppError> {
    let attempts = service
        .list_attempts(&test_id, &Actor::from(&claims), params)
        .await?;
    Ok(Json(attempts))
}
