// src/routes.rs

use axum::{
    Router,
    http::Method,
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{attempt, grading},
    state::AppState,
    utils::jwt::{auth_middleware, grader_middleware},
};

/// Assembles the main application router.
///
/// * Student routes (attempt lifecycle) behind authentication.
/// * Grader routes behind authentication plus the grader role check.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let test_routes = Router::new()
        .route("/{test_id}/attempts", post(attempt::start_attempt))
        .route("/{test_id}/auto-submit", post(attempt::auto_submit));

    let attempt_routes = Router::new()
        .route("/{id}", get(attempt::get_attempt_state))
        .route("/{id}/answers", put(attempt::submit_answer))
        .route("/{id}/flags", post(attempt::flag_question))
        .route("/{id}/sections", get(attempt::get_section_status))
        .route("/{id}/sections/{index}/start", post(attempt::start_section))
        .route("/{id}/submit", post(attempt::submit_test))
        .route("/{id}/result", get(attempt::get_result));

    let grading_routes = Router::new()
        .route("/tests/{test_id}/ungraded", get(grading::get_ungraded_answers))
        .route("/tests/{test_id}/attempts", get(grading::list_attempts))
        .route("/tests/{test_id}/finalize", post(grading::finalize_grading))
        .route("/tests/{test_id}/rank", post(grading::rank_test))
        .route(
            "/tests/{test_id}/questions/{question_id}/bulk",
            post(grading::bulk_grade_question),
        )
        .route(
            "/attempts/{id}/answers/{question_id}",
            put(grading::grade_answer),
        )
        .layer(middleware::from_fn(grader_middleware));

    // Auth wraps everything under /api; layers run outside in.
    let api = Router::new()
        .nest("/tests", test_routes)
        .nest("/attempts", attempt_routes)
        .nest("/grading", grading_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api", api)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
