// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, types::Json};

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

/// Postgres implementation of every storage port.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(context: &str, e: sqlx::Error) -> AppError {
    tracing::error!("{}: {:?}", context, e);
    AppError::InternalServerError(e.to_string())
}

fn bodies(rows: Vec<Json<Attempt>>) -> Vec<Attempt> {
    rows.into_iter().map(|Json(a)| a).collect()
}

#[async_trait]
impl AttemptStore for PgStore {
    async fn insert(&self, attempt: &Attempt) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO attempts (id, test_id, student_id, attempt_number, status, started_at, body)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&attempt.id)
        .bind(&attempt.test_id)
        .bind(&attempt.student_id)
        .bind(attempt.attempt_number as i32)
        .bind(attempt.status.as_str())
        .bind(attempt.started_at)
        .bind(Json(attempt))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return AppError::Conflict(format!(
                        "Attempt {} for this test already exists",
                        attempt.attempt_number
                    ));
                }
            }
            db_error("Failed to insert attempt", e)
        })?;

        Ok(())
    }

    async fn save(&self, attempt: &Attempt) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE attempts
            SET status = $2, body = $3, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            "#,
        )
        .bind(&attempt.id)
        .bind(attempt.status.as_str())
        .bind(Json(attempt))
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to save attempt", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Attempt not found".to_string()));
        }
        Ok(())
    }

    async fn find(&self, attempt_id: &str) -> Result<Option<Attempt>, AppError> {
        let row: Option<Json<Attempt>> = sqlx::query_scalar("SELECT body FROM attempts WHERE id = $1")
            .bind(attempt_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load attempt", e))?;

        Ok(row.map(|Json(a)| a))
    }

    async fn find_in_progress(&self, test_id: &str, student_id: &str) -> Result<Option<Attempt>, AppError> {
        let row: Option<Json<Attempt>> = sqlx::query_scalar(
            r#"
            SELECT body FROM attempts
            WHERE test_id = $1 AND student_id = $2 AND status = $3
            ORDER BY attempt_number DESC
            LIMIT 1
            "#,
        )
        .bind(test_id)
        .bind(student_id)
        .bind(AttemptStatus::InProgress.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load in-progress attempt", e))?;

        Ok(row.map(|Json(a)| a))
    }

    async fn count_for_student(&self, test_id: &str, student_id: &str) -> Result<u32, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM attempts WHERE test_id = $1 AND student_id = $2",
        )
        .bind(test_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to count attempts", e))?;

        Ok(count.max(0) as u32)
    }

    async fn list_for_test(&self, test_id: &str, statuses: &[AttemptStatus]) -> Result<Vec<Attempt>, AppError> {
        let statuses: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
        let rows: Vec<Json<Attempt>> = sqlx::query_scalar(
            r#"
            SELECT body FROM attempts
            WHERE test_id = $1 AND status = ANY($2)
            ORDER BY started_at ASC
            "#,
        )
        .bind(test_id)
        .bind(&statuses)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list attempts", e))?;

        Ok(bodies(rows))
    }

    async fn page_for_test(
        &self,
        test_id: &str,
        status: Option<AttemptStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Attempt>, AppError> {
        let rows: Vec<Json<Attempt>> = sqlx::query_scalar(
            r#"
            SELECT body FROM attempts
            WHERE test_id = $1 AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY started_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(test_id)
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to page attempts", e))?;

        Ok(bodies(rows))
    }

    async fn save_rankings(&self, rankings: &[RankedAttempt]) -> Result<(), AppError> {
        let ids: Vec<&str> = rankings.iter().map(|r| r.attempt_id.as_str()).collect();
        let ranks: Vec<i32> = rankings.iter().map(|r| r.rank as i32).collect();
        let percentiles: Vec<f64> = rankings.iter().map(|r| r.percentile).collect();

        sqlx::query(
            r#"
            UPDATE attempts a
            SET body = jsonb_set(
                    jsonb_set(a.body, '{result,rank}', to_jsonb(r.rank)),
                    '{result,percentile}', to_jsonb(r.percentile)
                ),
                updated_at = CURRENT_TIMESTAMP
            FROM UNNEST($1::TEXT[], $2::INT[], $3::FLOAT8[]) AS r(id, rank, percentile)
            WHERE a.id = r.id AND a.body->'result' IS NOT NULL AND a.body->'result' <> 'null'::jsonb
            "#,
        )
        .bind(&ids)
        .bind(&ranks)
        .bind(&percentiles)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to save rankings", e))?;

        Ok(())
    }
}

#[async_trait]
impl TestCatalog for PgStore {
    async fn get_test(&self, test_id: &str) -> Result<Option<TestDefinition>, AppError> {
        let row: Option<Json<TestDefinition>> =
            sqlx::query_scalar("SELECT definition FROM tests WHERE id = $1")
                .bind(test_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to load test", e))?;

        Ok(row.map(|Json(t)| t))
    }
}

#[async_trait]
impl QuestionBank for PgStore {
    async fn get_questions(&self, question_ids: &[String]) -> Result<Vec<Question>, AppError> {
        if question_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<Json<Question>> =
            sqlx::query_scalar("SELECT definition FROM questions WHERE id = ANY($1)")
                .bind(question_ids)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_error("Failed to load questions", e))?;

        Ok(rows.into_iter().map(|Json(q)| q).collect())
    }
}

#[async_trait]
impl ClassDirectory for PgStore {
    async fn classes_of(&self, student_id: &str) -> Result<Vec<String>, AppError> {
        sqlx::query_scalar("SELECT class_id FROM class_members WHERE student_id = $1")
            .bind(student_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load class memberships", e))
    }
}

#[async_trait]
impl PerformanceLedger for PgStore {
    async fn record_outcome(&self, question_id: &str, correct: bool, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO question_performance (question_id, total_attempts, correct_attempts, last_attempted_at)
            VALUES ($1, 1, $2, $3)
            ON CONFLICT (question_id) DO UPDATE SET
                total_attempts = question_performance.total_attempts + 1,
                correct_attempts = question_performance.correct_attempts + EXCLUDED.correct_attempts,
                last_attempted_at = EXCLUDED.last_attempted_at
            "#,
        )
        .bind(question_id)
        .bind(if correct { 1i64 } else { 0i64 })
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update question performance", e))?;

        Ok(())
    }
}

#[async_trait]
impl AnalyticsNotifier for PgStore {
    async fn request_recompute(&self, student_id: &str, test_id: &str) -> Result<(), AppError> {
        sqlx::query("INSERT INTO analytics_requests (student_id, test_id) VALUES ($1, $2)")
            .bind(student_id)
            .bind(test_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to queue analytics recompute", e))?;

        Ok(())
    }
}
