// src/config.rs

use std::env;
use dotenvy::dotenv;

/// Pass mark applied when a test does not carry its own `passing_score`.
pub const DEFAULT_PASSING_SCORE: f64 = 40.0;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: String,
    pub default_passing_score: f64,
    /// Applied when a test definition leaves `max_attempts` unset.
    pub default_max_attempts: u32,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let default_passing_score = env::var("DEFAULT_PASSING_SCORE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PASSING_SCORE);

        let default_max_attempts = env::var("DEFAULT_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);

        Self {
            database_url,
            jwt_secret,
            rust_log,
            bind_addr,
            default_passing_score,
            default_max_attempts,
        }
    }
}
