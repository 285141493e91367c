use std::sync::Arc;

use crate::{config::Config, services::AssessmentService};
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AssessmentService>,
    pub config: Config,
}

impl FromRef<AppState> for Arc<AssessmentService> {
    fn from_ref(state: &AppState) -> Self {
        state.service.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
