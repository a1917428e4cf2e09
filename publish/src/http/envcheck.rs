use axum::extract::State;
use axum::Json;

use super::AppState;
use crate::config::EnvReport;

pub async fn get(State(AppState { env_report, .. }): State<AppState>) -> Json<EnvReport> {
    Json(env_report.as_ref().clone())
}
