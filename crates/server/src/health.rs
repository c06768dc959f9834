use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use brickbot_db::DbPool;
use chrono::Utc;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    archive_enabled: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub archive: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool, archive_enabled: bool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, archive_enabled })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let archive_enabled = state.archive_enabled;
    let database = database_check(&state.db_pool).await;
    let ready = database.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "brickbot-server runtime initialized".to_string(),
        },
        database,
        archive: HealthCheck {
            status: if archive_enabled { "ready" } else { "disabled" },
            detail: if archive_enabled {
                "log archival accepting batches".to_string()
            } else {
                "log archival is turned off".to_string()
            },
        },
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    let reachable = sqlx::query_scalar::<_, i64>("SELECT 1 FROM lego_order LIMIT 1")
        .fetch_optional(pool)
        .await;
    match reachable {
        Ok(_) => HealthCheck { status: "ready", detail: "order table reachable".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}
