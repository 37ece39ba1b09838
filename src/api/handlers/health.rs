//! Handler for health check endpoint.

use axum::{Json, extract::State, http::StatusCode};

use crate::api::dto::health::{CheckStatus, HealthChecks, HealthResponse};
use crate::state::AppState;

/// Returns service health status with component checks.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response Codes
///
/// - **200 OK**: All components healthy
/// - **503 Service Unavailable**: One or more components degraded
///
/// # Components Checked
///
/// 1. **Database**: Counts live campaigns
/// 2. **Task Queue**: Checks if the background queue is open and reports free slots
/// 3. **Cache**: Reports cached entities and unflushed clicks
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "checks": {
///     "database": { "status": "ok", "message": "Connected, 12 live campaigns" },
///     "task_queue": { "status": "ok", "message": "Capacity: 10000" },
///     "cache": { "status": "ok", "message": "urls=40 campaigns=12 aliases=3 distributions=9, pending clicks=17" }
///   }
/// }
/// ```
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let db_check = check_database(&state).await;

    let queue_check = check_task_queue(&state);

    let cache_check = check_cache(&state);

    let all_healthy =
        db_check.status == "ok" && queue_check.status == "ok" && cache_check.status == "ok";

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            database: db_check,
            task_queue: queue_check,
            cache: cache_check,
        },
    };

    if all_healthy {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

async fn check_database(state: &AppState) -> CheckStatus {
    match state.campaign_repository.count_live().await {
        Ok(count) => CheckStatus {
            status: "ok".to_string(),
            message: Some(format!("Connected, {} live campaigns", count)),
        },
        Err(e) => CheckStatus {
            status: "error".to_string(),
            message: Some(format!("Database error: {}", e)),
        },
    }
}

fn check_task_queue(state: &AppState) -> CheckStatus {
    if state.task_queue.is_closed() {
        CheckStatus {
            status: "error".to_string(),
            message: Some("Task queue is closed".to_string()),
        }
    } else {
        CheckStatus {
            status: "ok".to_string(),
            message: Some(format!("Capacity: {}", state.task_queue.capacity())),
        }
    }
}

fn check_cache(state: &AppState) -> CheckStatus {
    let stats = state.cache.stats();
    CheckStatus {
        status: "ok".to_string(),
        message: Some(format!(
            "urls={} campaigns={} aliases={} distributions={}, pending clicks={}",
            stats.urls,
            stats.campaigns,
            stats.aliases,
            stats.distributions,
            state.accountant.pending().total()
        )),
    }
}
