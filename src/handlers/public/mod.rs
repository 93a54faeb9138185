pub mod auth;
pub mod share;

use axum::http::StatusCode;
use once_cell::sync::Lazy;
use serde_json::json;
use std::time::Instant;

use crate::config::config;
use crate::database::DatabaseManager;
use crate::middleware::{ApiResponse, ApiResult};

static STARTED_AT: Lazy<Instant> = Lazy::new(Instant::now);

/// Pin the process start time; called once from server startup.
pub fn mark_started() {
    Lazy::force(&STARTED_AT);
}

/// GET / - service banner
pub async fn root() -> ApiResult<serde_json::Value> {
    Ok(ApiResponse::success(json!({
        "name": "graft-api",
        "description": "Business dashboard API for UK trades",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": config().environment.as_str(),
    })))
}

/// GET /health - database health plus uptime. Reports degraded (503)
/// rather than erroring when the database is unreachable.
pub async fn health() -> ApiResult<serde_json::Value> {
    let uptime_secs = STARTED_AT.elapsed().as_secs();

    match DatabaseManager::health_check().await {
        Ok(latency) => Ok(ApiResponse::success(json!({
            "status": "ok",
            "uptime_seconds": uptime_secs,
            "database": {
                "status": "ok",
                "latency_ms": latency.as_millis() as u64,
            },
        }))),
        Err(e) => Ok(ApiResponse::with_status(
            json!({
                "status": "degraded",
                "uptime_seconds": uptime_secs,
                "database": {
                    "status": "unavailable",
                    "error": e.to_string(),
                },
            }),
            StatusCode::SERVICE_UNAVAILABLE,
        )),
    }
}
