use std::sync::Arc;

use actix_web::{get, web, HttpResponse};

use crate::app_state::AppState;

#[get("/health")]
async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[get("/health/ready")]
async fn health_check_ready(state: web::Data<Arc<AppState>>) -> HttpResponse {
    let db_health = state.check_database().await;

    let status = if db_health.is_ok() {
        "ready"
    } else {
        "not_ready"
    };

    let response = serde_json::json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "dependencies": {
            "mongodb": if db_health.is_ok() { "ok" } else { "error" }
        }
    });

    if db_health.is_ok() {
        HttpResponse::Ok().json(response)
    } else {
        log::warn!("readiness check failed: {:?}", db_health.err());
        HttpResponse::ServiceUnavailable().json(response)
    }
}

#[get("/health/live")]
async fn health_check_live() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
