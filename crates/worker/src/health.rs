//! Tiny health/ready/liveness surface for the worker process. This does not
//! route enrichment traffic — that ingress is the HTTP layer spec.md §1
//! excludes — it only lets an orchestrator (k8s, ECS) probe whether the
//! process is alive and holding a DB/Redis connection. Shape grounded on the
//! teacher's `api::main::{health_check, readiness_check, liveness_check}`.

use actix_web::{web, App, HttpResponse, HttpServer};
use sqlx::PgPool;

#[derive(Clone)]
pub struct HealthState {
    pub db: PgPool,
}

pub async fn serve(state: HealthState, port: u16) -> std::io::Result<()> {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .route("/health", web::get().to(health_check))
            .route("/ready", web::get().to(readiness_check))
            .route("/liveness", web::get().to(liveness_check))
    })
    .bind(("0.0.0.0", port))?
    .shutdown_timeout(30)
    .run();

    let handle = server.handle();
    tokio::spawn(async move {
        crate::shutdown::wait().await;
        tracing::info!("shutdown signal received, stopping health server");
        handle.stop(true).await;
    });

    server.await
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "alexandria-worker",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn readiness_check(state: web::Data<HealthState>) -> HttpResponse {
    let db_ok = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();
    let status = if db_ok {
        actix_web::http::StatusCode::OK
    } else {
        actix_web::http::StatusCode::SERVICE_UNAVAILABLE
    };
    HttpResponse::build(status).json(serde_json::json!({ "ready": db_ok, "checks": { "database": db_ok } }))
}

async fn liveness_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "alive",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
