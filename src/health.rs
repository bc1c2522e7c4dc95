//! `/health` and `/ready` for the load balancer. Liveness never fails once
//! the process is up; readiness is a place for a future dependency check
//! (none exist yet — this server has no outbound startup dependency).

use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

pub async fn liveness() -> (StatusCode, Json<HealthBody>) {
    (StatusCode::OK, Json(HealthBody { status: "ok" }))
}

pub async fn readiness() -> (StatusCode, Json<HealthBody>) {
    (StatusCode::OK, Json(HealthBody { status: "ready" }))
}
