use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::{names, services::goals::RoadmapGenerator, AppState};

pub fn routes<G: RoadmapGenerator + Clone + 'static>() -> Router<AppState<G>> {
    Router::new()
        .route(names::HEALTH_URL, get(health::<G>))
        .route(names::HEALTH_READY_URL, get(ready::<G>))
        .route(names::HEALTH_LIVE_URL, get(live))
}

#[derive(Serialize)]
struct Checks {
    database: &'static str,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
    checks: Checks,
}

#[derive(Serialize)]
struct Status {
    status: &'static str,
}

/// `true` when the pool answers a trivial query.
async fn database_up<G: RoadmapGenerator + Clone + 'static>(state: &AppState<G>) -> bool {
    match state.db.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("database health check failed: {e}");
            false
        }
    }
}

async fn health<G: RoadmapGenerator + Clone + 'static>(
    State(state): State<AppState<G>>,
) -> Response {
    let up = database_up(&state).await;
    let body = Health {
        status: if up { "healthy" } else { "unhealthy" },
        version: names::VERSION,
        checks: Checks {
            database: if up { "connected" } else { "disconnected" },
        },
    };

    let status = if up {
        StatusCode::OK
    } else {
        tracing::warn!("health check failed");
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}

async fn ready<G: RoadmapGenerator + Clone + 'static>(
    State(state): State<AppState<G>>,
) -> Response {
    if database_up(&state).await {
        (StatusCode::OK, Json(Status { status: "ready" })).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(Status {
                status: "not_ready",
            }),
        )
            .into_response()
    }
}

async fn live() -> Json<Status> {
    Json(Status { status: "alive" })
}
