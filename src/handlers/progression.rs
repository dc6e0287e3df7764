use axum::{extract::State, routing::get, Json, Router};

use crate::{
    extractors::AuthGuard,
    names,
    rejections::AppError,
    services::{goals::RoadmapGenerator, progression::Stats},
    AppState,
};

pub fn routes<G: RoadmapGenerator + Clone + 'static>() -> Router<AppState<G>> {
    Router::new().route(names::STATS_URL, get(stats::<G>))
}

async fn stats<G: RoadmapGenerator + Clone + 'static>(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState<G>>,
) -> Result<Json<Stats>, AppError> {
    Ok(Json(state.progression.stats(user.id).await?))
}
