use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::{
    extractors::AuthGuard,
    names,
    rejections::AppError,
    services::{goals::RoadmapGenerator, leaderboard::Leaderboard},
    AppState,
};

pub fn routes<G: RoadmapGenerator + Clone + 'static>() -> Router<AppState<G>> {
    Router::new().route(names::LEADERBOARD_URL, get(leaderboard::<G>))
}

#[derive(Deserialize)]
struct LeaderboardQuery {
    limit: Option<i64>,
}

async fn leaderboard<G: RoadmapGenerator + Clone + 'static>(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState<G>>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Leaderboard>, AppError> {
    Ok(Json(state.leaderboard.leaderboard(user.id, query.limit).await?))
}
