use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::{
    db::models::{GoalSummary, GoalTree},
    extractors::AuthGuard,
    names,
    rejections::AppError,
    services::goals::RoadmapGenerator,
    AppState,
};

pub fn routes<G: RoadmapGenerator + Clone + 'static>() -> Router<AppState<G>> {
    Router::new()
        .route(names::GOALS_URL, post(create_goal::<G>).get(list_goals::<G>))
        .route("/goals/{goal_id}", get(get_goal::<G>))
        .route("/goals/{goal_id}/archive", post(archive_goal::<G>))
}

#[derive(Deserialize)]
struct CreateGoalPost {
    description: String,
}

async fn create_goal<G: RoadmapGenerator + Clone + 'static>(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState<G>>,
    Json(body): Json<CreateGoalPost>,
) -> Result<axum::response::Response, AppError> {
    let goal = state.goals.create_goal(user.id, &body.description).await?;
    Ok((StatusCode::CREATED, Json(goal)).into_response())
}

async fn list_goals<G: RoadmapGenerator + Clone + 'static>(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState<G>>,
) -> Result<Json<Vec<GoalSummary>>, AppError> {
    Ok(Json(state.goals.list_goals(user.id).await?))
}

async fn get_goal<G: RoadmapGenerator + Clone + 'static>(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState<G>>,
    Path(goal_id): Path<i64>,
) -> Result<Json<GoalTree>, AppError> {
    Ok(Json(state.goals.get_goal(user.id, goal_id).await?))
}

async fn archive_goal<G: RoadmapGenerator + Clone + 'static>(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState<G>>,
    Path(goal_id): Path<i64>,
) -> Result<Json<GoalTree>, AppError> {
    Ok(Json(state.goals.archive_goal(user.id, goal_id).await?))
}
