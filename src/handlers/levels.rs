use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::{
    db::{
        models::{Level, QuizResult, QuizView},
        TopicOutcome,
    },
    extractors::AuthGuard,
    rejections::AppError,
    services::goals::RoadmapGenerator,
    AppState,
};

pub fn routes<G: RoadmapGenerator + Clone + 'static>() -> Router<AppState<G>> {
    Router::new()
        .route("/levels/{level_id}", get(get_level::<G>))
        .route(
            "/levels/{level_id}/topics/{topic_index}/complete",
            post(complete_topic::<G>),
        )
        .route("/levels/{level_id}/quiz", get(get_quiz::<G>))
        .route("/levels/{level_id}/quiz/submit", post(submit_quiz::<G>))
}

#[derive(Deserialize)]
struct SubmitQuizPost {
    submission_id: String,
    answers: Vec<String>,
}

async fn get_level<G: RoadmapGenerator + Clone + 'static>(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState<G>>,
    Path(level_id): Path<i64>,
) -> Result<Json<Level>, AppError> {
    Ok(Json(state.goals.get_level(user.id, level_id).await?))
}

async fn complete_topic<G: RoadmapGenerator + Clone + 'static>(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState<G>>,
    Path((level_id, topic_index)): Path<(i64, i64)>,
) -> Result<Json<TopicOutcome>, AppError> {
    let outcome = state
        .progression
        .complete_topic(user.id, level_id, topic_index)
        .await?;
    Ok(Json(outcome))
}

async fn get_quiz<G: RoadmapGenerator + Clone + 'static>(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState<G>>,
    Path(level_id): Path<i64>,
) -> Result<Json<QuizView>, AppError> {
    Ok(Json(state.quizzes.get_quiz(user.id, level_id).await?))
}

async fn submit_quiz<G: RoadmapGenerator + Clone + 'static>(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState<G>>,
    Path(level_id): Path<i64>,
    Json(body): Json<SubmitQuizPost>,
) -> Result<Json<QuizResult>, AppError> {
    let result = state
        .quizzes
        .submit_quiz(user.id, level_id, &body.submission_id, &body.answers)
        .await?;
    Ok(Json(result))
}
