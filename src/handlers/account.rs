use axum::{
    extract::State,
    http::{header::SET_COOKIE, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    extractors::AuthGuard,
    names,
    rejections::{AppError, ResultExt},
    services::{goals::RoadmapGenerator, progression::experience_level},
    utils, AppState,
};

pub fn routes<G: RoadmapGenerator + Clone + 'static>() -> Router<AppState<G>> {
    Router::new()
        .route(names::REGISTER_URL, post(register::<G>))
        .route(names::ME_URL, get(me))
}

#[derive(Deserialize)]
struct RegisterPost {
    display_name: String,
}

#[derive(Serialize)]
struct Registered {
    user_id: i64,
    display_name: String,
    token: String,
}

#[derive(Serialize)]
struct Me {
    id: i64,
    display_name: String,
    total_exp: i64,
    level: i64,
}

async fn register<G: RoadmapGenerator + Clone + 'static>(
    State(state): State<AppState<G>>,
    Json(body): Json<RegisterPost>,
) -> Result<axum::response::Response, AppError> {
    let display_name = body.display_name.trim();
    if utils::is_blank(display_name) || display_name.chars().count() > names::MAX_DISPLAY_NAME_LEN
    {
        return Err(AppError::Validation(format!(
            "display name must be 1 to {} characters",
            names::MAX_DISPLAY_NAME_LEN
        )));
    }

    let user = state
        .db
        .create_user(display_name)
        .await
        .reject("could not create user")?;

    let token = state
        .db
        .create_user_session(user.id)
        .await
        .reject("could not create session")?;

    let cookie = utils::cookie(names::USER_SESSION_COOKIE_NAME, &token);
    let body = Registered {
        user_id: user.id,
        display_name: user.display_name,
        token,
    };

    Ok((StatusCode::CREATED, [(SET_COOKIE, cookie)], Json(body)).into_response())
}

async fn me(AuthGuard(user): AuthGuard) -> Json<Me> {
    Json(Me {
        level: experience_level(user.total_exp),
        id: user.id,
        display_name: user.display_name,
        total_exp: user.total_exp,
    })
}
