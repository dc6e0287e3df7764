use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use axum_extra::extract::CookieJar;

use crate::{
    db::models::AuthUser, names, rejections::AppError, services::goals::RoadmapGenerator,
    AppState,
};

/// Guard extractor that resolves the session token to a user.
/// Accepts `Authorization: Bearer <token>` first, then the session cookie.
pub struct AuthGuard(pub AuthUser);

impl<G> FromRequestParts<AppState<G>> for AuthGuard
where
    G: RoadmapGenerator + Clone + 'static,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<G>,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = session_token(parts) else {
            return Err(AppError::Unauthorized);
        };

        match state.db.get_user_by_session(&token).await {
            Ok(Some(user)) => Ok(AuthGuard(user)),
            Ok(None) => Err(AppError::Unauthorized),
            Err(e) => {
                tracing::error!("could not resolve session: {e}");
                Err(AppError::Internal(e))
            }
        }
    }
}

fn session_token(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    bearer.or_else(|| {
        CookieJar::from_headers(&parts.headers)
            .get(names::USER_SESSION_COOKIE_NAME)
            .map(|c| c.value().to_string())
    })
}
