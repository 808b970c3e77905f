//! Token endpoints of the account API.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    domain::entities::{token::TokenPair, user::UserProfile},
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokenPayload {
    refresh_token: String,
}

#[derive(Serialize)]
struct TokensResponse {
    tokens: TokenPair,
}

#[derive(Serialize)]
struct MeResponse {
    user: UserProfile,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tokens", post(tokens))
        .route("/me", get(me))
        .route("/signout", post(signout))
}

/// POST {prefix}/tokens
/// Exchanges the current refresh token of a family for a new token pair.
async fn tokens(
    State(app_state): State<AppState>,
    Json(payload): Json<RefreshTokenPayload>,
) -> AppResult<impl IntoResponse> {
    let presented = non_empty(&payload.refresh_token)?;
    let tokens = app_state.token_use_cases.rotate(presented).await?;
    Ok(Json(TokensResponse { tokens }))
}

/// GET {prefix}/me
async fn me(State(app_state): State<AppState>, headers: HeaderMap) -> AppResult<impl IntoResponse> {
    let token = bearer_token(&headers)?;
    let user = app_state.token_use_cases.current_user(token).await?;
    Ok(Json(MeResponse { user }))
}

/// POST {prefix}/signout
/// Revokes the family of the presented refresh token.
async fn signout(
    State(app_state): State<AppState>,
    Json(payload): Json<RefreshTokenPayload>,
) -> AppResult<impl IntoResponse> {
    let presented = non_empty(&payload.refresh_token)?;
    app_state.token_use_cases.revoke(presented).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn non_empty(token: &str) -> AppResult<&str> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::InvalidInput("refreshToken is required".into()));
    }
    Ok(token)
}

fn bearer_token(headers: &HeaderMap) -> AppResult<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("Bearer"))
        .map(|(_, token)| token.trim())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::MalformedToken("missing bearer token".into()))
}
