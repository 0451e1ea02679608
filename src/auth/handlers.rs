use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::auth::{
    dto::{AccountView, LoginRequest, RegisterRequest, TokenResponse},
    extractors::AuthAccount,
    jwt::JwtKeys,
    services,
};
use crate::error::into_http;
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/accounts", post(register))
        .route("/auth/login", post(login))
        .route("/me", get(me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AccountView>), (StatusCode, String)> {
    let account = services::register(state.store.as_ref(), payload)
        .await
        .map_err(into_http)?;
    Ok((StatusCode::CREATED, Json(AccountView::from(&account))))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, (StatusCode, String)> {
    let account = services::authenticate(state.store.as_ref(), &payload.username, &payload.password)
        .await
        .map_err(into_http)?;

    let keys = JwtKeys::from_ref(&state);
    let signed = keys.sign(&account).map_err(into_http)?;

    info!(account_id = %account.account_id, username = %account.username, "login");
    Ok(Json(TokenResponse {
        access_token: signed.token,
        token_type: "bearer".to_string(),
        expires_at: signed.expires_at,
        account: AccountView::from(&account),
    }))
}

#[instrument(skip_all)]
pub async fn me(AuthAccount(account): AuthAccount) -> Json<AccountView> {
    Json(AccountView::from(&account))
}
