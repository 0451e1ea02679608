use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
};
use tracing::warn;

use crate::auth::jwt::JwtKeys;
use crate::auth::services::current_account;
use crate::domain::Account;
use crate::error::into_http;
use crate::state::AppState;

/// Extracts the bearer token and resolves it to the live account.
pub struct AuthAccount(pub Account);

#[async_trait]
impl FromRequestParts<AppState> for AuthAccount {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "missing Authorization header".to_string(),
            ))?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or((StatusCode::UNAUTHORIZED, "invalid auth scheme".to_string()))?;

        let keys = JwtKeys::from_ref(state);
        let account = current_account(state.store.as_ref(), &keys, token)
            .await
            .map_err(|err| {
                warn!(error = %err, "bearer token rejected");
                into_http(err)
            })?;

        Ok(AuthAccount(account))
    }
}
