use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::auth::dto::AccountView;
use crate::auth::extractors::AuthAccount;
use crate::domain::{Account, AccountId};
use crate::error::into_http;
use crate::ledger::dto::{
    BalanceResponse, DepositRequest, MutationResponse, TransactionView, TransferRequest,
    TransferResponse, WithdrawRequest,
};
use crate::ledger::services;
use crate::state::AppState;

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/accounts", get(list_accounts))
        .route("/accounts/:id/balance", get(balance))
        .route("/accounts/:id/transactions", get(transactions))
}

pub fn transaction_routes() -> Router<AppState> {
    Router::new()
        .route("/transactions/deposit", post(deposit))
        .route("/transactions/withdraw", post(withdraw))
        .route("/transactions/transfer", post(transfer))
}

/// A caller may act on their own account; admins may act on any.
fn require_account_access(
    auth: &Account,
    target: AccountId,
) -> Result<(), (StatusCode, String)> {
    if auth.account_id == target || auth.is_admin {
        Ok(())
    } else {
        warn!(account_id = %auth.account_id, target = %target, "account access denied");
        Err((StatusCode::FORBIDDEN, "forbidden".to_string()))
    }
}

#[instrument(skip(state, auth))]
pub async fn list_accounts(
    State(state): State<AppState>,
    AuthAccount(auth): AuthAccount,
) -> Result<Json<Vec<AccountView>>, (StatusCode, String)> {
    if !auth.is_admin {
        return Err((StatusCode::FORBIDDEN, "forbidden".to_string()));
    }
    let accounts = services::list_accounts(state.store.as_ref())
        .await
        .map_err(into_http)?;
    Ok(Json(accounts.iter().map(AccountView::from).collect()))
}

#[instrument(skip(state, auth))]
pub async fn balance(
    State(state): State<AppState>,
    AuthAccount(auth): AuthAccount,
    Path(id): Path<i64>,
) -> Result<Json<BalanceResponse>, (StatusCode, String)> {
    let account_id = AccountId(id);
    require_account_access(&auth, account_id)?;
    let account = services::balance_of(state.store.as_ref(), account_id)
        .await
        .map_err(into_http)?;
    Ok(Json(BalanceResponse::from(&account)))
}

#[instrument(skip(state, auth))]
pub async fn transactions(
    State(state): State<AppState>,
    AuthAccount(auth): AuthAccount,
    Path(id): Path<i64>,
) -> Result<Json<Vec<TransactionView>>, (StatusCode, String)> {
    let account_id = AccountId(id);
    require_account_access(&auth, account_id)?;
    let entries = services::transactions_of(state.store.as_ref(), account_id)
        .await
        .map_err(into_http)?;
    Ok(Json(entries.iter().map(TransactionView::from).collect()))
}

#[instrument(skip(state, auth, payload))]
pub async fn deposit(
    State(state): State<AppState>,
    AuthAccount(auth): AuthAccount,
    Json(payload): Json<DepositRequest>,
) -> Result<Json<MutationResponse>, (StatusCode, String)> {
    require_account_access(&auth, payload.account_id)?;
    let (account, entry) = services::deposit(
        state.store.as_ref(),
        payload.account_id,
        payload.amount,
        &payload.currency,
        payload.description,
    )
    .await
    .map_err(into_http)?;
    Ok(Json(MutationResponse {
        account: BalanceResponse::from(&account),
        transaction: TransactionView::from(&entry),
    }))
}

#[instrument(skip(state, auth, payload))]
pub async fn withdraw(
    State(state): State<AppState>,
    AuthAccount(auth): AuthAccount,
    Json(payload): Json<WithdrawRequest>,
) -> Result<Json<MutationResponse>, (StatusCode, String)> {
    require_account_access(&auth, payload.account_id)?;
    let (account, entry) = services::withdraw(
        state.store.as_ref(),
        payload.account_id,
        payload.amount,
        &payload.currency,
        payload.description,
    )
    .await
    .map_err(into_http)?;
    Ok(Json(MutationResponse {
        account: BalanceResponse::from(&account),
        transaction: TransactionView::from(&entry),
    }))
}

#[instrument(skip(state, auth, payload))]
pub async fn transfer(
    State(state): State<AppState>,
    AuthAccount(auth): AuthAccount,
    Json(payload): Json<TransferRequest>,
) -> Result<Json<TransferResponse>, (StatusCode, String)> {
    // Only the source account (or an admin) may move funds out of it.
    require_account_access(&auth, payload.from_account_id)?;
    let outcome = services::transfer(
        state.store.as_ref(),
        payload.from_account_id,
        payload.to_account_id,
        payload.amount,
        &payload.currency,
        payload.description,
    )
    .await
    .map_err(into_http)?;
    Ok(Json(TransferResponse {
        from: BalanceResponse::from(&outcome.from),
        to: BalanceResponse::from(&outcome.to),
        debit: TransactionView::from(&outcome.debit),
        credit: TransactionView::from(&outcome.credit),
    }))
}
