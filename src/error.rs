use axum::http::StatusCode;
use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Error taxonomy surfaced by every ledger operation.
///
/// Display strings are fixed and safe to return to callers; the underlying
/// cause of a `Storage` error is logged, never serialized.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid input: {0}")]
    Validation(&'static str),

    #[error("currency mismatch")]
    CurrencyMismatch,

    #[error("username already registered")]
    DuplicateUsername,

    #[error("email already registered")]
    DuplicateEmail,

    #[error("cannot transfer to the same account")]
    SelfTransfer,

    #[error("account not found")]
    AccountNotFound,

    #[error("transaction not found")]
    TransactionNotFound,

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("token expired")]
    TokenExpired,

    #[error("malformed token")]
    TokenMalformed,

    #[error("invalid token signature")]
    TokenSignatureInvalid,

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("illegal transaction status transition")]
    InvalidTransition,

    #[error("internal storage error")]
    Storage(anyhow::Error),
}

impl LedgerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            LedgerError::Validation(_) | LedgerError::CurrencyMismatch => StatusCode::BAD_REQUEST,
            LedgerError::DuplicateUsername
            | LedgerError::DuplicateEmail
            | LedgerError::SelfTransfer
            | LedgerError::InvalidTransition => StatusCode::CONFLICT,
            LedgerError::AccountNotFound | LedgerError::TransactionNotFound => {
                StatusCode::NOT_FOUND
            }
            LedgerError::InsufficientFunds => StatusCode::UNPROCESSABLE_ENTITY,
            LedgerError::InvalidCredentials
            | LedgerError::TokenExpired
            | LedgerError::TokenMalformed
            | LedgerError::TokenSignatureInvalid
            | LedgerError::Unauthenticated => StatusCode::UNAUTHORIZED,
            LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Maps a ledger error to the handler rejection shape used across routes.
/// Storage causes stay in the logs; the response body only carries the
/// fixed Display message.
pub fn into_http(err: LedgerError) -> (StatusCode, String) {
    if let LedgerError::Storage(ref cause) = err {
        tracing::error!(error = %cause, "storage failure");
    }
    (err.status_code(), err.to_string())
}
