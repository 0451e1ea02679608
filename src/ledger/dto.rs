use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::{Account, AccountId, Transaction, TransactionId, TxKind, TxStatus};

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub account_id: AccountId,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub account_id: AccountId,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Balance projection for one account.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub account_id: AccountId,
    pub balance: i64,
    pub currency: String,
}

impl From<&Account> for BalanceResponse {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.account_id,
            balance: account.balance,
            currency: account.currency.as_str().to_string(),
        }
    }
}

/// Journal entry as returned to clients.
#[derive(Debug, Serialize)]
pub struct TransactionView {
    pub transaction_id: TransactionId,
    pub account_id: AccountId,
    pub kind: TxKind,
    pub amount: i64,
    pub currency: String,
    pub status: TxStatus,
    pub counterpart: Option<TransactionId>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub description: String,
}

impl From<&Transaction> for TransactionView {
    fn from(tx: &Transaction) -> Self {
        Self {
            transaction_id: tx.transaction_id,
            account_id: tx.account_id,
            kind: tx.kind,
            amount: tx.amount,
            currency: tx.currency.as_str().to_string(),
            status: tx.status,
            counterpart: tx.counterpart,
            timestamp: tx.timestamp,
            description: tx.description.clone(),
        }
    }
}

/// Result of a deposit or withdrawal: the settled journal entry and the
/// account's new balance.
#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub account: BalanceResponse,
    pub transaction: TransactionView,
}

/// Result of a transfer: both balances and both linked legs.
#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub from: BalanceResponse,
    pub to: BalanceResponse,
    pub debit: TransactionView,
    pub credit: TransactionView,
}
