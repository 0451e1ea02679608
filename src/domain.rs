use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::LedgerError;

/// Monotonic account identifier, allocated by the store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct AccountId(pub i64);

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Monotonic journal entry identifier, allocated by the store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct TransactionId(pub i64);

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Savings,
    Checking,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Savings => "savings",
            AccountType::Checking => "checking",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "savings" => Some(AccountType::Savings),
            "checking" => Some(AccountType::Checking),
            _ => None,
        }
    }
}

/// ISO-style currency code: exactly three ASCII letters, held uppercase.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    pub fn parse(code: &str) -> Result<Self, LedgerError> {
        let code = code.trim();
        if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(LedgerError::Validation("unknown currency"));
        }
        Ok(Currency(code.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Direction of a journal entry. Amounts are always positive; the kind
/// carries the sign.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Deposit,
    Withdrawal,
    TransferIn,
    TransferOut,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Deposit => "deposit",
            TxKind::Withdrawal => "withdrawal",
            TxKind::TransferIn => "transfer_in",
            TxKind::TransferOut => "transfer_out",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "deposit" => Some(TxKind::Deposit),
            "withdrawal" => Some(TxKind::Withdrawal),
            "transfer_in" => Some(TxKind::TransferIn),
            "transfer_out" => Some(TxKind::TransferOut),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Completed,
    Failed,
    Reversed,
}

impl TxStatus {
    /// Journal entries are append-only: the only legal mutations are
    /// `pending -> completed` and `pending -> failed`.
    pub fn can_become(self, next: TxStatus) -> bool {
        matches!(
            (self, next),
            (TxStatus::Pending, TxStatus::Completed) | (TxStatus::Pending, TxStatus::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Completed => "completed",
            TxStatus::Failed => "failed",
            TxStatus::Reversed => "reversed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TxStatus::Pending),
            "completed" => Some(TxStatus::Completed),
            "failed" => Some(TxStatus::Failed),
            "reversed" => Some(TxStatus::Reversed),
            _ => None,
        }
    }
}

/// Account record. Balances are integer minor units; the hash never leaves
/// the process through serialization.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub account_id: AccountId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub account_type: AccountType,
    pub balance: i64,
    pub currency: Currency,
    pub phone: String,
    pub address: String,
    pub is_active: bool,
    pub is_admin: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Journal entry. `counterpart` links the two legs of a transfer to each
/// other; it is None for deposits and withdrawals.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub transaction_id: TransactionId,
    pub account_id: AccountId,
    pub kind: TxKind,
    pub amount: i64,
    pub currency: Currency,
    pub status: TxStatus,
    pub counterpart: Option<TransactionId>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Validated input for account creation. The store allocates the id,
/// zeroes the balance and stamps the timestamps.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub account_type: AccountType,
    pub currency: Currency,
    pub phone: String,
    pub address: String,
    pub is_admin: bool,
}

/// Validated input for a single journal entry.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub account_id: AccountId,
    pub kind: TxKind,
    pub amount: i64,
    pub currency: Currency,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_normalizes_to_uppercase() {
        let c = Currency::parse("usd").expect("three letters should parse");
        assert_eq!(c.as_str(), "USD");
    }

    #[test]
    fn currency_rejects_non_iso_input() {
        assert!(Currency::parse("").is_err());
        assert!(Currency::parse("US").is_err());
        assert!(Currency::parse("DOLLARS").is_err());
        assert!(Currency::parse("U$D").is_err());
    }

    #[test]
    fn only_pending_entries_can_move() {
        assert!(TxStatus::Pending.can_become(TxStatus::Completed));
        assert!(TxStatus::Pending.can_become(TxStatus::Failed));
        assert!(!TxStatus::Pending.can_become(TxStatus::Reversed));
        assert!(!TxStatus::Completed.can_become(TxStatus::Pending));
        assert!(!TxStatus::Completed.can_become(TxStatus::Failed));
        assert!(!TxStatus::Failed.can_become(TxStatus::Completed));
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            TxStatus::Pending,
            TxStatus::Completed,
            TxStatus::Failed,
            TxStatus::Reversed,
        ] {
            assert_eq!(TxStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(TxStatus::from_str("settled"), None);
    }
}
