use async_trait::async_trait;

use crate::domain::{
    Account, AccountId, Currency, NewAccount, NewTransaction, Transaction, TransactionId, TxStatus,
};
use crate::error::LedgerResult;

mod memory;
mod postgres;

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

/// Persistence seam for accounts and the transaction journal.
///
/// All balance mutation goes through `apply_delta` (one account) or
/// `transfer_deltas` (two accounts, all-or-nothing). Implementations must
/// serialize mutations per account while letting operations on different
/// accounts proceed concurrently.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Persists a new account with a store-allocated monotonic id and a
    /// zero balance. Username and email collisions are rejected.
    async fn insert_account(&self, new: NewAccount) -> LedgerResult<Account>;

    async fn account_by_id(&self, id: AccountId) -> LedgerResult<Account>;

    async fn account_by_username(&self, username: &str) -> LedgerResult<Account>;

    /// All accounts in creation order.
    async fn list_accounts(&self) -> LedgerResult<Vec<Account>>;

    /// Applies a signed balance delta to one account. Rejects a currency
    /// mismatch, and a negative delta that would drive the balance below
    /// zero, without partial effect.
    async fn apply_delta(
        &self,
        id: AccountId,
        delta: i64,
        expected: &Currency,
    ) -> LedgerResult<Account>;

    /// Debits `from` and credits `to` by `amount` as one unit. Both
    /// accounts are acquired in ascending id order; either both deltas
    /// apply or neither does. Returns the updated (source, destination).
    async fn transfer_deltas(
        &self,
        from: AccountId,
        to: AccountId,
        amount: i64,
        expected: &Currency,
    ) -> LedgerResult<(Account, Account)>;

    /// Appends a pending journal entry.
    async fn record_transaction(&self, new: NewTransaction) -> LedgerResult<Transaction>;

    /// Appends the two pending legs of a transfer, cross-linked through
    /// their `counterpart` references. Returns (debit leg, credit leg).
    async fn record_transfer_pair(
        &self,
        debit: NewTransaction,
        credit: NewTransaction,
    ) -> LedgerResult<(Transaction, Transaction)>;

    /// Moves a pending entry to `completed` or `failed`. Every other
    /// transition is rejected.
    async fn mark_transaction(
        &self,
        id: TransactionId,
        status: TxStatus,
    ) -> LedgerResult<Transaction>;

    /// Journal entries for one account, oldest first.
    async fn transactions_for_account(&self, id: AccountId) -> LedgerResult<Vec<Transaction>>;
}
