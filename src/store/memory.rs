use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::domain::{
    Account, AccountId, Currency, NewAccount, NewTransaction, Transaction, TransactionId,
    TxStatus,
};
use crate::error::{LedgerError, LedgerResult};
use crate::store::LedgerStore;

/// In-memory arena store. Each account lives in its own mutex cell so
/// mutations on one account serialize while other accounts stay free;
/// the outer lock only guards the maps and the journal.
pub struct MemoryLedgerStore {
    state: RwLock<State>,
    next_account_id: AtomicI64,
    next_transaction_id: AtomicI64,
}

#[derive(Default)]
struct State {
    accounts: BTreeMap<i64, Arc<Mutex<Account>>>,
    by_username: HashMap<String, i64>,
    by_email: HashMap<String, i64>,
    journal: BTreeMap<i64, Transaction>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            next_account_id: AtomicI64::new(1),
            next_transaction_id: AtomicI64::new(1),
        }
    }

    async fn account_cell(&self, id: AccountId) -> LedgerResult<Arc<Mutex<Account>>> {
        self.state
            .read()
            .await
            .accounts
            .get(&id.0)
            .cloned()
            .ok_or(LedgerError::AccountNotFound)
    }
}

fn build_entry(id: i64, new: NewTransaction, now: OffsetDateTime) -> Transaction {
    Transaction {
        transaction_id: TransactionId(id),
        account_id: new.account_id,
        kind: new.kind,
        amount: new.amount,
        currency: new.currency,
        status: TxStatus::Pending,
        counterpart: None,
        timestamp: now,
        description: new.description,
        created_at: now,
        updated_at: now,
    }
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

fn checked_apply(account: &mut Account, delta: i64, expected: &Currency) -> LedgerResult<()> {
    if account.currency != *expected {
        return Err(LedgerError::CurrencyMismatch);
    }
    let next = account
        .balance
        .checked_add(delta)
        .ok_or(LedgerError::Validation("balance out of range"))?;
    if next < 0 {
        return Err(LedgerError::InsufficientFunds);
    }
    account.balance = next;
    account.updated_at = OffsetDateTime::now_utc();
    Ok(())
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn insert_account(&self, new: NewAccount) -> LedgerResult<Account> {
        let mut state = self.state.write().await;
        if state.by_username.contains_key(&new.username) {
            return Err(LedgerError::DuplicateUsername);
        }
        if state.by_email.contains_key(&new.email) {
            return Err(LedgerError::DuplicateEmail);
        }

        let id = self.next_account_id.fetch_add(1, Ordering::SeqCst);
        let now = OffsetDateTime::now_utc();
        let account = Account {
            account_id: AccountId(id),
            username: new.username.clone(),
            email: new.email.clone(),
            password_hash: new.password_hash,
            account_type: new.account_type,
            balance: 0,
            currency: new.currency,
            phone: new.phone,
            address: new.address,
            is_active: true,
            is_admin: new.is_admin,
            created_at: now,
            updated_at: now,
        };

        state.by_username.insert(new.username, id);
        state.by_email.insert(new.email, id);
        state
            .accounts
            .insert(id, Arc::new(Mutex::new(account.clone())));
        Ok(account)
    }

    async fn account_by_id(&self, id: AccountId) -> LedgerResult<Account> {
        let cell = self.account_cell(id).await?;
        let account = cell.lock().await;
        Ok(account.clone())
    }

    async fn account_by_username(&self, username: &str) -> LedgerResult<Account> {
        let cell = {
            let state = self.state.read().await;
            let id = state
                .by_username
                .get(username)
                .ok_or(LedgerError::AccountNotFound)?;
            state
                .accounts
                .get(id)
                .cloned()
                .ok_or(LedgerError::AccountNotFound)?
        };
        let account = cell.lock().await;
        Ok(account.clone())
    }

    async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        let state = self.state.read().await;
        let mut out = Vec::with_capacity(state.accounts.len());
        for cell in state.accounts.values() {
            out.push(cell.lock().await.clone());
        }
        Ok(out)
    }

    async fn apply_delta(
        &self,
        id: AccountId,
        delta: i64,
        expected: &Currency,
    ) -> LedgerResult<Account> {
        let cell = self.account_cell(id).await?;
        let mut account = cell.lock().await;
        checked_apply(&mut account, delta, expected)?;
        Ok(account.clone())
    }

    async fn transfer_deltas(
        &self,
        from: AccountId,
        to: AccountId,
        amount: i64,
        expected: &Currency,
    ) -> LedgerResult<(Account, Account)> {
        if from == to {
            return Err(LedgerError::SelfTransfer);
        }
        let from_cell = self.account_cell(from).await?;
        let to_cell = self.account_cell(to).await?;

        // Lock both cells in ascending id order so crossing transfers
        // cannot deadlock.
        let (mut src, mut dst): (MutexGuard<'_, Account>, MutexGuard<'_, Account>) = if from < to {
            let src = from_cell.lock().await;
            let dst = to_cell.lock().await;
            (src, dst)
        } else {
            let dst = to_cell.lock().await;
            let src = from_cell.lock().await;
            (src, dst)
        };

        // Validate both legs before touching either balance.
        if src.currency != *expected || dst.currency != *expected {
            return Err(LedgerError::CurrencyMismatch);
        }
        if src.balance < amount {
            return Err(LedgerError::InsufficientFunds);
        }
        dst.balance
            .checked_add(amount)
            .ok_or(LedgerError::Validation("balance out of range"))?;

        checked_apply(&mut src, -amount, expected)?;
        checked_apply(&mut dst, amount, expected)?;
        Ok((src.clone(), dst.clone()))
    }

    async fn record_transaction(&self, new: NewTransaction) -> LedgerResult<Transaction> {
        if new.amount <= 0 {
            return Err(LedgerError::Validation("amount must be positive"));
        }
        let mut state = self.state.write().await;
        if !state.accounts.contains_key(&new.account_id.0) {
            return Err(LedgerError::AccountNotFound);
        }
        let id = self.next_transaction_id.fetch_add(1, Ordering::SeqCst);
        let entry = build_entry(id, new, OffsetDateTime::now_utc());
        state.journal.insert(id, entry.clone());
        Ok(entry)
    }

    async fn record_transfer_pair(
        &self,
        debit: NewTransaction,
        credit: NewTransaction,
    ) -> LedgerResult<(Transaction, Transaction)> {
        if debit.amount <= 0 || credit.amount <= 0 {
            return Err(LedgerError::Validation("amount must be positive"));
        }
        let mut state = self.state.write().await;
        if !state.accounts.contains_key(&debit.account_id.0)
            || !state.accounts.contains_key(&credit.account_id.0)
        {
            return Err(LedgerError::AccountNotFound);
        }

        let now = OffsetDateTime::now_utc();
        let debit_id = self.next_transaction_id.fetch_add(1, Ordering::SeqCst);
        let credit_id = self.next_transaction_id.fetch_add(1, Ordering::SeqCst);

        let mut debit_entry = build_entry(debit_id, debit, now);
        let mut credit_entry = build_entry(credit_id, credit, now);
        debit_entry.counterpart = Some(TransactionId(credit_id));
        credit_entry.counterpart = Some(TransactionId(debit_id));

        state.journal.insert(debit_id, debit_entry.clone());
        state.journal.insert(credit_id, credit_entry.clone());
        Ok((debit_entry, credit_entry))
    }

    async fn mark_transaction(
        &self,
        id: TransactionId,
        status: TxStatus,
    ) -> LedgerResult<Transaction> {
        let mut state = self.state.write().await;
        let entry = state
            .journal
            .get_mut(&id.0)
            .ok_or(LedgerError::TransactionNotFound)?;
        if !entry.status.can_become(status) {
            return Err(LedgerError::InvalidTransition);
        }
        entry.status = status;
        entry.updated_at = OffsetDateTime::now_utc();
        Ok(entry.clone())
    }

    async fn transactions_for_account(&self, id: AccountId) -> LedgerResult<Vec<Transaction>> {
        let state = self.state.read().await;
        Ok(state
            .journal
            .values()
            .filter(|tx| tx.account_id == id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountType, TxKind};

    fn new_account(username: &str, email: &str) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$fake".to_string(),
            account_type: AccountType::Checking,
            currency: Currency::parse("USD").unwrap(),
            phone: String::new(),
            address: String::new(),
            is_admin: false,
        }
    }

    fn usd() -> Currency {
        Currency::parse("USD").unwrap()
    }

    #[tokio::test]
    async fn ids_are_monotonic_and_list_keeps_creation_order() {
        let store = MemoryLedgerStore::new();
        let a = store.insert_account(new_account("a", "a@x.io")).await.unwrap();
        let b = store.insert_account(new_account("b", "b@x.io")).await.unwrap();
        assert!(b.account_id > a.account_id);

        let all = store.list_accounts().await.unwrap();
        let ids: Vec<_> = all.iter().map(|acct| acct.account_id).collect();
        assert_eq!(ids, vec![a.account_id, b.account_id]);
    }

    #[tokio::test]
    async fn duplicate_username_and_email_are_rejected() {
        let store = MemoryLedgerStore::new();
        store.insert_account(new_account("a", "a@x.io")).await.unwrap();

        let err = store
            .insert_account(new_account("a", "other@x.io"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateUsername));

        let err = store
            .insert_account(new_account("other", "a@x.io"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateEmail));

        assert_eq!(store.list_accounts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn apply_delta_rejects_overdraft_without_effect() {
        let store = MemoryLedgerStore::new();
        let acct = store.insert_account(new_account("a", "a@x.io")).await.unwrap();
        store.apply_delta(acct.account_id, 500, &usd()).await.unwrap();

        let err = store
            .apply_delta(acct.account_id, -700, &usd())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds));
        assert_eq!(store.account_by_id(acct.account_id).await.unwrap().balance, 500);
    }

    #[tokio::test]
    async fn apply_delta_rejects_currency_mismatch() {
        let store = MemoryLedgerStore::new();
        let acct = store.insert_account(new_account("a", "a@x.io")).await.unwrap();
        let err = store
            .apply_delta(acct.account_id, 100, &Currency::parse("EUR").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::CurrencyMismatch));
    }

    #[tokio::test]
    async fn transfer_deltas_is_all_or_nothing() {
        let store = MemoryLedgerStore::new();
        let a = store.insert_account(new_account("a", "a@x.io")).await.unwrap();
        let b = store.insert_account(new_account("b", "b@x.io")).await.unwrap();
        store.apply_delta(a.account_id, 300, &usd()).await.unwrap();

        let (src, dst) = store
            .transfer_deltas(a.account_id, b.account_id, 200, &usd())
            .await
            .unwrap();
        assert_eq!(src.balance, 100);
        assert_eq!(dst.balance, 200);

        // Insufficient funds leaves both sides untouched.
        let err = store
            .transfer_deltas(a.account_id, b.account_id, 500, &usd())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds));
        assert_eq!(store.account_by_id(a.account_id).await.unwrap().balance, 100);
        assert_eq!(store.account_by_id(b.account_id).await.unwrap().balance, 200);
    }

    #[tokio::test]
    async fn transfer_pair_entries_reference_each_other() {
        let store = MemoryLedgerStore::new();
        let a = store.insert_account(new_account("a", "a@x.io")).await.unwrap();
        let b = store.insert_account(new_account("b", "b@x.io")).await.unwrap();

        let (debit, credit) = store
            .record_transfer_pair(
                NewTransaction {
                    account_id: a.account_id,
                    kind: TxKind::TransferOut,
                    amount: 50,
                    currency: usd(),
                    description: "transfer".to_string(),
                },
                NewTransaction {
                    account_id: b.account_id,
                    kind: TxKind::TransferIn,
                    amount: 50,
                    currency: usd(),
                    description: "transfer".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(debit.counterpart, Some(credit.transaction_id));
        assert_eq!(credit.counterpart, Some(debit.transaction_id));
        assert_eq!(debit.status, TxStatus::Pending);
        assert_eq!(credit.status, TxStatus::Pending);
    }

    #[tokio::test]
    async fn mark_transaction_enforces_pending_only() {
        let store = MemoryLedgerStore::new();
        let a = store.insert_account(new_account("a", "a@x.io")).await.unwrap();
        let entry = store
            .record_transaction(NewTransaction {
                account_id: a.account_id,
                kind: TxKind::Deposit,
                amount: 10,
                currency: usd(),
                description: String::new(),
            })
            .await
            .unwrap();

        let entry = store
            .mark_transaction(entry.transaction_id, TxStatus::Completed)
            .await
            .unwrap();
        assert_eq!(entry.status, TxStatus::Completed);

        let err = store
            .mark_transaction(entry.transaction_id, TxStatus::Failed)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition));

        let err = store
            .mark_transaction(TransactionId(999), TxStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::TransactionNotFound));
    }

    #[tokio::test]
    async fn journal_listing_is_oldest_first_per_account() {
        let store = MemoryLedgerStore::new();
        let a = store.insert_account(new_account("a", "a@x.io")).await.unwrap();
        let b = store.insert_account(new_account("b", "b@x.io")).await.unwrap();

        for amount in [10, 20, 30] {
            store
                .record_transaction(NewTransaction {
                    account_id: a.account_id,
                    kind: TxKind::Deposit,
                    amount,
                    currency: usd(),
                    description: String::new(),
                })
                .await
                .unwrap();
        }
        store
            .record_transaction(NewTransaction {
                account_id: b.account_id,
                kind: TxKind::Deposit,
                amount: 99,
                currency: usd(),
                description: String::new(),
            })
            .await
            .unwrap();

        let entries = store.transactions_for_account(a.account_id).await.unwrap();
        let amounts: Vec<_> = entries.iter().map(|tx| tx.amount).collect();
        assert_eq!(amounts, vec![10, 20, 30]);
    }
}
