use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

use crate::domain::{
    Account, AccountId, AccountType, Currency, NewAccount, NewTransaction, Transaction,
    TransactionId, TxKind, TxStatus,
};
use crate::error::{LedgerError, LedgerResult};
use crate::store::LedgerStore;

const ACCOUNT_COLUMNS: &str = "account_id, username, email, password_hash, account_type, \
     balance, currency, phone, address, is_active, is_admin, created_at, updated_at";

const TX_COLUMNS: &str = "transaction_id, account_id, kind, amount, currency, status, \
     counterpart_id, occurred_at, description, created_at, updated_at";

/// Postgres-backed store. Row-level `FOR UPDATE` locks inside a transaction
/// serialize balance mutation per account; unique and CHECK constraints in
/// the schema back the same invariants the domain enforces.
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn storage(err: sqlx::Error) -> LedgerError {
    LedgerError::Storage(anyhow::Error::new(err))
}

/// Translates unique/foreign-key violations into the taxonomy; anything
/// else stays an internal storage error.
fn map_db_error(err: sqlx::Error) -> LedgerError {
    if let Some(db) = err.as_database_error() {
        match db.constraint() {
            Some("accounts_username_key") => return LedgerError::DuplicateUsername,
            Some("accounts_email_key") => return LedgerError::DuplicateEmail,
            Some("transactions_account_id_fkey") => return LedgerError::AccountNotFound,
            _ => {}
        }
    }
    storage(err)
}

#[derive(FromRow)]
struct AccountRow {
    account_id: i64,
    username: String,
    email: String,
    password_hash: String,
    account_type: String,
    balance: i64,
    currency: String,
    phone: String,
    address: String,
    is_active: bool,
    is_admin: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<AccountRow> for Account {
    type Error = LedgerError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let account_type = AccountType::from_str(&row.account_type)
            .ok_or_else(|| LedgerError::Storage(anyhow::anyhow!("corrupt account_type column")))?;
        let currency = Currency::parse(&row.currency)
            .map_err(|_| LedgerError::Storage(anyhow::anyhow!("corrupt currency column")))?;
        Ok(Account {
            account_id: AccountId(row.account_id),
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            account_type,
            balance: row.balance,
            currency,
            phone: row.phone,
            address: row.address,
            is_active: row.is_active,
            is_admin: row.is_admin,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct TxRow {
    transaction_id: i64,
    account_id: i64,
    kind: String,
    amount: i64,
    currency: String,
    status: String,
    counterpart_id: Option<i64>,
    occurred_at: OffsetDateTime,
    description: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<TxRow> for Transaction {
    type Error = LedgerError;

    fn try_from(row: TxRow) -> Result<Self, Self::Error> {
        let kind = TxKind::from_str(&row.kind)
            .ok_or_else(|| LedgerError::Storage(anyhow::anyhow!("corrupt kind column")))?;
        let status = TxStatus::from_str(&row.status)
            .ok_or_else(|| LedgerError::Storage(anyhow::anyhow!("corrupt status column")))?;
        let currency = Currency::parse(&row.currency)
            .map_err(|_| LedgerError::Storage(anyhow::anyhow!("corrupt currency column")))?;
        Ok(Transaction {
            transaction_id: TransactionId(row.transaction_id),
            account_id: AccountId(row.account_id),
            kind,
            amount: row.amount,
            currency,
            status,
            counterpart: row.counterpart_id.map(TransactionId),
            timestamp: row.occurred_at,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn insert_account(&self, new: NewAccount) -> LedgerResult<Account> {
        let row: AccountRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO accounts
                (username, email, password_hash, account_type, currency,
                 phone, address, is_admin)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.account_type.as_str())
        .bind(new.currency.as_str())
        .bind(&new.phone)
        .bind(&new.address)
        .bind(new.is_admin)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;
        row.try_into()
    }

    async fn account_by_id(&self, id: AccountId) -> LedgerResult<Account> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            r#"SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_id = $1"#
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        row.ok_or(LedgerError::AccountNotFound)?.try_into()
    }

    async fn account_by_username(&self, username: &str) -> LedgerResult<Account> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            r#"SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = $1"#
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        row.ok_or(LedgerError::AccountNotFound)?.try_into()
    }

    async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        let rows: Vec<AccountRow> = sqlx::query_as(&format!(
            r#"SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY account_id"#
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows.into_iter().map(Account::try_from).collect()
    }

    async fn apply_delta(
        &self,
        id: AccountId,
        delta: i64,
        expected: &Currency,
    ) -> LedgerResult<Account> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let row: Option<AccountRow> = sqlx::query_as(&format!(
            r#"SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_id = $1 FOR UPDATE"#
        ))
        .bind(id.0)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage)?;
        let account: Account = row.ok_or(LedgerError::AccountNotFound)?.try_into()?;

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

        let row: AccountRow = sqlx::query_as(&format!(
            r#"
            UPDATE accounts SET balance = $2, updated_at = now()
            WHERE account_id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(id.0)
        .bind(next)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        row.try_into()
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
        let mut tx = self.pool.begin().await.map_err(storage)?;

        // Ascending id order keeps crossing transfers deadlock-free.
        let rows: Vec<AccountRow> = sqlx::query_as(&format!(
            r#"
            SELECT {ACCOUNT_COLUMNS} FROM accounts
            WHERE account_id = $1 OR account_id = $2
            ORDER BY account_id
            FOR UPDATE
            "#
        ))
        .bind(from.0)
        .bind(to.0)
        .fetch_all(&mut *tx)
        .await
        .map_err(storage)?;
        if rows.len() != 2 {
            return Err(LedgerError::AccountNotFound);
        }

        let mut src = None;
        let mut dst = None;
        for row in rows {
            let account: Account = row.try_into()?;
            if account.account_id == from {
                src = Some(account);
            } else {
                dst = Some(account);
            }
        }
        let src = src.ok_or(LedgerError::AccountNotFound)?;
        let dst = dst.ok_or(LedgerError::AccountNotFound)?;

        if src.currency != *expected || dst.currency != *expected {
            return Err(LedgerError::CurrencyMismatch);
        }
        if src.balance < amount {
            return Err(LedgerError::InsufficientFunds);
        }
        let credited = dst
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::Validation("balance out of range"))?;

        let src_row: AccountRow = sqlx::query_as(&format!(
            r#"
            UPDATE accounts SET balance = $2, updated_at = now()
            WHERE account_id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(from.0)
        .bind(src.balance - amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage)?;

        let dst_row: AccountRow = sqlx::query_as(&format!(
            r#"
            UPDATE accounts SET balance = $2, updated_at = now()
            WHERE account_id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(to.0)
        .bind(credited)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        Ok((src_row.try_into()?, dst_row.try_into()?))
    }

    async fn record_transaction(&self, new: NewTransaction) -> LedgerResult<Transaction> {
        if new.amount <= 0 {
            return Err(LedgerError::Validation("amount must be positive"));
        }
        let row: TxRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO transactions (account_id, kind, amount, currency, description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {TX_COLUMNS}
            "#
        ))
        .bind(new.account_id.0)
        .bind(new.kind.as_str())
        .bind(new.amount)
        .bind(new.currency.as_str())
        .bind(&new.description)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;
        row.try_into()
    }

    async fn record_transfer_pair(
        &self,
        debit: NewTransaction,
        credit: NewTransaction,
    ) -> LedgerResult<(Transaction, Transaction)> {
        if debit.amount <= 0 || credit.amount <= 0 {
            return Err(LedgerError::Validation("amount must be positive"));
        }
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let debit_row: TxRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO transactions (account_id, kind, amount, currency, description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {TX_COLUMNS}
            "#
        ))
        .bind(debit.account_id.0)
        .bind(debit.kind.as_str())
        .bind(debit.amount)
        .bind(debit.currency.as_str())
        .bind(&debit.description)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_db_error)?;

        let credit_row: TxRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO transactions
                (account_id, kind, amount, currency, description, counterpart_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {TX_COLUMNS}
            "#
        ))
        .bind(credit.account_id.0)
        .bind(credit.kind.as_str())
        .bind(credit.amount)
        .bind(credit.currency.as_str())
        .bind(&credit.description)
        .bind(debit_row.transaction_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_db_error)?;

        let debit_row: TxRow = sqlx::query_as(&format!(
            r#"
            UPDATE transactions SET counterpart_id = $2, updated_at = now()
            WHERE transaction_id = $1
            RETURNING {TX_COLUMNS}
            "#
        ))
        .bind(debit_row.transaction_id)
        .bind(credit_row.transaction_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        Ok((debit_row.try_into()?, credit_row.try_into()?))
    }

    async fn mark_transaction(
        &self,
        id: TransactionId,
        status: TxStatus,
    ) -> LedgerResult<Transaction> {
        if !TxStatus::Pending.can_become(status) {
            return Err(LedgerError::InvalidTransition);
        }

        let row: Option<TxRow> = sqlx::query_as(&format!(
            r#"
            UPDATE transactions SET status = $2, updated_at = now()
            WHERE transaction_id = $1 AND status = 'pending'
            RETURNING {TX_COLUMNS}
            "#
        ))
        .bind(id.0)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        match row {
            Some(row) => row.try_into(),
            None => {
                let exists: Option<(i64,)> =
                    sqlx::query_as("SELECT transaction_id FROM transactions WHERE transaction_id = $1")
                        .bind(id.0)
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(storage)?;
                match exists {
                    Some(_) => Err(LedgerError::InvalidTransition),
                    None => Err(LedgerError::TransactionNotFound),
                }
            }
        }
    }

    async fn transactions_for_account(&self, id: AccountId) -> LedgerResult<Vec<Transaction>> {
        let rows: Vec<TxRow> = sqlx::query_as(&format!(
            r#"
            SELECT {TX_COLUMNS} FROM transactions
            WHERE account_id = $1
            ORDER BY transaction_id
            "#
        ))
        .bind(id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows.into_iter().map(Transaction::try_from).collect()
    }
}
