use tracing::{info, warn};

use crate::domain::{
    Account, AccountId, Currency, NewTransaction, Transaction, TransactionId, TxKind, TxStatus,
};
use crate::error::{LedgerError, LedgerResult};
use crate::store::LedgerStore;

/// Result of a settled transfer: both updated accounts and both legs of
/// the journal pair.
#[derive(Debug)]
pub struct TransferOutcome {
    pub from: Account,
    pub to: Account,
    pub debit: Transaction,
    pub credit: Transaction,
}

async fn mark_failed(store: &dyn LedgerStore, id: TransactionId) {
    if let Err(err) = store.mark_transaction(id, TxStatus::Failed).await {
        warn!(transaction_id = %id, error = %err, "could not mark journal entry failed");
    }
}

/// Single-account mutation: journal first, then the balance delta, then
/// the status settle. A failed delta leaves the entry `failed` and the
/// balance untouched.
async fn mutate(
    store: &dyn LedgerStore,
    account_id: AccountId,
    kind: TxKind,
    amount: i64,
    delta: i64,
    currency_code: &str,
    description: String,
) -> LedgerResult<(Account, Transaction)> {
    if amount <= 0 {
        return Err(LedgerError::Validation("amount must be positive"));
    }
    let currency = Currency::parse(currency_code)?;
    store.account_by_id(account_id).await?;

    let entry = store
        .record_transaction(NewTransaction {
            account_id,
            kind,
            amount,
            currency: currency.clone(),
            description,
        })
        .await?;

    match store.apply_delta(account_id, delta, &currency).await {
        Ok(account) => {
            let entry = store
                .mark_transaction(entry.transaction_id, TxStatus::Completed)
                .await?;
            info!(
                account_id = %account.account_id,
                transaction_id = %entry.transaction_id,
                kind = kind.as_str(),
                amount,
                "transaction completed"
            );
            Ok((account, entry))
        }
        Err(err) => {
            mark_failed(store, entry.transaction_id).await;
            Err(err)
        }
    }
}

pub async fn deposit(
    store: &dyn LedgerStore,
    account_id: AccountId,
    amount: i64,
    currency: &str,
    description: Option<String>,
) -> LedgerResult<(Account, Transaction)> {
    let description = description.unwrap_or_else(|| "deposit".to_string());
    mutate(
        store,
        account_id,
        TxKind::Deposit,
        amount,
        amount,
        currency,
        description,
    )
    .await
}

pub async fn withdraw(
    store: &dyn LedgerStore,
    account_id: AccountId,
    amount: i64,
    currency: &str,
    description: Option<String>,
) -> LedgerResult<(Account, Transaction)> {
    let description = description.unwrap_or_else(|| "withdrawal".to_string());
    mutate(
        store,
        account_id,
        TxKind::Withdrawal,
        amount,
        -amount,
        currency,
        description,
    )
    .await
}

/// Moves `amount` between two accounts as one unit: two linked journal
/// entries, debit and credit applied together or not at all.
pub async fn transfer(
    store: &dyn LedgerStore,
    from: AccountId,
    to: AccountId,
    amount: i64,
    currency_code: &str,
    description: Option<String>,
) -> LedgerResult<TransferOutcome> {
    if from == to {
        return Err(LedgerError::SelfTransfer);
    }
    if amount <= 0 {
        return Err(LedgerError::Validation("amount must be positive"));
    }
    let currency = Currency::parse(currency_code)?;
    store.account_by_id(from).await?;
    store.account_by_id(to).await?;

    let debit_description = description
        .clone()
        .unwrap_or_else(|| format!("transfer to account {to}"));
    let credit_description = description.unwrap_or_else(|| format!("transfer from account {from}"));

    let (debit, credit) = store
        .record_transfer_pair(
            NewTransaction {
                account_id: from,
                kind: TxKind::TransferOut,
                amount,
                currency: currency.clone(),
                description: debit_description,
            },
            NewTransaction {
                account_id: to,
                kind: TxKind::TransferIn,
                amount,
                currency: currency.clone(),
                description: credit_description,
            },
        )
        .await?;

    match store.transfer_deltas(from, to, amount, &currency).await {
        Ok((from_account, to_account)) => {
            let debit = store
                .mark_transaction(debit.transaction_id, TxStatus::Completed)
                .await?;
            let credit = store
                .mark_transaction(credit.transaction_id, TxStatus::Completed)
                .await?;
            info!(
                from = %from, to = %to, amount,
                debit_id = %debit.transaction_id,
                credit_id = %credit.transaction_id,
                "transfer completed"
            );
            Ok(TransferOutcome {
                from: from_account,
                to: to_account,
                debit,
                credit,
            })
        }
        Err(err) => {
            mark_failed(store, debit.transaction_id).await;
            mark_failed(store, credit.transaction_id).await;
            Err(err)
        }
    }
}

pub async fn balance_of(store: &dyn LedgerStore, account_id: AccountId) -> LedgerResult<Account> {
    store.account_by_id(account_id).await
}

pub async fn transactions_of(
    store: &dyn LedgerStore,
    account_id: AccountId,
) -> LedgerResult<Vec<Transaction>> {
    store.account_by_id(account_id).await?;
    store.transactions_for_account(account_id).await
}

pub async fn list_accounts(store: &dyn LedgerStore) -> LedgerResult<Vec<Account>> {
    store.list_accounts().await
}
