use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::auth::dto::RegisterRequest;
use crate::auth::jwt::JwtKeys;
use crate::auth::password::{hash_password, verify_password};
use crate::domain::{Account, Currency, NewAccount};
use crate::error::{LedgerError, LedgerResult};
use crate::store::LedgerStore;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username.len() <= 64
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Registers a new account: validates the registration, hashes the
/// password, persists with a zero balance. Username/email collisions
/// surface as conflicts from the store.
pub async fn register(store: &dyn LedgerStore, req: RegisterRequest) -> LedgerResult<Account> {
    let username = req.username.trim().to_string();
    if !is_valid_username(&username) {
        return Err(LedgerError::Validation("invalid username"));
    }

    let email = req.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(LedgerError::Validation("invalid email"));
    }

    if req.password.len() < 8 {
        return Err(LedgerError::Validation("password too short"));
    }

    let currency = Currency::parse(&req.currency)?;
    let password_hash = hash_password(&req.password)?;

    let account = store
        .insert_account(NewAccount {
            username,
            email,
            password_hash,
            account_type: req.account_type,
            currency,
            phone: req.phone,
            address: req.address,
            is_admin: req.is_admin,
        })
        .await?;

    info!(account_id = %account.account_id, username = %account.username, "account registered");
    Ok(account)
}

/// Checks a username/password pair. Both the unknown-username and the
/// wrong-password paths collapse into the same error so callers cannot
/// tell which field was wrong.
pub async fn authenticate(
    store: &dyn LedgerStore,
    username: &str,
    password: &str,
) -> LedgerResult<Account> {
    let account = match store.account_by_username(username).await {
        Ok(account) => account,
        Err(LedgerError::AccountNotFound) => {
            warn!(username = %username, "login for unknown username");
            return Err(LedgerError::InvalidCredentials);
        }
        Err(err) => return Err(err),
    };

    if !verify_password(password, &account.password_hash)? {
        warn!(username = %username, "login with invalid password");
        return Err(LedgerError::InvalidCredentials);
    }

    Ok(account)
}

/// Resolves a bearer token to its live account. Fails if the token does
/// not validate, the account is gone, or the account is deactivated.
pub async fn current_account(
    store: &dyn LedgerStore,
    keys: &JwtKeys,
    token: &str,
) -> LedgerResult<Account> {
    let claims = keys.verify(token)?;
    let account = match store.account_by_username(&claims.sub).await {
        Ok(account) => account,
        Err(LedgerError::AccountNotFound) => return Err(LedgerError::Unauthenticated),
        Err(err) => return Err(err),
    };
    if !account.is_active {
        return Err(LedgerError::Unauthenticated);
    }
    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::domain::AccountType;
    use crate::store::MemoryLedgerStore;

    fn registration(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: "hunter2hunter2".to_string(),
            account_type: AccountType::Checking,
            currency: "usd".to_string(),
            phone: "+1234567890".to_string(),
            address: "123 Main St".to_string(),
            is_admin: false,
        }
    }

    fn make_keys() -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 45,
        })
    }

    #[tokio::test]
    async fn register_starts_at_zero_balance_with_uppercased_currency() {
        let store = MemoryLedgerStore::new();
        let account = register(&store, registration("alice", "alice@example.com"))
            .await
            .unwrap();
        assert_eq!(account.balance, 0);
        assert_eq!(account.currency.as_str(), "USD");
        assert!(account.is_active);
        assert_ne!(account.password_hash, "hunter2hunter2");
    }

    #[tokio::test]
    async fn register_rejects_bad_input() {
        let store = MemoryLedgerStore::new();

        let mut req = registration("alice", "alice@example.com");
        req.password = "short".into();
        assert!(matches!(
            register(&store, req).await.unwrap_err(),
            LedgerError::Validation(_)
        ));

        let req = registration("", "alice@example.com");
        assert!(matches!(
            register(&store, req).await.unwrap_err(),
            LedgerError::Validation(_)
        ));

        let req = registration("alice", "not-an-email");
        assert!(matches!(
            register(&store, req).await.unwrap_err(),
            LedgerError::Validation(_)
        ));

        let mut req = registration("alice", "alice@example.com");
        req.currency = "DOLLARS".into();
        assert!(matches!(
            register(&store, req).await.unwrap_err(),
            LedgerError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn authenticate_accepts_correct_credentials_only() {
        let store = MemoryLedgerStore::new();
        register(&store, registration("alice", "alice@example.com"))
            .await
            .unwrap();

        let account = authenticate(&store, "alice", "hunter2hunter2").await.unwrap();
        assert_eq!(account.username, "alice");

        let err = authenticate(&store, "alice", "wrong-password").await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidCredentials));

        let err = authenticate(&store, "nobody", "hunter2hunter2").await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidCredentials));
    }

    #[tokio::test]
    async fn current_account_resolves_a_valid_token() {
        let store = MemoryLedgerStore::new();
        let keys = make_keys();
        let account = register(&store, registration("alice", "alice@example.com"))
            .await
            .unwrap();

        let signed = keys.sign(&account).unwrap();
        let resolved = current_account(&store, &keys, &signed.token).await.unwrap();
        assert_eq!(resolved.account_id, account.account_id);
    }

    #[tokio::test]
    async fn current_account_rejects_unknown_subject() {
        let store = MemoryLedgerStore::new();
        let keys = make_keys();
        let account = register(&store, registration("alice", "alice@example.com"))
            .await
            .unwrap();

        // Token for an account that only exists in another store.
        let other_store = MemoryLedgerStore::new();
        let signed = keys.sign(&account).unwrap();
        let err = current_account(&other_store, &keys, &signed.token)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Unauthenticated));
    }
}
