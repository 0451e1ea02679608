use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::{Account, AccountId, AccountType};

/// Request body for account registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub account_type: AccountType,
    pub currency: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Response returned after login: a bearer token and the account it is for.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub account: AccountView,
}

/// Sanitized account view returned to clients. Never carries the digest.
#[derive(Debug, Serialize)]
pub struct AccountView {
    pub account_id: AccountId,
    pub username: String,
    pub email: String,
    pub account_type: AccountType,
    pub balance: i64,
    pub currency: String,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.account_id,
            username: account.username.clone(),
            email: account.email.clone(),
            account_type: account.account_type,
            balance: account.balance,
            currency: account.currency.as_str().to_string(),
            is_active: account.is_active,
            created_at: account.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Currency;

    #[test]
    fn account_view_never_contains_the_digest() {
        let now = OffsetDateTime::now_utc();
        let account = Account {
            account_id: AccountId(7),
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "$argon2id$super-secret".into(),
            account_type: AccountType::Savings,
            balance: 500,
            currency: Currency::parse("USD").unwrap(),
            phone: String::new(),
            address: String::new(),
            is_active: true,
            is_admin: false,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&AccountView::from(&account)).unwrap();
        assert!(json.contains("alice"));
        assert!(!json.contains("argon2"));
        assert!(!json.contains("super-secret"));
    }

    #[test]
    fn register_request_defaults_optional_profile_fields() {
        let req: RegisterRequest = serde_json::from_str(
            r#"{
                "username": "bob",
                "email": "bob@example.com",
                "password": "hunter2hunter2",
                "account_type": "checking",
                "currency": "usd"
            }"#,
        )
        .unwrap();
        assert_eq!(req.phone, "");
        assert_eq!(req.address, "");
        assert!(!req.is_admin);
    }
}
