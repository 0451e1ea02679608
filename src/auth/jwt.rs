use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::config::JwtConfig;
use crate::domain::Account;
use crate::error::{LedgerError, LedgerResult};
use crate::state::AppState;

/// Bearer token payload: subject is the account's username.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
    pub aud: String,
}

/// A freshly issued token plus its expiry.
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: TimeDuration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::from_config(&state.config.jwt)
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> LedgerError {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
        ErrorKind::ExpiredSignature => LedgerError::TokenExpired,
        ErrorKind::InvalidSignature => LedgerError::TokenSignatureInvalid,
        _ => LedgerError::TokenMalformed,
    }
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: TimeDuration::minutes(cfg.ttl_minutes),
        }
    }

    // Zero leeway: a token is rejected the moment its expiry passes.
    fn validation(&self) -> Validation {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation
    }

    /// Issues a token for the account with the configured time-to-live.
    pub fn sign(&self, account: &Account) -> LedgerResult<SignedToken> {
        let now = OffsetDateTime::now_utc();
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: account.username.clone(),
            iat: now.unix_timestamp() as usize,
            exp: expires_at.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| LedgerError::Storage(anyhow::Error::new(e)))?;
        debug!(username = %account.username, "token signed");
        Ok(SignedToken { token, expires_at })
    }

    /// Full validation: signature, issuer, audience, expiry.
    pub fn verify(&self, token: &str) -> LedgerResult<Claims> {
        let data =
            decode::<Claims>(token, &self.decoding, &self.validation()).map_err(map_jwt_error)?;
        debug!(username = %data.claims.sub, "token verified");
        Ok(data.claims)
    }

    /// Expiry introspection: the signature must check out, but an already
    /// expired token still reports its expiry.
    pub fn expiry_of(&self, token: &str) -> LedgerResult<OffsetDateTime> {
        let mut validation = self.validation();
        validation.validate_exp = false;
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(map_jwt_error)?;
        OffsetDateTime::from_unix_timestamp(data.claims.exp as i64)
            .map_err(|_| LedgerError::TokenMalformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountId, AccountType, Currency};

    fn make_keys(secret: &str, ttl_minutes: i64) -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: secret.into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes,
        })
    }

    fn account(username: &str) -> Account {
        let now = OffsetDateTime::now_utc();
        Account {
            account_id: AccountId(1),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: String::new(),
            account_type: AccountType::Checking,
            balance: 0,
            currency: Currency::parse("USD").unwrap(),
            phone: String::new(),
            address: String::new(),
            is_active: true,
            is_admin: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn sign_and_verify_roundtrip() {
        let keys = make_keys("dev-secret", 45);
        let signed = keys.sign(&account("alice")).expect("sign");
        let claims = keys.verify(&signed.token).expect("verify");
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
    }

    #[test]
    fn token_is_valid_until_ttl_and_rejected_after() {
        let keys = make_keys("dev-secret", 45);
        let signed = keys.sign(&account("alice")).expect("sign");
        assert!(keys.verify(&signed.token).is_ok());

        // A negative ttl puts the expiry in the past.
        let expired_keys = make_keys("dev-secret", -5);
        let expired = expired_keys.sign(&account("alice")).expect("sign");
        let err = expired_keys.verify(&expired.token).unwrap_err();
        assert!(matches!(err, LedgerError::TokenExpired));
    }

    #[test]
    fn expiry_of_reports_even_for_expired_tokens() {
        let keys = make_keys("dev-secret", 0);
        let now = OffsetDateTime::now_utc();
        let signed = keys.sign(&account("alice")).expect("sign");
        let expiry = keys.expiry_of(&signed.token).expect("introspect");
        assert!((expiry - now).whole_seconds().abs() <= 2);
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let keys = make_keys("secret-one", 45);
        let other = make_keys("secret-two", 45);
        let signed = keys.sign(&account("alice")).expect("sign");
        let err = other.verify(&signed.token).unwrap_err();
        assert!(matches!(err, LedgerError::TokenSignatureInvalid));
    }

    #[test]
    fn verify_rejects_garbage_as_malformed() {
        let keys = make_keys("dev-secret", 45);
        let err = keys.verify("not-a-jwt").unwrap_err();
        assert!(matches!(err, LedgerError::TokenMalformed));
        let err = keys.expiry_of("not-a-jwt").unwrap_err();
        assert!(matches!(err, LedgerError::TokenMalformed));
    }

    #[test]
    fn verify_rejects_wrong_audience() {
        let keys = make_keys("dev-secret", 45);
        let other = JwtKeys::from_config(&JwtConfig {
            secret: "dev-secret".into(),
            issuer: "test-issuer".into(),
            audience: "other-aud".into(),
            ttl_minutes: 45,
        });
        let signed = other.sign(&account("alice")).expect("sign");
        assert!(keys.verify(&signed.token).is_err());
    }
}
