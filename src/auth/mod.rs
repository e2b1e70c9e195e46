//! Credential Verifier: password hashing and bearer-token sessions.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use chrono::Utc;
use rand::rngs::OsRng;
use tracing::debug;

use crate::domain::Account;
use crate::store::{StoreError, StoreHandle};
pub use token::{Claims, DEFAULT_TTL_HOURS, TokenSigner};

mod token;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Invalid session token")]
    InvalidToken,
    #[error("Session token expired")]
    Expired,
    #[error("Account has no credential to sign sessions with")]
    NoCredential,
    #[error("Credential processing failed: {0}")]
    Internal(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Salted Argon2id hash in PHC string form.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Internal(e.to_string()))
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(password_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[derive(Clone)]
pub struct CredentialVerifier {
    store: StoreHandle,
    signer: Arc<TokenSigner>,
}

impl CredentialVerifier {
    pub fn new(store: StoreHandle, signer: TokenSigner) -> Self {
        Self {
            store,
            signer: Arc::new(signer),
        }
    }

    /// Runs on the blocking pool.
    pub async fn hash_password(&self, password: String) -> Result<String, AuthError> {
        tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
    }

    pub async fn verify_password(&self, password: String, password_hash: String) -> bool {
        tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
            .await
            .unwrap_or(false)
    }

    /// Checks a password against the account's stored hash. Federated
    /// accounts without a password never match.
    pub async fn check_account_password(&self, account: &Account, password: &str) -> bool {
        match &account.password_hash {
            Some(hash) => {
                self.verify_password(password.to_owned(), hash.clone())
                    .await
            }
            None => false,
        }
    }

    /// Signs a token and registers its session on the account.
    pub async fn issue_token(&self, account: &Account) -> Result<String, AuthError> {
        let (token, session) = self.signer.issue(account, Utc::now())?;
        self.store.add_session(account.id, session).await?;
        debug!(account = %account.id, "Issued session token");
        Ok(token)
    }

    /// Resolves a token to its account, verifying against the account's
    /// current credentials and open sessions.
    pub async fn verify_token(&self, token: &str) -> Result<(Claims, Account), AuthError> {
        let claimed = TokenSigner::peek(token)?;
        let account = self
            .store
            .get_by_id(claimed.sub)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        let claims = self.signer.verify(token, &account, Utc::now())?;
        if !account.has_session(claims.jti) {
            return Err(AuthError::InvalidToken);
        }
        Ok((claims, account))
    }

    /// Closes the session behind `claims`. Idempotent.
    pub async fn revoke(&self, claims: &Claims) -> Result<(), AuthError> {
        match self.store.remove_session(claims.sub, claims.jti).await {
            Ok(_) | Err(StoreError::NotFound) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
