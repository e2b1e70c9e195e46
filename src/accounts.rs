//! Account lifecycle: registration, sign-in, profile, password, deletion.

use tracing::{info, warn};

use crate::auth::{AuthError, CredentialVerifier};
use crate::domain::{Account, AccountId, DomainError, Email, NewAccount, Password, ProfileUpdate};
use crate::gate::{GateError, Principal};
use crate::store::{IdentityField, StoreError, StoreHandle};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AccountError {
    #[error(transparent)]
    InvalidInput(#[from] DomainError),
    #[error("An account with this {0} already exists")]
    DuplicateIdentity(IdentityField),
    #[error("Account not found")]
    NotFound,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error(transparent)]
    Auth(AuthError),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateIdentity(field) => AccountError::DuplicateIdentity(field),
            StoreError::NotFound => AccountError::NotFound,
            other => AccountError::Store(other),
        }
    }
}

impl From<AuthError> for AccountError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => AccountError::InvalidCredentials,
            AuthError::Store(store) => store.into(),
            other => AccountError::Auth(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: Email,
    pub password: Password,
}

#[derive(Debug, Clone)]
pub struct FederatedIdentity {
    pub name: String,
    pub email: Email,
    pub external_id: String,
}

/// A signed-in account and its fresh session token.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub account: Account,
    pub token: String,
}

#[derive(Clone)]
pub struct AccountService {
    store: StoreHandle,
    verifier: CredentialVerifier,
}

impl AccountService {
    pub fn new(store: StoreHandle, verifier: CredentialVerifier) -> Self {
        Self { store, verifier }
    }

    pub async fn register(&self, registration: Registration) -> Result<SignedIn, AccountError> {
        // Skips the hash for obvious duplicates; the store still enforces it.
        if self.store.get_by_email(&registration.email).await?.is_some() {
            return Err(AccountError::DuplicateIdentity(IdentityField::Email));
        }
        let password_hash = self
            .verifier
            .hash_password(registration.password.expose().to_owned())
            .await?;
        let account = self
            .store
            .create_account(NewAccount {
                name: registration.name,
                email: registration.email,
                password_hash: Some(password_hash),
                external_id: None,
                is_admin: false,
            })
            .await?;
        info!(account = %account.id, number = %account.account_number, "Account registered");
        self.sign_in(account).await
    }

    pub async fn login(&self, email: &Email, password: &str) -> Result<SignedIn, AccountError> {
        let Some(account) = self.store.get_by_email(email).await? else {
            warn!(%email, "Login for unknown email");
            return Err(AccountError::InvalidCredentials);
        };
        if !self.verifier.check_account_password(&account, password).await {
            warn!(account = %account.id, "Login with wrong password");
            return Err(AccountError::InvalidCredentials);
        }
        info!(account = %account.id, "Signed in");
        self.sign_in(account).await
    }

    /// Signs in the account holding this external identity, or registers a
    /// new federated account. An email already held by an account with
    /// another (or no) external identity is a duplicate, never a sign-in.
    pub async fn federated_login(
        &self,
        identity: FederatedIdentity,
    ) -> Result<SignedIn, AccountError> {
        if let Some(account) = self.store.get_by_external_id(&identity.external_id).await? {
            return self.sign_in(account).await;
        }
        if let Some(account) = self.store.get_by_email(&identity.email).await? {
            warn!(account = %account.id, "Federated login for an email held by another identity");
            return Err(AccountError::DuplicateIdentity(IdentityField::Email));
        }
        let account = self
            .store
            .create_account(NewAccount {
                name: identity.name,
                email: identity.email,
                password_hash: None,
                external_id: Some(identity.external_id),
                is_admin: false,
            })
            .await?;
        info!(account = %account.id, "Federated account registered");
        self.sign_in(account).await
    }

    async fn sign_in(&self, account: Account) -> Result<SignedIn, AccountError> {
        let token = self.verifier.issue_token(&account).await?;
        Ok(SignedIn { account, token })
    }

    pub async fn logout(&self, principal: &Principal) -> Result<(), AccountError> {
        self.verifier.revoke(&principal.claims).await?;
        info!(account = %principal.id(), "Signed out");
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<Account>, AccountError> {
        Ok(self.store.list_accounts().await?)
    }

    pub async fn update_profile(
        &self,
        principal: &Principal,
        update: ProfileUpdate,
    ) -> Result<Account, AccountError> {
        Ok(self.store.update_profile(principal.id(), update).await?)
    }

    /// Sets a new password on `target`.
    ///
    /// On one's own account the current password must be confirmed, if one
    /// is set. On another account the actor must be an administrator and
    /// confirm with the administrator's own password.
    pub async fn change_password(
        &self,
        actor: &Principal,
        target: AccountId,
        new_password: Password,
        confirmation: Option<String>,
    ) -> Result<(), AccountError> {
        if actor.id() == target {
            if actor.account.password_hash.is_some() {
                self.confirm(&actor.account, confirmation).await?;
            }
        } else {
            actor.ensure_admin()?;
            self.confirm(&actor.account, confirmation).await?;
            if self.store.get_by_id(target).await?.is_none() {
                return Err(AccountError::NotFound);
            }
        }

        let hash = self
            .verifier
            .hash_password(new_password.expose().to_owned())
            .await?;
        self.store.set_password_hash(target, hash).await?;
        info!(actor = %actor.id(), %target, "Password changed");
        Ok(())
    }

    /// Administrative deletion. Requires the administrator's own password and
    /// refuses to delete the administrator's own account.
    pub async fn delete_account(
        &self,
        actor: &Principal,
        target: AccountId,
        admin_password: Option<String>,
    ) -> Result<(), AccountError> {
        actor.ensure_admin()?;
        if actor.id() == target {
            return Err(GateError::Forbidden("Administrators cannot delete their own account").into());
        }
        self.confirm(&actor.account, admin_password).await?;

        self.store.delete_account(target).await?;
        info!(actor = %actor.id(), %target, "Account deleted");
        Ok(())
    }

    /// Creates the bootstrap administrator unless the email is already taken.
    pub async fn seed_admin(
        &self,
        name: String,
        email: Email,
        password: Password,
    ) -> Result<Option<Account>, AccountError> {
        if self.store.get_by_email(&email).await?.is_some() {
            return Ok(None);
        }
        let password_hash = self
            .verifier
            .hash_password(password.expose().to_owned())
            .await?;
        let account = self
            .store
            .create_account(NewAccount {
                name,
                email,
                password_hash: Some(password_hash),
                external_id: None,
                is_admin: true,
            })
            .await?;
        info!(account = %account.id, "Administrator account created");
        Ok(Some(account))
    }

    /// Checks `password` against the account's current stored hash.
    async fn confirm(&self, account: &Account, password: Option<String>) -> Result<(), AccountError> {
        let password = password.ok_or(AccountError::InvalidCredentials)?;
        let current = self
            .store
            .get_by_id(account.id)
            .await?
            .ok_or(AccountError::NotFound)?;
        if !self.verifier.check_account_password(&current, &password).await {
            warn!(account = %account.id, "Password confirmation failed");
            return Err(AccountError::InvalidCredentials);
        }
        Ok(())
    }
}
