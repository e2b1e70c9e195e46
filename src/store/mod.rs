//! Account Store: keyed account documents with uniqueness on email, account
//! number and external identity.
//!
//! Every mutation is a single atomic read-modify-write of one account.
//! [`AccountStore::apply_balance_delta`] is the only way a balance changes,
//! and it updates the balance and appends the ledger record together.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use crate::domain::{
    Account, AccountId, AccountNumber, Balance, Email, NewAccount, Posting, ProfileUpdate,
    Session, Transaction,
};
pub use errors::{IdentityField, StoreError};
pub use memory::MemoryStore;

mod errors;
mod memory;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_READ_RETRIES: u32 = 2;

/// Lookups return `Ok(None)` for a missing account; callers pick the error.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Fails with `DuplicateIdentity` if the email or external id is taken.
    async fn create_account(&self, new: NewAccount) -> Result<Account, StoreError>;

    async fn get_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError>;
    async fn get_by_email(&self, email: &Email) -> Result<Option<Account>, StoreError>;
    async fn get_by_account_number(
        &self,
        number: &AccountNumber,
    ) -> Result<Option<Account>, StoreError>;
    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<Account>, StoreError>;
    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError>;

    /// Atomically applies the posting's signed amount and appends the
    /// resulting transaction. Fails with `InsufficientFunds`, leaving the
    /// account untouched, if the balance would go negative.
    async fn apply_balance_delta(
        &self,
        id: AccountId,
        posting: Posting,
    ) -> Result<Transaction, StoreError>;

    /// Removes a just-applied transaction and undoes its effect on the
    /// balance. Used only to compensate a half-finished transfer.
    async fn reverse_transaction(
        &self,
        id: AccountId,
        transaction_id: Uuid,
    ) -> Result<Balance, StoreError>;

    async fn update_profile(
        &self,
        id: AccountId,
        update: ProfileUpdate,
    ) -> Result<Account, StoreError>;
    async fn set_password_hash(&self, id: AccountId, hash: String) -> Result<(), StoreError>;

    /// Registers a session, pruning expired ones first.
    async fn add_session(&self, id: AccountId, session: Session) -> Result<(), StoreError>;
    /// Returns whether a session was removed.
    async fn remove_session(&self, id: AccountId, session_id: Uuid) -> Result<bool, StoreError>;

    /// Unconditional removal. `NotFound` if the account is already gone.
    async fn delete_account(&self, id: AccountId) -> Result<(), StoreError>;
}

/// Shared handle to the store injected into every service.
///
/// Each round-trip is bounded by a timeout surfaced as
/// `StoreError::Unavailable`. Reads are retried on `Unavailable`; mutations
/// never are, since a retry could apply them twice.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<dyn AccountStore>,
    timeout: Duration,
    read_retries: u32,
}

impl StoreHandle {
    pub fn new(store: impl AccountStore + 'static) -> Self {
        Self {
            inner: Arc::new(store),
            timeout: DEFAULT_TIMEOUT,
            read_retries: DEFAULT_READ_RETRIES,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_read_retries(mut self, read_retries: u32) -> Self {
        self.read_retries = read_retries;
        self
    }

    async fn bounded<T>(
        &self,
        op: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(format!(
                "no response within {:?}",
                self.timeout
            ))),
        }
    }

    async fn read<T, F, Fut>(&self, op: F) -> Result<T, StoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 0;
        loop {
            match self.bounded(op()).await {
                Err(StoreError::Unavailable(reason)) if attempt < self.read_retries => {
                    attempt += 1;
                    warn!(attempt, %reason, "Retrying store read");
                }
                result => return result,
            }
        }
    }

    pub async fn create_account(&self, new: NewAccount) -> Result<Account, StoreError> {
        self.bounded(self.inner.create_account(new)).await
    }

    pub async fn get_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        self.read(|| self.inner.get_by_id(id)).await
    }

    pub async fn get_by_email(&self, email: &Email) -> Result<Option<Account>, StoreError> {
        self.read(|| self.inner.get_by_email(email)).await
    }

    pub async fn get_by_account_number(
        &self,
        number: &AccountNumber,
    ) -> Result<Option<Account>, StoreError> {
        self.read(|| self.inner.get_by_account_number(number)).await
    }

    pub async fn get_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Account>, StoreError> {
        self.read(|| self.inner.get_by_external_id(external_id))
            .await
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        self.read(|| self.inner.list_accounts()).await
    }

    pub async fn apply_balance_delta(
        &self,
        id: AccountId,
        posting: Posting,
    ) -> Result<Transaction, StoreError> {
        self.bounded(self.inner.apply_balance_delta(id, posting))
            .await
    }

    pub async fn reverse_transaction(
        &self,
        id: AccountId,
        transaction_id: Uuid,
    ) -> Result<Balance, StoreError> {
        self.bounded(self.inner.reverse_transaction(id, transaction_id))
            .await
    }

    pub async fn update_profile(
        &self,
        id: AccountId,
        update: ProfileUpdate,
    ) -> Result<Account, StoreError> {
        self.bounded(self.inner.update_profile(id, update)).await
    }

    pub async fn set_password_hash(&self, id: AccountId, hash: String) -> Result<(), StoreError> {
        self.bounded(self.inner.set_password_hash(id, hash)).await
    }

    pub async fn add_session(&self, id: AccountId, session: Session) -> Result<(), StoreError> {
        self.bounded(self.inner.add_session(id, session)).await
    }

    pub async fn remove_session(
        &self,
        id: AccountId,
        session_id: Uuid,
    ) -> Result<bool, StoreError> {
        self.bounded(self.inner.remove_session(id, session_id))
            .await
    }

    pub async fn delete_account(&self, id: AccountId) -> Result<(), StoreError> {
        self.bounded(self.inner.delete_account(id)).await
    }
}
