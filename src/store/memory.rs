//! In-process document store, optionally mirrored to a JSON snapshot file.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::{AccountStore, IdentityField, StoreError};
use crate::domain::{
    Account, AccountId, AccountNumber, Balance, BalanceError, Email, NewAccount, Posting,
    ProfileUpdate, Session, Transaction,
};

/// Accounts plus the secondary indexes that enforce uniqueness.
///
/// One write lock covers a whole read-modify-write, so two postings against
/// the same account are serialized and cannot both pass the funds check.
#[derive(Debug, Default)]
struct State {
    accounts: HashMap<AccountId, Account>,
    by_email: HashMap<Email, AccountId>,
    by_number: HashMap<AccountNumber, AccountId>,
    by_external_id: HashMap<String, AccountId>,
}

impl State {
    fn insert(&mut self, account: Account) {
        self.by_email.insert(account.email.clone(), account.id);
        self.by_number
            .insert(account.account_number.clone(), account.id);
        if let Some(external_id) = &account.external_id {
            self.by_external_id.insert(external_id.clone(), account.id);
        }
        self.accounts.insert(account.id, account);
    }

    fn remove(&mut self, id: AccountId) -> Option<Account> {
        let account = self.accounts.remove(&id)?;
        self.by_email.remove(&account.email);
        self.by_number.remove(&account.account_number);
        if let Some(external_id) = &account.external_id {
            self.by_external_id.remove(external_id);
        }
        Some(account)
    }

    /// Puts an account back exactly as it was before a failed commit.
    fn restore(&mut self, id: AccountId, before: Option<Account>) {
        self.remove(id);
        if let Some(account) = before {
            self.insert(account);
        }
    }

    fn lookup(&self, id: Option<&AccountId>) -> Option<Account> {
        id.and_then(|id| self.accounts.get(id)).cloned()
    }

    fn fresh_account_number(&self) -> AccountNumber {
        loop {
            let candidate = AccountNumber::generate();
            if !self.by_number.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    accounts: Vec<Account>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    accounts: Vec<&'a Account>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    snapshot: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a store backed by a snapshot file, loading it if present.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let mut state = State::default();
        if path.exists() {
            let bytes = fs::read(&path).map_err(|e| unavailable(&path, e))?;
            let snapshot: Snapshot =
                serde_json::from_slice(&bytes).map_err(|e| unavailable(&path, e))?;
            for account in snapshot.accounts {
                state.insert(account);
            }
            info!(
                path = %path.display(),
                accounts = state.accounts.len(),
                "Loaded account snapshot"
            );
        }
        Ok(Self {
            state: RwLock::new(state),
            snapshot: Some(path),
        })
    }

    /// Writes the snapshot next to its target and renames it into place.
    /// Called under the write lock with no await in between.
    fn persist(&self, state: &State) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        let mut accounts: Vec<&Account> = state.accounts.values().collect();
        accounts.sort_by_key(|a| a.created_at);
        let bytes = serde_json::to_vec_pretty(&SnapshotRef { accounts })
            .map_err(|e| unavailable(path, e))?;
        let tmp = path.with_extension("tmp");
        blocking(|| {
            fs::write(&tmp, bytes).map_err(|e| unavailable(&tmp, e))?;
            fs::rename(&tmp, path).map_err(|e| unavailable(path, e))
        })
    }

    /// Persists, or rolls the in-memory change back if persisting fails.
    fn commit(
        &self,
        state: &mut State,
        id: AccountId,
        before: Option<Account>,
    ) -> Result<(), StoreError> {
        if let Err(err) = self.persist(state) {
            error!(%id, %err, "Snapshot write failed, rolling back");
            state.restore(id, before);
            return Err(err);
        }
        Ok(())
    }
}

/// Runs blocking file I/O. On a multi-threaded runtime the worker hands its
/// other tasks off first; `block_in_place` is unavailable elsewhere.
fn blocking<T>(io: impl FnOnce() -> T) -> T {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(io),
        _ => io(),
    }
}

fn rejected(err: BalanceError, balance: Balance, requested: Decimal) -> StoreError {
    let balance = balance.value();
    match err {
        BalanceError::Overdrawn => StoreError::InsufficientFunds { balance, requested },
        BalanceError::OutOfRange => StoreError::BalanceLimit { balance, requested },
    }
}

fn unavailable(path: &Path, err: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(format!("{}: {err}", path.display()))
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn create_account(&self, new: NewAccount) -> Result<Account, StoreError> {
        let mut state = self.state.write().await;
        if state.by_email.contains_key(&new.email) {
            return Err(StoreError::DuplicateIdentity(IdentityField::Email));
        }
        if let Some(external_id) = &new.external_id {
            if state.by_external_id.contains_key(external_id) {
                return Err(StoreError::DuplicateIdentity(IdentityField::ExternalId));
            }
        }

        let account = Account::open(new, state.fresh_account_number(), Utc::now());
        state.insert(account.clone());
        self.commit(&mut state, account.id, None)?;
        Ok(account)
    }

    async fn get_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.state.read().await.lookup(Some(&id)))
    }

    async fn get_by_email(&self, email: &Email) -> Result<Option<Account>, StoreError> {
        let state = self.state.read().await;
        Ok(state.lookup(state.by_email.get(email)))
    }

    async fn get_by_account_number(
        &self,
        number: &AccountNumber,
    ) -> Result<Option<Account>, StoreError> {
        let state = self.state.read().await;
        Ok(state.lookup(state.by_number.get(number)))
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<Account>, StoreError> {
        let state = self.state.read().await;
        Ok(state.lookup(state.by_external_id.get(external_id)))
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let state = self.state.read().await;
        let mut accounts: Vec<Account> = state.accounts.values().cloned().collect();
        accounts.sort_by_key(|a| a.created_at);
        Ok(accounts)
    }

    async fn apply_balance_delta(
        &self,
        id: AccountId,
        posting: Posting,
    ) -> Result<Transaction, StoreError> {
        let mut state = self.state.write().await;
        let account = state.accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        let before = account.clone();

        let balance = account
            .balance
            .apply(posting.delta())
            .map_err(|err| rejected(err, account.balance, posting.amount.value()))?;
        let transaction = posting.into_transaction(balance);
        account.balance = balance;
        account.transactions.push(transaction.clone());

        self.commit(&mut state, id, Some(before))?;
        debug!(%id, kind = ?transaction.kind, amount = %transaction.amount, %balance, "Posted");
        Ok(transaction)
    }

    async fn reverse_transaction(
        &self,
        id: AccountId,
        transaction_id: Uuid,
    ) -> Result<Balance, StoreError> {
        let mut state = self.state.write().await;
        let account = state.accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        let before = account.clone();

        let position = account
            .transactions
            .iter()
            .position(|t| t.id == transaction_id)
            .ok_or(StoreError::TransactionNotFound(transaction_id))?;
        let undo = -account.transactions[position].signed_amount();
        let balance = account
            .balance
            .apply(undo)
            .map_err(|err| rejected(err, account.balance, undo.abs()))?;
        account.transactions.remove(position);
        account.balance = balance;

        self.commit(&mut state, id, Some(before))?;
        Ok(balance)
    }

    async fn update_profile(
        &self,
        id: AccountId,
        update: ProfileUpdate,
    ) -> Result<Account, StoreError> {
        let mut state = self.state.write().await;
        if let Some(email) = &update.email {
            if state.by_email.get(email).is_some_and(|owner| *owner != id) {
                return Err(StoreError::DuplicateIdentity(IdentityField::Email));
            }
        }

        let before = state.remove(id).ok_or(StoreError::NotFound)?;
        let mut account = before.clone();
        if let Some(email) = update.email.clone() {
            account.email = email;
        }
        update.apply_to(&mut account);
        state.insert(account.clone());

        self.commit(&mut state, id, Some(before))?;
        Ok(account)
    }

    async fn set_password_hash(&self, id: AccountId, hash: String) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let account = state.accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        let before = account.clone();
        account.password_hash = Some(hash);
        self.commit(&mut state, id, Some(before))
    }

    async fn add_session(&self, id: AccountId, session: Session) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let account = state.accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        let before = account.clone();
        let now = Utc::now();
        account.sessions.retain(|s| !s.is_expired(now));
        account.sessions.push(session);
        self.commit(&mut state, id, Some(before))
    }

    async fn remove_session(&self, id: AccountId, session_id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let account = state.accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        if !account.has_session(session_id) {
            return Ok(false);
        }
        let before = account.clone();
        account.sessions.retain(|s| s.id != session_id);
        self.commit(&mut state, id, Some(before))?;
        Ok(true)
    }

    async fn delete_account(&self, id: AccountId) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let removed = state.remove(id).ok_or(StoreError::NotFound)?;
        self.commit(&mut state, id, Some(removed))
    }
}
