mod common;

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use bank_ledger::{
    domain::{
        Account, AccountId, AccountNumber, Amount, Balance, Email, NewAccount, Posting,
        ProfileUpdate, Session, Transaction, TransactionKind,
    },
    store::{AccountStore, IdentityField, MemoryStore, StoreError, StoreHandle},
};
use chrono::Utc;
use common::{assert_reconciled, funded_account, open_account, reload, store};
use rust_decimal::dec;
use uuid::Uuid;

fn new_account(email: &str, external_id: Option<&str>) -> NewAccount {
    NewAccount {
        name: "Someone".to_owned(),
        email: Email::parse(email).unwrap(),
        password_hash: None,
        external_id: external_id.map(str::to_owned),
        is_admin: false,
    }
}

#[tokio::test]
async fn email_is_unique_regardless_of_case() {
    let store = store();
    open_account(&store, "Alice", "alice@x.com").await;

    assert_eq!(
        store
            .create_account(new_account("ALICE@x.com", None))
            .await
            .err(),
        Some(StoreError::DuplicateIdentity(IdentityField::Email))
    );
}

#[tokio::test]
async fn external_id_is_unique() {
    let store = store();
    store
        .create_account(new_account("a@x.com", Some("ext-1")))
        .await
        .unwrap();

    assert_eq!(
        store
            .create_account(new_account("b@x.com", Some("ext-1")))
            .await
            .err(),
        Some(StoreError::DuplicateIdentity(IdentityField::ExternalId))
    );
    assert!(
        store
            .get_by_external_id("ext-1")
            .await
            .unwrap()
            .is_some_and(|a| a.email.as_str() == "a@x.com")
    );
}

#[tokio::test]
async fn account_numbers_are_unique_seventeen_digits() {
    let store = store();
    let mut numbers = HashSet::new();
    for i in 0..200 {
        let account = open_account(&store, "User", &format!("u{i}@x.com")).await;
        let number = account.account_number.as_str().to_owned();
        assert_eq!(number.len(), 17);
        assert!(number.bytes().all(|b| b.is_ascii_digit()));
        assert!(!number.starts_with('0'));
        assert!(numbers.insert(number));
    }
}

#[tokio::test]
async fn lookups_find_the_same_account() {
    let store = store();
    let alice = open_account(&store, "Alice", "a@x.com").await;

    assert_eq!(
        store.get_by_email(&alice.email).await.unwrap(),
        Some(alice.clone())
    );
    assert_eq!(
        store
            .get_by_account_number(&alice.account_number)
            .await
            .unwrap(),
        Some(alice.clone())
    );
    assert_eq!(store.get_by_id(AccountId::new()).await.unwrap(), None);
}

#[tokio::test]
async fn delete_is_reported_once() {
    let store = store();
    let alice = open_account(&store, "Alice", "a@x.com").await;

    store.delete_account(alice.id).await.unwrap();
    assert_eq!(
        store.delete_account(alice.id).await,
        Err(StoreError::NotFound)
    );
    assert_eq!(store.get_by_email(&alice.email).await.unwrap(), None);

    // The email is free again once the account is gone.
    open_account(&store, "Alice", "a@x.com").await;
}

#[tokio::test]
async fn posting_that_would_overdraw_is_refused() {
    let store = store();
    let alice = funded_account(&store, "Alice", "a@x.com", dec!(10)).await;
    let posting = Posting::new(
        TransactionKind::Withdraw,
        Amount::new(dec!(10.01)).unwrap(),
        Utc::now(),
    );

    assert_eq!(
        store.apply_balance_delta(alice.id, posting).await,
        Err(StoreError::InsufficientFunds {
            balance: dec!(10),
            requested: dec!(10.01),
        })
    );
    assert_eq!(reload(&store, alice.id).await, alice);
}

#[tokio::test]
async fn reversal_removes_the_record_and_restores_balance() {
    let store = store();
    let alice = funded_account(&store, "Alice", "a@x.com", dec!(10)).await;
    let debit = store
        .apply_balance_delta(
            alice.id,
            Posting::new(
                TransactionKind::TransferSent,
                Amount::new(dec!(4)).unwrap(),
                Utc::now(),
            ),
        )
        .await
        .unwrap();

    assert_eq!(
        store.reverse_transaction(alice.id, debit.id).await,
        Ok(Balance::zero().apply(dec!(10)).unwrap())
    );
    assert_eq!(reload(&store, alice.id).await, alice);
    assert_eq!(
        store.reverse_transaction(alice.id, debit.id).await,
        Err(StoreError::TransactionNotFound(debit.id))
    );
}

#[tokio::test]
async fn profile_update_cannot_steal_an_email() {
    let store = store();
    let alice = open_account(&store, "Alice", "a@x.com").await;
    open_account(&store, "Bob", "b@x.com").await;

    let steal = ProfileUpdate {
        email: Some(Email::parse("b@x.com").unwrap()),
        ..ProfileUpdate::default()
    };
    assert_eq!(
        store.update_profile(alice.id, steal).await.err(),
        Some(StoreError::DuplicateIdentity(IdentityField::Email))
    );

    let rename = ProfileUpdate {
        email: Some(Email::parse("alice@y.com").unwrap()),
        name: Some("Alice Smith".to_owned()),
        ..ProfileUpdate::default()
    };
    let updated = store.update_profile(alice.id, rename).await.unwrap();
    assert_eq!(updated.name, "Alice Smith");
    assert_eq!(updated.account_number, alice.account_number);
    assert_eq!(store.get_by_email(&alice.email).await.unwrap(), None);
    assert_eq!(
        store.get_by_email(&updated.email).await.unwrap(),
        Some(updated)
    );
}

#[tokio::test]
async fn snapshot_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounts.json");

    let alice = {
        let store = StoreHandle::new(MemoryStore::open(&path).unwrap());
        let alice = funded_account(&store, "Alice", "a@x.com", dec!(42.50)).await;
        open_account(&store, "Bob", "b@x.com").await;
        alice
    };

    let reopened = StoreHandle::new(MemoryStore::open(&path).unwrap());
    let loaded = reload(&reopened, alice.id).await;
    assert_eq!(loaded, alice);
    assert_reconciled(&loaded);
    assert_eq!(reopened.list_accounts().await.unwrap().len(), 2);
    assert!(
        reopened
            .get_by_account_number(&alice.account_number)
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn corrupt_snapshot_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounts.json");
    std::fs::write(&path, b"{ not json").unwrap();

    assert!(matches!(
        MemoryStore::open(&path),
        Err(StoreError::Unavailable(_))
    ));
}

/// Never answers, so every call runs into the handle's timeout.
struct Stalled;

#[async_trait]
impl AccountStore for Stalled {
    async fn create_account(&self, _: NewAccount) -> Result<Account, StoreError> {
        std::future::pending().await
    }
    async fn get_by_id(&self, _: AccountId) -> Result<Option<Account>, StoreError> {
        std::future::pending().await
    }
    async fn get_by_email(&self, _: &Email) -> Result<Option<Account>, StoreError> {
        std::future::pending().await
    }
    async fn get_by_account_number(&self, _: &AccountNumber) -> Result<Option<Account>, StoreError> {
        std::future::pending().await
    }
    async fn get_by_external_id(&self, _: &str) -> Result<Option<Account>, StoreError> {
        std::future::pending().await
    }
    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        std::future::pending().await
    }
    async fn apply_balance_delta(&self, _: AccountId, _: Posting) -> Result<Transaction, StoreError> {
        std::future::pending().await
    }
    async fn reverse_transaction(&self, _: AccountId, _: Uuid) -> Result<Balance, StoreError> {
        std::future::pending().await
    }
    async fn update_profile(&self, _: AccountId, _: ProfileUpdate) -> Result<Account, StoreError> {
        std::future::pending().await
    }
    async fn set_password_hash(&self, _: AccountId, _: String) -> Result<(), StoreError> {
        std::future::pending().await
    }
    async fn add_session(&self, _: AccountId, _: Session) -> Result<(), StoreError> {
        std::future::pending().await
    }
    async fn remove_session(&self, _: AccountId, _: Uuid) -> Result<bool, StoreError> {
        std::future::pending().await
    }
    async fn delete_account(&self, _: AccountId) -> Result<(), StoreError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn stalled_store_surfaces_as_unavailable() {
    let store = StoreHandle::new(Stalled)
        .with_timeout(Duration::from_millis(20))
        .with_read_retries(1);

    assert!(matches!(
        store.get_by_id(AccountId::new()).await,
        Err(StoreError::Unavailable(_))
    ));
    assert!(matches!(
        store.delete_account(AccountId::new()).await,
        Err(StoreError::Unavailable(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn snapshot_writes_from_worker_threads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounts.json");
    let store = StoreHandle::new(MemoryStore::open(&path).unwrap());

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                funded_account(&store, "User", &format!("u{i}@x.com"), dec!(5)).await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let reopened = StoreHandle::new(MemoryStore::open(&path).unwrap());
    let accounts = reopened.list_accounts().await.unwrap();
    assert_eq!(accounts.len(), 8);
    for account in &accounts {
        assert_eq!(account.balance.value(), dec!(5));
        assert_reconciled(account);
    }
}

#[tokio::test]
async fn posting_past_the_balance_limit_is_refused() {
    let store = store();
    let alice = funded_account(&store, "Alice", "a@x.com", dec!(700000000000000000000000000)).await;
    let posting = Posting::new(
        TransactionKind::Deposit,
        Amount::new(dec!(700000000000000000000000000)).unwrap(),
        Utc::now(),
    );

    assert!(matches!(
        store.apply_balance_delta(alice.id, posting).await,
        Err(StoreError::BalanceLimit { .. })
    ));
    assert_eq!(reload(&store, alice.id).await, alice);
}
