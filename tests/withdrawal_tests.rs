mod common;

use bank_ledger::{
    domain::TransactionKind,
    engine::{LedgerEngine, errors::LedgerError},
};
use common::{assert_reconciled, funded_account, open_account, reload, store};
use rust_decimal::dec;

#[tokio::test]
async fn withdrawal_reduces_balance() {
    let store = store();
    let engine = LedgerEngine::new(store.clone());
    let alice = funded_account(&store, "Alice", "a@x.com", dec!(100)).await;

    let receipt = engine.withdraw(alice.id, dec!(40)).await.unwrap();

    assert_eq!(receipt.balance.value(), dec!(60));
    assert_eq!(receipt.transaction.kind, TransactionKind::Withdraw);
    assert_eq!(receipt.transaction.amount, dec!(40));

    let alice = reload(&store, alice.id).await;
    assert_eq!(alice.balance.value(), dec!(60));
    assert_reconciled(&alice);
}

#[tokio::test]
async fn withdrawal_of_exact_balance_leaves_zero() {
    let store = store();
    let engine = LedgerEngine::new(store.clone());
    let alice = funded_account(&store, "Alice", "a@x.com", dec!(50)).await;

    engine.withdraw(alice.id, dec!(50)).await.unwrap();

    let alice = reload(&store, alice.id).await;
    assert_eq!(alice.balance.value(), dec!(0));
    assert_reconciled(&alice);
}

/// Withdraw 80 from a balance of 50: rejected, balance stays 50, no record.
#[tokio::test]
async fn withdrawal_exceeding_balance_fails_without_effect() {
    let store = store();
    let engine = LedgerEngine::new(store.clone());
    let alice = funded_account(&store, "Alice", "a@x.com", dec!(50)).await;

    assert_eq!(
        engine.withdraw(alice.id, dec!(80)).await,
        Err(LedgerError::InsufficientFunds {
            balance: dec!(50),
            requested: dec!(80),
        })
    );

    let after = reload(&store, alice.id).await;
    assert_eq!(after.balance.value(), dec!(50));
    assert_eq!(after.transactions.len(), 1);
}

#[tokio::test]
async fn withdrawal_from_empty_account_fails() {
    let store = store();
    let engine = LedgerEngine::new(store.clone());
    let alice = open_account(&store, "Alice", "a@x.com").await;

    assert!(matches!(
        engine.withdraw(alice.id, dec!(0.01)).await,
        Err(LedgerError::InsufficientFunds { .. })
    ));
    assert!(reload(&store, alice.id).await.transactions.is_empty());
}

#[tokio::test]
async fn invalid_amount_is_checked_before_funds() {
    let store = store();
    let engine = LedgerEngine::new(store.clone());
    let alice = open_account(&store, "Alice", "a@x.com").await;

    assert_eq!(
        engine.withdraw(alice.id, dec!(-1)).await,
        Err(LedgerError::InvalidAmount(dec!(-1)))
    );
}
