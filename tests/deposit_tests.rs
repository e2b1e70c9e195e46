mod common;

use bank_ledger::{
    domain::{AccountId, TransactionKind},
    engine::{LedgerEngine, errors::LedgerError},
};
use common::{assert_reconciled, open_account, reload, store};
use rust_decimal::{Decimal, dec};

/// Deposit 50 into a fresh account: balance 50, one deposit record with a
/// resulting balance of 50.
#[tokio::test]
async fn deposit_credits_balance_and_snapshots_it() {
    let store = store();
    let engine = LedgerEngine::new(store.clone());
    let alice = open_account(&store, "Alice", "a@x.com").await;

    let receipt = engine.deposit(alice.id, dec!(50)).await.unwrap();

    assert_eq!(receipt.balance.value(), dec!(50));
    assert_eq!(receipt.transaction.kind, TransactionKind::Deposit);
    assert_eq!(receipt.transaction.amount, dec!(50));
    assert_eq!(receipt.transaction.resulting_balance.value(), dec!(50));

    let alice = reload(&store, alice.id).await;
    assert_eq!(alice.balance.value(), dec!(50));
    assert_eq!(alice.transactions, vec![receipt.transaction]);
    assert_reconciled(&alice);
}

#[tokio::test]
async fn deposits_accumulate() {
    let store = store();
    let engine = LedgerEngine::new(store.clone());
    let alice = open_account(&store, "Alice", "a@x.com").await;

    for amount in [dec!(10), dec!(0.10), dec!(0.20), dec!(99.99)] {
        engine.deposit(alice.id, amount).await.unwrap();
    }

    let alice = reload(&store, alice.id).await;
    assert_eq!(alice.balance.value(), dec!(110.29));
    assert_eq!(alice.transactions.len(), 4);
    let snapshots: Vec<_> = alice
        .transactions
        .iter()
        .map(|t| t.resulting_balance.value())
        .collect();
    assert_eq!(snapshots, vec![dec!(10), dec!(10.10), dec!(10.30), dec!(110.29)]);
    assert_reconciled(&alice);
}

#[tokio::test]
async fn deposit_amount_is_rounded_to_cents() {
    let store = store();
    let engine = LedgerEngine::new(store.clone());
    let alice = open_account(&store, "Alice", "a@x.com").await;

    let receipt = engine.deposit(alice.id, dec!(12.345)).await.unwrap();

    assert_eq!(receipt.transaction.amount, dec!(12.35));
    assert_eq!(receipt.balance.value().to_string(), "12.35");
}

#[tokio::test]
async fn non_positive_deposit_is_rejected_without_effect() {
    let store = store();
    let engine = LedgerEngine::new(store.clone());
    let alice = open_account(&store, "Alice", "a@x.com").await;

    for amount in [dec!(0), dec!(-10), dec!(0.001)] {
        assert_eq!(
            engine.deposit(alice.id, amount).await,
            Err(LedgerError::InvalidAmount(amount))
        );
    }

    let alice = reload(&store, alice.id).await;
    assert_eq!(alice.balance.value(), dec!(0));
    assert!(alice.transactions.is_empty());
}

#[tokio::test]
async fn deposit_to_unknown_account_is_not_found() {
    let engine = LedgerEngine::new(store());

    assert_eq!(
        engine.deposit(AccountId::new(), dec!(5)).await,
        Err(LedgerError::AccountNotFound)
    );
}

/// An amount too large to carry cents is refused rather than truncated.
#[tokio::test]
async fn oversized_deposit_is_rejected() {
    let store = store();
    let engine = LedgerEngine::new(store.clone());
    let alice = open_account(&store, "Alice", "a@x.com").await;

    for amount in [dec!(40000000000000000000000000000), Decimal::MAX] {
        assert_eq!(
            engine.deposit(alice.id, amount).await,
            Err(LedgerError::InvalidAmount(amount))
        );
    }
    assert_eq!(reload(&store, alice.id).await, alice);
}

#[tokio::test]
async fn deposit_past_the_balance_limit_leaves_balance_alone() {
    let store = store();
    let engine = LedgerEngine::new(store.clone());
    let alice = open_account(&store, "Alice", "a@x.com").await;
    let large = dec!(700000000000000000000000000);

    engine.deposit(alice.id, large).await.unwrap();
    assert!(matches!(
        engine.deposit(alice.id, large).await,
        Err(LedgerError::BalanceLimit { .. })
    ));

    let alice = reload(&store, alice.id).await;
    assert_eq!(alice.balance.value(), large);
    assert_eq!(alice.transactions.len(), 1);
    assert_reconciled(&alice);
}
