//! Ledger engine.
//!
//! The only path by which a balance and its ledger change together. Every
//! check (amount, account lookup, available funds) runs before the first
//! mutation; the store re-checks funds atomically when it applies a posting,
//! so a concurrent withdrawal cannot slip past a stale read.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, error, warn};

use crate::{
    domain::{Account, AccountId, AccountNumber, Amount, Email, Posting, Transaction, TransactionKind},
    engine::errors::LedgerError,
    store::{StoreError, StoreHandle},
};
pub use types::Receipt;

pub mod errors;
mod types;

/// Attempts made to undo a sender debit when the matching credit fails.
const REVERSAL_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct LedgerEngine {
    store: StoreHandle,
}

/// Guard: a debit may never take the balance below zero.
fn check_funds(account: &Account, amount: Amount) -> Result<(), LedgerError> {
    if !account.balance.covers(amount) {
        return Err(LedgerError::InsufficientFunds {
            balance: account.balance.value(),
            requested: amount.value(),
        });
    }
    Ok(())
}

fn normalize(raw: Decimal) -> Result<Amount, LedgerError> {
    Amount::new(raw).map_err(|_| LedgerError::InvalidAmount(raw))
}

impl LedgerEngine {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    pub async fn deposit(&self, account_id: AccountId, amount: Decimal) -> Result<Receipt, LedgerError> {
        let amount = normalize(amount)?;
        let posting = Posting::new(TransactionKind::Deposit, amount, Utc::now());

        let transaction = self.store.apply_balance_delta(account_id, posting).await?;
        debug!(account = %account_id, %amount, "Deposit posted");
        Ok(Receipt::from(transaction))
    }

    pub async fn withdraw(&self, account_id: AccountId, amount: Decimal) -> Result<Receipt, LedgerError> {
        let amount = normalize(amount)?;
        let account = self
            .store
            .get_by_id(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound)?;
        check_funds(&account, amount)?;

        let posting = Posting::new(TransactionKind::Withdraw, amount, Utc::now());
        let transaction = self.store.apply_balance_delta(account_id, posting).await?;
        debug!(account = %account_id, %amount, "Withdrawal posted");
        Ok(Receipt::from(transaction))
    }

    /// Moves `amount` from the account owning `from` to the account numbered
    /// `to`. Returns the sender's receipt.
    ///
    /// The two legs are separate single-account updates. If the credit fails
    /// after the debit landed, the debit is reversed so that neither side
    /// shows the transfer.
    pub async fn transfer(
        &self,
        from: &Email,
        to: &AccountNumber,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<Receipt, LedgerError> {
        let amount = normalize(amount)?;
        let sender = self
            .store
            .get_by_email(from)
            .await?
            .ok_or(LedgerError::SenderNotFound)?;
        let recipient = self
            .store
            .get_by_account_number(to)
            .await?
            .ok_or(LedgerError::RecipientNotFound)?;
        if sender.id == recipient.id {
            return Err(LedgerError::SelfTransfer);
        }
        check_funds(&sender, amount)?;

        let timestamp = Utc::now();
        let sent = Posting::new(TransactionKind::TransferSent, amount, timestamp)
            .with_counterparty(recipient.counterparty())
            .with_description(
                description
                    .clone()
                    .unwrap_or_else(|| format!("Transfer to {}", recipient.name)),
            );
        let received = Posting::new(TransactionKind::TransferReceived, amount, timestamp)
            .with_counterparty(sender.counterparty())
            .with_description(description.unwrap_or_else(|| format!("Transfer from {}", sender.name)));

        let debit = match self.store.apply_balance_delta(sender.id, sent).await {
            Ok(debit) => debit,
            Err(StoreError::NotFound) => return Err(LedgerError::SenderNotFound),
            Err(err) => return Err(err.into()),
        };
        match self.store.apply_balance_delta(recipient.id, received).await {
            Ok(_) => {
                debug!(
                    sender = %sender.id,
                    recipient = %recipient.id,
                    %amount,
                    "Transfer posted"
                );
                Ok(Receipt::from(debit))
            }
            Err(err) => {
                self.reverse_debit(sender.id, &debit, &err).await;
                match err {
                    StoreError::NotFound => Err(LedgerError::RecipientNotFound),
                    other => Err(other.into()),
                }
            }
        }
    }

    /// Compensates a transfer whose credit leg failed. Retried on transient
    /// failures; a debit already gone counts as reversed.
    async fn reverse_debit(&self, sender: AccountId, debit: &Transaction, cause: &StoreError) {
        warn!(
            target: "reconciliation",
            %sender,
            transaction = %debit.id,
            amount = %debit.amount,
            %cause,
            "Transfer credit failed, reversing sender debit"
        );
        for attempt in 1..=REVERSAL_ATTEMPTS {
            match self.store.reverse_transaction(sender, debit.id).await {
                Ok(balance) => {
                    warn!(target: "reconciliation", %sender, %balance, "Sender debit reversed");
                    return;
                }
                Err(StoreError::TransactionNotFound(_)) => return,
                Err(err) => {
                    error!(
                        target: "reconciliation",
                        %sender,
                        transaction = %debit.id,
                        attempt,
                        %err,
                        "Reversal attempt failed"
                    );
                }
            }
        }
        error!(
            target: "reconciliation",
            %sender,
            transaction = %debit.id,
            amount = %debit.amount,
            "Sender debit could not be reversed; manual reconciliation required"
        );
    }

    /// The account's ledger, newest first.
    pub async fn history(&self, account_id: AccountId) -> Result<Vec<Transaction>, LedgerError> {
        let account = self
            .store
            .get_by_id(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound)?;
        Ok(account.history())
    }
}
