use rust_decimal::Decimal;

use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),
    #[error("Cannot transfer to your own account")]
    SelfTransfer,
    #[error("Account not found")]
    AccountNotFound,
    #[error("Sender account not found")]
    SenderNotFound,
    #[error("Recipient account not found")]
    RecipientNotFound,
    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: Decimal, requested: Decimal },
    #[error("Balance limit exceeded: balance {balance}, requested {requested}")]
    BalanceLimit { balance: Decimal, requested: Decimal },
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => LedgerError::AccountNotFound,
            StoreError::InsufficientFunds { balance, requested } => {
                LedgerError::InsufficientFunds { balance, requested }
            }
            StoreError::BalanceLimit { balance, requested } => {
                LedgerError::BalanceLimit { balance, requested }
            }
            other => LedgerError::Store(other),
        }
    }
}

