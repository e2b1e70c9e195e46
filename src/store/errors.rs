use derive_more::Display;
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum IdentityField {
    #[display("email")]
    Email,
    #[display("external identity")]
    ExternalId,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("An account with this {0} already exists")]
    DuplicateIdentity(IdentityField),
    #[error("Account not found")]
    NotFound,
    #[error("Transaction {0} not found")]
    TransactionNotFound(Uuid),
    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: Decimal, requested: Decimal },
    #[error("Posting {requested} to balance {balance} exceeds the largest representable balance")]
    BalanceLimit { balance: Decimal, requested: Decimal },
    /// Transient backing-store failure. Safe to retry for reads only.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
