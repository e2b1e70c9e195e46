//! Core domain types: accounts, ledger transactions, and monetary amounts.

use std::fmt;

use chrono::{DateTime, Utc};
use derive_more::{Display, From, Into};
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of decimal places every stored amount carries.
pub const CENT_SCALE: u32 = 2;
pub const ACCOUNT_NUMBER_DIGITS: u32 = 17;
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    #[error("Amount must be greater than zero, got {0}")]
    InvalidAmount(Decimal),
    #[error("Amount {0} is too large to hold to the cent")]
    AmountTooLarge(Decimal),
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
    #[error("Invalid account number: {0}")]
    InvalidAccountNumber(String),
    #[error("Name must not be empty")]
    EmptyName,
    #[error("Missing {0}")]
    MissingField(&'static str),
    #[error("Password must be at least {} characters", MIN_PASSWORD_LEN)]
    WeakPassword,
}

/// Rounds to cents and pins the scale so `50` and `50.00` serialize alike.
/// `None` when the value is too large to carry two decimal places.
pub fn to_cents(value: Decimal) -> Option<Decimal> {
    let mut rounded = value.round_dp_with_strategy(CENT_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(CENT_SCALE);
    (rounded.scale() == CENT_SCALE).then_some(rounded)
}

/// Opaque account identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, From, Into, Display,
)]
#[serde(transparent)]
pub struct AccountId(Uuid);

impl AccountId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

/// Public 17-digit account number. Assigned once, never changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(transparent)]
pub struct AccountNumber(String);

impl AccountNumber {
    /// Draws a random number with no leading zero from the 17-digit space.
    /// Uniqueness is enforced by the store, which redraws on collision.
    pub fn generate() -> Self {
        let low = 10u64.pow(ACCOUNT_NUMBER_DIGITS - 1);
        let high = 10u64.pow(ACCOUNT_NUMBER_DIGITS);
        Self(rand::thread_rng().gen_range(low..high).to_string())
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.len() == ACCOUNT_NUMBER_DIGITS as usize
            && trimmed.bytes().all(|b| b.is_ascii_digit())
        {
            Ok(Self(trimmed.to_owned()))
        } else {
            Err(DomainError::InvalidAccountNumber(raw.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Lower-cased email address. Equality is therefore case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let normalized = raw.trim().to_lowercase();
        match normalized.split_once('@') {
            Some((local, domain))
                if !local.is_empty()
                    && !domain.is_empty()
                    && !domain.contains('@')
                    && !normalized.contains(char::is_whitespace) =>
            {
                Ok(Self(normalized))
            }
            _ => Err(DomainError::InvalidEmail(raw.to_owned())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Plaintext password that passed the length policy. Never printed.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn parse(raw: String) -> Result<Self, DomainError> {
        if raw.chars().count() < MIN_PASSWORD_LEN {
            return Err(DomainError::WeakPassword);
        }
        Ok(Self(raw))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

pub fn display_name(raw: &str) -> Result<String, DomainError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(DomainError::EmptyName);
    }
    Ok(name.to_owned())
}

/// A strictly positive monetary amount, normalized to cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Display)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    /// Rounds to cents first, then validates, so `0.004` is rejected.
    pub fn new(raw: Decimal) -> Result<Self, DomainError> {
        let value = to_cents(raw).ok_or(DomainError::AmountTooLarge(raw))?;
        if value <= Decimal::ZERO {
            return Err(DomainError::InvalidAmount(raw));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> Decimal {
        self.0
    }
}

/// Live account balance. The authoritative figure; ledger snapshots are display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[serde(transparent)]
pub struct Balance(Decimal);

impl Default for Balance {
    fn default() -> Self {
        Self::zero()
    }
}

/// Why a delta could not be applied to a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceError {
    /// The result would be below zero.
    Overdrawn,
    /// The result no longer fits a decimal held to the cent.
    OutOfRange,
}

impl Balance {
    pub fn zero() -> Self {
        Self(Decimal::new(0, CENT_SCALE))
    }

    pub fn value(self) -> Decimal {
        self.0
    }

    pub fn covers(self, amount: Amount) -> bool {
        self.0 >= amount.0
    }

    /// Applies a signed delta without ever panicking on overflow.
    pub fn apply(self, delta: Decimal) -> Result<Self, BalanceError> {
        let next = self
            .0
            .checked_add(delta)
            .and_then(to_cents)
            .ok_or(BalanceError::OutOfRange)?;
        if next < Decimal::ZERO {
            return Err(BalanceError::Overdrawn);
        }
        Ok(Self(next))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    /// Untyped transfer kept for older records. Counted as outgoing.
    Transfer,
    TransferSent,
    TransferReceived,
}

impl TransactionKind {
    pub fn is_credit(self) -> bool {
        matches!(self, Self::Deposit | Self::TransferReceived)
    }

    pub fn signed(self, amount: Decimal) -> Decimal {
        if self.is_credit() { amount } else { -amount }
    }
}

/// The other side of a transfer, copied onto each ledger so no join is needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counterparty {
    pub account_number: AccountNumber,
    pub email: Email,
    pub name: String,
}

/// One immutable ledger record embedded in an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub resulting_balance: Balance,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<Counterparty>,
    #[serde(default)]
    pub description: String,
}

impl Transaction {
    pub fn signed_amount(&self) -> Decimal {
        self.kind.signed(self.amount)
    }
}

/// A ledger entry that has not been applied yet. The resulting balance is
/// only known once the store has performed the update.
#[derive(Debug, Clone, PartialEq)]
pub struct Posting {
    pub kind: TransactionKind,
    pub amount: Amount,
    pub timestamp: DateTime<Utc>,
    pub counterparty: Option<Counterparty>,
    pub description: String,
}

impl Posting {
    pub fn new(kind: TransactionKind, amount: Amount, timestamp: DateTime<Utc>) -> Self {
        let description = match kind {
            TransactionKind::Deposit => "Deposit",
            TransactionKind::Withdraw => "Withdrawal",
            TransactionKind::Transfer
            | TransactionKind::TransferSent
            | TransactionKind::TransferReceived => "Transfer",
        };
        Self {
            kind,
            amount,
            timestamp,
            counterparty: None,
            description: description.to_owned(),
        }
    }

    pub fn with_counterparty(mut self, counterparty: Counterparty) -> Self {
        self.counterparty = Some(counterparty);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn delta(&self) -> Decimal {
        self.kind.signed(self.amount.value())
    }

    pub fn into_transaction(self, resulting_balance: Balance) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            kind: self.kind,
            amount: self.amount.value(),
            resulting_balance,
            timestamp: self.timestamp,
            counterparty: self.counterparty,
            description: self.description,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub email: bool,
    pub sms: bool,
}

/// Pass-through contact data. Stored as sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Profile {
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub language: Option<String>,
    pub notifications: NotificationPreferences,
}

/// Partial update of the non-ledger fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<Email>,
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub language: Option<String>,
    pub notifications: Option<NotificationPreferences>,
}

impl ProfileUpdate {
    /// Email is left to the caller, which owns the uniqueness index.
    pub fn apply_to(self, account: &mut Account) {
        if let Some(name) = self.name {
            account.name = name;
        }
        if let Some(phone) = self.phone {
            account.profile.phone = Some(phone);
        }
        if let Some(address) = self.address {
            account.profile.address = Some(address);
        }
        if let Some(language) = self.language {
            account.profile.language = Some(language);
        }
        if let Some(notifications) = self.notifications {
            account.profile.notifications = notifications;
        }
    }
}

/// Outstanding bearer session registered on the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Everything needed to create an account. The store assigns id and number.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: Email,
    pub password_hash: Option<String>,
    pub external_id: Option<String>,
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub email: Email,
    pub account_number: AccountNumber,
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub federated: bool,
    pub balance: Balance,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub sessions: Vec<Session>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn open(new: NewAccount, account_number: AccountNumber, now: DateTime<Utc>) -> Self {
        Self {
            id: AccountId::new(),
            name: new.name,
            email: new.email,
            account_number,
            federated: new.external_id.is_some() && new.password_hash.is_none(),
            password_hash: new.password_hash,
            external_id: new.external_id,
            balance: Balance::zero(),
            is_admin: new.is_admin,
            profile: Profile::default(),
            transactions: Vec::new(),
            sessions: Vec::new(),
            created_at: now,
        }
    }

    /// Balance recomputed from the ledger. Must always equal `balance`.
    /// `None` if the running sum leaves the representable range.
    pub fn ledger_balance(&self) -> Option<Decimal> {
        self.transactions
            .iter()
            .map(Transaction::signed_amount)
            .try_fold(Decimal::ZERO, Decimal::checked_add)
            .and_then(to_cents)
    }

    pub fn is_reconciled(&self) -> bool {
        self.ledger_balance() == Some(self.balance.value())
    }

    /// Material the session signing key is derived from. Changes whenever the
    /// password does, which is what retires older tokens.
    pub fn credential_fingerprint(&self) -> Option<&str> {
        self.password_hash
            .as_deref()
            .or(self.external_id.as_deref())
    }

    pub fn has_session(&self, session_id: Uuid) -> bool {
        self.sessions.iter().any(|s| s.id == session_id)
    }

    pub fn counterparty(&self) -> Counterparty {
        Counterparty {
            account_number: self.account_number.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
        }
    }

    /// Ledger in newest-first order.
    pub fn history(&self) -> Vec<Transaction> {
        self.transactions.iter().rev().cloned().collect()
    }
}
