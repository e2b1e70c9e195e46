//! Wire schemas.
//!
//! Requests are parsed in two stages:
//! 1. Serde deserializes the body into a flat request struct, rejecting
//!    unknown fields.
//! 2. `TryFrom` converts it into a validated domain command, so nothing
//!    malformed reaches the ledger or the store.
//!
//! Responses are views built from accounts; none carries a password hash
//! or session data.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::accounts::{FederatedIdentity, Registration, SignedIn};
use crate::domain::{
    Account, AccountId, AccountNumber, Address, Balance, DomainError, Email,
    NotificationPreferences, Password, Profile, ProfileUpdate, display_name,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl TryFrom<RegisterRequest> for Registration {
    type Error = DomainError;

    fn try_from(value: RegisterRequest) -> Result<Self, Self::Error> {
        Ok(Registration {
            name: display_name(&value.name)?,
            email: Email::parse(&value.email)?,
            password: Password::parse(value.password)?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct FederatedLoginRequest {
    pub email: String,
    pub name: String,
    pub external_id: String,
}

impl TryFrom<FederatedLoginRequest> for FederatedIdentity {
    type Error = DomainError;

    fn try_from(value: FederatedLoginRequest) -> Result<Self, Self::Error> {
        let external_id = value.external_id.trim();
        if external_id.is_empty() {
            return Err(DomainError::MissingField("external identity id"));
        }
        Ok(FederatedIdentity {
            name: display_name(&value.name)?,
            email: Email::parse(&value.email)?,
            external_id: external_id.to_owned(),
        })
    }
}

/// Deposit or withdrawal. `accountId`, when sent, must be the caller's own.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct AmountRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub account_id: Option<AccountId>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct TransferRequest {
    pub to_account_number: String,
    pub amount: Decimal,
    /// When sent, must be the caller's own email.
    #[serde(default)]
    pub from_email: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A validated transfer, minus the sender (always the caller).
#[derive(Debug)]
pub struct TransferCommand {
    pub to: AccountNumber,
    pub amount: Decimal,
    pub from: Option<Email>,
    pub description: Option<String>,
}

impl TryFrom<TransferRequest> for TransferCommand {
    type Error = DomainError;

    fn try_from(value: TransferRequest) -> Result<Self, Self::Error> {
        Ok(TransferCommand {
            to: AccountNumber::parse(&value.to_account_number)?,
            amount: value.amount,
            from: value.from_email.as_deref().map(Email::parse).transpose()?,
            description: value
                .description
                .map(|d| d.trim().to_owned())
                .filter(|d| !d.is_empty()),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub language: Option<String>,
    pub notifications: Option<NotificationPreferences>,
}

impl TryFrom<ProfileRequest> for ProfileUpdate {
    type Error = DomainError;

    fn try_from(value: ProfileRequest) -> Result<Self, Self::Error> {
        Ok(ProfileUpdate {
            name: value.name.as_deref().map(display_name).transpose()?,
            email: value.email.as_deref().map(Email::parse).transpose()?,
            phone: value.phone,
            address: value.address,
            language: value.language,
            notifications: value.notifications,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PasswordRequest {
    pub new_password: String,
    /// The caller's own current password: required when changing another
    /// account's password, and when changing one's own if one is set.
    #[serde(default)]
    pub current_password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl From<&Account> for Role {
    fn from(account: &Account) -> Self {
        if account.is_admin { Role::Admin } else { Role::User }
    }
}

/// Public-safe directory entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub id: AccountId,
    pub name: String,
    pub email: Email,
    pub account_number: AccountNumber,
    pub balance: Balance,
    pub role: Role,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            name: account.name.clone(),
            email: account.email.clone(),
            account_number: account.account_number.clone(),
            balance: account.balance,
            role: Role::from(account),
        }
    }
}

/// Full non-secret view for the owner and administrators.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    #[serde(flatten)]
    pub summary: AccountSummary,
    pub federated: bool,
    pub profile: Profile,
    pub transaction_count: usize,
    pub created_at: DateTime<Utc>,
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        Self {
            summary: AccountSummary::from(account),
            federated: account.federated,
            profile: account.profile.clone(),
            transaction_count: account.transactions.len(),
            created_at: account.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub account: AccountSummary,
    pub token: String,
}

impl From<SignedIn> for AuthResponse {
    fn from(signed_in: SignedIn) -> Self {
        Self {
            account: AccountSummary::from(&signed_in.account),
            token: signed_in.token,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
