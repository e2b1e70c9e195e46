//! Maps every layer's errors onto a stable `kind` plus HTTP status.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::accounts::AccountError;
use crate::auth::AuthError;
use crate::domain::DomainError;
use crate::engine::errors::LedgerError;
use crate::gate::GateError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    DuplicateIdentity(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InsufficientFunds(String),
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Authentication required")]
    Unauthorized,
    #[error("Invalid session token")]
    InvalidToken,
    #[error("Session token expired")]
    Expired,
    #[error("{0}")]
    Forbidden(String),
    /// The cause is logged, never returned.
    #[error("Service temporarily unavailable, please retry")]
    StoreUnavailable(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    kind: &'a str,
    message: String,
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "invalid_input",
            ApiError::DuplicateIdentity(_) => "duplicate_identity",
            ApiError::NotFound(_) => "not_found",
            ApiError::InsufficientFunds(_) => "insufficient_funds",
            ApiError::InvalidCredentials => "invalid_credentials",
            ApiError::Unauthorized => "unauthorized",
            ApiError::InvalidToken => "invalid_token",
            ApiError::Expired => "expired",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::StoreUnavailable(_) => "store_unavailable",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::DuplicateIdentity(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InsufficientFunds(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InvalidCredentials
            | ApiError::Unauthorized
            | ApiError::InvalidToken
            | ApiError::Expired => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::StoreUnavailable(cause) = &self {
            error!(%cause, "Store unavailable");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.kind(),
                message: self.to_string(),
            },
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateIdentity(_) => ApiError::DuplicateIdentity(err.to_string()),
            StoreError::NotFound | StoreError::TransactionNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            StoreError::InsufficientFunds { .. } => ApiError::InsufficientFunds(err.to_string()),
            StoreError::BalanceLimit { .. } => ApiError::InvalidInput(err.to_string()),
            StoreError::Unavailable(cause) => ApiError::StoreUnavailable(cause),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::InvalidInput(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidAmount(_)
            | LedgerError::SelfTransfer
            | LedgerError::BalanceLimit { .. } => {
                ApiError::InvalidInput(err.to_string())
            }
            LedgerError::AccountNotFound
            | LedgerError::SenderNotFound
            | LedgerError::RecipientNotFound => ApiError::NotFound(err.to_string()),
            LedgerError::InsufficientFunds { .. } => ApiError::InsufficientFunds(err.to_string()),
            LedgerError::Store(store) => store.into(),
        }
    }
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Unauthorized => ApiError::Unauthorized,
            GateError::InvalidToken => ApiError::InvalidToken,
            GateError::Expired => ApiError::Expired,
            GateError::Forbidden(reason) => ApiError::Forbidden(reason.to_owned()),
            GateError::Store(store) => store.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::InvalidCredentials,
            AuthError::InvalidToken => ApiError::InvalidToken,
            AuthError::Expired => ApiError::Expired,
            AuthError::Store(store) => store.into(),
            AuthError::NoCredential | AuthError::Internal(_) => {
                ApiError::StoreUnavailable(err.to_string())
            }
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::InvalidInput(domain) => domain.into(),
            AccountError::DuplicateIdentity(_) => ApiError::DuplicateIdentity(err.to_string()),
            AccountError::NotFound => ApiError::NotFound(err.to_string()),
            AccountError::InvalidCredentials => ApiError::InvalidCredentials,
            AccountError::Gate(gate) => gate.into(),
            AccountError::Auth(auth) => auth.into(),
            AccountError::Store(store) => store.into(),
        }
    }
}
