//! Request handlers. Each translates one request into a service call and
//! serializes the result.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde_json::json;

use super::AppState;
use super::error::ApiError;
use super::extract::{AdminOnly, ApiJson, ApiPath, Authenticated};
use super::types::{
    AccountSummary, AccountView, AmountRequest, AuthResponse, FederatedLoginRequest, LoginRequest,
    MessageResponse, PasswordRequest, ProfileRequest, RegisterRequest, TransferCommand,
    TransferRequest,
};
use crate::accounts::{FederatedIdentity, Registration};
use crate::domain::{AccountId, Email, Password, ProfileUpdate};
use crate::engine::Receipt;
use crate::gate::{GateError, Principal};

/// Header carrying the administrator's own password on deletions.
pub const ADMIN_PASSWORD_HEADER: &str = "x-admin-password";

pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let registration = Registration::try_from(request)?;
    let signed_in = state.accounts.register(registration).await?;
    Ok((StatusCode::CREATED, Json(signed_in.into())))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    // A malformed email can't match any account.
    let email = Email::parse(&request.email).map_err(|_| ApiError::InvalidCredentials)?;
    let signed_in = state.accounts.login(&email, &request.password).await?;
    Ok(Json(signed_in.into()))
}

pub async fn federated_login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<FederatedLoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let identity = FederatedIdentity::try_from(request)?;
    let signed_in = state.accounts.federated_login(identity).await?;
    Ok(Json(signed_in.into()))
}

pub async fn logout(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
) -> Result<Json<MessageResponse>, ApiError> {
    state.accounts.logout(&principal).await?;
    Ok(Json(MessageResponse::new("Signed out")))
}

/// Public directory: never includes hashes, sessions, or ledgers.
pub async fn list_accounts(
    State(state): State<AppState>,
) -> Result<Json<Vec<AccountSummary>>, ApiError> {
    let accounts = state.accounts.list().await?;
    Ok(Json(accounts.iter().map(AccountSummary::from).collect()))
}

pub async fn admin_list_accounts(
    State(state): State<AppState>,
    AdminOnly(_admin): AdminOnly,
) -> Result<Json<Vec<AccountView>>, ApiError> {
    let accounts = state.accounts.list().await?;
    Ok(Json(accounts.iter().map(AccountView::from).collect()))
}

pub async fn me(Authenticated(principal): Authenticated) -> Json<AccountView> {
    Json(AccountView::from(&principal.account))
}

/// Rejects a body naming any account other than the caller's.
fn claimed_account(principal: &Principal, claimed: Option<AccountId>) -> Result<AccountId, GateError> {
    if let Some(claimed) = claimed {
        principal.ensure_owner(claimed)?;
    }
    Ok(principal.id())
}

pub async fn deposit(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiJson(request): ApiJson<AmountRequest>,
) -> Result<Json<Receipt>, ApiError> {
    let account_id = claimed_account(&principal, request.account_id)?;
    let receipt = state.ledger.deposit(account_id, request.amount).await?;
    Ok(Json(receipt))
}

pub async fn withdraw(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiJson(request): ApiJson<AmountRequest>,
) -> Result<Json<Receipt>, ApiError> {
    let account_id = claimed_account(&principal, request.account_id)?;
    let receipt = state.ledger.withdraw(account_id, request.amount).await?;
    Ok(Json(receipt))
}

pub async fn transfer(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiJson(request): ApiJson<TransferRequest>,
) -> Result<Json<Receipt>, ApiError> {
    let command = TransferCommand::try_from(request)?;
    if command.from.as_ref().is_some_and(|from| *from != principal.account.email) {
        return Err(GateError::Forbidden("You can only transfer from your own account").into());
    }
    let receipt = state
        .ledger
        .transfer(
            &principal.account.email,
            &command.to,
            command.amount,
            command.description,
        )
        .await?;
    Ok(Json(receipt))
}

pub async fn history(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiPath(account_id): ApiPath<AccountId>,
) -> Result<impl IntoResponse, ApiError> {
    principal.ensure_owner_or_admin(account_id)?;
    let transactions = state.ledger.history(account_id).await?;
    Ok(Json(transactions))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiJson(request): ApiJson<ProfileRequest>,
) -> Result<Json<AccountView>, ApiError> {
    let update = ProfileUpdate::try_from(request)?;
    let account = state.accounts.update_profile(&principal, update).await?;
    Ok(Json(AccountView::from(&account)))
}

pub async fn change_password(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiPath(account_id): ApiPath<AccountId>,
    ApiJson(request): ApiJson<PasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let new_password = Password::parse(request.new_password)?;
    state
        .accounts
        .change_password(&principal, account_id, new_password, request.current_password)
        .await?;
    Ok(Json(MessageResponse::new("Password updated")))
}

pub async fn delete_account(
    State(state): State<AppState>,
    AdminOnly(admin): AdminOnly,
    ApiPath(account_id): ApiPath<AccountId>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, ApiError> {
    let admin_password = headers
        .get(ADMIN_PASSWORD_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    state
        .accounts
        .delete_account(&admin, account_id, admin_password)
        .await?;
    Ok(Json(MessageResponse::new("Account deleted")))
}
