//! HTTP surface.

use axum::{
    Router,
    extract::FromRef,
    routing::{delete, get, post, put},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::accounts::AccountService;
use crate::auth::{CredentialVerifier, TokenSigner};
use crate::engine::LedgerEngine;
use crate::store::StoreHandle;
pub use error::ApiError;
pub use handlers::ADMIN_PASSWORD_HEADER;

pub mod error;
pub mod extract;
pub mod handlers;
pub mod types;

/// Services shared by every handler. All state lives in the store behind
/// the injected handle.
#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    pub ledger: LedgerEngine,
    pub verifier: CredentialVerifier,
}

impl AppState {
    pub fn new(store: StoreHandle, signer: TokenSigner) -> Self {
        let verifier = CredentialVerifier::new(store.clone(), signer);
        Self {
            accounts: AccountService::new(store.clone(), verifier.clone()),
            ledger: LedgerEngine::new(store),
            verifier,
        }
    }
}

impl FromRef<AppState> for CredentialVerifier {
    fn from_ref(state: &AppState) -> Self {
        state.verifier.clone()
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        // Sessions
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/federated", post(handlers::federated_login))
        .route("/api/auth/logout", post(handlers::logout))
        // Accounts
        .route("/api/accounts", get(handlers::list_accounts))
        .route("/api/accounts/me", get(handlers::me))
        .route("/api/accounts/me/profile", put(handlers::update_profile))
        .route("/api/accounts/:id/transactions", get(handlers::history))
        .route("/api/accounts/:id/password", put(handlers::change_password))
        // Ledger
        .route("/api/transactions/deposit", post(handlers::deposit))
        .route("/api/transactions/withdraw", post(handlers::withdraw))
        .route("/api/transactions/transfer", post(handlers::transfer))
        // Administration
        .route("/api/admin/accounts", get(handlers::admin_list_accounts))
        .route("/api/admin/accounts/:id", delete(handlers::delete_account))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
