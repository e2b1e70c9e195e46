use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use bank_ledger::{
    api::{self, AppState},
    auth::TokenSigner,
    domain::{Account, AccountId, Email, NewAccount},
    engine::LedgerEngine,
    store::{MemoryStore, StoreHandle},
};
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;

pub const SECRET: &str = "integration-test-secret";

pub fn store() -> StoreHandle {
    StoreHandle::new(MemoryStore::new())
}

#[allow(dead_code)]
pub fn signer() -> TokenSigner {
    TokenSigner::new(SECRET, chrono::Duration::hours(24))
}

/// Creates an account directly in the store, skipping password hashing.
#[allow(dead_code)]
pub async fn open_account(store: &StoreHandle, name: &str, email: &str) -> Account {
    store
        .create_account(NewAccount {
            name: name.to_owned(),
            email: Email::parse(email).unwrap(),
            password_hash: Some(format!("hash-of-{email}")),
            external_id: None,
            is_admin: false,
        })
        .await
        .unwrap()
}

#[allow(dead_code)]
pub async fn funded_account(
    store: &StoreHandle,
    name: &str,
    email: &str,
    amount: Decimal,
) -> Account {
    let account = open_account(store, name, email).await;
    LedgerEngine::new(store.clone())
        .deposit(account.id, amount)
        .await
        .unwrap();
    reload(store, account.id).await
}

#[allow(dead_code)]
pub async fn reload(store: &StoreHandle, id: AccountId) -> Account {
    store.get_by_id(id).await.unwrap().unwrap()
}

/// Balance equals the signed sum of the ledger and is never negative.
#[allow(dead_code)]
pub fn assert_reconciled(account: &Account) {
    assert!(account.balance.value() >= Decimal::ZERO);
    assert_eq!(account.ledger_balance(), Some(account.balance.value()));
}

#[allow(dead_code)]
pub fn app() -> (Router, AppState) {
    let state = AppState::new(store(), signer());
    (api::router(state.clone()), state)
}

/// Sends one JSON request through the router and returns status and body.
#[allow(dead_code)]
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    send_with(app, method, uri, token, body, &[]).await
}

#[allow(dead_code)]
pub async fn send_with(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}
