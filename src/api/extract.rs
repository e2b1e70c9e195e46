//! Request extractors tying axum to the access gate.

use axum::{
    async_trait,
    extract::{FromRef, FromRequest, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use super::error::ApiError;
use crate::auth::CredentialVerifier;
use crate::gate::{self, Caller, Principal};

/// `Json` whose rejections use the service's error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Path` whose rejections use the service's error body.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

async fn caller<S>(parts: &Parts, state: &S) -> Result<Caller, ApiError>
where
    CredentialVerifier: FromRef<S>,
{
    let verifier = CredentialVerifier::from_ref(state);
    let authorization = match parts.headers.get(AUTHORIZATION) {
        Some(value) => Some(value.to_str().map_err(|_| ApiError::Unauthorized)?),
        None => None,
    };
    Ok(gate::classify(&verifier, authorization).await?)
}

/// Any caller holding a valid session.
pub struct Authenticated(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
    CredentialVerifier: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(caller(parts, state).await?.into_principal()?))
    }
}

/// A caller whose account carries the administrator flag.
pub struct AdminOnly(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for AdminOnly
where
    S: Send + Sync,
    CredentialVerifier: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(caller(parts, state).await?.into_admin()?))
    }
}
