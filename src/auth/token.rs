//! Bearer session tokens.
//!
//! A token is `base64url(claims).base64url(hmac)`. The HMAC key is the
//! service secret followed by the account's credential fingerprint (its
//! current password hash), so changing the password silently invalidates
//! every token signed before the change.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use super::AuthError;
use crate::domain::{Account, AccountId, AccountNumber, Email, Session};

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: AccountId,
    pub email: Email,
    pub account_number: AccountNumber,
    /// Session id, matched against the sessions registered on the account.
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Signs a fresh token for `account` and returns the session it opens.
    pub fn issue(
        &self,
        account: &Account,
        now: DateTime<Utc>,
    ) -> Result<(String, Session), AuthError> {
        let fingerprint = account
            .credential_fingerprint()
            .ok_or(AuthError::NoCredential)?;
        let session = Session {
            id: Uuid::new_v4(),
            created_at: now,
            expires_at: now + self.ttl,
        };
        let claims = Claims {
            sub: account.id,
            email: account.email.clone(),
            account_number: account.account_number.clone(),
            jti: session.id,
            iat: session.created_at.timestamp(),
            exp: session.expires_at.timestamp(),
        };

        let payload = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&claims).map_err(|e| AuthError::Internal(e.to_string()))?,
        );
        let signature = self.mac(fingerprint, &payload)?.finalize().into_bytes();
        let token = format!("{payload}.{}", URL_SAFE_NO_PAD.encode(signature));
        Ok((token, session))
    }

    /// Reads the claims without checking the signature. Only used to find
    /// which account's key to verify against.
    pub fn peek(token: &str) -> Result<Claims, AuthError> {
        let (payload, _) = token.split_once('.').ok_or(AuthError::InvalidToken)?;
        decode_claims(payload)
    }

    /// Checks signature, subject, and expiry against the account as it is now.
    pub fn verify(
        &self,
        token: &str,
        account: &Account,
        now: DateTime<Utc>,
    ) -> Result<Claims, AuthError> {
        let (payload, signature) = token.split_once('.').ok_or(AuthError::InvalidToken)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::InvalidToken)?;
        let fingerprint = account
            .credential_fingerprint()
            .ok_or(AuthError::InvalidToken)?;
        self.mac(fingerprint, payload)?
            .verify_slice(&signature)
            .map_err(|_| AuthError::InvalidToken)?;

        let claims = decode_claims(payload)?;
        if claims.sub != account.id {
            return Err(AuthError::InvalidToken);
        }
        if now.timestamp() >= claims.exp {
            return Err(AuthError::Expired);
        }
        Ok(claims)
    }

    fn mac(&self, fingerprint: &str, payload: &str) -> Result<HmacSha256, AuthError> {
        let mut key = self.secret.clone();
        key.extend_from_slice(fingerprint.as_bytes());
        let mut mac =
            HmacSha256::new_from_slice(&key).map_err(|e| AuthError::Internal(e.to_string()))?;
        mac.update(payload.as_bytes());
        Ok(mac)
    }
}

fn decode_claims(payload: &str) -> Result<Claims, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| AuthError::InvalidToken)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::InvalidToken)
}
