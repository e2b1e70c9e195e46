//! Access gate: classifies each caller and decides what it may do.

use tracing::warn;

use crate::auth::{AuthError, Claims, CredentialVerifier};
use crate::domain::{Account, AccountId};
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GateError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Invalid session token")]
    InvalidToken,
    #[error("Session token expired")]
    Expired,
    #[error("{0}")]
    Forbidden(&'static str),
    #[error(transparent)]
    Store(StoreError),
}

impl From<AuthError> for GateError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Expired => GateError::Expired,
            AuthError::Store(store) => GateError::Store(store),
            _ => GateError::InvalidToken,
        }
    }
}

/// An authenticated caller and the account its token resolved to.
#[derive(Debug, Clone)]
pub struct Principal {
    pub account: Account,
    pub claims: Claims,
}

impl Principal {
    pub fn id(&self) -> AccountId {
        self.account.id
    }

    pub fn is_admin(&self) -> bool {
        self.account.is_admin
    }

    /// Self-operations must target the caller's own account.
    pub fn ensure_owner(&self, target: AccountId) -> Result<(), GateError> {
        if self.id() != target {
            warn!(caller = %self.id(), %target, "Rejected operation on another account");
            return Err(GateError::Forbidden("You can only act on your own account"));
        }
        Ok(())
    }

    pub fn ensure_owner_or_admin(&self, target: AccountId) -> Result<(), GateError> {
        if self.is_admin() {
            return Ok(());
        }
        self.ensure_owner(target)
    }

    pub fn ensure_admin(&self) -> Result<(), GateError> {
        if !self.is_admin() {
            warn!(caller = %self.id(), "Rejected admin operation");
            return Err(GateError::Forbidden("Administrator access required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum Caller {
    Anonymous,
    User(Principal),
    Admin(Principal),
}

impl Caller {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Caller::Anonymous => None,
            Caller::User(principal) | Caller::Admin(principal) => Some(principal),
        }
    }

    pub fn into_principal(self) -> Result<Principal, GateError> {
        match self {
            Caller::Anonymous => Err(GateError::Unauthorized),
            Caller::User(principal) | Caller::Admin(principal) => Ok(principal),
        }
    }

    pub fn into_admin(self) -> Result<Principal, GateError> {
        match self {
            Caller::Admin(principal) => Ok(principal),
            Caller::User(_) => Err(GateError::Forbidden("Administrator access required")),
            Caller::Anonymous => Err(GateError::Unauthorized),
        }
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Resolves the `Authorization` header, if any, to a caller.
///
/// No header is anonymous. A header that is present but unusable is an
/// error, never a silent downgrade to anonymous.
pub async fn classify(
    verifier: &CredentialVerifier,
    authorization: Option<&str>,
) -> Result<Caller, GateError> {
    let Some(header) = authorization else {
        return Ok(Caller::Anonymous);
    };
    let token = bearer_token(header).ok_or(GateError::Unauthorized)?;
    let (claims, account) = verifier.verify_token(token).await?;
    let principal = Principal { account, claims };
    Ok(if principal.is_admin() {
        Caller::Admin(principal)
    } else {
        Caller::User(principal)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer   abc.def "), Some("abc.def"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc.def"), None);
    }
}
