//! Bearer-token authorization.

use std::collections::HashMap;

use axum::http::{header, HeaderMap};
use patrol_core::{Identity, Role};
use thiserror::Error;

use crate::config::AuthConfig;

/// Why a credential was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Not authenticated")]
    MissingCredential,

    #[error("Could not validate credentials")]
    InvalidCredential,

    #[error("Role '{role}' may not perform this action (requires '{required}' or higher)")]
    InsufficientRole { role: Role, required: Role },
}

/// Resolves a credential to an identity holding at least `minimum`.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, credential: Option<&str>, minimum: Role) -> Result<Identity, AuthError>;
}

/// Authorizer backed by a fixed table of opaque tokens.
#[derive(Debug, Default)]
pub struct TokenAuthorizer {
    tokens: HashMap<String, Identity>,
}

impl TokenAuthorizer {
    pub fn new(tokens: impl IntoIterator<Item = (String, Identity)>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.tokens.iter().map(|entry| {
            (
                entry.token.clone(),
                Identity::new(entry.username.clone(), entry.role),
            )
        }))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Authorizer for TokenAuthorizer {
    fn authorize(&self, credential: Option<&str>, minimum: Role) -> Result<Identity, AuthError> {
        let token = credential.ok_or(AuthError::MissingCredential)?;
        let identity = self
            .tokens
            .get(token)
            .ok_or(AuthError::InvalidCredential)?;

        if !identity.role.permits(minimum) {
            return Err(AuthError::InsufficientRole {
                role: identity.role,
                required: minimum,
            });
        }
        Ok(identity.clone())
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// A header with any other scheme counts as no credential.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
