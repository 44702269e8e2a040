//! Bearer token verification and the ownership rules shared by every mutable entity.
//!
//! Tokens are issued by the account service; this crate only verifies HS256 signatures
//! against the shared secret and reads the `id` and `role` claims.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Responder,
    Admin,
}

/// The authenticated caller of a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Update rule: the author or an admin.
    pub fn ensure_owner_or_admin(&self, owner: &str, what: &str) -> Result<(), AppError> {
        if self.id == owner || self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("Not authorized to update this {what}")))
        }
    }

    /// The author or anyone holding one of `roles`. `action` names the refused verb
    /// in the error ("update", "delete").
    pub fn ensure_owner_or_roles(
        &self,
        owner: &str,
        roles: &[Role],
        action: &str,
        what: &str,
    ) -> Result<(), AppError> {
        if self.id == owner || roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("Not authorized to {action} this {what}")))
        }
    }

    /// Delete rule: admins only, regardless of ownership.
    pub fn ensure_admin(&self, what: &str) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("Not authorized to delete this {what}")))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    #[serde(default)]
    pub role: Role,
    pub exp: u64,
}

pub struct TokenVerifier {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let key = (!secret.is_empty()).then(|| DecodingKey::from_secret(secret.as_bytes()));
        Self {
            key,
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Actor, AppError> {
        let Some(key) = &self.key else {
            return Err(AppError::Unauthenticated(
                "token verification is not configured".into(),
            ));
        };

        let data = decode::<Claims>(token, key, &self.validation).map_err(|e| {
            debug!(error = %e, "Rejected bearer token");
            AppError::Unauthenticated("token failed".into())
        })?;

        Ok(Actor::new(data.claims.id, data.claims.role))
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthenticated("no token".into()))?;
        state.tokens.verify(token)
    }
}
