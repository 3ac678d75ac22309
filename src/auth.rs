use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::AppState;

/// Claim structure for JWT tokens. Tokens are issued by an external
/// identity provider; this service only verifies and consumes them.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// User's roles
    #[serde(default)]
    pub roles: Vec<String>,
    /// Issued at time
    pub iat: i64,
    /// Expiration time
    pub exp: i64,
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub roles: Vec<String>,
}

impl CurrentUser {
    /// Check if the user has a specific role
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Check if the user is an admin
    pub fn is_admin(&self) -> bool {
        self.has_role("admin")
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, ServiceError> {
    let header_value = parts
        .headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ServiceError::Unauthorized("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| ServiceError::Unauthorized("Invalid authorization header".to_string()))?;

    header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ServiceError::Unauthorized("Expected bearer token".to_string()))
}

fn verify_token(token: &str, secret: &str) -> Result<CurrentUser, ServiceError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| ServiceError::Unauthorized(format!("Invalid token: {}", e)))?;

    let user_id = Uuid::parse_str(&token_data.claims.sub)
        .map_err(|_| ServiceError::Unauthorized("Invalid subject claim".to_string()))?;

    Ok(CurrentUser {
        user_id,
        roles: token_data.claims.roles,
    })
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        verify_token(token, &state.config.jwt_secret)
    }
}
