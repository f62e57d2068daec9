//! Authentication and authorization for the lifecycle core.
//!
//! Callers authenticate with an HS256 JWT carrying their user id and role.
//! Every lifecycle operation is gated by [`AuthUser::require_role`] before
//! any ownership check; ownership itself is validated inside the services.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::AppState;

pub use crate::entities::user::UserRole;

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Marketplace role the token was issued for
    pub role: String,
    /// JWT ID (unique identifier for this token)
    pub jti: String,
    /// Issued at time
    pub iat: i64,
    /// Expiration time
    pub exp: i64,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication token")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    ExpiredToken,

    #[error("Internal auth error: {0}")]
    InternalError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        };
        let body = serde_json::json!({
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": self.to_string(),
            "timestamp": Utc::now().to_rfc3339(),
        });
        (status, Json(body)).into_response()
    }
}

/// Auth service configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub audience: String,
    pub token_ttl: Duration,
}

impl AuthConfig {
    pub fn new(jwt_secret: String, issuer: String, audience: String, token_ttl: Duration) -> Self {
        Self {
            jwt_secret,
            issuer,
            audience,
            token_ttl,
        }
    }
}

/// Issues and validates JWT tokens.
#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Issues a token binding a user id to a role.
    pub fn issue_token(&self, user_id: Uuid, role: UserRole) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let jti: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(24)
            .map(char::from)
            .collect();

        let claims = Claims {
            sub: user_id.to_string(),
            role: role.to_string(),
            jti,
            iat: now,
            exp: now + self.config.token_ttl.as_secs() as i64,
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::InternalError(e.to_string()))
    }

    /// Validates a token and returns its claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
            _ => AuthError::InvalidToken(e.to_string()),
        })
    }
}

/// Authenticated caller extracted from the JWT token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: UserRole,
    pub token_id: String,
}

impl AuthUser {
    /// Capability check applied before a lifecycle operation. Admins pass any
    /// role gate.
    pub fn require_role(&self, role: UserRole) -> Result<&Self, ServiceError> {
        if self.role == role || self.role == UserRole::Admin {
            Ok(self)
        } else {
            Err(ServiceError::Unauthorized(format!(
                "Operation requires {} role",
                role
            )))
        }
    }

    /// Ownership check: the caller may act on a resource they own; admins may
    /// act on anyone's.
    pub fn can_act_for(&self, owner_id: Uuid) -> bool {
        self.user_id == owner_id || self.role == UserRole::Admin
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::MissingToken)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::MissingToken)?
            .trim();

        let claims = state.auth_service.validate_token(token)?;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AuthError::InvalidToken("subject is not a valid user id".into()))?;
        let role = UserRole::from_str(&claims.role)
            .map_err(|_| AuthError::InvalidToken(format!("unknown role: {}", claims.role)))?;

        Ok(AuthUser {
            user_id,
            role,
            token_id: claims.jti,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service() -> AuthService {
        AuthService::new(AuthConfig::new(
            "test_secret_key_for_testing_purposes_only_32chars".into(),
            "cropmate-api".into(),
            "cropmate".into(),
            Duration::from_secs(3600),
        ))
    }

    #[test]
    fn token_round_trip_preserves_identity() {
        let svc = test_service();
        let user_id = Uuid::new_v4();

        let token = svc.issue_token(user_id, UserRole::Driver).unwrap();
        let claims = svc.validate_token(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, "DRIVER");
        assert_eq!(claims.iss, "cropmate-api");
    }

    #[test]
    fn tampered_token_is_rejected() {
        let svc = test_service();
        let token = svc.issue_token(Uuid::new_v4(), UserRole::Farmer).unwrap();
        let mut tampered = token.clone();
        tampered.pop();
        tampered.push('x');

        assert!(svc.validate_token(&tampered).is_err());
    }

    #[test]
    fn require_role_gates_by_role() {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            role: UserRole::Customer,
            token_id: "jti".into(),
        };

        assert!(user.require_role(UserRole::Customer).is_ok());
        assert!(user.require_role(UserRole::Farmer).is_err());
    }

    #[test]
    fn admin_passes_any_role_gate() {
        let admin = AuthUser {
            user_id: Uuid::new_v4(),
            role: UserRole::Admin,
            token_id: "jti".into(),
        };

        assert!(admin.require_role(UserRole::Farmer).is_ok());
        assert!(admin.require_role(UserRole::Driver).is_ok());
    }

    #[test]
    fn role_parse_round_trip() {
        for role in [
            UserRole::Customer,
            UserRole::Farmer,
            UserRole::Driver,
            UserRole::Admin,
        ] {
            assert_eq!(UserRole::from_str(&role.to_string()).unwrap(), role);
        }
    }
}
