use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::models::{UserRecord, UserRole};
use crate::error::{AppError, Result};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub role: UserRole,
    /// "access" or "refresh" - a refresh token cannot be used as a bearer token.
    pub typ: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(password_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

fn create_token(user: &UserRecord, secret: &str, typ: &str, ttl: Duration) -> Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role,
        typ: typ.to_string(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };

    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
}

pub fn create_access_token(user: &UserRecord, secret: &str, expire_minutes: i64) -> Result<String> {
    create_token(user, secret, "access", Duration::minutes(expire_minutes))
}

pub fn create_refresh_token(user: &UserRecord, secret: &str, expire_days: i64) -> Result<String> {
    create_token(user, secret, "refresh", Duration::days(expire_days))
}

/// Deactivated accounts keep their rows but lose all access, including
/// token refresh.
pub fn ensure_active(user: UserRecord) -> Result<UserRecord> {
    if user.is_active {
        Ok(user)
    } else {
        Err(AppError::Unauthorized("Account is deactivated".to_string()))
    }
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
}

/// Authenticated user, resolved from the `Authorization: Bearer <token>` header.
pub struct CurrentUser(pub UserRecord);

impl CurrentUser {
    pub fn require_role(&self, role: UserRole, action: &str) -> Result<()> {
        if self.0.role == role || self.0.role == UserRole::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("Only {:?} accounts can {}", role, action)))
        }
    }

    pub fn require_admin(&self) -> Result<()> {
        if self.0.role == UserRole::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin access required".to_string()))
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> std::result::Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Expected a Bearer token".to_string()))?;

        let claims = verify_token(token, &state.config.jwt_secret)?;
        if claims.typ != "access" {
            return Err(AppError::Unauthorized("Refresh token cannot be used here".to_string()));
        }

        let user_id: i32 = claims
            .sub
            .parse()
            .map_err(|_| AppError::Unauthorized("Invalid token subject".to_string()))?;

        let user = state
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User no longer exists".to_string()))?;

        Ok(CurrentUser(ensure_active(user)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> UserRecord {
        UserRecord {
            id: 7,
            email: "backer@example.com".to_string(),
            password_hash: String::new(),
            full_name: "Test Backer".to_string(),
            role: UserRole::Backer,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(verify_password("correct horse battery", &hash));
        assert!(!verify_password("wrong password", &hash));
    }

    #[test]
    fn verify_rejects_malformed_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn access_token_round_trip() {
        let token = create_access_token(&test_user(), "secret", 60).unwrap();
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.typ, "access");
        assert_eq!(claims.role, UserRole::Backer);
    }

    #[test]
    fn token_rejected_with_wrong_secret() {
        let token = create_access_token(&test_user(), "secret", 60).unwrap();
        assert!(verify_token(&token, "other-secret").is_err());
    }

    #[test]
    fn expired_token_rejected() {
        let token = create_token(&test_user(), "secret", "access", Duration::minutes(-5)).unwrap();
        assert!(verify_token(&token, "secret").is_err());
    }

    #[test]
    fn refresh_token_carries_typ() {
        let token = create_refresh_token(&test_user(), "secret", 30).unwrap();
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.typ, "refresh");
    }

    #[test]
    fn deactivated_account_rejected() {
        let mut user = test_user();
        user.is_active = false;
        assert!(matches!(ensure_active(user), Err(AppError::Unauthorized(_))));

        let active = test_user();
        assert_eq!(ensure_active(active).unwrap().id, 7);
    }
}
