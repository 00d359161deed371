use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, response::IntoResponse};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{info, warn};
use uuid::Uuid;

use rumon_db::{Database, queries};
use rumon_types::api::{Claims, LoginRequest, LoginResponse};

use crate::error::ApiError;
use crate::extract::{Validate, ValidJson};
use crate::run_blocking;
use crate::validate::{self, Errors};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        Errors::new()
            .check(validate::is_email(&self.email), "email must be a valid email address")
            .check(self.password.len() >= 6, "password must be at least 6 characters")
            .finish()
    }
}

pub async fn login(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let email = req.email.trim().to_lowercase();
    let user = run_blocking(move || {
        db.db
            .with_conn(|conn| queries::users::find_by_email(conn, &email))
            .map_err(ApiError::from)
    })
    .await?;

    // Same answer for every failure so the endpoint does not reveal which
    // emails exist.
    let invalid = || ApiError::Unauthorized("Invalid credentials".into());

    let user = user.ok_or_else(invalid)?;
    if !user.is_active {
        warn!("Login attempt on inactive account {}", user.id);
        return Err(invalid());
    }
    let hash = user.password.as_deref().ok_or_else(invalid)?;
    if !verify_password(&req.password, hash)? {
        return Err(invalid());
    }

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(format!("corrupt user id '{}': {}", user.id, e)))?;
    let token = create_token(&state.jwt_secret, state.token_ttl_days, user_id, &user.email)?;

    info!("User {} logged in", user_id);
    Ok(Json(LoginResponse {
        user_id,
        name: user.name,
        token,
    }))
}

/// Hash with Argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))?
        .to_string();
    Ok(hash)
}

/// `Ok(false)` on a wrong password; `Err` only when the stored hash is unreadable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, ApiError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| ApiError::Internal(format!("stored password hash unreadable: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn create_token(
    secret: &str,
    ttl_days: i64,
    user_id: Uuid,
    email: &str,
) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(ttl_days)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token encoding failed: {}", e)))
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| ApiError::Unauthorized(format!("Invalid token: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies_only_the_original() {
        let hash = hash_password("segredo123").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("segredo123", &hash).unwrap());
        assert!(!verify_password("outra-senha", &hash).unwrap());
    }

    #[test]
    fn token_round_trips_claims() {
        let id = Uuid::new_v4();
        let token = create_token("test-secret", 30, id, "ana@rep.com").unwrap();
        let claims = decode_token("test-secret", &token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.email, "ana@rep.com");
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = create_token("secret-a", 30, Uuid::new_v4(), "a@b.com").unwrap();
        assert!(matches!(
            decode_token("secret-b", &token),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = create_token("s", -1, Uuid::new_v4(), "a@b.com").unwrap();
        assert!(decode_token("s", &token).is_err());
    }
}
