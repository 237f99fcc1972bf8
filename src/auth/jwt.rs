use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// One warehouse shift.
pub const TOKEN_TTL_HOURS: i64 = 8;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub role: String,
    pub username: String,
    pub exp: usize,
    pub iat: usize,
}

pub fn sign_token(user_id: i64, role: &str, username: &str, secret: &str) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        role: role.to_string(),
        username: username.to_string(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp() as usize,
    };
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AppError::internal(format!("Token signing failed: {e}")))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|d| d.claims)
    .map_err(|e| AppError::validation(format!("Invalid or expired token: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_claims() {
        let token = sign_token(7, "manager", "kho.truong", "s3cret").unwrap();
        let claims = verify_token(&token, "s3cret").unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.role, "manager");
        assert_eq!(claims.username, "kho.truong");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = sign_token(7, "operator", "op1", "s3cret").unwrap();
        assert!(verify_token(&token, "other").is_err());
    }
}
