use std::{num::NonZeroU32, sync::Arc};

use anyhow::anyhow;
use argon2::password_hash::rand_core::OsRng;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crate::{
    config::Config,
    errors::{AppError, AppResult},
    models::Claims,
};

/// Cookie holding the signed-in user's access token.
pub const SESSION_COOKIE: &str = "access_token";
/// Cookie holding the refresh token used to mint a new access token.
pub const REFRESH_COOKIE: &str = "refresh_token";

pub type KeyedRateLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Hash a plaintext password using Argon2.
///
/// # Errors
/// Returns an error if hashing fails.
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Anyhow(anyhow!(e.to_string())))
}

/// Check a login attempt against a stored hash.
///
/// # Errors
/// Returns an error if the stored hash is malformed.
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| AppError::Anyhow(anyhow!(e.to_string())))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Signed session tokens for one user.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access: String,
    pub refresh: String,
}

fn expiry_after(lifetime: Duration) -> AppResult<usize> {
    usize::try_from((Utc::now() + lifetime).timestamp())
        .map_err(|e| AppError::Anyhow(anyhow!(e.to_string())))
}

/// Issue a 15 minute access token and a 7 day refresh token for `user_id`.
///
/// # Errors
/// Returns an error if encoding fails.
pub fn issue_tokens(user_id: Uuid, config: &Config) -> AppResult<SessionTokens> {
    let key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
    let sign = |lifetime: Duration, refresh: bool| -> AppResult<String> {
        let claims = Claims {
            sub: user_id,
            exp: expiry_after(lifetime)?,
            refresh,
        };
        encode(&Header::default(), &claims, &key).map_err(|e| AppError::Anyhow(e.into()))
    };

    Ok(SessionTokens {
        access: sign(Duration::minutes(15), false)?,
        refresh: sign(Duration::days(7), true)?,
    })
}

/// Decode and validate a token signed by [`issue_tokens`].
///
/// # Errors
/// Returns Unauthorized if the signature or expiry check fails.
pub fn decode_token(token: &str, config: &Config) -> AppResult<Claims> {
    let key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    decode::<Claims>(token, &key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|_| AppError::Unauthorized)
}

/// Keyed rate limiter allowing `per_minute` requests per signed-in user.
///
/// A zero quota is raised to one request per minute.
#[must_use]
pub fn build_rate_limiter(per_minute: u32) -> Arc<KeyedRateLimiter> {
    let quota = Quota::per_minute(NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::keyed(quota))
}
