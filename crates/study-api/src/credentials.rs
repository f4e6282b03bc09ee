//! Credential service: password hashing, bearer tokens and reset tokens.

use anyhow::anyhow;
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use study_db::models::UserRow;
use study_db::Database;

/// Reset tokens live for one hour.
pub const RESET_TOKEN_TTL_HOURS: i64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// The user's email address.
    pub sub: String,
    pub exp: usize,
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Issue a signed bearer token whose subject is the user's email.
pub fn create_access_token(
    secret: &str,
    email: &str,
    ttl_minutes: i64,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: email.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::minutes(ttl_minutes)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Verify signature and expiry; malformed, forged and expired tokens all
/// collapse to `None`.
pub fn decode_token(secret: &str, token: &str) -> Option<String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims.sub)
}

/// Look a user up by email and check the password. Fails closed: an unknown
/// email and a wrong password are indistinguishable to the caller.
pub fn authenticate(db: &Database, email: &str, password: &str) -> anyhow::Result<Option<UserRow>> {
    let Some(user) = db.get_user_by_email(email)? else {
        return Ok(None);
    };
    if !verify_password(password, &user.password_hash) {
        return Ok(None);
    }
    Ok(Some(user))
}

/// Cryptographically random URL-safe reset token (32 bytes of entropy).
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
