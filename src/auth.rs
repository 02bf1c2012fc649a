//! Identity: bearer tokens, password hashing and the request extractors
//! that resolve a caller to a [`User`].

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::aggregates::User;
use crate::{BuyvError, Result};

#[derive(Debug, Serialize, Deserialize)]
struct Claims { sub: String, iat: i64, exp: i64 }

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken { pub access_token: String, pub expires_in: i64 }

/// HS256 signing and verification keys.
#[derive(Clone)]
pub struct TokenKeys { encoding: EncodingKey, decoding: DecodingKey, ttl: Duration }

impl TokenKeys {
    pub fn new(secret: &[u8], ttl_minutes: i64) -> Self {
        Self { encoding: EncodingKey::from_secret(secret), decoding: DecodingKey::from_secret(secret), ttl: Duration::minutes(ttl_minutes) }
    }

    pub fn issue(&self, uid: &str) -> Result<IssuedToken> {
        let now = Utc::now();
        let claims = Claims { sub: uid.to_string(), iat: now.timestamp(), exp: (now + self.ttl).timestamp() };
        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| BuyvError::Internal(format!("token signing failed: {}", e)))?;
        Ok(IssuedToken { access_token, expires_in: self.ttl.num_seconds() })
    }

    /// Returns the user uid the token was issued for.
    pub fn verify(&self, token: &str) -> Result<String> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256)).map_err(|_| BuyvError::InvalidToken)?;
        if data.claims.sub.is_empty() { return Err(BuyvError::InvalidToken); }
        Ok(data.claims.sub)
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default().hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| BuyvError::Internal(format!("password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}

/// Token from an `Authorization: Bearer <token>` header. Scheme is case-insensitive.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    let value = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()).ok_or(BuyvError::Unauthenticated)?;
    let (scheme, token) = value.split_once(' ').ok_or(BuyvError::Unauthenticated)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(BuyvError::Unauthenticated);
    }
    Ok(token)
}

async fn resolve(state: &AppState, headers: &HeaderMap) -> Result<User> {
    let uid = state.tokens.verify(bearer_token(headers)?)?;
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE uid = $1")
        .bind(&uid).fetch_optional(&state.db).await?
        .ok_or(BuyvError::NotFound("User"))
}

/// The authenticated caller. Rejects the request when the credential is
/// missing, invalid, or names an unknown user.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = BuyvError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        resolve(state, &parts.headers).await.map(AuthUser)
    }
}

/// The caller if they presented a usable credential, otherwise anonymous.
pub struct MaybeAuthUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = BuyvError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        match resolve(state, &parts.headers).await {
            Ok(user) => Ok(MaybeAuthUser(Some(user))),
            Err(BuyvError::Storage(e)) => Err(BuyvError::Storage(e)),
            Err(_) => Ok(MaybeAuthUser(None)),
        }
    }
}
