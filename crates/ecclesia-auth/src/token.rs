//! Bearer session tokens (HS256 JWT)

use crate::error::AuthError;
use crate::roles::UserRole;
use crate::AuthResult;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id
    pub sub: String,
    pub email: String,
    /// Role at issue time. Guards re-read the stored role.
    pub role: UserRole,
    pub church_id: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and validates session tokens
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: u64,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    pub fn issue(
        &self,
        user_id: &str,
        email: &str,
        role: UserRole,
        church_id: Option<&str>,
    ) -> AuthResult<String> {
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role,
            church_id: church_id.map(str::to_string),
            iat: now,
            exp: now + self.ttl_secs as i64,
        };
        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    pub fn verify(&self, token: &str) -> AuthResult<SessionClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = decode::<SessionClaims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header value
pub fn extract_bearer_token(header: &str) -> AuthResult<&str> {
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .ok_or_else(|| AuthError::token_error("Authorization header must use Bearer scheme"))?
        .trim();
    if token.is_empty() {
        return Err(AuthError::token_error("Empty bearer token"));
    }
    Ok(token)
}
