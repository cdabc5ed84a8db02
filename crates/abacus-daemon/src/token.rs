// Copyright (c) 2026 Abacus Contributors
// SPDX-License-Identifier: Apache-2.0

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use abacus_core::Role;

/// Claims carried by an abacus bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleClaims {
    pub iss: String,
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Outcome of a successful verification: the raw claims plus the parsed
/// role.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub role: Role,
    pub claims: RoleClaims,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("role claim `{0}` is not a recognized role")]
    UnknownRole(String),
}

/// Seam between the access interceptor and the concrete token
/// implementation, so tests can substitute instrumented verifiers.
pub trait BearerVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<VerifiedToken, AuthError>;
}

/// Validates HS256 bearer tokens against a shared secret.
///
/// Key material is read-only after construction; `verify` is safe to call
/// from any number of request workers concurrently.
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &[u8], issuer: impl AsRef<str>, leeway_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer.as_ref()]);
        validation.leeway = leeway_secs;
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl BearerVerifier for TokenVerifier {
    fn verify(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        // Signature, expiry, and issuer are always validated before the role
        // claim is read; there is no privileged fast path.
        let data =
            jsonwebtoken::decode::<RoleClaims>(token, &self.decoding_key, &self.validation)?;
        let role = Role::from_claim(&data.claims.role)
            .ok_or_else(|| AuthError::UnknownRole(data.claims.role.clone()))?;
        Ok(VerifiedToken {
            role,
            claims: data.claims,
        })
    }
}

/// Mints HS256 bearer tokens. Used by `abacusctl mint-token` and tests;
/// the daemon itself never issues credentials.
pub struct TokenIssuer {
    issuer: String,
    ttl: Duration,
    encoding_key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], issuer: impl Into<String>, ttl: Duration) -> Self {
        Self {
            issuer: issuer.into(),
            ttl,
            encoding_key: EncodingKey::from_secret(secret),
        }
    }

    pub fn mint(&self, subject: &str, role: Role) -> Result<String, AuthError> {
        let now = now_epoch_seconds();
        let claims = RoleClaims {
            iss: self.issuer.clone(),
            sub: subject.to_string(),
            role: role.as_str().to_string(),
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(token)
    }
}

fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs() as i64
}
