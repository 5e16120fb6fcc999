//! Identity tokens: HS256 JWTs carrying the `role` custom claim

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::config::PortalConfig;
use crate::error::Result;

use super::types::{Caller, IdentityRecord, RoleClaims};

/// Signs and verifies identity tokens
#[derive(Clone)]
pub struct TokenIssuer {
    secret: String,
    expiry_hours: i64,
}

impl TokenIssuer {
    pub fn new(secret: impl Into<String>, expiry_hours: u32) -> Self {
        Self {
            secret: secret.into(),
            expiry_hours: i64::from(expiry_hours),
        }
    }

    pub fn from_config(config: &PortalConfig) -> Self {
        Self::new(config.jwt_secret.clone(), config.token_expiry_hours)
    }

    /// Issue a token asserting the identity's current claim
    pub fn issue(&self, identity: &IdentityRecord) -> Result<String> {
        let now = Utc::now();
        let claims = RoleClaims {
            sub: identity.uid.clone(),
            email: identity.email.clone(),
            name: identity.display_name.clone(),
            role: identity.role_claim.map(|r| r.as_str().to_string()),
            exp: (now + Duration::hours(self.expiry_hours)).timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;
        Ok(token)
    }

    /// Decode and validate signature + expiry
    pub fn verify(&self, token: &str) -> Result<RoleClaims> {
        let data = decode::<RoleClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(data.claims)
    }

    /// Resolve a bearer token into a caller; any failure means "no caller"
    pub fn caller_from_token(&self, token: &str) -> Option<Caller> {
        self.verify(token).ok().map(|c| Caller::from_claims(&c))
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("expiry_hours", &self.expiry_hours)
            .finish_non_exhaustive()
    }
}
