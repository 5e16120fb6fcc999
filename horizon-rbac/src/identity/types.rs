//! Identity domain types: IdentityRecord, NewIdentity, RoleClaims, Caller

use serde::{Deserialize, Serialize};

use crate::role::Role;

/// Identity record as held by the identity store.
///
/// The password hash never leaves the store; `role_claim` is the signed
/// custom claim and the only input to authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub role_claim: Option<Role>,
    pub created_at: String,
}

/// Input for creating an identity
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

/// JWT claims embedded in every issued identity token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleClaims {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    /// Custom claim; absent until an admin assigns a role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub exp: usize,
    pub iat: usize,
}

/// Resolved identity of whoever invokes a privileged operation.
///
/// Built from a verified token and handed explicitly to every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub uid: String,
    pub role: Option<Role>,
}

impl Caller {
    pub fn new(uid: impl Into<String>, role: Option<Role>) -> Self {
        Self {
            uid: uid.into(),
            role,
        }
    }

    /// Unknown role strings in a token do not grant anything
    pub fn from_claims(claims: &RoleClaims) -> Self {
        Self {
            uid: claims.sub.clone(),
            role: claims.role.as_deref().and_then(|r| r.parse().ok()),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.map(|r| r.is_admin()).unwrap_or(false)
    }
}
