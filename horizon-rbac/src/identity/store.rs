//! IdentityStore: the seam to the authentication provider
//!
//! The provider owns credentials and the `role` claim. It offers no query
//! across claims, which is why a separate profile mirror exists.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{PortalError, Result};
use crate::role::Role;

use super::password;
use super::types::{IdentityRecord, NewIdentity};

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Create an identity with no role claim.
    ///
    /// Fails `EmailAlreadyExists` on a registered email, `PasswordTooWeak`
    /// before anything is written.
    async fn create_identity(&self, new: NewIdentity) -> Result<IdentityRecord>;

    /// Overwrite the `role` claim. Fails `UserNotFound`.
    async fn set_role_claim(&self, uid: &str, role: Role) -> Result<()>;

    async fn get_identity(&self, uid: &str) -> Result<Option<IdentityRecord>>;

    /// One page of identities, oldest first, at most `max_results`
    async fn list_identities(&self, max_results: usize) -> Result<Vec<IdentityRecord>>;

    /// Permanently remove the identity. Fails `UserNotFound`.
    async fn delete_identity(&self, uid: &str) -> Result<()>;

    /// Check credentials. Fails `InvalidCredentials` on unknown email or bad password.
    async fn verify_password(&self, email: &str, password: &str) -> Result<IdentityRecord>;
}

struct StoredIdentity {
    record: IdentityRecord,
    password_hash: String,
    seq: u64,
}

/// In-process identity store
pub struct MemoryIdentityStore {
    min_password_len: usize,
    inner: RwLock<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    by_uid: HashMap<String, StoredIdentity>,
    next_seq: u64,
}

impl MemoryIdentityStore {
    pub fn new(min_password_len: usize) -> Self {
        Self {
            min_password_len,
            inner: RwLock::new(MemoryInner::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_uid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryIdentityStore {
    fn default() -> Self {
        Self::new(6)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn create_identity(&self, new: NewIdentity) -> Result<IdentityRecord> {
        password::check_strength(&new.password, self.min_password_len)?;
        let email = normalize_email(&new.email);
        let password_hash = password::hash(&new.password)?;

        let mut inner = self.inner.write();
        if inner.by_uid.values().any(|s| s.record.email == email) {
            return Err(PortalError::EmailAlreadyExists(email));
        }

        let record = IdentityRecord {
            uid: Uuid::new_v4().simple().to_string(),
            email,
            display_name: new.display_name,
            role_claim: None,
            created_at: Utc::now().to_rfc3339(),
        };
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.by_uid.insert(
            record.uid.clone(),
            StoredIdentity {
                record: record.clone(),
                password_hash,
                seq,
            },
        );
        info!(uid = %record.uid, "Identity created");
        Ok(record)
    }

    async fn set_role_claim(&self, uid: &str, role: Role) -> Result<()> {
        let mut inner = self.inner.write();
        let stored = inner
            .by_uid
            .get_mut(uid)
            .ok_or_else(|| PortalError::UserNotFound(uid.to_string()))?;
        stored.record.role_claim = Some(role);
        debug!(uid, role = %role, "Role claim set");
        Ok(())
    }

    async fn get_identity(&self, uid: &str) -> Result<Option<IdentityRecord>> {
        Ok(self.inner.read().by_uid.get(uid).map(|s| s.record.clone()))
    }

    async fn list_identities(&self, max_results: usize) -> Result<Vec<IdentityRecord>> {
        let inner = self.inner.read();
        let mut stored: Vec<&StoredIdentity> = inner.by_uid.values().collect();
        stored.sort_by_key(|s| s.seq);
        Ok(stored
            .into_iter()
            .take(max_results)
            .map(|s| s.record.clone())
            .collect())
    }

    async fn delete_identity(&self, uid: &str) -> Result<()> {
        if self.inner.write().by_uid.remove(uid).is_none() {
            return Err(PortalError::UserNotFound(uid.to_string()));
        }
        info!(uid, "Identity deleted");
        Ok(())
    }

    async fn verify_password(&self, email: &str, password: &str) -> Result<IdentityRecord> {
        let email = normalize_email(email);
        let (record, hash) = {
            let inner = self.inner.read();
            let stored = inner
                .by_uid
                .values()
                .find(|s| s.record.email == email)
                .ok_or(PortalError::InvalidCredentials)?;
            (stored.record.clone(), stored.password_hash.clone())
        };
        password::verify(password, &hash)?;
        Ok(record)
    }
}
