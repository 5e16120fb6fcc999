//! ProfileStore: the queryable mirror of each user's display data and role

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PortalError, Result};
use crate::role::Role;

/// One document of the `users` collection, keyed by `uid`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, uid: &str) -> Result<Option<Profile>>;

    /// The whole collection in one pass
    async fn list_profiles(&self) -> Result<Vec<Profile>>;

    /// Create or overwrite the document for `profile.uid`
    async fn put_profile(&self, profile: &Profile) -> Result<()>;

    /// Change only the `role` field. Fails `UserNotFound` when no document exists.
    async fn update_role(&self, uid: &str, role: Role) -> Result<()>;

    /// Remove the document; removing a missing document is not an error
    async fn delete_profile(&self, uid: &str) -> Result<()>;
}

/// In-process profile store
#[derive(Default)]
pub struct MemoryProfileStore {
    docs: RwLock<BTreeMap<String, Profile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get_profile(&self, uid: &str) -> Result<Option<Profile>> {
        Ok(self.docs.read().get(uid).cloned())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        Ok(self.docs.read().values().cloned().collect())
    }

    async fn put_profile(&self, profile: &Profile) -> Result<()> {
        self.docs
            .write()
            .insert(profile.uid.clone(), profile.clone());
        debug!(uid = %profile.uid, role = %profile.role, "Profile written");
        Ok(())
    }

    async fn update_role(&self, uid: &str, role: Role) -> Result<()> {
        let mut docs = self.docs.write();
        let doc = docs
            .get_mut(uid)
            .ok_or_else(|| PortalError::UserNotFound(uid.to_string()))?;
        doc.role = role;
        Ok(())
    }

    async fn delete_profile(&self, uid: &str) -> Result<()> {
        self.docs.write().remove(uid);
        Ok(())
    }
}
