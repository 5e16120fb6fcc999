//! Store wrappers for integration tests: call counting, failure injection, latency
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use horizon_rbac::{
    bootstrap_admin, Caller, IdentityRecord, IdentityStore, MemoryIdentityStore,
    MemoryProfileStore, NewIdentity, PortalError, Profile, ProfileStore, Result, Role,
    RoleService,
};

fn injected() -> PortalError {
    PortalError::DeltaTable("injected failure".into())
}

#[derive(Default)]
pub struct TestIdentities {
    pub inner: MemoryIdentityStore,
    pub calls: AtomicUsize,
    pub fail_set_claim: AtomicBool,
    pub fail_delete: AtomicBool,
    /// Latency for `set_role_claim`
    pub claim_delay: Mutex<Option<Duration>>,
}

impl TestIdentities {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdentityStore for TestIdentities {
    async fn create_identity(&self, new: NewIdentity) -> Result<IdentityRecord> {
        self.hit();
        self.inner.create_identity(new).await
    }

    async fn set_role_claim(&self, uid: &str, role: Role) -> Result<()> {
        self.hit();
        let delay = *self.claim_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_set_claim.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.set_role_claim(uid, role).await
    }

    async fn get_identity(&self, uid: &str) -> Result<Option<IdentityRecord>> {
        self.hit();
        self.inner.get_identity(uid).await
    }

    async fn list_identities(&self, max_results: usize) -> Result<Vec<IdentityRecord>> {
        self.hit();
        self.inner.list_identities(max_results).await
    }

    async fn delete_identity(&self, uid: &str) -> Result<()> {
        self.hit();
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.delete_identity(uid).await
    }

    async fn verify_password(&self, email: &str, password: &str) -> Result<IdentityRecord> {
        self.hit();
        self.inner.verify_password(email, password).await
    }
}

#[derive(Default)]
pub struct TestProfiles {
    pub inner: MemoryProfileStore,
    pub calls: AtomicUsize,
    pub fail_put: AtomicBool,
    pub fail_update_role: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_get: AtomicBool,
    /// Per-uid latency for `get_profile`
    pub get_delays: Mutex<HashMap<String, Duration>>,
}

impl TestProfiles {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn delay_get(&self, uid: &str, delay: Duration) {
        self.get_delays.lock().insert(uid.to_string(), delay);
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProfileStore for TestProfiles {
    async fn get_profile(&self, uid: &str) -> Result<Option<Profile>> {
        self.hit();
        let delay = self.get_delays.lock().get(uid).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.get_profile(uid).await
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        self.hit();
        self.inner.list_profiles().await
    }

    async fn put_profile(&self, profile: &Profile) -> Result<()> {
        self.hit();
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.put_profile(profile).await
    }

    async fn update_role(&self, uid: &str, role: Role) -> Result<()> {
        self.hit();
        if self.fail_update_role.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.update_role(uid, role).await
    }

    async fn delete_profile(&self, uid: &str) -> Result<()> {
        self.hit();
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.delete_profile(uid).await
    }
}

pub struct Harness {
    pub identities: Arc<TestIdentities>,
    pub profiles: Arc<TestProfiles>,
    pub service: RoleService,
    pub admin: Caller,
}

impl Harness {
    /// Total store calls since the harness was built
    pub fn store_calls(&self) -> usize {
        self.identities.calls() + self.profiles.calls()
    }

    /// Create a user through the service and return its uid
    pub async fn seed_user(&self, email: &str, role: &str) -> String {
        self.service
            .create_user(
                Some(&self.admin),
                horizon_rbac::CreateUserRequest::new(email, "password1", email, role),
            )
            .await
            .unwrap();
        self.service
            .list_users_with_role(Some(&self.admin))
            .await
            .unwrap()
            .into_iter()
            .find(|u| u.email == email)
            .map(|u| u.uid)
            .unwrap()
    }

    /// Role claim and profile role of `uid`
    pub async fn roles_of(&self, uid: &str) -> (Option<Role>, Option<Role>) {
        let claim = self
            .identities
            .inner
            .get_identity(uid)
            .await
            .unwrap()
            .and_then(|i| i.role_claim);
        let profile = self.profiles.inner.get_profile(uid).await.unwrap().map(|p| p.role);
        (claim, profile)
    }
}

/// Stores with a bootstrapped admin; call counters start at zero
pub async fn harness() -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("horizon_rbac=debug")
        .with_test_writer()
        .try_init();

    let identities = Arc::new(TestIdentities::default());
    let profiles = Arc::new(TestProfiles::default());
    let admin = bootstrap_admin(
        &identities.inner,
        &profiles.inner,
        "admin@school.test",
        "admin-pass",
        "Admin",
    )
    .await
    .unwrap()
    .unwrap();

    let service = RoleService::new(identities.clone(), profiles.clone());
    Harness {
        identities,
        profiles,
        service,
        admin: Caller::new(admin.uid, Some(Role::Admin)),
    }
}
