//! RoleService: privileged operations over the identity and profile stores
//!
//! Every operation takes the resolved [`Caller`] explicitly and runs the
//! admin precheck before touching a store. Errors returned from here are
//! always one of the five caller-facing kinds; store details are logged and
//! replaced by a short message.
//!
//! The two stores share no transaction. When a multi-step mutation fails
//! part-way, the target uid is reconciled (claim wins) before the
//! `Internal` error goes back to the caller.
//!
//! Mutations and reconciliation passes hold a write gate shared by every
//! clone, so a sweep never observes a creation or deletion half-done.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::{DEFAULT_CLAIM_GRACE_SECS, DEFAULT_LIST_USERS_LIMIT};
use crate::error::{PortalError, Result};
use crate::identity::{Caller, IdentityRecord, IdentityStore, NewIdentity};
use crate::profile::{Profile, ProfileStore};
use crate::role::Role;

use super::types::*;

const MSG_UNAUTHENTICATED: &str = "The function must be called while authenticated.";
const MSG_NOT_ADMIN: &str = "The function must be called by an admin.";

/// Totals of one repair sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: usize,
    pub repaired: usize,
    pub failed: usize,
}

/// The role mutation service
///
/// Cheap to clone; clones share the same stores and the same write gate.
#[derive(Clone)]
pub struct RoleService {
    identities: Arc<dyn IdentityStore>,
    profiles: Arc<dyn ProfileStore>,
    list_limit: usize,
    claim_grace: Duration,
    write_gate: Arc<Mutex<()>>,
}

impl RoleService {
    pub fn new(identities: Arc<dyn IdentityStore>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self {
            identities,
            profiles,
            list_limit: DEFAULT_LIST_USERS_LIMIT,
            claim_grace: Duration::from_secs(DEFAULT_CLAIM_GRACE_SECS),
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Override the identity page bound used by listing and sweeps
    pub fn with_list_limit(mut self, limit: usize) -> Self {
        self.list_limit = limit;
        self
    }

    /// Override how long sweeps leave a fresh claimless identity alone
    pub fn with_claim_grace(mut self, grace: Duration) -> Self {
        self.claim_grace = grace;
        self
    }

    pub fn identities(&self) -> &Arc<dyn IdentityStore> {
        &self.identities
    }

    pub fn profiles(&self) -> &Arc<dyn ProfileStore> {
        &self.profiles
    }

    fn ensure_admin<'a>(caller: Option<&'a Caller>, op: &str) -> Result<&'a Caller> {
        let caller = caller.ok_or_else(|| {
            warn!(op, "Rejected call without identity");
            PortalError::Unauthenticated(MSG_UNAUTHENTICATED.into())
        })?;
        if !caller.is_admin() {
            warn!(op, caller = %caller.uid, "Rejected call from non-admin");
            return Err(PortalError::PermissionDenied(MSG_NOT_ADMIN.into()));
        }
        Ok(caller)
    }

    // ─── Operations ───

    /// Every identity (up to the list limit) with its profile role.
    ///
    /// Profiles are fetched in one pass; an identity without a profile is
    /// reported as `student`.
    pub async fn list_users_with_role(&self, caller: Option<&Caller>) -> Result<Vec<UserSummary>> {
        Self::ensure_admin(caller, "list_users_with_role")?;
        const FAILED: &str = "An unexpected error occurred while listing users.";

        let identities = self
            .identities
            .list_identities(self.list_limit)
            .await
            .map_err(|e| {
                error!(error = %e, "Listing identities failed");
                e.into_taxonomy(FAILED)
            })?;
        let profiles: HashMap<String, Profile> = self
            .profiles
            .list_profiles()
            .await
            .map_err(|e| {
                error!(error = %e, "Listing profiles failed");
                e.into_taxonomy(FAILED)
            })?
            .into_iter()
            .map(|p| (p.uid.clone(), p))
            .collect();

        let users: Vec<UserSummary> = identities
            .into_iter()
            .map(|identity| {
                let role = profiles
                    .get(&identity.uid)
                    .map(|p| p.role)
                    .unwrap_or_default();
                UserSummary {
                    uid: identity.uid,
                    email: identity.email,
                    display_name: identity.display_name,
                    role,
                }
            })
            .collect();

        debug!(count = users.len(), "Listed users");
        Ok(users)
    }

    /// Write `new_role` to the claim, then to the profile
    pub async fn set_role(&self, caller: Option<&Caller>, req: SetRoleRequest) -> Result<MutationReply> {
        let caller = Self::ensure_admin(caller, "set_role")?;
        const FAILED: &str = "Failed to update user role.";

        let uid = req.uid.trim();
        let role = match req.new_role.parse::<Role>() {
            Ok(role) if !uid.is_empty() => role,
            _ => {
                return Err(PortalError::InvalidArgument(
                    "The function must be called with a 'uid' and a valid 'newRole'.".into(),
                ))
            }
        };
        if uid == caller.uid {
            warn!(caller = %caller.uid, "Rejected self role change");
            return Err(PortalError::PermissionDenied(
                "Admins cannot change their own role.".into(),
            ));
        }

        let _gate = self.write_gate.lock().await;
        if let Err(e) = self.identities.set_role_claim(uid, role).await {
            error!(uid, role = %role, error = %e, "Writing role claim failed");
            self.repair_after_failure(uid).await;
            return Err(e.into_taxonomy(FAILED));
        }
        if let Err(e) = self.profiles.update_role(uid, role).await {
            error!(uid, role = %role, error = %e, "Claim written but profile update failed");
            self.repair_after_failure(uid).await;
            return Err(e.into_taxonomy(FAILED));
        }

        info!(uid, role = %role, caller = %caller.uid, "Role updated");
        Ok(MutationReply::new(format!(
            "Successfully updated role for user {uid} to {role}."
        )))
    }

    /// Create identity, assign its claim, then write its profile
    pub async fn create_user(&self, caller: Option<&Caller>, req: CreateUserRequest) -> Result<MutationReply> {
        let caller = Self::ensure_admin(caller, "create_user")?;
        const FAILED: &str = "Failed to create new user.";

        if req.email.trim().is_empty()
            || req.password.is_empty()
            || req.display_name.trim().is_empty()
            || req.role.trim().is_empty()
        {
            return Err(PortalError::InvalidArgument(
                "Missing required fields: email, password, displayName, role.".into(),
            ));
        }
        let role: Role = req.role.parse()?;

        let _gate = self.write_gate.lock().await;
        let identity = self
            .identities
            .create_identity(NewIdentity {
                email: req.email.clone(),
                password: req.password,
                display_name: req.display_name.clone(),
            })
            .await
            .map_err(|e| {
                warn!(email = %req.email, error = %e, "Identity creation failed");
                e.into_taxonomy(FAILED)
            })?;
        let uid = identity.uid.as_str();

        if let Err(e) = self.identities.set_role_claim(uid, role).await {
            error!(uid, role = %role, error = %e, "Identity created but claim write failed");
            self.repair_after_failure(uid).await;
            return Err(e.into_taxonomy(FAILED));
        }

        let profile = Profile {
            uid: identity.uid.clone(),
            email: identity.email.clone(),
            display_name: req.display_name.clone(),
            role,
        };
        if let Err(e) = self.profiles.put_profile(&profile).await {
            error!(uid, role = %role, error = %e, "Identity created but profile write failed");
            self.repair_after_failure(uid).await;
            return Err(e.into_taxonomy(FAILED));
        }

        info!(uid, role = %role, caller = %caller.uid, "User created");
        Ok(MutationReply::new(format!(
            "Successfully created user: {}",
            req.display_name
        )))
    }

    /// Remove the identity, then the profile. The caller cannot delete itself.
    pub async fn delete_user(&self, caller: Option<&Caller>, req: UidRequest) -> Result<MutationReply> {
        let caller = Self::ensure_admin(caller, "delete_user")?;
        const FAILED: &str = "Failed to delete user.";

        let uid = req.uid.trim();
        if uid.is_empty() {
            return Err(PortalError::InvalidArgument("The 'uid' is required.".into()));
        }
        if uid == caller.uid {
            warn!(caller = %caller.uid, "Rejected self deletion");
            return Err(PortalError::PermissionDenied(
                "Admins cannot delete their own account.".into(),
            ));
        }

        let _gate = self.write_gate.lock().await;
        if let Err(e) = self.identities.delete_identity(uid).await {
            error!(uid, error = %e, "Deleting identity failed");
            self.repair_after_failure(uid).await;
            return Err(e.into_taxonomy(FAILED));
        }
        if let Err(e) = self.profiles.delete_profile(uid).await {
            error!(uid, error = %e, "Identity deleted but profile delete failed");
            self.repair_after_failure(uid).await;
            return Err(e.into_taxonomy(FAILED));
        }

        info!(uid, caller = %caller.uid, "User deleted");
        Ok(MutationReply::new("Successfully deleted user."))
    }

    /// Admin entry point to [`reconcile_uid`](Self::reconcile_uid)
    pub async fn reconcile(&self, caller: Option<&Caller>, req: UidRequest) -> Result<ReconcileOutcome> {
        let caller = Self::ensure_admin(caller, "reconcile")?;
        let uid = req.uid.trim();
        if uid.is_empty() {
            return Err(PortalError::InvalidArgument("The 'uid' is required.".into()));
        }

        let outcome = self.reconcile_uid(uid).await.map_err(|e| {
            error!(uid, error = %e, "Reconciliation failed");
            e.into_taxonomy("Failed to reconcile user.")
        })?;
        info!(uid, %outcome, caller = %caller.uid, "User reconciled");
        Ok(outcome)
    }

    // ─── Reconciliation ───

    /// Make both stores agree for `uid`, taking the identity's claim as truth.
    ///
    /// - no identity: a leftover profile is deleted
    /// - claim present: the profile is created or its role overwritten
    /// - no claim: `student` is written to the claim and the profile
    pub async fn reconcile_uid(&self, uid: &str) -> Result<ReconcileOutcome> {
        let _gate = self.write_gate.lock().await;
        self.reconcile_gated(uid, None).await
    }

    /// Reconciliation body; the caller holds the write gate.
    ///
    /// With `grace`, a claimless identity younger than `grace` is deferred.
    /// The identity is read again right before every write, and the pass is
    /// deferred if it changed since the decision was made.
    async fn reconcile_gated(&self, uid: &str, grace: Option<Duration>) -> Result<ReconcileOutcome> {
        let identity = self.identities.get_identity(uid).await?;
        let profile = self.profiles.get_profile(uid).await?;

        let Some(identity) = identity else {
            return match profile {
                Some(_) => {
                    if self.identities.get_identity(uid).await?.is_some() {
                        return Ok(ReconcileOutcome::Deferred);
                    }
                    self.profiles.delete_profile(uid).await?;
                    Ok(ReconcileOutcome::OrphanProfileRemoved)
                }
                None => Ok(ReconcileOutcome::NothingToDo),
            };
        };

        let (role, outcome) = match (identity.role_claim, &profile) {
            (Some(claim), Some(p)) if p.role == claim => {
                return Ok(ReconcileOutcome::AlreadyConsistent)
            }
            (Some(claim), Some(_)) => (claim, ReconcileOutcome::RoleRealigned),
            (Some(claim), None) => (claim, ReconcileOutcome::ProfileCreated),
            (None, _) => {
                if grace.is_some_and(|grace| created_within(&identity, grace)) {
                    debug!(uid, "Claimless identity inside grace period, deferred");
                    return Ok(ReconcileOutcome::Deferred);
                }
                if !self.claim_unchanged(uid, None).await? {
                    return Ok(ReconcileOutcome::Deferred);
                }
                self.identities.set_role_claim(uid, Role::Student).await?;
                (Role::Student, ReconcileOutcome::ClaimAssigned)
            }
        };

        if !self.claim_unchanged(uid, Some(role)).await? {
            return Ok(ReconcileOutcome::Deferred);
        }
        let profile = match profile {
            Some(p) => Profile { role, ..p },
            None => Profile {
                uid: identity.uid,
                email: identity.email,
                display_name: identity.display_name,
                role,
            },
        };
        self.profiles.put_profile(&profile).await?;

        debug!(uid, role = %role, %outcome, "Reconciled");
        Ok(outcome)
    }

    /// Whether `uid` still exists with claim `expected`
    async fn claim_unchanged(&self, uid: &str, expected: Option<Role>) -> Result<bool> {
        let current = self.identities.get_identity(uid).await?;
        let unchanged = matches!(&current, Some(i) if i.role_claim == expected);
        if !unchanged {
            warn!(uid, ?expected, "Identity changed during reconciliation");
        }
        Ok(unchanged)
    }

    async fn repair_after_failure(&self, uid: &str) {
        match self.reconcile_gated(uid, None).await {
            Ok(outcome) => warn!(uid, %outcome, "Reconciled after partial failure"),
            Err(e) => error!(uid, error = %e, "Reconciliation after partial failure failed"),
        }
    }

    /// Reconcile every known uid: identities up to the list limit plus
    /// every profile. Individual failures are counted, not propagated.
    ///
    /// The write gate is taken per uid, so mutations interleave between
    /// uids but never inside one.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let mut uids: BTreeSet<String> = self
            .identities
            .list_identities(self.list_limit)
            .await?
            .into_iter()
            .map(|i| i.uid)
            .collect();
        uids.extend(self.profiles.list_profiles().await?.into_iter().map(|p| p.uid));

        let mut report = SweepReport::default();
        for uid in &uids {
            report.checked += 1;
            let result = {
                let _gate = self.write_gate.lock().await;
                self.reconcile_gated(uid, Some(self.claim_grace)).await
            };
            match result {
                Ok(outcome) if outcome.changed() => {
                    report.repaired += 1;
                    info!(uid = %uid, %outcome, "Repaired");
                }
                Ok(_) => {}
                Err(e) => {
                    report.failed += 1;
                    error!(uid = %uid, error = %e, "Repair failed");
                }
            }
        }
        Ok(report)
    }
}

fn created_within(identity: &IdentityRecord, grace: Duration) -> bool {
    let Ok(created) = DateTime::parse_from_rfc3339(&identity.created_at) else {
        return false;
    };
    let age = Utc::now().signed_duration_since(created.with_timezone(&Utc));
    age.to_std().map_or(true, |age| age < grace)
}
