//! Request and reply shapes of the admin operations

use serde::{Deserialize, Serialize};

use crate::role::Role;

/// One row of `list_users_with_role`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
}

/// Input of `set_role`. Fields default to empty so a missing field is
/// reported as an invalid argument rather than a decoding failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SetRoleRequest {
    pub uid: String,
    pub new_role: String,
}

impl SetRoleRequest {
    pub fn new(uid: impl Into<String>, new_role: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            new_role: new_role.into(),
        }
    }
}

/// Input of `create_user`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub role: String,
}

impl CreateUserRequest {
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        display_name: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            display_name: display_name.into(),
            role: role.into(),
        }
    }
}

/// Input of `delete_user` and `reconcile`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UidRequest {
    pub uid: String,
}

impl UidRequest {
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into() }
    }
}

/// Reply of every mutating operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationReply {
    pub message: String,
}

impl MutationReply {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// What a reconciliation pass did for one uid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReconcileOutcome {
    /// Claim and profile already agreed
    AlreadyConsistent,
    /// Identity had a claim but no profile
    ProfileCreated,
    /// Profile role differed from the claim and was overwritten
    RoleRealigned,
    /// Identity had no claim; `student` was written to both stores
    ClaimAssigned,
    /// Profile without identity was deleted
    OrphanProfileRemoved,
    /// Neither store knows the uid
    NothingToDo,
    /// Left untouched: the identity is still being created, or changed
    /// between the read and the write
    Deferred,
}

impl ReconcileOutcome {
    /// Whether the pass wrote to a store
    pub fn changed(&self) -> bool {
        !matches!(
            self,
            Self::AlreadyConsistent | Self::NothingToDo | Self::Deferred
        )
    }
}

impl std::fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AlreadyConsistent => "already consistent",
            Self::ProfileCreated => "profile created",
            Self::RoleRealigned => "role realigned",
            Self::ClaimAssigned => "claim assigned",
            Self::OrphanProfileRemoved => "orphan profile removed",
            Self::NothingToDo => "nothing to do",
            Self::Deferred => "deferred",
        };
        f.write_str(s)
    }
}
