//! Role mutation service, reconciliation and bootstrap

pub mod bootstrap;
pub mod service;
pub mod types;

pub use bootstrap::bootstrap_admin;
pub use service::{RoleService, SweepReport};
pub use types::{
    CreateUserRequest, MutationReply, ReconcileOutcome, SetRoleRequest, UidRequest, UserSummary,
};
