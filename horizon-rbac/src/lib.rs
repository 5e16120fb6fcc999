//! # Horizon RBAC
//!
//! Role-based access control for the Horizon school portal: who may see
//! which page, and the privileged operations that change a user's role or
//! account, kept consistent across two independent stores.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    horizon-rbac                      │
//! ├──────────────┬──────────────────┬────────────────────┤
//! │ AuthSession  │   RoleService    │  RepairScheduler   │
//! │ Resolver     │ (list, setRole,  │ (sweep, compact,   │
//! │ RouteGuard   │  create, delete, │  vacuum)           │
//! │              │  reconcile)      │                    │
//! ├──────────────┴────────┬─────────┴────────────────────┤
//! │    IdentityStore      │        ProfileStore          │
//! │ (credentials, claim)  │ (uid, email, name, role)     │
//! ├───────────────────────┴──────────────────────────────┤
//! │        memory backends  |  DeltaStore (delta-rs)     │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use horizon_rbac::{
//!     bootstrap_admin, Caller, CreateUserRequest, MemoryIdentityStore,
//!     MemoryProfileStore, Role, RoleService,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let identities = Arc::new(MemoryIdentityStore::default());
//!     let profiles = Arc::new(MemoryProfileStore::new());
//!     let admin = bootstrap_admin(identities.as_ref(), profiles.as_ref(),
//!         "root@school.test", "change-me", "Root").await?
//!         .expect("empty store");
//!
//!     let service = RoleService::new(identities, profiles);
//!     let caller = Caller::new(admin.uid, Some(Role::Admin));
//!     service.create_user(Some(&caller), CreateUserRequest::new(
//!         "ada@school.test", "secret1", "Ada", "teacher")).await?;
//!
//!     for user in service.list_users_with_role(Some(&caller)).await? {
//!         println!("{} {}", user.email, user.role);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Claim-first authorization**: only the identity's signed `role` claim
//!   admits a caller to privileged operations
//! - **Reconciliation**: partial failures are repaired toward the claim
//! - **Reactive guard**: route decisions follow the session view
//! - **Delta Lake backend** (`delta` feature): ACID tables `identities` and `users`

pub mod admin;
pub mod config;
pub mod error;
pub mod guard;
pub mod identity;
pub mod profile;
pub mod repair;
pub mod role;
pub mod session;

#[cfg(feature = "delta")]
pub mod schema;
#[cfg(feature = "delta")]
pub mod store;

// Re-exports for convenience
pub use admin::{
    bootstrap_admin, CreateUserRequest, MutationReply, ReconcileOutcome, RoleService,
    SetRoleRequest, SweepReport, UidRequest, UserSummary,
};
pub use config::PortalConfig;
pub use error::{ErrorKind, PortalError, Result};
pub use guard::{decide, Access, Decision, RouteGuard, RouteTable};
pub use identity::{
    Caller, IdentityRecord, IdentityStore, MemoryIdentityStore, NewIdentity, TokenIssuer,
};
pub use profile::{MemoryProfileStore, Profile, ProfileStore};
pub use repair::{RepairReport, RepairScheduler};
pub use role::Role;
pub use session::{AuthSession, ProfileResolver, ResolverHandle, ResolverState, SessionView, SignedInIdentity};

#[cfg(feature = "delta")]
pub use identity::DeltaIdentityStore;
#[cfg(feature = "delta")]
pub use profile::DeltaProfileStore;
#[cfg(feature = "delta")]
pub use store::DeltaStore;
