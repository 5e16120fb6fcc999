//! Configuration for the Horizon access layer

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound on identities returned by one listing call
pub const DEFAULT_LIST_USERS_LIMIT: usize = 1000;

/// Age below which the repair sweep leaves a claimless identity alone
pub const DEFAULT_CLAIM_GRACE_SECS: u64 = 300;

/// Portal access configuration
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Root path for the Delta tables (`identities/`, `users/`)
    pub base_path: PathBuf,

    /// Secret used to sign identity tokens
    pub jwt_secret: String,

    /// Lifetime of an issued identity token, in hours
    pub token_expiry_hours: u32,

    /// Maximum identities fetched by `list_users_with_role`
    pub list_users_limit: usize,

    /// Interval between two repair sweeps
    pub repair_interval_secs: u64,

    /// Claimless identities younger than this are skipped by sweeps,
    /// as a creation may still be assigning their claim
    pub claim_grace_secs: u64,

    /// Vacuum retention in hours (default: 168 = 7 days)
    pub vacuum_retention_hours: u64,

    /// Minimum password length accepted by the identity store
    pub min_password_len: usize,
}

impl PortalConfig {
    /// Create config with sensible defaults
    ///
    /// # Arguments
    /// * `base_path` - Root directory for Delta tables.
    ///   Structure created:
    ///   ```text
    ///   base_path/
    ///   ├── identities/      (credentials + role claim)
    ///   └── users/           (profile mirror)
    ///   ```
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            jwt_secret: std::env::var("HORIZON_JWT_SECRET")
                .unwrap_or_else(|_| "horizon-portal-default-secret-change-me".to_string()),
            token_expiry_hours: 1,
            list_users_limit: DEFAULT_LIST_USERS_LIMIT,
            repair_interval_secs: 3600,
            claim_grace_secs: DEFAULT_CLAIM_GRACE_SECS,
            vacuum_retention_hours: 168,
            min_password_len: 6,
        }
    }

    /// Override JWT secret
    pub fn with_jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.jwt_secret = secret.into();
        self
    }

    /// Override token lifetime
    pub fn with_token_expiry_hours(mut self, hours: u32) -> Self {
        self.token_expiry_hours = hours;
        self
    }

    /// Override the listing bound
    pub fn with_list_users_limit(mut self, limit: usize) -> Self {
        self.list_users_limit = limit;
        self
    }

    /// Override repair sweep interval
    pub fn with_repair_interval_secs(mut self, secs: u64) -> Self {
        self.repair_interval_secs = secs;
        self
    }

    /// Override the sweep grace period for claimless identities
    pub fn with_claim_grace_secs(mut self, secs: u64) -> Self {
        self.claim_grace_secs = secs;
        self
    }

    /// Override vacuum retention
    pub fn with_vacuum_retention_hours(mut self, hours: u64) -> Self {
        self.vacuum_retention_hours = hours;
        self
    }

    /// Override minimum password length
    pub fn with_min_password_len(mut self, len: usize) -> Self {
        self.min_password_len = len;
        self
    }

    pub fn repair_interval(&self) -> Duration {
        Duration::from_secs(self.repair_interval_secs)
    }

    pub fn claim_grace(&self) -> Duration {
        Duration::from_secs(self.claim_grace_secs)
    }

    /// Get path for a specific table
    pub fn table_path(&self, table_name: &str) -> PathBuf {
        self.base_path.join(table_name)
    }

    /// Get table URI (string) for delta-rs
    pub fn table_uri(&self, table_name: &str) -> String {
        self.table_path(table_name).to_string_lossy().to_string()
    }
}
