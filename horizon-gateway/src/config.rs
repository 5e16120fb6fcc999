//! Gateway configuration, read from the environment

use std::path::PathBuf;

use horizon_rbac::PortalConfig;

use crate::error::GatewayError;

/// Which store backend serves the identity and profile data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Delta,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "delta" => Ok(Self::Delta),
            "memory" => Ok(Self::Memory),
            other => Err(GatewayError::Config(format!(
                "HORIZON_STORE must be 'delta' or 'memory', got '{other}'"
            ))),
        }
    }
}

/// Credentials of the admin created on first start
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub portal: PortalConfig,
    pub store: StoreBackend,
    pub port: u16,
    pub bootstrap: Option<BootstrapAdmin>,
}

impl GatewayConfig {
    /// Read `HORIZON_*` and `PORT` variables
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, GatewayError> {
        let data_dir = var("HORIZON_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));
        let mut portal = PortalConfig::new(data_dir);
        if let Some(secret) = var("HORIZON_JWT_SECRET") {
            portal = portal.with_jwt_secret(secret);
        }

        let store = match var("HORIZON_STORE") {
            Some(raw) => raw.parse()?,
            None => StoreBackend::Delta,
        };
        let port = match var("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| GatewayError::Config(format!("PORT is not a port number: '{raw}'")))?,
            None => 8080,
        };

        let bootstrap = match (
            var("HORIZON_BOOTSTRAP_ADMIN_EMAIL"),
            var("HORIZON_BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(BootstrapAdmin {
                email,
                password,
                display_name: var("HORIZON_BOOTSTRAP_ADMIN_NAME")
                    .unwrap_or_else(|| "Administrator".to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            portal,
            store,
            port,
            bootstrap,
        })
    }
}
