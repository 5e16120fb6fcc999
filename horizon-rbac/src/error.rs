//! Error types for horizon-rbac: Railway Programming
//!
//! All operations return `Result<T, PortalError>`.
//! No panics, no unwraps in production code paths.
//!
//! The first five variants are the caller-facing taxonomy. Everything the
//! [`RoleService`](crate::admin::RoleService) returns is one of those five;
//! the remaining variants come out of the stores and token layer and are
//! mapped at the service boundary.

use thiserror::Error;

/// Unified error type for all portal operations
#[derive(Error, Debug)]
pub enum PortalError {
    // ─── Caller-facing taxonomy ───

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    Internal(String),

    // ─── Identity / Profile Errors ───

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Email already registered: {0}")]
    EmailAlreadyExists(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Password too weak: {0}")]
    PasswordTooWeak(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Token invalid: {0}")]
    TokenInvalid(String),

    // ─── Infrastructure Errors ───

    #[error("Delta table error: {0}")]
    DeltaTable(String),

    #[error("Arrow error: {0}")]
    Arrow(String),

    #[error("DataFusion error: {0}")]
    DataFusion(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Actor unavailable: {0}")]
    ActorUnavailable(String),
}

/// The five error kinds a caller of the admin operations can observe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthenticated,
    PermissionDenied,
    InvalidArgument,
    AlreadyExists,
    Internal,
}

impl ErrorKind {
    /// Stable wire code, kebab-case
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::PermissionDenied => "permission-denied",
            Self::InvalidArgument => "invalid-argument",
            Self::AlreadyExists => "already-exists",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl PortalError {
    /// Classify any error into the caller-facing taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated(_)
            | Self::InvalidCredentials
            | Self::TokenExpired
            | Self::TokenInvalid(_) => ErrorKind::Unauthenticated,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::InvalidArgument(_) | Self::PasswordTooWeak(_) => ErrorKind::InvalidArgument,
            Self::AlreadyExists(_) | Self::EmailAlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::Internal(_)
            | Self::UserNotFound(_)
            | Self::DeltaTable(_)
            | Self::Arrow(_)
            | Self::DataFusion(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Config(_)
            | Self::ActorUnavailable(_) => ErrorKind::Internal,
        }
    }

    /// Collapse a store-level failure into its taxonomy variant.
    ///
    /// Taxonomy variants pass through untouched. Store details are dropped
    /// in favour of `message` for `Internal`, so callers see a short text.
    pub fn into_taxonomy(self, message: &str) -> PortalError {
        match self {
            Self::Unauthenticated(_)
            | Self::PermissionDenied(_)
            | Self::InvalidArgument(_)
            | Self::AlreadyExists(_)
            | Self::Internal(_) => self,
            Self::EmailAlreadyExists(_) => {
                Self::AlreadyExists("This email address is already in use.".into())
            }
            Self::PasswordTooWeak(reason) => Self::InvalidArgument(reason),
            other => match other.kind() {
                ErrorKind::Unauthenticated => Self::Unauthenticated(message.into()),
                _ => Self::Internal(message.into()),
            },
        }
    }
}

#[cfg(feature = "delta")]
impl From<deltalake::DeltaTableError> for PortalError {
    fn from(err: deltalake::DeltaTableError) -> Self {
        PortalError::DeltaTable(err.to_string())
    }
}

#[cfg(feature = "delta")]
impl From<deltalake::arrow::error::ArrowError> for PortalError {
    fn from(err: deltalake::arrow::error::ArrowError) -> Self {
        PortalError::Arrow(err.to_string())
    }
}

#[cfg(feature = "delta")]
impl From<deltalake::datafusion::error::DataFusionError> for PortalError {
    fn from(err: deltalake::datafusion::error::DataFusionError) -> Self {
        PortalError::DataFusion(err.to_string())
    }
}

#[cfg(feature = "delta")]
impl From<url::ParseError> for PortalError {
    fn from(err: url::ParseError) -> Self {
        PortalError::Config(format!("URL parse error: {err}"))
    }
}

impl From<serde_json::Error> for PortalError {
    fn from(err: serde_json::Error) -> Self {
        PortalError::Serialization(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for PortalError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => PortalError::TokenExpired,
            _ => PortalError::TokenInvalid(err.to_string()),
        }
    }
}

/// Result type alias for portal operations
pub type Result<T> = std::result::Result<T, PortalError>;
