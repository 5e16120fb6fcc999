//! Role: the unit of authorization
//!
//! Closed set, no hierarchy: only `Admin` carries mutation rights.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PortalError;

/// Portal roles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    /// Assigned when nothing else is known about an identity
    #[default]
    Student,
}

impl Role {
    /// Every role, in display order
    pub const ALL: [Role; 3] = [Role::Student, Role::Teacher, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Teacher => "teacher",
            Self::Student => "student",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl FromStr for Role {
    type Err = PortalError;

    /// Exact, lowercase match. Anything else is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "teacher" => Ok(Self::Teacher),
            "student" => Ok(Self::Student),
            other => Err(PortalError::InvalidArgument(format!(
                "Unknown role '{other}'; expected one of admin, teacher, student."
            ))),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
