//! Ranked roles for authorization.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Closed set of roles, ordered by privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    ViewOnly,
    PatrolMember,
    PatrolComd,
    HqOps,
    SuperAdmin,
}

impl Role {
    /// Privilege rank, higher is more privileged.
    pub const fn rank(self) -> u8 {
        match self {
            Self::ViewOnly => 1,
            Self::PatrolMember => 2,
            Self::PatrolComd => 3,
            Self::HqOps => 4,
            Self::SuperAdmin => 5,
        }
    }

    /// True if this role is at least as privileged as `minimum`.
    pub const fn permits(self, minimum: Role) -> bool {
        self.rank() >= minimum.rank()
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ViewOnly => "view_only",
            Self::PatrolMember => "patrol_member",
            Self::PatrolComd => "patrol_comd",
            Self::HqOps => "hq_ops",
            Self::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view_only" => Ok(Self::ViewOnly),
            "patrol_member" => Ok(Self::PatrolMember),
            "patrol_comd" => Ok(Self::PatrolComd),
            "hq_ops" => Ok(Self::HqOps),
            "super_admin" => Ok(Self::SuperAdmin),
            other => Err(CoreError::UnknownRole(other.to_string())),
        }
    }
}

/// A verified caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub role: Role,
}

impl Identity {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }
}
