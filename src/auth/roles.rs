use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::auth::AuthError;

/// Privilege levels, ordered from least to most privileged.
///
/// Ordering always goes through [`Role::rank`]; the wire identifier is only
/// used at the token and storage boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    Teacher,
    Admin,
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Student, Role::Teacher, Role::Admin, Role::SuperAdmin];

    pub fn rank(&self) -> u8 {
        match self {
            Role::Student => 1,
            Role::Teacher => 2,
            Role::Admin => 3,
            Role::SuperAdmin => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Teacher => "TEACHER",
            Role::Admin => "ADMIN",
            Role::SuperAdmin => "SUPER_ADMIN",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Student => "Student",
            Role::Teacher => "Teacher",
            Role::Admin => "Administrator",
            Role::SuperAdmin => "Super administrator",
        }
    }

    /// The bootstrap role. Only provisioned out of band, never through
    /// self-registration.
    pub fn is_bootstrap(&self) -> bool {
        matches!(self, Role::SuperAdmin)
    }

    pub fn at_least(&self, required: Role) -> bool {
        self.rank() >= required.rank()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| AuthError::UnrecognizedRole(value.to_string()))
    }
}
