//! Role hierarchy and the access check used on every request path.
//!
//! Roles form a total order `super_admin > admin > operator > viewer`.
//! They gate operations only; they never filter business data, which is
//! always scoped by tenant instead.

use serde::{Deserialize, Serialize};

pub const ROLE_SUPER_ADMIN: &str = "super_admin";
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_OPERATOR: &str = "operator";
pub const ROLE_VIEWER: &str = "viewer";

/// A caller's access level.
///
/// The derived `Ord` follows declaration order, so `Viewer < Operator <
/// Admin < SuperAdmin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Viewer,
    Operator,
    Admin,
    SuperAdmin,
}

/// Outcome of [`authorize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Role {
    /// All roles from lowest to highest.
    pub const ALL: [Role; 4] = [Role::Viewer, Role::Operator, Role::Admin, Role::SuperAdmin];

    /// Numeric level: `super_admin=4, admin=3, operator=2, viewer=1`.
    pub fn level(self) -> u8 {
        match self {
            Self::Viewer => 1,
            Self::Operator => 2,
            Self::Admin => 3,
            Self::SuperAdmin => 4,
        }
    }

    /// Parse a stored role name. Unknown names map to the lowest role.
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            ROLE_SUPER_ADMIN => Self::SuperAdmin,
            ROLE_ADMIN => Self::Admin,
            ROLE_OPERATOR => Self::Operator,
            _ => Self::Viewer,
        }
    }

    /// Parse an optional role name. A missing role is treated as `viewer`.
    pub fn from_optional(name: Option<&str>) -> Self {
        name.map(Self::from_name).unwrap_or(Self::Viewer)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Viewer => ROLE_VIEWER,
            Self::Operator => ROLE_OPERATOR,
            Self::Admin => ROLE_ADMIN,
            Self::SuperAdmin => ROLE_SUPER_ADMIN,
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::Viewer
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Allow iff the caller's level is at least the required level.
pub fn authorize(caller: Role, min: Role) -> Decision {
    if caller.level() >= min.level() {
        Decision::Allow
    } else {
        Decision::Deny
    }
}
