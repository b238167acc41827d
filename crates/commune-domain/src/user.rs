//! User domain types.

use serde::{Deserialize, Serialize};

/// User permission level.
///
/// Wire format: `u8` (0 = User, 1 = Admin, 2 = SuperAdmin). The `Ord`
/// impl orders by privilege. Role changes are *not* decided by this
/// ordering — see the elevation policy in the api service, which compares
/// hierarchy positions instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User = 0,
    Admin = 1,
    SuperAdmin = 2,
}

impl UserRole {
    /// Convert from `u8` wire value. Returns `None` for unknown values.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::User),
            1 => Some(Self::Admin),
            2 => Some(Self::SuperAdmin),
            _ => None,
        }
    }

    /// Convert to `u8` wire value.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse the role name as it appears in the Authorization prefix.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "User" => Some(Self::User),
            "Admin" => Some(Self::Admin),
            "SuperAdmin" => Some(Self::SuperAdmin),
            _ => None,
        }
    }

    /// Role name used as the Authorization scheme prefix.
    pub fn name(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Admin => "Admin",
            Self::SuperAdmin => "SuperAdmin",
        }
    }
}

impl PartialOrd for UserRole {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UserRole {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_u8().cmp(&other.as_u8())
    }
}

/// Account origin: password signup or OAuth provisioning.
///
/// Wire format: `u8` (0 = System, 1 = Google).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    System = 0,
    Google = 1,
}

impl Provider {
    /// Convert from `u8` wire value. Returns `None` for unknown values.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::System),
            1 => Some(Self::Google),
            _ => None,
        }
    }

    /// Convert to `u8` wire value.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_u8_to_user_role() {
        assert_eq!(UserRole::from_u8(0), Some(UserRole::User));
        assert_eq!(UserRole::from_u8(1), Some(UserRole::Admin));
        assert_eq!(UserRole::from_u8(2), Some(UserRole::SuperAdmin));
        assert_eq!(UserRole::from_u8(3), None);
    }

    #[test]
    fn should_convert_user_role_to_u8() {
        assert_eq!(UserRole::User.as_u8(), 0);
        assert_eq!(UserRole::Admin.as_u8(), 1);
        assert_eq!(UserRole::SuperAdmin.as_u8(), 2);
    }

    #[test]
    fn should_order_roles_by_privilege_level() {
        assert!(UserRole::User < UserRole::Admin);
        assert!(UserRole::Admin < UserRole::SuperAdmin);
        assert!(UserRole::User < UserRole::SuperAdmin);
    }

    #[test]
    fn should_round_trip_role_names() {
        for role in [UserRole::User, UserRole::Admin, UserRole::SuperAdmin] {
            assert_eq!(UserRole::from_name(role.name()), Some(role));
        }
        assert_eq!(UserRole::from_name("user"), None);
        assert_eq!(UserRole::from_name("Bearer"), None);
    }

    #[test]
    fn should_round_trip_user_role_via_serde() {
        for role in [UserRole::User, UserRole::Admin, UserRole::SuperAdmin] {
            let json = serde_json::to_string(&role).unwrap();
            let parsed: UserRole = serde_json::from_str(&json).unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn should_convert_u8_to_provider() {
        assert_eq!(Provider::from_u8(0), Some(Provider::System));
        assert_eq!(Provider::from_u8(1), Some(Provider::Google));
        assert_eq!(Provider::from_u8(2), None);
    }
}
