//! The fixed role enum

use crate::error::AuthError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a user within their church
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Visitor,
    Volunteer,
    Member,
    Leader,
    BranchAdmin,
    Pastor,
    Admin,
    SuperAdmin,
}

impl UserRole {
    pub const ALL: [UserRole; 8] = [
        UserRole::Visitor,
        UserRole::Volunteer,
        UserRole::Member,
        UserRole::Leader,
        UserRole::BranchAdmin,
        UserRole::Pastor,
        UserRole::Admin,
        UserRole::SuperAdmin,
    ];

    /// Roles that manage church-wide resources (invites, sessions, courses)
    pub const MANAGERS: [UserRole; 4] = [
        UserRole::Admin,
        UserRole::Pastor,
        UserRole::BranchAdmin,
        UserRole::SuperAdmin,
    ];

    /// Roles with authority over the whole church, regardless of branch
    pub const CHURCH_ADMINS: [UserRole; 3] =
        [UserRole::Admin, UserRole::Pastor, UserRole::SuperAdmin];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Visitor => "VISITOR",
            UserRole::Volunteer => "VOLUNTEER",
            UserRole::Member => "MEMBER",
            UserRole::Leader => "LEADER",
            UserRole::BranchAdmin => "BRANCH_ADMIN",
            UserRole::Pastor => "PASTOR",
            UserRole::Admin => "ADMIN",
            UserRole::SuperAdmin => "SUPER_ADMIN",
        }
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(self, UserRole::SuperAdmin)
    }

    pub fn is_manager(&self) -> bool {
        Self::MANAGERS.contains(self)
    }

    pub fn is_church_admin(&self) -> bool {
        Self::CHURCH_ADMINS.contains(self)
    }
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::Member
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace(['-', ' '], "_");
        UserRole::ALL
            .into_iter()
            .find(|role| role.as_str() == normalized)
            .ok_or_else(|| AuthError::UnknownRole {
                role: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing_is_case_insensitive() {
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!(
            "branch_admin".parse::<UserRole>().unwrap(),
            UserRole::BranchAdmin
        );
        assert_eq!(
            "Super-Admin".parse::<UserRole>().unwrap(),
            UserRole::SuperAdmin
        );
        assert!("bishop".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_role_serde_uses_screaming_case() {
        assert_eq!(
            serde_json::to_string(&UserRole::BranchAdmin).unwrap(),
            "\"BRANCH_ADMIN\""
        );
        let role: UserRole = serde_json::from_str("\"SUPER_ADMIN\"").unwrap();
        assert_eq!(role, UserRole::SuperAdmin);
    }

    #[test]
    fn test_role_groups() {
        assert!(UserRole::BranchAdmin.is_manager());
        assert!(!UserRole::BranchAdmin.is_church_admin());
        assert!(UserRole::Pastor.is_church_admin());
        assert!(!UserRole::Leader.is_manager());
    }
}
