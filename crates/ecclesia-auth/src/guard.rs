//! Per-route access requirements

use crate::error::AuthError;
use crate::roles::UserRole;
use crate::AuthResult;

/// What a route demands of the caller
///
/// An empty `allowed_roles` admits any authenticated user. `SUPER_ADMIN` is
/// not implied; list it when it should pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardOptions {
    /// Resolve a current church and fail when none is selected
    pub require_church: bool,
    pub allowed_roles: Vec<UserRole>,
}

impl GuardOptions {
    /// Any signed-in user, no church needed
    pub fn authenticated() -> Self {
        Self::default()
    }

    /// Any signed-in user with a current church
    pub fn church() -> Self {
        Self {
            require_church: true,
            allowed_roles: Vec::new(),
        }
    }

    pub fn require_church(mut self) -> Self {
        self.require_church = true;
        self
    }

    pub fn roles<I>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = UserRole>,
    {
        self.allowed_roles.extend(roles);
        self
    }

    /// Shorthand for `church().roles(UserRole::MANAGERS)`
    pub fn managers() -> Self {
        Self::church().roles(UserRole::MANAGERS)
    }

    /// Platform-level routes
    pub fn super_admin() -> Self {
        Self::authenticated().roles([UserRole::SuperAdmin])
    }

    pub fn check_role(&self, role: UserRole) -> AuthResult<()> {
        if self.allowed_roles.is_empty() || self.allowed_roles.contains(&role) {
            Ok(())
        } else {
            Err(AuthError::InsufficientPermissions)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_roles_admit_everyone() {
        let options = GuardOptions::church();
        assert!(options.require_church);
        for role in UserRole::ALL {
            assert!(options.check_role(role).is_ok());
        }
    }

    #[test]
    fn test_role_restriction() {
        let options = GuardOptions::church().roles([UserRole::Admin, UserRole::Pastor]);
        assert!(options.check_role(UserRole::Pastor).is_ok());
        assert_eq!(
            options.check_role(UserRole::SuperAdmin),
            Err(AuthError::InsufficientPermissions)
        );
    }

    #[test]
    fn test_presets() {
        assert!(GuardOptions::managers().check_role(UserRole::BranchAdmin).is_ok());
        assert!(GuardOptions::managers().check_role(UserRole::Leader).is_err());
        assert!(!GuardOptions::super_admin().require_church);
        assert!(GuardOptions::super_admin().check_role(UserRole::Admin).is_err());
    }
}
