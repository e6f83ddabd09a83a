//! Role-based permissions
//!
//! Permissions are a static function of the role; there are no per-user
//! grants.

use crate::error::AuthError;
use crate::roles::UserRole;
use crate::AuthResult;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewUsers,
    EditUsers,
    DeleteUsers,
    ManageRoles,
    ViewPayroll,
    ManagePayroll,
    ViewAnalytics,
    ManageChurchSettings,
    ManageSubscription,
    ManageDepartments,
    ManageGroups,
    ManageSermons,
    ManageEvents,
    ManageGiving,
    SendBroadcasts,
    ApproveTestimonies,
    ManageVolunteers,
}

use Permission::*;

const ALL_PERMISSIONS: &[Permission] = &[
    ViewUsers,
    EditUsers,
    DeleteUsers,
    ManageRoles,
    ViewPayroll,
    ManagePayroll,
    ViewAnalytics,
    ManageChurchSettings,
    ManageSubscription,
    ManageDepartments,
    ManageGroups,
    ManageSermons,
    ManageEvents,
    ManageGiving,
    SendBroadcasts,
    ApproveTestimonies,
    ManageVolunteers,
];

const VOLUNTEER_PERMISSIONS: &[Permission] = &[ViewUsers];

const LEADER_PERMISSIONS: &[Permission] = &[
    ViewUsers,
    EditUsers,
    ManageGroups,
    ManageVolunteers,
    ViewAnalytics,
];

const BRANCH_ADMIN_PERMISSIONS: &[Permission] = &[
    ViewUsers,
    EditUsers,
    ViewPayroll,
    ViewAnalytics,
    ManageDepartments,
    ManageGroups,
    ManageSermons,
    ManageEvents,
    ManageGiving,
    SendBroadcasts,
    ApproveTestimonies,
    ManageVolunteers,
];

const PASTOR_PERMISSIONS: &[Permission] = &[
    ViewUsers,
    EditUsers,
    ManageRoles,
    ViewPayroll,
    ManagePayroll,
    ViewAnalytics,
    ManageChurchSettings,
    ManageDepartments,
    ManageGroups,
    ManageSermons,
    ManageEvents,
    ManageGiving,
    SendBroadcasts,
    ApproveTestimonies,
    ManageVolunteers,
];

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewUsers => "view_users",
            EditUsers => "edit_users",
            DeleteUsers => "delete_users",
            ManageRoles => "manage_roles",
            ViewPayroll => "view_payroll",
            ManagePayroll => "manage_payroll",
            ViewAnalytics => "view_analytics",
            ManageChurchSettings => "manage_church_settings",
            ManageSubscription => "manage_subscription",
            ManageDepartments => "manage_departments",
            ManageGroups => "manage_groups",
            ManageSermons => "manage_sermons",
            ManageEvents => "manage_events",
            ManageGiving => "manage_giving",
            SendBroadcasts => "send_broadcasts",
            ApproveTestimonies => "approve_testimonies",
            ManageVolunteers => "manage_volunteers",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All permissions granted to a role
pub fn role_permissions(role: UserRole) -> &'static [Permission] {
    match role {
        UserRole::Visitor | UserRole::Member => &[],
        UserRole::Volunteer => VOLUNTEER_PERMISSIONS,
        UserRole::Leader => LEADER_PERMISSIONS,
        UserRole::BranchAdmin => BRANCH_ADMIN_PERMISSIONS,
        UserRole::Pastor => PASTOR_PERMISSIONS,
        UserRole::Admin | UserRole::SuperAdmin => ALL_PERMISSIONS,
    }
}

pub fn has_permission(role: UserRole, permission: Permission) -> bool {
    role_permissions(role).contains(&permission)
}

pub fn has_any_permission(role: UserRole, permissions: &[Permission]) -> bool {
    permissions.iter().any(|p| has_permission(role, *p))
}

pub fn has_all_permissions(role: UserRole, permissions: &[Permission]) -> bool {
    permissions.iter().all(|p| has_permission(role, *p))
}

pub fn require_permission(role: UserRole, permission: Permission) -> AuthResult<()> {
    if has_permission(role, permission) {
        Ok(())
    } else {
        tracing::debug!(role = %role, permission = %permission, "permission denied");
        Err(AuthError::InsufficientPermissions)
    }
}

/// Whether `actor` may administer a user holding `target`
pub fn can_manage_user(actor: UserRole, target: UserRole) -> bool {
    use UserRole::*;
    match actor {
        SuperAdmin => true,
        Admin => target != SuperAdmin,
        Pastor => matches!(target, Visitor | Member | Volunteer | Leader | BranchAdmin),
        BranchAdmin => matches!(target, Visitor | Member | Volunteer | Leader),
        Leader => matches!(target, Visitor | Member | Volunteer),
        Volunteer | Member | Visitor => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_counts_per_role() {
        assert_eq!(role_permissions(UserRole::Visitor).len(), 0);
        assert_eq!(role_permissions(UserRole::Member).len(), 0);
        assert_eq!(role_permissions(UserRole::Volunteer).len(), 1);
        assert_eq!(role_permissions(UserRole::Leader).len(), 5);
        assert_eq!(role_permissions(UserRole::BranchAdmin).len(), 12);
        assert_eq!(role_permissions(UserRole::Pastor).len(), 15);
        assert_eq!(role_permissions(UserRole::Admin).len(), 17);
        assert_eq!(role_permissions(UserRole::SuperAdmin).len(), 17);
    }

    #[test]
    fn test_pastor_lacks_deletion_and_billing() {
        assert!(!has_permission(UserRole::Pastor, DeleteUsers));
        assert!(!has_permission(UserRole::Pastor, ManageSubscription));
        assert!(has_permission(UserRole::Pastor, ManagePayroll));
    }

    #[test]
    fn test_any_and_all() {
        assert!(has_any_permission(UserRole::Leader, &[ManagePayroll, ManageGroups]));
        assert!(!has_all_permissions(UserRole::Leader, &[ManagePayroll, ManageGroups]));
        assert!(has_all_permissions(UserRole::Admin, ALL_PERMISSIONS));
        assert!(has_all_permissions(UserRole::Member, &[]));
    }

    #[test]
    fn test_require_permission() {
        assert!(require_permission(UserRole::BranchAdmin, ViewPayroll).is_ok());
        assert_eq!(
            require_permission(UserRole::BranchAdmin, ManagePayroll),
            Err(AuthError::InsufficientPermissions)
        );
    }

    #[test]
    fn test_can_manage_user_hierarchy() {
        use UserRole::*;
        assert!(can_manage_user(SuperAdmin, SuperAdmin));
        assert!(can_manage_user(Admin, Pastor));
        assert!(!can_manage_user(Admin, SuperAdmin));
        assert!(can_manage_user(Pastor, BranchAdmin));
        assert!(!can_manage_user(Pastor, Admin));
        assert!(can_manage_user(BranchAdmin, Leader));
        assert!(!can_manage_user(BranchAdmin, BranchAdmin));
        assert!(can_manage_user(Leader, Volunteer));
        assert!(!can_manage_user(Leader, Leader));
        assert!(!can_manage_user(Member, Visitor));
    }

    #[test]
    fn test_permission_serde() {
        assert_eq!(
            serde_json::to_string(&ManageChurchSettings).unwrap(),
            "\"manage_church_settings\""
        );
    }
}
