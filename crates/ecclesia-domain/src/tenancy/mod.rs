//! Churches, users and the branch hierarchy

pub mod branch;
pub mod church;
pub mod registration;
pub mod user;

pub use branch::{
    descendant_branch_ids, has_branch_access, has_global_church_access, Branch, BranchAdmin,
    BranchAdminInput, BranchLevel, BranchScope, BranchService, NewBranch,
};
pub use church::{Church, ChurchService, ChurchUpdate};
pub use registration::{ChurchRegistration, MemberRegistration, RegisteredChurch, RegistrationService, Session};
pub use user::{normalize_email, User, UserProfile, UserService};
