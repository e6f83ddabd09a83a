//! # ecclesia-auth
//!
//! Authentication and authorization building blocks:
//! - the fixed [`UserRole`] enum and the role to [`Permission`] table
//! - [`can_manage_user`], the user-management hierarchy
//! - password hashing ([`Argon2Hasher`], with bcrypt verification for
//!   imported accounts)
//! - bearer session tokens ([`TokenIssuer`], [`SessionClaims`])
//! - [`GuardOptions`], the per-route access requirements

pub mod error;
pub mod guard;
pub mod password;
pub mod permissions;
pub mod roles;
pub mod token;

pub use error::AuthError;
pub use guard::GuardOptions;
pub use password::{
    validate_password_strength, Argon2Hasher, BcryptHasher, PasswordHasher, PasswordService,
};
pub use permissions::{
    can_manage_user, has_all_permissions, has_any_permission, has_permission, require_permission,
    role_permissions, Permission,
};
pub use roles::UserRole;
pub use token::{extract_bearer_token, SessionClaims, TokenIssuer};

/// Authentication result type alias
pub type AuthResult<T> = Result<T, AuthError>;
