//! # ecclesia-domain
//!
//! The tenant data model and the services that operate on it. Every record
//! carries a `churchId`; services receive an [`AccessContext`] describing
//! the caller and the church they are acting in, and return
//! [`AppResult`](ecclesia_core::AppResult).
//!
//! Services are cheap to clone: they hold typed repositories over a shared
//! [`DocumentStore`](ecclesia_store::DocumentStore). [`Services`] wires them
//! all together.

/// Implement [`Document`](ecclesia_store::Document) for a record with an
/// `id: String` field
macro_rules! document {
    ($ty:ty, $collection:literal) => {
        impl ecclesia_store::Document for $ty {
            const COLLECTION: &'static str = $collection;

            fn id(&self) -> &str {
                &self.id
            }
        }
    };
}

pub mod access;
pub mod attendance;
pub mod church_invites;
pub mod giving;
pub mod payroll;
pub mod prayer;
pub mod school;
pub mod services;
pub mod subscription;
pub mod surveys;
pub mod tenancy;
pub mod units;

pub use access::{AccessContext, AccessGuard};
pub use services::Services;
