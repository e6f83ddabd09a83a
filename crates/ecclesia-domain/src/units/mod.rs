//! Units (cells, departments, ministries), memberships and unit invites

mod leaders;
pub mod invites;
pub mod model;
pub mod service;

pub use invites::UnitInviteService;
pub use model::{
    CreationPolicy, InvitePolicy, InviteStatus, JoinPolicy, NewUnit, NewUnitType, Unit,
    UnitInvite, UnitMembership, UnitPermissions, UnitRole, UnitType,
};
pub use service::UnitService;
