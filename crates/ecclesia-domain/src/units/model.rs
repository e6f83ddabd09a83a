use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinPolicy {
    #[default]
    InviteOnly,
    Open,
    Request,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreationPolicy {
    #[default]
    AdminOnly,
    Anyone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitePolicy {
    #[default]
    HeadOnly,
    AnyMember,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitRole {
    Head,
    Member,
}

impl fmt::Display for UnitRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnitRole::Head => "HEAD",
            UnitRole::Member => "MEMBER",
        })
    }
}

impl FromStr for UnitRole {
    type Err = ecclesia_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "HEAD" => Ok(UnitRole::Head),
            "MEMBER" => Ok(UnitRole::Member),
            _ => Err(ecclesia_core::AppError::bad_request(
                "Role must be HEAD or MEMBER",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Declined,
    Revoked,
}

impl fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InviteStatus::Pending => "PENDING",
            InviteStatus::Accepted => "ACCEPTED",
            InviteStatus::Declined => "DECLINED",
            InviteStatus::Revoked => "REVOKED",
        })
    }
}

/// Kind of group, e.g. "Cell", "Department"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitType {
    pub id: String,
    pub church_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// When false a user may belong to at most one unit of this type
    pub allow_multiple_per_user: bool,
    pub join_policy: JoinPolicy,
    pub creation_policy: CreationPolicy,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(UnitType, "unitTypes");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitPermissions {
    #[serde(default)]
    pub invite_policy: InvitePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: String,
    pub church_id: String,
    pub unit_type_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    #[serde(default)]
    pub permissions: UnitPermissions,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(Unit, "units");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitMembership {
    /// `{unitId}__{userId}`
    pub id: String,
    pub church_id: String,
    pub unit_id: String,
    pub unit_type_id: String,
    pub user_id: String,
    pub role: UnitRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(UnitMembership, "unitMemberships");

impl UnitMembership {
    pub fn key(unit_id: &str, user_id: &str) -> String {
        format!("{}__{}", unit_id, user_id)
    }

    pub fn new(unit: &Unit, user_id: &str, role: UnitRole) -> Self {
        let now = Utc::now();
        Self {
            id: Self::key(&unit.id, user_id),
            church_id: unit.church_id.clone(),
            unit_id: unit.id.clone(),
            unit_type_id: unit.unit_type_id.clone(),
            user_id: user_id.to_string(),
            role,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitInvite {
    pub id: String,
    pub church_id: String,
    pub unit_id: String,
    pub unit_type_id: String,
    pub invited_user_id: String,
    pub invited_by_user_id: String,
    pub status: InviteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,
}

document!(UnitInvite, "unitInvites");

impl UnitInvite {
    /// Move out of PENDING. Every transition starts from PENDING.
    pub fn transition(&mut self, to: InviteStatus, now: DateTime<Utc>) -> Result<(), InviteStatus> {
        if self.status != InviteStatus::Pending || to == InviteStatus::Pending {
            return Err(self.status);
        }
        self.status = to;
        self.responded_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUnitType {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub allow_multiple_per_user: bool,
    #[serde(default)]
    pub join_policy: JoinPolicy,
    #[serde(default)]
    pub creation_policy: CreationPolicy,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUnit {
    #[serde(default)]
    pub unit_type_id: String,
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub branch_id: Option<String>,
    pub invite_policy: Option<InvitePolicy>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invite() -> UnitInvite {
        let now = Utc::now();
        UnitInvite {
            id: "i1".into(),
            church_id: "c1".into(),
            unit_id: "u1".into(),
            unit_type_id: "t1".into(),
            invited_user_id: "bob".into(),
            invited_by_user_id: "ann".into(),
            status: InviteStatus::Pending,
            created_at: now,
            updated_at: now,
            responded_at: None,
        }
    }

    #[test]
    fn test_transitions_only_leave_pending() {
        let now = Utc::now();
        let mut inv = invite();
        assert!(inv.transition(InviteStatus::Accepted, now).is_ok());
        assert_eq!(inv.responded_at, Some(now));

        assert_eq!(
            inv.transition(InviteStatus::Revoked, now),
            Err(InviteStatus::Accepted)
        );
        assert!(invite().transition(InviteStatus::Pending, now).is_err());
    }

    #[test]
    fn test_policy_defaults_and_serde() {
        let unit: UnitPermissions = serde_json::from_str("{}").unwrap();
        assert_eq!(unit.invite_policy, InvitePolicy::HeadOnly);
        assert_eq!(
            serde_json::to_string(&JoinPolicy::InviteOnly).unwrap(),
            "\"INVITE_ONLY\""
        );
        assert_eq!(UnitMembership::key("u1", "bob"), "u1__bob");
        assert_eq!("head".parse::<UnitRole>().unwrap(), UnitRole::Head);
        assert!("OWNER".parse::<UnitRole>().is_err());
    }
}
