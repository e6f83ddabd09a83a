//! What a unit HEAD may manage

use super::model::UnitRole;
use super::service::UnitService;
use ecclesia_core::AppResult;
use ecclesia_store::Query;
use std::collections::BTreeSet;

impl UnitService {
    pub async fn can_leader_manage_unit(&self, user_id: &str, unit_id: &str) -> AppResult<bool> {
        Ok(self
            .find_membership(unit_id, user_id)
            .await?
            .is_some_and(|m| m.role == UnitRole::Head))
    }

    /// Ids of units the user heads
    pub async fn leader_units(&self, user_id: &str) -> AppResult<Vec<String>> {
        Ok(self
            .memberships_for_user(user_id)
            .await?
            .into_iter()
            .filter(|m| m.role == UnitRole::Head)
            .map(|m| m.unit_id)
            .collect())
    }

    /// Whether `target` belongs to any unit `leader` heads
    pub async fn can_leader_manage_user(&self, leader_id: &str, target_id: &str) -> AppResult<bool> {
        let led = self.leader_units(leader_id).await?;
        if led.is_empty() {
            return Ok(false);
        }
        Ok(self
            .memberships_for_user(target_id)
            .await?
            .iter()
            .any(|m| led.contains(&m.unit_id)))
    }

    /// Members of every unit the leader heads, the leader included
    pub async fn leader_managed_users(&self, leader_id: &str) -> AppResult<Vec<String>> {
        let mut users = BTreeSet::new();
        for unit_id in self.leader_units(leader_id).await? {
            let members = self
                .memberships
                .find_many(Query::new().filter("unitId", unit_id.as_str()))
                .await?;
            users.extend(members.into_iter().map(|m| m.user_id));
        }
        Ok(users.into_iter().collect())
    }
}
