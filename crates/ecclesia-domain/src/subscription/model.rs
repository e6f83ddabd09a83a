use super::plan::PlanLimits;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Trial,
    Active,
    /// Cancelled at period end; still usable until `endDate`
    Canceling,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Trial => "TRIAL",
            SubscriptionStatus::Active => "ACTIVE",
            SubscriptionStatus::Canceling => "CANCELING",
            SubscriptionStatus::Cancelled => "CANCELLED",
            SubscriptionStatus::Expired => "EXPIRED",
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Trial | SubscriptionStatus::Active | SubscriptionStatus::Canceling
        )
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub church_id: String,
    pub plan_id: String,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(Subscription, "subscriptions");

impl Subscription {
    /// Live status and not past its end date
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status.is_live() && self.end_date.map_or(true, |end| end > now)
    }
}

/// The subscription that governs a church: the most recently started
/// active one, else the most recently started of any status
pub fn current_subscription(mut subs: Vec<Subscription>, now: DateTime<Utc>) -> Option<Subscription> {
    subs.sort_by(|a, b| b.start_date.cmp(&a.start_date));
    match subs.iter().position(|s| s.is_active(now)) {
        Some(index) => Some(subs.swap_remove(index)),
        None => subs.into_iter().next(),
    }
}

/// Usage counter kinds, keyed as in the usage report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UsageMetricKind {
    UserCount,
    #[serde(rename = "storageUsedGB")]
    StorageUsedGb,
    SermonsCount,
    EventsCount,
    DepartmentsCount,
    GroupsCount,
    ApiCalls,
    AiCoachingSessions,
}

impl UsageMetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageMetricKind::UserCount => "userCount",
            UsageMetricKind::StorageUsedGb => "storageUsedGB",
            UsageMetricKind::SermonsCount => "sermonsCount",
            UsageMetricKind::EventsCount => "eventsCount",
            UsageMetricKind::DepartmentsCount => "departmentsCount",
            UsageMetricKind::GroupsCount => "groupsCount",
            UsageMetricKind::ApiCalls => "apiCalls",
            UsageMetricKind::AiCoachingSessions => "aiCoachingSessions",
        }
    }
}

/// Per-church, per-period counter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetric {
    /// `{churchId}__{metricType}__{period}`
    pub id: String,
    pub church_id: String,
    pub metric_type: UsageMetricKind,
    pub value: f64,
    /// First day of the month, `YYYY-MM-01`
    pub period: String,
    pub created_at: DateTime<Utc>,
}

document!(UsageMetric, "usageMetrics");

impl UsageMetric {
    pub fn key(church_id: &str, kind: UsageMetricKind, period: &str) -> String {
        format!("{}__{}__{}", church_id, kind.as_str(), period)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub user_count: u64,
    #[serde(rename = "storageUsedGB")]
    pub storage_used_gb: f64,
    pub sermons_count: u64,
    pub events_count: u64,
    pub departments_count: u64,
    pub groups_count: u64,
    pub api_calls: u64,
    pub ai_coaching_sessions: u64,
}

/// A plan limit that can be checked against usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    Users,
    Storage,
    Sermons,
    Events,
    Departments,
    Groups,
}

impl LimitKind {
    /// Configured limit; zero counts as unlimited
    pub fn limit(&self, limits: &PlanLimits) -> Option<f64> {
        let value = match self {
            LimitKind::Users => limits.max_users.map(|v| v as f64),
            LimitKind::Storage => limits.max_storage_gb,
            LimitKind::Sermons => limits.max_sermons.map(|v| v as f64),
            LimitKind::Events => limits.max_events.map(|v| v as f64),
            LimitKind::Departments => limits.max_departments.map(|v| v as f64),
            LimitKind::Groups => limits.max_groups.map(|v| v as f64),
        };
        value.filter(|v| *v > 0.0)
    }

    pub fn current(&self, usage: &UsageStats) -> f64 {
        match self {
            LimitKind::Users => usage.user_count as f64,
            LimitKind::Storage => usage.storage_used_gb,
            LimitKind::Sermons => usage.sermons_count as f64,
            LimitKind::Events => usage.events_count as f64,
            LimitKind::Departments => usage.departments_count as f64,
            LimitKind::Groups => usage.groups_count as f64,
        }
    }
}

/// Outcome of a limit check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LimitCheck {
    pub allowed: bool,
    pub current: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<f64>,
}

/// Creations checked against a plan limit before they are counted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageAction {
    UserCreate,
    GroupCreate,
}

impl UsageAction {
    pub fn limit_kind(&self) -> LimitKind {
        match self {
            UsageAction::UserCreate => LimitKind::Users,
            UsageAction::GroupCreate => LimitKind::Groups,
        }
    }

    pub fn metric(&self) -> UsageMetricKind {
        match self {
            UsageAction::UserCreate => UsageMetricKind::UserCount,
            UsageAction::GroupCreate => UsageMetricKind::GroupsCount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sub(id: &str, status: SubscriptionStatus, started_days_ago: i64, ends_in_days: Option<i64>) -> Subscription {
        let now = Utc::now();
        Subscription {
            id: id.to_string(),
            church_id: "c1".to_string(),
            plan_id: "starter".to_string(),
            status,
            start_date: now - Duration::days(started_days_ago),
            end_date: ends_in_days.map(|d| now + Duration::days(d)),
            trial_ends_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_is_active() {
        let now = Utc::now();
        assert!(sub("a", SubscriptionStatus::Active, 1, Some(10)).is_active(now));
        assert!(sub("a", SubscriptionStatus::Trial, 1, None).is_active(now));
        assert!(sub("a", SubscriptionStatus::Canceling, 1, Some(3)).is_active(now));
        assert!(!sub("a", SubscriptionStatus::Active, 40, Some(-1)).is_active(now));
        assert!(!sub("a", SubscriptionStatus::Cancelled, 1, Some(10)).is_active(now));
        assert!(!sub("a", SubscriptionStatus::Expired, 1, None).is_active(now));
    }

    #[test]
    fn test_current_subscription_prefers_active() {
        let now = Utc::now();
        let picked = current_subscription(
            vec![
                sub("old-active", SubscriptionStatus::Active, 20, Some(10)),
                sub("new-expired", SubscriptionStatus::Expired, 1, None),
            ],
            now,
        )
        .unwrap();
        assert_eq!(picked.id, "old-active");

        let picked = current_subscription(
            vec![
                sub("older", SubscriptionStatus::Expired, 20, None),
                sub("newer", SubscriptionStatus::Cancelled, 5, None),
            ],
            now,
        )
        .unwrap();
        assert_eq!(picked.id, "newer");
        assert!(current_subscription(vec![], now).is_none());
    }

    #[test]
    fn test_zero_limit_is_unlimited() {
        let limits = PlanLimits {
            max_users: Some(0),
            max_groups: Some(5),
            ..Default::default()
        };
        assert_eq!(LimitKind::Users.limit(&limits), None);
        assert_eq!(LimitKind::Groups.limit(&limits), Some(5.0));
        assert_eq!(LimitKind::Storage.limit(&limits), None);
    }

    #[test]
    fn test_metric_keys() {
        assert_eq!(
            UsageMetric::key("c1", UsageMetricKind::ApiCalls, "2024-05-01"),
            "c1__apiCalls__2024-05-01"
        );
        assert_eq!(
            serde_json::to_string(&UsageMetricKind::StorageUsedGb).unwrap(),
            "\"storageUsedGB\""
        );
    }
}
