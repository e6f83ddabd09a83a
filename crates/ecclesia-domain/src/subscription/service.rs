use super::model::{
    current_subscription, LimitCheck, LimitKind, Subscription, SubscriptionStatus, UsageAction,
    UsageMetric, UsageMetricKind, UsageStats,
};
use super::plan::{catalogue, BillingCycle, PlanLimits, PlanUpdate, SubscriptionPlan};
use super::pricing::{EffectivePrice, PricingService};
use crate::tenancy::{Church, User};
use crate::units::Unit;
use chrono::{DateTime, Duration, Utc};
use ecclesia_core::time::{add_months, billing_period, month_end, month_start};
use ecclesia_core::{new_id, AppError, AppResult};
use ecclesia_store::{DocumentStore, Query, Repository};
use serde::Serialize;
use std::sync::Arc;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
pub const DEFAULT_TRIAL_EXTENSION_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageCheck {
    pub allowed: bool,
    pub current: f64,
    pub projected: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<f64>,
}

/// Subscription with its current billing window
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPeriod {
    #[serde(flatten)]
    pub subscription: Subscription,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionReport {
    pub active: bool,
    pub status: Option<SubscriptionStatus>,
    pub plan: Option<SubscriptionPlan>,
    pub usage: Option<UsageStats>,
    pub limits: Option<PlanLimits>,
    pub subscription: Option<SubscriptionPeriod>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanChange {
    pub subscription: Subscription,
    pub plan: SubscriptionPlan,
    pub price: EffectivePrice,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChurchSummary {
    pub church: Church,
    pub subscription: Option<Subscription>,
    pub plan_name: Option<String>,
    pub active: bool,
    pub user_count: u64,
}

#[derive(Clone)]
pub struct SubscriptionService {
    plans: Repository<SubscriptionPlan>,
    subscriptions: Repository<Subscription>,
    metrics: Repository<UsageMetric>,
    churches: Repository<Church>,
    users: Repository<User>,
    units: Repository<Unit>,
    pricing: PricingService,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            plans: Repository::new(Arc::clone(&store)),
            subscriptions: Repository::new(Arc::clone(&store)),
            metrics: Repository::new(Arc::clone(&store)),
            churches: Repository::new(Arc::clone(&store)),
            users: Repository::new(Arc::clone(&store)),
            units: Repository::new(Arc::clone(&store)),
            pricing: PricingService::new(store),
        }
    }

    pub fn pricing(&self) -> &PricingService {
        &self.pricing
    }

    /// Insert catalogue plans that are not stored yet. Returns how many were added.
    pub async fn ensure_catalogue(&self) -> AppResult<usize> {
        let mut inserted = 0;
        for plan in catalogue(Utc::now()) {
            if self.plans.create(&plan).await? {
                inserted += 1;
            }
        }
        if inserted > 0 {
            tracing::info!(inserted, "plan catalogue seeded");
        }
        Ok(inserted)
    }

    /// Active plans, cheapest first
    pub async fn list_plans(&self) -> AppResult<Vec<SubscriptionPlan>> {
        let mut plans = self
            .plans
            .find_many(Query::new().filter("isActive", true))
            .await?;
        plans.sort_by(|a, b| a.price.total_cmp(&b.price));
        Ok(plans)
    }

    pub async fn get_plan(&self, plan_id: &str) -> AppResult<SubscriptionPlan> {
        self.plans
            .find_by_id(plan_id)
            .await?
            .ok_or_else(|| AppError::not_found("Plan"))
    }

    pub async fn update_plan(&self, plan_id: &str, update: PlanUpdate) -> AppResult<SubscriptionPlan> {
        let mut plan = self.get_plan(plan_id).await?;
        update.apply(&mut plan)?;
        self.plans.save(&plan).await?;
        tracing::info!(plan_id = %plan_id, price = plan.price, "plan updated");
        Ok(plan)
    }

    /// Start a subscription: a trial when requested and the plan offers
    /// one, otherwise one paid month
    pub async fn create_subscription(
        &self,
        church_id: &str,
        plan_id: &str,
        start_trial: bool,
    ) -> AppResult<Subscription> {
        let plan = self.get_plan(plan_id).await?;
        let now = Utc::now();

        let (status, end_date, trial_ends_at) = if start_trial && plan.trial_days > 0 {
            let trial_end = now + Duration::days(i64::from(plan.trial_days));
            (SubscriptionStatus::Trial, trial_end, Some(trial_end))
        } else {
            (SubscriptionStatus::Active, add_months(now, 1), None)
        };

        let subscription = Subscription {
            id: new_id(),
            church_id: church_id.to_string(),
            plan_id: plan.id,
            status,
            start_date: now,
            end_date: Some(end_date),
            trial_ends_at,
            created_at: now,
            updated_at: now,
        };
        self.subscriptions.save(&subscription).await?;
        tracing::info!(church_id = %church_id, plan_id = %subscription.plan_id, status = %status, "subscription created");
        Ok(subscription)
    }

    pub async fn find_by_church(&self, church_id: &str) -> AppResult<Option<Subscription>> {
        let subs = self
            .subscriptions
            .find_many(Query::church(church_id))
            .await?;
        Ok(current_subscription(subs, Utc::now()))
    }

    async fn require_subscription(&self, church_id: &str) -> AppResult<Subscription> {
        self.find_by_church(church_id)
            .await?
            .ok_or_else(|| AppError::not_found("Subscription"))
    }

    pub async fn is_active(&self, church_id: &str) -> AppResult<bool> {
        Ok(self
            .find_by_church(church_id)
            .await?
            .is_some_and(|s| s.is_active(Utc::now())))
    }

    pub async fn plan_limits(&self, plan_id: &str) -> AppResult<PlanLimits> {
        Ok(self
            .plans
            .find_by_id(plan_id)
            .await?
            .map(|p| p.limits)
            .unwrap_or_default())
    }

    /// Current-period usage. Users and units are counted, the rest read
    /// from this month's metrics.
    pub async fn usage_stats(&self, church_id: &str) -> AppResult<UsageStats> {
        let period = billing_period(Utc::now());
        let metrics = self
            .metrics
            .find_many(Query::church(church_id).filter("period", period.as_str()))
            .await?;
        let metric = |kind: UsageMetricKind| {
            metrics
                .iter()
                .find(|m| m.metric_type == kind)
                .map_or(0.0, |m| m.value)
        };

        Ok(UsageStats {
            user_count: self.users.count(Query::church(church_id)).await?,
            groups_count: self.units.count(Query::church(church_id)).await?,
            storage_used_gb: metric(UsageMetricKind::StorageUsedGb),
            sermons_count: metric(UsageMetricKind::SermonsCount) as u64,
            events_count: metric(UsageMetricKind::EventsCount) as u64,
            departments_count: metric(UsageMetricKind::DepartmentsCount) as u64,
            api_calls: metric(UsageMetricKind::ApiCalls) as u64,
            ai_coaching_sessions: metric(UsageMetricKind::AiCoachingSessions) as u64,
        })
    }

    pub async fn check_usage_limit(&self, church_id: &str, kind: LimitKind) -> AppResult<LimitCheck> {
        let Some(subscription) = self.find_by_church(church_id).await? else {
            return Ok(LimitCheck {
                allowed: false,
                current: 0.0,
                limit: None,
            });
        };
        let limits = self.plan_limits(&subscription.plan_id).await?;
        let usage = self.usage_stats(church_id).await?;
        let current = kind.current(&usage);

        Ok(match kind.limit(&limits) {
            None => LimitCheck {
                allowed: true,
                current,
                limit: None,
            },
            Some(limit) => LimitCheck {
                allowed: current < limit,
                current,
                limit: Some(limit),
            },
        })
    }

    /// Add to this month's counter, creating it when missing
    pub async fn increment_usage(
        &self,
        church_id: &str,
        kind: UsageMetricKind,
        amount: f64,
    ) -> AppResult<f64> {
        let period = billing_period(Utc::now());
        let id = UsageMetric::key(church_id, kind, &period);
        let seed = UsageMetric {
            id: id.clone(),
            church_id: church_id.to_string(),
            metric_type: kind,
            value: 0.0,
            period,
            created_at: Utc::now(),
        };
        self.metrics.create(&seed).await?;
        let value = self.metrics.increment(&id, "value", amount).await?;
        Ok(value.unwrap_or(amount))
    }

    /// Enforce the subscription and the action's limit, then count the action
    pub async fn track_usage(&self, church_id: Option<&str>, action: UsageAction) -> AppResult<()> {
        let church_id = church_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::bad_request("Church ID required"))?;

        if !self.is_active(church_id).await? {
            tracing::debug!(church_id = %church_id, ?action, "usage refused: subscription inactive");
            return Err(AppError::SubscriptionInactive);
        }

        let check = self.check_usage_limit(church_id, action.limit_kind()).await?;
        if !check.allowed {
            tracing::info!(church_id = %church_id, ?action, current = check.current, limit = ?check.limit, "usage limit reached");
            return Err(AppError::usage_limit(check.limit, check.current));
        }

        self.increment_usage(church_id, action.metric(), 1.0).await?;
        Ok(())
    }

    /// Count one authenticated request against the church's `apiCalls`; never limited
    pub async fn record_api_call(&self, church_id: &str) -> AppResult<()> {
        self.increment_usage(church_id, UsageMetricKind::ApiCalls, 1.0).await?;
        Ok(())
    }

    pub async fn check_storage_for_upload(&self, church_id: &str, upload_bytes: u64) -> AppResult<StorageCheck> {
        let Some(subscription) = self.find_by_church(church_id).await? else {
            return Ok(StorageCheck {
                allowed: false,
                current: 0.0,
                projected: 0.0,
                limit: None,
            });
        };
        let limits = self.plan_limits(&subscription.plan_id).await?;
        let current = self.usage_stats(church_id).await?.storage_used_gb;
        let projected = current + upload_bytes as f64 / BYTES_PER_GB;
        let limit = LimitKind::Storage.limit(&limits);

        Ok(StorageCheck {
            allowed: limit.map_or(true, |limit| projected < limit),
            current,
            projected,
            limit,
        })
    }

    /// `X-Usage-*` response headers
    pub async fn usage_headers(&self, church_id: &str) -> AppResult<Vec<(&'static str, String)>> {
        let usage = self.usage_stats(church_id).await?;
        let limits = match self.find_by_church(church_id).await? {
            Some(subscription) => self.plan_limits(&subscription.plan_id).await?,
            None => PlanLimits::default(),
        };
        let ratio = |kind: LimitKind| match kind.limit(&limits) {
            Some(limit) => format!("{}/{}", kind.current(&usage), limit),
            None => format!("{}/unlimited", kind.current(&usage)),
        };

        let storage = match LimitKind::Storage.limit(&limits) {
            Some(limit) => format!("{:.2}/{}GB", usage.storage_used_gb, limit),
            None => format!("{:.2}/unlimited", usage.storage_used_gb),
        };
        Ok(vec![
            ("X-Usage-Users", ratio(LimitKind::Users)),
            ("X-Usage-Groups", ratio(LimitKind::Groups)),
            ("X-Usage-Sermons", ratio(LimitKind::Sermons)),
            ("X-Usage-Events", ratio(LimitKind::Events)),
            ("X-Usage-Storage", storage),
            ("X-Usage-API-Calls", usage.api_calls.to_string()),
        ])
    }

    pub async fn subscription_status(&self, church_id: &str) -> AppResult<SubscriptionReport> {
        let Some(subscription) = self.find_by_church(church_id).await? else {
            return Ok(SubscriptionReport {
                active: false,
                status: None,
                plan: None,
                usage: None,
                limits: None,
                subscription: None,
            });
        };
        let now = Utc::now();
        let plan = self.plans.find_by_id(&subscription.plan_id).await?;
        let usage = self.usage_stats(church_id).await?;
        let limits = plan.as_ref().map(|p| p.limits.clone()).unwrap_or_default();

        let cycle = plan.as_ref().map_or(BillingCycle::Monthly, |p| p.billing_cycle);
        let (period_start, period_end) = match cycle {
            BillingCycle::Monthly => (month_start(now), month_end(now)),
            _ => (subscription.start_date, add_months(subscription.start_date, 12)),
        };

        Ok(SubscriptionReport {
            active: subscription.is_active(now),
            status: Some(subscription.status),
            plan,
            usage: Some(usage),
            limits: Some(limits),
            subscription: Some(SubscriptionPeriod {
                cancel_at_period_end: matches!(
                    subscription.status,
                    SubscriptionStatus::Canceling | SubscriptionStatus::Cancelled
                ),
                subscription,
                current_period_start: period_start,
                current_period_end: period_end,
            }),
        })
    }

    pub async fn cancel(&self, church_id: &str, at_period_end: bool) -> AppResult<Subscription> {
        let mut subscription = self.require_subscription(church_id).await?;
        let now = Utc::now();
        if at_period_end {
            subscription.status = SubscriptionStatus::Canceling;
        } else {
            subscription.status = SubscriptionStatus::Cancelled;
            subscription.end_date = Some(now);
        }
        subscription.updated_at = now;
        self.subscriptions.save(&subscription).await?;
        tracing::info!(church_id = %church_id, at_period_end, "subscription cancelled");
        Ok(subscription)
    }

    pub async fn change_plan(
        &self,
        church_id: &str,
        plan_id: &str,
        promo_code: Option<&str>,
    ) -> AppResult<PlanChange> {
        if plan_id.trim().is_empty() {
            return Err(AppError::bad_request("Plan ID is required"));
        }
        let plan = self.get_plan(plan_id).await?;
        let mut subscription = self.require_subscription(church_id).await?;

        let price = self
            .pricing
            .calculate_effective_price(&plan.id, church_id, plan.price, promo_code)
            .await?;
        if let Some(promo) = &price.applied_promo {
            self.pricing.redeem_promo(&promo.code).await?;
        }

        subscription.plan_id = plan.id.clone();
        subscription.updated_at = Utc::now();
        self.subscriptions.save(&subscription).await?;
        tracing::info!(church_id = %church_id, plan_id = %plan.id, amount = price.amount, "plan changed");

        Ok(PlanChange {
            message: format!("Plan changed to {}", plan.name),
            subscription,
            plan,
            price,
        })
    }

    /// Add `days` (default 30) to `trialEndsAt`, else `endDate`, else now.
    /// Expired subscriptions return to TRIAL.
    pub async fn extend_trial(&self, church_id: &str, days: Option<i64>) -> AppResult<Subscription> {
        let days = days.unwrap_or(DEFAULT_TRIAL_EXTENSION_DAYS);
        if days <= 0 {
            return Err(AppError::bad_request("days must be a positive number"));
        }
        let mut subscription = self.require_subscription(church_id).await?;
        let now = Utc::now();
        let base = subscription
            .trial_ends_at
            .or(subscription.end_date)
            .unwrap_or(now);
        let new_end = base + Duration::days(days);

        subscription.trial_ends_at = Some(new_end);
        subscription.end_date = Some(new_end);
        if subscription.status == SubscriptionStatus::Expired {
            subscription.status = SubscriptionStatus::Trial;
        }
        subscription.updated_at = now;
        self.subscriptions.save(&subscription).await?;
        tracing::info!(church_id = %church_id, days, trial_ends_at = %new_end, "trial extended");
        Ok(subscription)
    }

    /// Every church with its governing subscription
    pub async fn list_churches(&self) -> AppResult<Vec<ChurchSummary>> {
        let now = Utc::now();
        let churches = self.churches.find_many(Query::new().newest_first()).await?;
        let mut summaries = Vec::with_capacity(churches.len());
        for church in churches {
            let subscription = self.find_by_church(&church.id).await?;
            let plan_name = match &subscription {
                Some(s) => self.plans.find_by_id(&s.plan_id).await?.map(|p| p.name),
                None => None,
            };
            summaries.push(ChurchSummary {
                active: subscription.as_ref().is_some_and(|s| s.is_active(now)),
                user_count: self.users.count(Query::church(&church.id)).await?,
                church,
                subscription,
                plan_name,
            });
        }
        Ok(summaries)
    }
}
