//! Subscription plans and the licensing catalogue

use chrono::{DateTime, Utc};
use ecclesia_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanTier {
    Starter,
    Growth,
    Enterprise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Monthly,
    Annual,
    Lifetime,
}

/// Per-plan caps. `None` (or zero) means unlimited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_users: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "maxStorageGB")]
    pub max_storage_gb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_sermons: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_events: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_departments: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_groups: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPlan {
    pub id: String,
    pub name: String,
    pub tier: PlanTier,
    pub description: String,
    pub price: f64,
    pub currency: String,
    pub billing_cycle: BillingCycle,
    pub trial_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_fee: Option<f64>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub limits: PlanLimits,
    #[serde(default)]
    pub multi_campus_support: bool,
    #[serde(default)]
    pub priority_support: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(SubscriptionPlan, "subscriptionPlans");

struct LicensingPlan {
    id: &'static str,
    tier: PlanTier,
    name: &'static str,
    description: &'static str,
    max_members: Option<u64>,
    monthly_price: f64,
    setup_fee: f64,
    billing_cycle: BillingCycle,
    multi_campus: bool,
    priority_support: bool,
    features: &'static [&'static str],
}

const LICENSING_PLANS: &[LicensingPlan] = &[
    LicensingPlan {
        id: "starter",
        tier: PlanTier::Starter,
        name: "Starter",
        description: "Digitize core church operations for small congregations.",
        max_members: Some(300),
        monthly_price: 29.0,
        setup_fee: 100.0,
        billing_cycle: BillingCycle::Monthly,
        multi_campus: false,
        priority_support: false,
        features: &[
            "Membership + attendance tracking",
            "Announcements & messaging",
            "Sermon + media library",
            "Basic giving + financial reports",
            "Limited admin roles",
        ],
    },
    LicensingPlan {
        id: "growth",
        tier: PlanTier::Growth,
        name: "Growth",
        description: "Automation & volunteer workflows for mid-sized churches.",
        max_members: Some(1500),
        monthly_price: 99.0,
        setup_fee: 300.0,
        billing_cycle: BillingCycle::Monthly,
        multi_campus: true,
        priority_support: false,
        features: &[
            "All Starter features",
            "First-timer + follow-up automation",
            "Volunteer & department management",
            "Event + registration workflows",
            "Advanced giving analytics",
            "Multiple admin workspaces",
        ],
    },
    LicensingPlan {
        id: "enterprise",
        tier: PlanTier::Enterprise,
        name: "Enterprise",
        description: "Full ERP suite for mega / multi-campus churches.",
        max_members: None,
        monthly_price: 299.0,
        setup_fee: 1000.0,
        billing_cycle: BillingCycle::Monthly,
        multi_campus: true,
        priority_support: true,
        features: &[
            "Multi-campus & HQ dashboard",
            "Advanced leadership analytics",
            "Role-based access + audit logs",
            "API + integrations",
            "Priority support + success manager",
        ],
    },
    LicensingPlan {
        id: "lifetime",
        tier: PlanTier::Enterprise,
        name: "Lifetime",
        description: "One-time license with lifetime updates and white-glove onboarding.",
        max_members: None,
        monthly_price: 6999.0,
        setup_fee: 0.0,
        billing_cycle: BillingCycle::Lifetime,
        multi_campus: true,
        priority_support: true,
        features: &[
            "All Enterprise capabilities",
            "Dedicated success manager",
            "Priority roadmap access",
            "Unlimited campuses & admins",
            "Lifetime feature updates",
        ],
    },
];

pub const DEFAULT_PLAN_ID: &str = "starter";
pub const TRIAL_DAYS: u32 = 30;

/// The seeded plan catalogue
pub fn catalogue(now: DateTime<Utc>) -> Vec<SubscriptionPlan> {
    LICENSING_PLANS
        .iter()
        .map(|p| SubscriptionPlan {
            id: p.id.to_string(),
            name: p.name.to_string(),
            tier: p.tier,
            description: p.description.to_string(),
            price: p.monthly_price,
            currency: "USD".to_string(),
            billing_cycle: p.billing_cycle,
            trial_days: TRIAL_DAYS,
            setup_fee: Some(p.setup_fee),
            features: p.features.iter().map(|f| f.to_string()).collect(),
            limits: PlanLimits {
                max_users: p.max_members,
                ..Default::default()
            },
            multi_campus_support: p.multi_campus,
            priority_support: p.priority_support,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
        .collect()
}

pub fn is_catalogue_plan(id: &str) -> bool {
    LICENSING_PLANS.iter().any(|p| p.id == id)
}

/// Plan id suited to a congregation
pub fn recommend_plan(member_count: u64, multi_campus: bool, needs_advanced_analytics: bool) -> &'static str {
    if member_count >= 1500 || multi_campus {
        "enterprise"
    } else if member_count >= 300 || needs_advanced_analytics {
        "growth"
    } else {
        "starter"
    }
}

/// Superadmin edit of a plan
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanUpdate {
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub billing_cycle: Option<String>,
    pub description: Option<String>,
    pub limits: Option<PlanLimits>,
}

impl PlanUpdate {
    pub fn is_empty(&self) -> bool {
        self.price.is_none()
            && self.currency.is_none()
            && self.billing_cycle.is_none()
            && self.description.is_none()
            && self.limits.is_none()
    }

    /// Validate and apply to `plan`
    pub fn apply(self, plan: &mut SubscriptionPlan) -> AppResult<()> {
        if self.is_empty() {
            return Err(AppError::bad_request("No updates provided"));
        }
        if let Some(price) = self.price {
            if !price.is_finite() || price < 0.0 {
                return Err(AppError::bad_request("Price must be a non-negative number"));
            }
            plan.price = price;
        }
        if let Some(currency) = self.currency {
            let currency = currency.trim().to_uppercase();
            if currency.is_empty() {
                return Err(AppError::bad_request("Currency is required"));
            }
            plan.currency = currency;
        }
        if let Some(cycle) = self.billing_cycle {
            plan.billing_cycle = match cycle.as_str() {
                "monthly" => BillingCycle::Monthly,
                "annual" => BillingCycle::Annual,
                _ => {
                    return Err(AppError::bad_request(
                        "Billing cycle must be monthly or annual",
                    ))
                }
            };
        }
        if let Some(description) = self.description {
            plan.description = description.trim().to_string();
        }
        if let Some(limits) = self.limits {
            plan.limits = limits;
        }
        plan.updated_at = Utc::now();
        Ok(())
    }
}
