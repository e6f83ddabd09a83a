//! Plans, subscriptions, usage metering and pricing

pub mod model;
pub mod plan;
pub mod pricing;
pub mod service;

pub use model::{
    current_subscription, LimitCheck, LimitKind, Subscription, SubscriptionStatus, UsageAction,
    UsageMetric, UsageMetricKind, UsageStats,
};
pub use plan::{
    catalogue, recommend_plan, BillingCycle, PlanLimits, PlanTier, PlanUpdate, SubscriptionPlan,
    DEFAULT_PLAN_ID,
};
pub use pricing::{
    apply_discount, is_promo_active, promo_applies_to, DiscountType, EffectivePrice, NewPromo,
    OverrideInput, PlanOverride, PromoScope, PromoStatus, PromoUpdate, SubscriptionPromo,
};
pub use service::{ChurchSummary, PlanChange, StorageCheck, SubscriptionReport, SubscriptionService};
pub use pricing::PricingService;
