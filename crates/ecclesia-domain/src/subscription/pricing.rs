//! Promotions and per-church plan overrides

use super::plan::SubscriptionPlan;
use chrono::{DateTime, Utc};
use ecclesia_core::{AppError, AppResult};
use ecclesia_store::{DocumentStore, Query, Repository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromoScope {
    Plan,
    Church,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromoStatus {
    Active,
    Inactive,
}

/// Discount code. Stored under its uppercase code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPromo {
    pub code: String,
    #[serde(rename = "type")]
    pub discount_type: DiscountType,
    pub value: f64,
    pub applies_to: PromoScope,
    #[serde(default)]
    pub plan_ids: Vec<String>,
    #[serde(default)]
    pub church_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_redemptions: Option<u64>,
    #[serde(default)]
    pub redeemed_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: PromoStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ecclesia_store::Document for SubscriptionPromo {
    const COLLECTION: &'static str = "subscriptionPromos";

    fn id(&self) -> &str {
        &self.code
    }
}

/// Custom pricing of one plan for one church
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOverride {
    /// `{planId}__{churchId}`
    pub id: String,
    pub plan_id: String,
    pub church_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_setup_fee: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promo_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(PlanOverride, "planOverrides");

impl PlanOverride {
    pub fn key(plan_id: &str, church_id: &str) -> String {
        format!("{}__{}", plan_id, church_id)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }
}

pub fn is_promo_active(promo: &SubscriptionPromo, now: DateTime<Utc>) -> bool {
    if promo.status == PromoStatus::Inactive {
        return false;
    }
    if promo.valid_from.is_some_and(|from| from > now) {
        return false;
    }
    if promo.valid_to.is_some_and(|to| to < now) {
        return false;
    }
    match promo.max_redemptions {
        Some(max) if max > 0 => promo.redeemed_count < max,
        _ => true,
    }
}

pub fn promo_applies_to(promo: &SubscriptionPromo, plan_id: &str, church_id: &str) -> bool {
    match promo.applies_to {
        PromoScope::Global => true,
        PromoScope::Plan => promo.plan_ids.iter().any(|id| id == plan_id),
        PromoScope::Church => promo.church_ids.iter().any(|id| id == church_id),
    }
}

/// Discounted amount, never below zero
pub fn apply_discount(amount: f64, promo: &SubscriptionPromo) -> f64 {
    match promo.discount_type {
        DiscountType::Flat => (amount - promo.value).max(0.0),
        DiscountType::Percentage => {
            let pct = promo.value.clamp(0.0, 100.0);
            (amount - amount * pct / 100.0).max(0.0)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub base_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectivePrice {
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_promo: Option<SubscriptionPromo>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "override")]
    pub plan_override: Option<PlanOverride>,
    pub breakdown: PriceBreakdown,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPromo {
    #[serde(default)]
    pub code: String,
    #[serde(rename = "type")]
    pub discount_type: Option<String>,
    pub value: Option<f64>,
    pub applies_to: Option<String>,
    #[serde(default)]
    pub plan_ids: Vec<String>,
    #[serde(default)]
    pub church_ids: Vec<String>,
    pub max_redemptions: Option<u64>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoUpdate {
    pub status: Option<PromoStatus>,
    pub value: Option<f64>,
    pub max_redemptions: Option<u64>,
    pub valid_to: Option<DateTime<Utc>>,
    pub plan_ids: Option<Vec<String>>,
    pub church_ids: Option<Vec<String>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideInput {
    #[serde(default)]
    pub plan_id: String,
    pub custom_price: Option<f64>,
    pub custom_setup_fee: Option<f64>,
    pub promo_code: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

fn parse_discount_type(value: Option<&str>) -> AppResult<DiscountType> {
    match value {
        Some("percentage") => Ok(DiscountType::Percentage),
        Some("flat") => Ok(DiscountType::Flat),
        _ => Err(AppError::bad_request("Promo type must be percentage or flat")),
    }
}

fn parse_scope(value: Option<&str>) -> AppResult<PromoScope> {
    match value {
        Some("plan") => Ok(PromoScope::Plan),
        Some("church") => Ok(PromoScope::Church),
        Some("global") => Ok(PromoScope::Global),
        _ => Err(AppError::bad_request("appliesTo must be plan, church or global")),
    }
}

#[derive(Clone)]
pub struct PricingService {
    promos: Repository<SubscriptionPromo>,
    overrides: Repository<PlanOverride>,
    plans: Repository<SubscriptionPlan>,
}

impl PricingService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            promos: Repository::new(Arc::clone(&store)),
            overrides: Repository::new(Arc::clone(&store)),
            plans: Repository::new(store),
        }
    }

    pub async fn list_promos(&self) -> AppResult<Vec<SubscriptionPromo>> {
        Ok(self.promos.find_many(Query::new().newest_first()).await?)
    }

    pub async fn get_promo(&self, code: &str) -> AppResult<Option<SubscriptionPromo>> {
        let code = code.trim();
        if code.is_empty() {
            return Ok(None);
        }
        Ok(self.promos.find_by_id(&code.to_uppercase()).await?)
    }

    pub async fn create_promo(&self, actor_id: &str, input: NewPromo) -> AppResult<SubscriptionPromo> {
        let code = input.code.trim().to_uppercase();
        if code.is_empty() {
            return Err(AppError::bad_request("Promo code is required"));
        }
        let discount_type = parse_discount_type(input.discount_type.as_deref())?;
        let value = input.value.filter(|v| v.is_finite() && *v > 0.0).ok_or_else(|| {
            AppError::bad_request("Promo value must be greater than zero")
        })?;
        let applies_to = parse_scope(input.applies_to.as_deref())?;

        let now = Utc::now();
        let promo = SubscriptionPromo {
            code: code.clone(),
            discount_type,
            value,
            applies_to,
            plan_ids: input.plan_ids,
            church_ids: input.church_ids,
            max_redemptions: input.max_redemptions,
            redeemed_count: 0,
            valid_from: Some(input.valid_from.unwrap_or(now)),
            valid_to: input.valid_to,
            notes: input.notes,
            status: PromoStatus::Active,
            created_by: Some(actor_id.to_string()),
            created_at: now,
            updated_at: now,
        };
        if !self.promos.create(&promo).await? {
            return Err(AppError::conflict(format!("Promo code {} already exists", code)));
        }
        tracing::info!(code = %code, actor = %actor_id, "promo created");
        Ok(promo)
    }

    pub async fn update_promo(&self, code: &str, update: PromoUpdate) -> AppResult<SubscriptionPromo> {
        let mut promo = self
            .get_promo(code)
            .await?
            .ok_or_else(|| AppError::not_found("Promo code"))?;
        if let Some(status) = update.status {
            promo.status = status;
        }
        if let Some(value) = update.value {
            if !value.is_finite() || value <= 0.0 {
                return Err(AppError::bad_request("Promo value must be greater than zero"));
            }
            promo.value = value;
        }
        if let Some(max) = update.max_redemptions {
            promo.max_redemptions = Some(max);
        }
        if let Some(valid_to) = update.valid_to {
            promo.valid_to = Some(valid_to);
        }
        if let Some(plan_ids) = update.plan_ids {
            promo.plan_ids = plan_ids;
        }
        if let Some(church_ids) = update.church_ids {
            promo.church_ids = church_ids;
        }
        if let Some(notes) = update.notes {
            promo.notes = Some(notes);
        }
        promo.updated_at = Utc::now();
        self.promos.save(&promo).await?;
        Ok(promo)
    }

    /// Count one use of a promo code
    pub async fn redeem_promo(&self, code: &str) -> AppResult<()> {
        self.promos
            .increment(&code.to_uppercase(), "redeemedCount", 1.0)
            .await?;
        Ok(())
    }

    pub async fn get_override(&self, plan_id: &str, church_id: &str) -> AppResult<Option<PlanOverride>> {
        Ok(self
            .overrides
            .find_by_id(&PlanOverride::key(plan_id, church_id))
            .await?)
    }

    pub async fn list_overrides_for_church(&self, church_id: &str) -> AppResult<Vec<PlanOverride>> {
        let mut overrides = self.overrides.find_many(Query::church(church_id)).await?;
        overrides.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(overrides)
    }

    pub async fn set_override(
        &self,
        actor_id: &str,
        church_id: &str,
        input: OverrideInput,
    ) -> AppResult<PlanOverride> {
        if input.plan_id.trim().is_empty() {
            return Err(AppError::bad_request("planId is required"));
        }
        if self.plans.find_by_id(&input.plan_id).await?.is_none() {
            return Err(AppError::not_found("Plan"));
        }
        for (field, value) in [
            ("customPrice", input.custom_price),
            ("customSetupFee", input.custom_setup_fee),
        ] {
            if value.is_some_and(|v| !v.is_finite() || v < 0.0) {
                return Err(AppError::bad_request(format!(
                    "{} must be a non-negative number",
                    field
                )));
            }
        }

        let promo_code = match input.promo_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => {
                let promo = self
                    .get_promo(code)
                    .await?
                    .ok_or_else(|| AppError::not_found("Promo code"))?;
                if !is_promo_active(&promo, Utc::now())
                    || !promo_applies_to(&promo, &input.plan_id, church_id)
                {
                    return Err(AppError::bad_request(
                        "Promo code not active for this plan/church",
                    ));
                }
                Some(promo.code)
            }
            _ => None,
        };

        let now = Utc::now();
        let id = PlanOverride::key(&input.plan_id, church_id);
        let created_at = self
            .overrides
            .find_by_id(&id)
            .await?
            .map_or(now, |existing| existing.created_at);
        let plan_override = PlanOverride {
            id,
            plan_id: input.plan_id,
            church_id: church_id.to_string(),
            custom_price: input.custom_price,
            custom_setup_fee: input.custom_setup_fee,
            promo_code,
            expires_at: input.expires_at,
            notes: input.notes,
            created_by: actor_id.to_string(),
            created_at,
            updated_at: now,
        };
        self.overrides.save(&plan_override).await?;
        tracing::info!(church_id = %church_id, plan_id = %plan_override.plan_id, "plan override set");
        Ok(plan_override)
    }

    pub async fn delete_override(&self, plan_id: &str, church_id: &str) -> AppResult<()> {
        if plan_id.trim().is_empty() {
            return Err(AppError::bad_request("planId is required"));
        }
        self.overrides
            .delete(&PlanOverride::key(plan_id, church_id))
            .await?;
        Ok(())
    }

    /// Override price first, then the promo (explicit code, else the
    /// override's code) when it is active and applies
    pub async fn calculate_effective_price(
        &self,
        plan_id: &str,
        church_id: &str,
        base_price: f64,
        promo_code: Option<&str>,
    ) -> AppResult<EffectivePrice> {
        let now = Utc::now();
        let mut amount = base_price;
        let mut breakdown = PriceBreakdown {
            base_price,
            override_price: None,
            discount: None,
        };

        let plan_override = self
            .get_override(plan_id, church_id)
            .await?
            .filter(|o| !o.is_expired(now));
        if let Some(price) = plan_override.as_ref().and_then(|o| o.custom_price) {
            amount = price;
            breakdown.override_price = Some(price);
        }

        let candidate = promo_code
            .filter(|c| !c.trim().is_empty())
            .map(str::to_string)
            .or_else(|| plan_override.as_ref().and_then(|o| o.promo_code.clone()));
        let mut applied_promo = None;
        if let Some(code) = candidate {
            if let Some(promo) = self.get_promo(&code).await? {
                if is_promo_active(&promo, now) && promo_applies_to(&promo, plan_id, church_id) {
                    let discounted = apply_discount(amount, &promo);
                    breakdown.discount = Some(amount - discounted);
                    amount = discounted;
                    applied_promo = Some(promo);
                }
            }
        }

        Ok(EffectivePrice {
            amount,
            applied_promo,
            plan_override,
            breakdown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn promo(discount_type: DiscountType, value: f64) -> SubscriptionPromo {
        let now = Utc::now();
        SubscriptionPromo {
            code: "EASTER".into(),
            discount_type,
            value,
            applies_to: PromoScope::Global,
            plan_ids: vec![],
            church_ids: vec![],
            max_redemptions: None,
            redeemed_count: 0,
            valid_from: None,
            valid_to: None,
            notes: None,
            status: PromoStatus::Active,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_apply_discount() {
        assert_eq!(apply_discount(100.0, &promo(DiscountType::Flat, 30.0)), 70.0);
        assert_eq!(apply_discount(20.0, &promo(DiscountType::Flat, 30.0)), 0.0);
        assert_eq!(apply_discount(80.0, &promo(DiscountType::Percentage, 25.0)), 60.0);
        assert_eq!(apply_discount(80.0, &promo(DiscountType::Percentage, 150.0)), 0.0);
        assert_eq!(apply_discount(80.0, &promo(DiscountType::Percentage, -5.0)), 80.0);
    }

    #[test]
    fn test_promo_activity_window() {
        let now = Utc::now();
        let mut p = promo(DiscountType::Flat, 5.0);
        assert!(is_promo_active(&p, now));

        p.valid_from = Some(now + Duration::days(1));
        assert!(!is_promo_active(&p, now));

        p.valid_from = None;
        p.valid_to = Some(now - Duration::days(1));
        assert!(!is_promo_active(&p, now));

        p.valid_to = None;
        p.max_redemptions = Some(2);
        p.redeemed_count = 2;
        assert!(!is_promo_active(&p, now));

        p.redeemed_count = 0;
        p.status = PromoStatus::Inactive;
        assert!(!is_promo_active(&p, now));
    }

    #[test]
    fn test_promo_scope() {
        let mut p = promo(DiscountType::Flat, 5.0);
        assert!(promo_applies_to(&p, "growth", "c1"));

        p.applies_to = PromoScope::Plan;
        p.plan_ids = vec!["growth".into()];
        assert!(promo_applies_to(&p, "growth", "c1"));
        assert!(!promo_applies_to(&p, "starter", "c1"));

        p.applies_to = PromoScope::Church;
        p.church_ids = vec!["c2".into()];
        assert!(!promo_applies_to(&p, "growth", "c1"));
        assert!(promo_applies_to(&p, "growth", "c2"));
    }
}
