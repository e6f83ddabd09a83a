//! Giving records, fundraising projects and the Flutterwave webhook

use crate::access::AccessContext;
use crate::tenancy::User;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use ecclesia_auth::Permission;
use ecclesia_core::{new_id, AppError, AppResult};
use ecclesia_store::{DocumentStore, Query, Repository};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Giving {
    pub id: String,
    pub church_id: String,
    pub user_id: String,
    pub amount: f64,
    /// Tithe, Offering, Project, ...
    #[serde(rename = "type")]
    pub giving_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(Giving, "giving");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProjectStatus {
    #[default]
    Active,
    Completed,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GivingProject {
    pub id: String,
    pub church_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub goal_amount: f64,
    pub current_amount: f64,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(GivingProject, "projects");

impl GivingProject {
    /// Percent of the goal raised, capped at 100
    pub fn progress(&self) -> f64 {
        if self.goal_amount > 0.0 {
            (self.current_amount / self.goal_amount * 100.0).min(100.0)
        } else {
            0.0
        }
    }

    pub fn remaining(&self) -> f64 {
        (self.goal_amount - self.current_amount).max(0.0)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectProgress {
    #[serde(flatten)]
    pub project: GivingProject,
    pub progress: f64,
    pub remaining_amount: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGiving {
    #[serde(default)]
    pub amount: f64,
    #[serde(rename = "type", default)]
    pub giving_type: String,
    pub project_id: Option<String>,
    pub payment_method: Option<String>,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub currency: Option<String>,
    #[serde(default)]
    pub goal_amount: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GivingSummary {
    pub total_amount: f64,
    pub total_donations: usize,
    pub by_type: BTreeMap<String, f64>,
    pub streak: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct GivingHistory {
    pub giving: Vec<Giving>,
    pub summary: GivingSummary,
}

/// Consecutive days, ending today, with at least one gift
pub fn giving_streak(dates: impl IntoIterator<Item = DateTime<Utc>>, today: NaiveDate) -> u32 {
    let days: BTreeSet<NaiveDate> = dates.into_iter().map(|d| d.date_naive()).collect();
    let mut streak = 0;
    let mut day = today;
    while days.contains(&day) {
        streak += 1;
        day -= Duration::days(1);
    }
    streak
}

/// Equality of two secrets without an early exit on the first mismatch
fn secrets_match(provided: &str, expected: &str) -> bool {
    let a = Sha256::digest(provided.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Result of processing one webhook delivery
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Recorded(Giving),
    /// Transaction already recorded by an earlier delivery
    Duplicate(Giving),
    Ignored,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChargeMeta {
    user_id: Option<String>,
    #[serde(rename = "type")]
    giving_type: Option<String>,
    project_id: Option<String>,
    notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChargeData {
    id: Value,
    #[serde(default)]
    status: String,
    #[serde(default)]
    amount: f64,
    #[serde(default)]
    meta: Option<ChargeMeta>,
}

#[derive(Clone)]
pub struct GivingService {
    giving: Repository<Giving>,
    projects: Repository<GivingProject>,
    users: Repository<User>,
    webhook_secret: Option<String>,
}

impl GivingService {
    pub fn new(store: Arc<dyn DocumentStore>, webhook_secret: Option<String>) -> Self {
        Self {
            giving: Repository::new(Arc::clone(&store)),
            projects: Repository::new(Arc::clone(&store)),
            users: Repository::new(store),
            webhook_secret,
        }
    }

    async fn tenant_project(&self, church_id: &str, project_id: &str) -> AppResult<Option<GivingProject>> {
        Ok(self
            .projects
            .find_by_id(project_id)
            .await?
            .filter(|p| p.church_id == church_id))
    }

    fn build(id: String, church_id: &str, user_id: &str, input: NewGiving) -> Giving {
        let now = Utc::now();
        Giving {
            id,
            church_id: church_id.to_string(),
            user_id: user_id.to_string(),
            amount: input.amount,
            giving_type: input.giving_type.trim().to_string(),
            project_id: input.project_id.filter(|p| !p.is_empty()),
            payment_method: input.payment_method.filter(|p| !p.is_empty()),
            transaction_id: input.transaction_id.filter(|t| !t.is_empty()),
            notes: input.notes.filter(|n| !n.trim().is_empty()),
            created_at: now,
            updated_at: now,
        }
    }

    async fn credit_project(&self, giving: &Giving) -> AppResult<()> {
        if let Some(project_id) = giving.project_id.as_deref() {
            self.projects
                .increment(project_id, "currentAmount", giving.amount)
                .await?;
        }
        tracing::info!(church_id = %giving.church_id, giving_id = %giving.id, amount = giving.amount, "giving recorded");
        Ok(())
    }

    async fn insert(&self, church_id: &str, user_id: &str, input: NewGiving) -> AppResult<Giving> {
        let giving = Self::build(new_id(), church_id, user_id, input);
        self.giving.save(&giving).await?;
        self.credit_project(&giving).await?;
        Ok(giving)
    }

    pub async fn record_giving(&self, ctx: &AccessContext, input: NewGiving) -> AppResult<Giving> {
        let church_id = ctx.church_id()?;
        if !(input.amount > 0.0) {
            return Err(AppError::invalid_field("amount", "Amount must be greater than 0"));
        }
        if input.giving_type.trim().is_empty() {
            return Err(AppError::invalid_field("type", "Giving type is required"));
        }
        if let Some(project_id) = input.project_id.as_deref().filter(|p| !p.is_empty()) {
            if self.tenant_project(church_id, project_id).await?.is_none() {
                return Err(AppError::not_found("Project"));
            }
        }
        self.insert(church_id, ctx.user_id(), input).await
    }

    /// The caller's own giving, newest first, optionally of one type
    pub async fn history(&self, ctx: &AccessContext, giving_type: Option<&str>, limit: usize) -> AppResult<GivingHistory> {
        let all = self
            .giving
            .find_many(Query::new().filter("userId", ctx.user_id()).newest_first())
            .await?;

        let mut by_type: BTreeMap<String, f64> = BTreeMap::new();
        for g in &all {
            *by_type.entry(g.giving_type.clone()).or_default() += g.amount;
        }
        let summary_total = all.iter().map(|g| g.amount).sum();
        let streak = giving_streak(all.iter().map(|g| g.created_at), Utc::now().date_naive());

        let giving: Vec<Giving> = all
            .into_iter()
            .filter(|g| giving_type.map_or(true, |t| g.giving_type == t))
            .take(limit)
            .collect();
        Ok(GivingHistory {
            summary: GivingSummary {
                total_amount: summary_total,
                total_donations: giving.len(),
                by_type,
                streak,
            },
            giving,
        })
    }

    /// Every gift in the current church
    pub async fn church_giving(&self, ctx: &AccessContext) -> AppResult<Vec<Giving>> {
        ctx.require(Permission::ManageGiving)?;
        Ok(self
            .giving
            .find_many(Query::church(ctx.church_id()?).newest_first())
            .await?)
    }

    pub async fn list_projects(&self, ctx: &AccessContext) -> AppResult<Vec<ProjectProgress>> {
        let projects = self
            .projects
            .find_many(
                Query::church(ctx.church_id()?)
                    .filter("status", "Active")
                    .newest_first(),
            )
            .await?;
        Ok(projects
            .into_iter()
            .map(|project| ProjectProgress {
                progress: project.progress(),
                remaining_amount: project.remaining(),
                project,
            })
            .collect())
    }

    pub async fn create_project(&self, ctx: &AccessContext, input: NewProject) -> AppResult<GivingProject> {
        ctx.require(Permission::ManageGiving)?;
        let church_id = ctx.church_id()?;
        let name = input.name.trim();
        if name.is_empty() {
            return Err(AppError::invalid_field("name", "Project name is required"));
        }
        if input.goal_amount < 0.0 {
            return Err(AppError::invalid_field("goalAmount", "Goal amount cannot be negative"));
        }
        let now = Utc::now();
        let project = GivingProject {
            id: new_id(),
            church_id: church_id.to_string(),
            name: name.to_string(),
            description: input.description.filter(|d| !d.trim().is_empty()),
            currency: input.currency.map(|c| c.trim().to_uppercase()).filter(|c| !c.is_empty()),
            goal_amount: input.goal_amount,
            current_amount: 0.0,
            status: ProjectStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.projects.save(&project).await?;
        tracing::info!(church_id = %church_id, project_id = %project.id, "giving project created");
        Ok(project)
    }

    /// Check the `verif-hash` header against the configured secret
    pub fn verify_webhook_signature(&self, signature: Option<&str>) -> AppResult<()> {
        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::bad_request("Missing signature"))?;
        let valid = self
            .webhook_secret
            .as_deref()
            .is_some_and(|secret| secrets_match(signature, secret));
        if !valid {
            tracing::warn!("flutterwave webhook with invalid signature");
            return Err(AppError::Unauthorized {
                message: "Invalid signature".to_string(),
            });
        }
        Ok(())
    }

    /// Record successful charges; everything else is acknowledged and ignored
    pub async fn handle_flutterwave(&self, signature: Option<&str>, payload: Value) -> AppResult<WebhookOutcome> {
        self.verify_webhook_signature(signature)?;

        let event = payload.get("event").and_then(Value::as_str).unwrap_or_default();
        if event != "charge.completed" {
            tracing::debug!(event = %event, "flutterwave event ignored");
            return Ok(WebhookOutcome::Ignored);
        }
        let Some(data) = payload
            .get("data")
            .cloned()
            .and_then(|d| serde_json::from_value::<ChargeData>(d).ok())
        else {
            tracing::warn!("flutterwave charge without usable data");
            return Ok(WebhookOutcome::Ignored);
        };
        if data.status != "successful" {
            return Ok(WebhookOutcome::Ignored);
        }
        let meta = data.meta.unwrap_or_default();
        let (Some(user_id), Some(giving_type)) = (meta.user_id, meta.giving_type) else {
            return Ok(WebhookOutcome::Ignored);
        };

        let transaction_id = match &data.id {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return Ok(WebhookOutcome::Ignored),
        };
        if let Some(existing) = self
            .giving
            .find_one(Query::new().filter("transactionId", transaction_id.as_str()))
            .await?
        {
            tracing::info!(transaction_id = %transaction_id, "flutterwave replay");
            return Ok(WebhookOutcome::Duplicate(existing));
        }

        let Some(church_id) = self
            .users
            .find_by_id(&user_id)
            .await?
            .and_then(|u| u.church_id)
        else {
            tracing::warn!(user_id = %user_id, "flutterwave charge for unknown user");
            return Ok(WebhookOutcome::Ignored);
        };
        let project_id = match meta.project_id.filter(|p| !p.is_empty()) {
            Some(id) => self.tenant_project(&church_id, &id).await?.map(|p| p.id),
            None => None,
        };

        let giving = Self::build(
            webhook_giving_id(&transaction_id),
            &church_id,
            &user_id,
            NewGiving {
                amount: data.amount,
                giving_type,
                project_id,
                payment_method: Some("Card".to_string()),
                transaction_id: Some(transaction_id),
                notes: meta.notes,
            },
        );
        // Concurrent deliveries race on the document id; only the winner credits the project
        if !self.giving.create(&giving).await? {
            let existing = self
                .giving
                .find_by_id(&giving.id)
                .await?
                .ok_or_else(|| AppError::internal("Webhook gift vanished after conflict"))?;
            tracing::info!(giving_id = %existing.id, "flutterwave replay");
            return Ok(WebhookOutcome::Duplicate(existing));
        }
        self.credit_project(&giving).await?;
        Ok(WebhookOutcome::Recorded(giving))
    }
}

/// Document id for a webhook gift, one per Flutterwave transaction
pub fn webhook_giving_id(transaction_id: &str) -> String {
    format!("flw__{}", transaction_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_giving_streak() {
        let today = NaiveDate::from_ymd_opt(2025, 5, 10).unwrap();
        let at = |d: u32| Utc.with_ymd_and_hms(2025, 5, d, 12, 0, 0).unwrap();

        assert_eq!(giving_streak(vec![at(10), at(9), at(9), at(8), at(6)], today), 3);
        assert_eq!(giving_streak(vec![at(9), at(8)], today), 0);
        assert_eq!(giving_streak(Vec::new(), today), 0);
    }

    #[test]
    fn test_secrets_match() {
        assert!(secrets_match("hash-123", "hash-123"));
        assert!(!secrets_match("hash-123", "hash-124"));
        assert!(!secrets_match("", "hash-123"));
    }

    #[test]
    fn test_project_progress() {
        let now = Utc::now();
        let mut project = GivingProject {
            id: "p1".into(),
            church_id: "c1".into(),
            name: "Roof".into(),
            description: None,
            currency: None,
            goal_amount: 1000.0,
            current_amount: 250.0,
            status: ProjectStatus::Active,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(project.progress(), 25.0);
        assert_eq!(project.remaining(), 750.0);

        project.current_amount = 1500.0;
        assert_eq!(project.progress(), 100.0);
        assert_eq!(project.remaining(), 0.0);

        project.goal_amount = 0.0;
        assert_eq!(project.progress(), 0.0);
    }
}
