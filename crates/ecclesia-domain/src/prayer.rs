//! Prayer wall: requests, prayers and answered testimonies

use crate::access::AccessContext;
use crate::tenancy::User;
use chrono::{DateTime, Utc};
use ecclesia_auth::{has_permission, Permission};
use ecclesia_core::{new_id, AppError, AppResult};
use ecclesia_store::{DocumentStore, Query, Repository};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

const LIST_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrayerStatus {
    #[default]
    Active,
    Answered,
    Archived,
}

impl PrayerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrayerStatus::Active => "ACTIVE",
            PrayerStatus::Answered => "ANSWERED",
            PrayerStatus::Archived => "ARCHIVED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrayerRequest {
    pub id: String,
    pub church_id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub status: PrayerStatus,
    pub is_anonymous: bool,
    pub prayer_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(PrayerRequest, "prayerRequests");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionType {
    Prayed,
}

/// One per user and request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrayerInteraction {
    pub id: String,
    pub church_id: String,
    pub request_id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub interaction_type: InteractionType,
    pub created_at: DateTime<Utc>,
}

document!(PrayerInteraction, "prayerInteractions");

impl PrayerInteraction {
    pub fn key(request_id: &str, user_id: &str) -> String {
        format!("{}__{}", request_id, user_id)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
}

/// A request as shown on the prayer wall
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrayerListing {
    #[serde(flatten)]
    pub request: PrayerRequest,
    /// Omitted for anonymous requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Author>,
    pub has_prayed: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPrayerRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_anonymous: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrayOutcome {
    pub prayer_count: u64,
    /// False when the caller had already prayed
    pub counted: bool,
}

#[derive(Clone)]
pub struct PrayerService {
    requests: Repository<PrayerRequest>,
    interactions: Repository<PrayerInteraction>,
    users: Repository<User>,
}

impl PrayerService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            requests: Repository::new(Arc::clone(&store)),
            interactions: Repository::new(Arc::clone(&store)),
            users: Repository::new(store),
        }
    }

    pub async fn create(&self, ctx: &AccessContext, input: NewPrayerRequest) -> AppResult<PrayerRequest> {
        let church_id = ctx.church_id()?;
        let title = input.title.trim();
        let content = input.content.trim();
        if title.is_empty() || content.is_empty() {
            return Err(AppError::bad_request("Title and content are required"));
        }
        let now = Utc::now();
        let request = PrayerRequest {
            id: new_id(),
            church_id: church_id.to_string(),
            user_id: ctx.user_id().to_string(),
            title: title.to_string(),
            content: content.to_string(),
            status: PrayerStatus::Active,
            is_anonymous: input.is_anonymous,
            prayer_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.requests.save(&request).await?;
        tracing::info!(church_id = %church_id, request_id = %request.id, "prayer request created");
        Ok(request)
    }

    pub async fn list(&self, ctx: &AccessContext, status: Option<PrayerStatus>) -> AppResult<Vec<PrayerListing>> {
        let mut query = Query::church(ctx.church_id()?);
        if let Some(status) = status {
            query = query.filter("status", status.as_str());
        }
        let requests = self
            .requests
            .find_many(query.newest_first().limit(LIST_LIMIT))
            .await?;

        let prayed: HashSet<String> = self
            .interactions
            .find_many(Query::new().filter("userId", ctx.user_id()))
            .await?
            .into_iter()
            .map(|i| i.request_id)
            .collect();

        let mut listings = Vec::with_capacity(requests.len());
        for request in requests {
            let user = if request.is_anonymous {
                None
            } else {
                self.users.find_by_id(&request.user_id).await?.map(|u| Author {
                    id: u.id,
                    first_name: u.first_name,
                    last_name: u.last_name,
                })
            };
            listings.push(PrayerListing {
                has_prayed: prayed.contains(&request.id),
                user,
                request,
            });
        }
        Ok(listings)
    }

    async fn tenant_request(&self, ctx: &AccessContext, request_id: &str) -> AppResult<PrayerRequest> {
        let church_id = ctx.church_id()?;
        self.requests
            .find_by_id(request_id)
            .await?
            .filter(|r| r.church_id == church_id)
            .ok_or_else(|| AppError::not_found("Prayer request"))
    }

    /// Count the caller's prayer once per request
    pub async fn pray(&self, ctx: &AccessContext, request_id: &str) -> AppResult<PrayOutcome> {
        let request = self.tenant_request(ctx, request_id).await?;
        let interaction = PrayerInteraction {
            id: PrayerInteraction::key(&request.id, ctx.user_id()),
            church_id: request.church_id.clone(),
            request_id: request.id.clone(),
            user_id: ctx.user_id().to_string(),
            interaction_type: InteractionType::Prayed,
            created_at: Utc::now(),
        };
        if !self.interactions.create(&interaction).await? {
            return Ok(PrayOutcome {
                prayer_count: request.prayer_count,
                counted: false,
            });
        }
        let count = self
            .requests
            .increment(&request.id, "prayerCount", 1.0)
            .await?
            .map(|c| c.max(0.0) as u64)
            .unwrap_or(request.prayer_count + 1);
        Ok(PrayOutcome {
            prayer_count: count,
            counted: true,
        })
    }

    /// Authors and testimony moderators may change a request's status
    pub async fn set_status(&self, ctx: &AccessContext, request_id: &str, status: PrayerStatus) -> AppResult<PrayerRequest> {
        let mut request = self.tenant_request(ctx, request_id).await?;
        let moderator = has_permission(ctx.role(), Permission::ApproveTestimonies);
        if request.user_id != ctx.user_id() && !moderator {
            return Err(AppError::insufficient_permissions());
        }
        request.status = status;
        request.updated_at = Utc::now();
        self.requests.save(&request).await?;
        tracing::info!(request_id = %request.id, status = status.as_str(), "prayer request status changed");
        Ok(request)
    }
}
