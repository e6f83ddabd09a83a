//! Service and meeting attendance

use crate::access::AccessContext;
use crate::tenancy::{Branch, User};
use chrono::{DateTime, Utc};
use ecclesia_auth::UserRole;
use ecclesia_core::{new_id, AppError, AppResult};
use ecclesia_store::{Direction, DocumentStore, Query, Repository};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

const SESSION_LIST_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionType {
    #[default]
    Service,
    Meeting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceMode {
    #[default]
    Offline,
    Online,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    #[default]
    Offline,
    Online,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Offline => "OFFLINE",
            Channel::Online => "ONLINE",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Headcount {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub men: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub women: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_timers: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSession {
    pub id: String,
    pub church_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    pub title: String,
    #[serde(rename = "type")]
    pub session_type: SessionType,
    pub mode: AttendanceMode,
    pub start_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headcount: Option<Headcount>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(AttendanceSession, "attendanceSessions");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub church_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_name: Option<String>,
    pub channel: Channel,
    pub checked_in_at: DateTime<Utc>,
}

document!(AttendanceRecord, "attendanceRecords");

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub session_type: SessionType,
    #[serde(default)]
    pub mode: AttendanceMode,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub branch_id: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckIn {
    /// Defaults to the caller
    pub user_id: Option<String>,
    pub guest_name: Option<String>,
    pub channel: Option<Channel>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub session: AttendanceSession,
    pub total_records: usize,
    pub members: usize,
    pub guests: usize,
    pub by_channel: BTreeMap<&'static str, usize>,
}

/// Count records per check-in channel, listing both channels
pub fn count_by_channel(records: &[AttendanceRecord]) -> BTreeMap<&'static str, usize> {
    let mut counts: BTreeMap<&'static str, usize> = [Channel::Offline, Channel::Online]
        .iter()
        .map(|c| (c.as_str(), 0))
        .collect();
    for record in records {
        *counts.entry(record.channel.as_str()).or_default() += 1;
    }
    counts
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[derive(Clone)]
pub struct AttendanceService {
    sessions: Repository<AttendanceSession>,
    records: Repository<AttendanceRecord>,
    branches: Repository<Branch>,
    users: Repository<User>,
}

impl AttendanceService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            sessions: Repository::new(Arc::clone(&store)),
            records: Repository::new(Arc::clone(&store)),
            branches: Repository::new(Arc::clone(&store)),
            users: Repository::new(store),
        }
    }

    /// Branch admins only act on sessions of their own branch
    fn check_branch(ctx: &AccessContext, session: &AttendanceSession) -> AppResult<()> {
        if ctx.role() == UserRole::BranchAdmin
            && session.branch_id.is_some()
            && session.branch_id != ctx.user.branch_id
        {
            return Err(AppError::forbidden("Session belongs to another branch"));
        }
        Ok(())
    }

    pub async fn create_session(&self, ctx: &AccessContext, input: NewSession) -> AppResult<AttendanceSession> {
        ctx.require_role(&UserRole::MANAGERS)?;
        let church_id = ctx.church_id()?;
        let title = input.title.trim();
        if title.is_empty() {
            return Err(AppError::invalid_field("title", "Title is required"));
        }
        if input.end_at.is_some_and(|end| end < input.start_at) {
            return Err(AppError::invalid_field("endAt", "End time must be after start time"));
        }

        let mut branch_id = non_empty(input.branch_id);
        if ctx.role() == UserRole::BranchAdmin {
            match (&branch_id, &ctx.user.branch_id) {
                (None, own) => branch_id = own.clone(),
                (Some(requested), Some(own)) if requested == own => {}
                _ => return Err(AppError::forbidden("Branch admins can only create sessions for their branch")),
            }
        }
        if let Some(id) = branch_id.as_deref() {
            let valid = self
                .branches
                .find_by_id(id)
                .await?
                .is_some_and(|b| b.church_id == church_id);
            if !valid {
                return Err(AppError::invalid_field("branchId", "Invalid branch"));
            }
        }

        let now = Utc::now();
        let session = AttendanceSession {
            id: new_id(),
            church_id: church_id.to_string(),
            branch_id,
            title: title.to_string(),
            session_type: input.session_type,
            mode: input.mode,
            start_at: input.start_at,
            end_at: input.end_at,
            location: non_empty(input.location),
            notes: non_empty(input.notes),
            headcount: None,
            created_by: ctx.user_id().to_string(),
            created_at: now,
            updated_at: now,
        };
        self.sessions.save(&session).await?;
        tracing::info!(church_id = %church_id, session_id = %session.id, "attendance session created");
        Ok(session)
    }

    pub async fn list_sessions(&self, ctx: &AccessContext, branch_id: Option<&str>) -> AppResult<Vec<AttendanceSession>> {
        let mut query = Query::church(ctx.church_id()?);
        if let Some(branch_id) = branch_id.filter(|b| !b.is_empty()) {
            query = query.filter("branchId", branch_id);
        }
        Ok(self
            .sessions
            .find_many(
                query
                    .order_by("startAt", Direction::Desc)
                    .limit(SESSION_LIST_LIMIT),
            )
            .await?)
    }

    pub async fn get_session(&self, ctx: &AccessContext, session_id: &str) -> AppResult<AttendanceSession> {
        let church_id = ctx.church_id()?;
        self.sessions
            .find_by_id(session_id)
            .await?
            .filter(|s| s.church_id == church_id)
            .ok_or_else(|| AppError::not_found("Session"))
    }

    /// Check in the caller, another member, or a named guest
    pub async fn check_in(&self, ctx: &AccessContext, session_id: &str, input: CheckIn) -> AppResult<AttendanceRecord> {
        let session = self.get_session(ctx, session_id).await?;
        let guest_name = non_empty(input.guest_name);
        let target = non_empty(input.user_id);
        let on_behalf = guest_name.is_some() || target.as_deref().is_some_and(|t| t != ctx.user_id());
        if on_behalf {
            ctx.require_role(&UserRole::MANAGERS)?;
            Self::check_branch(ctx, &session)?;
        }

        let user_id = match (guest_name.is_some(), target) {
            (true, _) => None,
            (false, Some(user_id)) => Some(user_id),
            (false, None) => Some(ctx.user_id().to_string()),
        };
        if let Some(user_id) = user_id.as_deref() {
            let member = self
                .users
                .find_by_id(user_id)
                .await?
                .is_some_and(|u| u.belongs_to(&session.church_id));
            if !member {
                return Err(AppError::not_found("User"));
            }
            let already = self
                .records
                .find_one(
                    Query::new()
                        .filter("sessionId", session.id.as_str())
                        .filter("userId", user_id),
                )
                .await?;
            if already.is_some() {
                return Err(AppError::bad_request("Already checked in"));
            }
        }

        let channel = input.channel.unwrap_or(match session.mode {
            AttendanceMode::Online => Channel::Online,
            _ => Channel::Offline,
        });
        let record = AttendanceRecord {
            id: new_id(),
            church_id: session.church_id.clone(),
            branch_id: session.branch_id.clone(),
            session_id: session.id.clone(),
            user_id,
            guest_name,
            channel,
            checked_in_at: Utc::now(),
        };
        self.records.save(&record).await?;
        Ok(record)
    }

    pub async fn set_headcount(
        &self,
        ctx: &AccessContext,
        session_id: &str,
        headcount: Headcount,
    ) -> AppResult<AttendanceSession> {
        ctx.require_role(&UserRole::MANAGERS)?;
        let mut session = self.get_session(ctx, session_id).await?;
        Self::check_branch(ctx, &session)?;
        session.headcount = Some(headcount);
        session.updated_at = Utc::now();
        self.sessions.save(&session).await?;
        Ok(session)
    }

    pub async fn session_report(&self, ctx: &AccessContext, session_id: &str) -> AppResult<SessionReport> {
        ctx.require_role(&UserRole::MANAGERS)?;
        let session = self.get_session(ctx, session_id).await?;
        Self::check_branch(ctx, &session)?;
        let records = self
            .records
            .find_many(Query::new().filter("sessionId", session.id.as_str()))
            .await?;
        let members = records.iter().filter(|r| r.user_id.is_some()).count();
        Ok(SessionReport {
            total_records: records.len(),
            members,
            guests: records.len() - members,
            by_channel: count_by_channel(&records),
            session,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(channel: Channel) -> AttendanceRecord {
        AttendanceRecord {
            id: new_id(),
            church_id: "c1".into(),
            branch_id: None,
            session_id: "s1".into(),
            user_id: None,
            guest_name: Some("Guest".into()),
            channel,
            checked_in_at: Utc::now(),
        }
    }

    #[test]
    fn test_count_by_channel() {
        let counts = count_by_channel(&[
            record(Channel::Online),
            record(Channel::Offline),
            record(Channel::Online),
        ]);
        assert_eq!(counts["ONLINE"], 2);
        assert_eq!(counts["OFFLINE"], 1);

        let empty = count_by_channel(&[]);
        assert_eq!(empty.len(), 2);
        assert_eq!(empty["ONLINE"], 0);
    }

    #[test]
    fn test_headcount_wire_format() {
        let headcount: Headcount =
            serde_json::from_value(serde_json::json!({"total": 120, "firstTimers": 4})).unwrap();
        assert_eq!(headcount.total, Some(120));
        assert_eq!(headcount.first_timers, Some(4));
        assert_eq!(headcount.men, None);
    }
}
