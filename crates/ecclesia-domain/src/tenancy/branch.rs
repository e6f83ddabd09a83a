//! Branch hierarchy and branch-admin scope
//!
//! Branches form a fixed four-level tree `REGION -> STATE -> ZONE -> BRANCH`.
//! A BRANCH_ADMIN sees the subtrees rooted at their assigned branches.

use crate::access::AccessContext;
use crate::tenancy::user::User;
use chrono::{DateTime, Utc};
use ecclesia_auth::UserRole;
use ecclesia_core::{new_id, slugify, AppError, AppResult};
use ecclesia_store::{DocumentStore, Query, Repository};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BranchLevel {
    Region,
    State,
    Zone,
    Branch,
}

impl BranchLevel {
    pub const ROOT: BranchLevel = BranchLevel::Region;

    /// Level that children of this level must have
    pub fn child(&self) -> Option<BranchLevel> {
        match self {
            BranchLevel::Region => Some(BranchLevel::State),
            BranchLevel::State => Some(BranchLevel::Zone),
            BranchLevel::Zone => Some(BranchLevel::Branch),
            BranchLevel::Branch => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BranchLevel::Region => "REGION",
            BranchLevel::State => "STATE",
            BranchLevel::Zone => "ZONE",
            BranchLevel::Branch => "BRANCH",
        }
    }

    /// Default display label
    pub fn label(&self) -> &'static str {
        match self {
            BranchLevel::Region => "Headquarters",
            BranchLevel::State => "Region",
            BranchLevel::Zone => "State",
            BranchLevel::Branch => "Branch",
        }
    }

    pub fn parse(value: &str) -> Option<BranchLevel> {
        match value.trim().to_uppercase().as_str() {
            "REGION" => Some(BranchLevel::Region),
            "STATE" => Some(BranchLevel::State),
            "ZONE" => Some(BranchLevel::Zone),
            "BRANCH" => Some(BranchLevel::Branch),
            _ => None,
        }
    }
}

impl fmt::Display for BranchLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: String,
    pub church_id: String,
    pub name: String,
    pub slug: String,
    pub level: BranchLevel,
    pub level_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_branch_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(Branch, "branches");

/// Assignment of a user as administrator of a branch subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchAdmin {
    /// `{branchId}__{userId}`
    pub id: String,
    pub church_id: String,
    pub branch_id: String,
    pub user_id: String,
    pub can_manage_members: bool,
    pub can_manage_events: bool,
    pub can_manage_groups: bool,
    pub can_manage_giving: bool,
    pub can_manage_sermons: bool,
    pub assigned_by: String,
    pub assigned_at: DateTime<Utc>,
}

document!(BranchAdmin, "branchAdmins");

impl BranchAdmin {
    /// Members, events and groups; no giving or sermons
    pub fn with_defaults(church_id: &str, branch_id: &str, user_id: &str, assigned_by: &str) -> Self {
        Self {
            id: format!("{}__{}", branch_id, user_id),
            church_id: church_id.to_string(),
            branch_id: branch_id.to_string(),
            user_id: user_id.to_string(),
            can_manage_members: true,
            can_manage_events: true,
            can_manage_groups: true,
            can_manage_giving: false,
            can_manage_sermons: false,
            assigned_by: assigned_by.to_string(),
            assigned_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBranch {
    #[serde(default)]
    pub name: String,
    pub level: Option<String>,
    pub level_label: Option<String>,
    pub parent_branch_id: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub admin_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchAdminInput {
    #[serde(default)]
    pub user_id: String,
    pub can_manage_members: Option<bool>,
    pub can_manage_events: Option<bool>,
    pub can_manage_groups: Option<bool>,
    pub can_manage_giving: Option<bool>,
    pub can_manage_sermons: Option<bool>,
}

/// Branches of a church plus the subset a user may access
#[derive(Debug, Clone, Default)]
pub struct BranchScope {
    pub branches: HashMap<String, Branch>,
    /// `None` means unrestricted
    pub scope: Option<HashSet<String>>,
}

impl BranchScope {
    pub fn is_unrestricted(&self) -> bool {
        self.scope.is_none()
    }

    /// Known branch inside the scope. An empty scope admits nothing.
    pub fn allows(&self, branch_id: &str) -> bool {
        has_branch_access(self, branch_id)
    }

    /// Whether a record tagged with `branch_id` is visible
    pub fn covers(&self, branch_id: Option<&str>) -> bool {
        match (&self.scope, branch_id) {
            (None, _) => true,
            (Some(scope), Some(id)) => scope.contains(id),
            (Some(_), None) => false,
        }
    }
}

pub fn has_branch_access(scope: &BranchScope, branch_id: &str) -> bool {
    if !scope.branches.contains_key(branch_id) {
        return false;
    }
    match &scope.scope {
        None => true,
        Some(ids) => !ids.is_empty() && ids.contains(branch_id),
    }
}

/// Breadth-first closure of `roots` over the parent links
pub fn descendant_branch_ids<'a, I>(branches: I, roots: &[String]) -> HashSet<String>
where
    I: IntoIterator<Item = &'a Branch>,
{
    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    for branch in branches {
        if let Some(parent) = branch.parent_branch_id.as_deref() {
            children.entry(parent).or_default().push(branch.id.as_str());
        }
    }

    let mut accessible: HashSet<String> = roots.iter().cloned().collect();
    let mut queue: VecDeque<String> = roots.iter().cloned().collect();
    while let Some(current) = queue.pop_front() {
        for child in children.get(current.as_str()).into_iter().flatten() {
            if accessible.insert(child.to_string()) {
                queue.push_back(child.to_string());
            }
        }
    }
    accessible
}

/// SUPER_ADMIN anywhere, ADMIN in their own church
pub fn has_global_church_access(user: &User, church_id: &str) -> bool {
    user.role == UserRole::SuperAdmin || (user.role == UserRole::Admin && user.belongs_to(church_id))
}

#[derive(Clone)]
pub struct BranchService {
    branches: Repository<Branch>,
    admins: Repository<BranchAdmin>,
    users: Repository<User>,
}

impl BranchService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            branches: Repository::new(Arc::clone(&store)),
            admins: Repository::new(Arc::clone(&store)),
            users: Repository::new(store),
        }
    }

    pub async fn find(&self, id: &str) -> AppResult<Option<Branch>> {
        Ok(self.branches.find_by_id(id).await?)
    }

    pub async fn list_for_church(&self, church_id: &str) -> AppResult<Vec<Branch>> {
        Ok(self.branches.find_many(Query::church(church_id)).await?)
    }

    pub async fn resolve_branch_scope(&self, church_id: &str, user: &User) -> AppResult<BranchScope> {
        let branches: HashMap<String, Branch> = self
            .branches
            .find_many(Query::church(church_id))
            .await?
            .into_iter()
            .map(|b| (b.id.clone(), b))
            .collect();

        if has_global_church_access(user, church_id) || user.role != UserRole::BranchAdmin {
            return Ok(BranchScope {
                branches,
                scope: None,
            });
        }

        let mut roots: Vec<String> = self
            .admins
            .find_many(Query::new().filter("userId", user.id.as_str()))
            .await?
            .into_iter()
            .map(|a| a.branch_id)
            .filter(|id| branches.contains_key(id))
            .collect();
        if roots.is_empty() {
            if let Some(own) = user.branch_id.as_ref().filter(|id| branches.contains_key(*id)) {
                roots.push(own.clone());
            }
        }

        let scope = if roots.is_empty() {
            HashSet::new()
        } else {
            descendant_branch_ids(branches.values(), &roots)
        };
        Ok(BranchScope {
            branches,
            scope: Some(scope),
        })
    }

    /// Branches of the current church visible to the caller, by name
    pub async fn list(&self, ctx: &AccessContext) -> AppResult<Vec<Branch>> {
        let scope = self
            .resolve_branch_scope(ctx.church_id()?, &ctx.user)
            .await?;
        let mut visible: Vec<Branch> = scope
            .branches
            .values()
            .filter(|b| scope.covers(Some(&b.id)))
            .cloned()
            .collect();
        visible.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(visible)
    }

    pub async fn create(&self, ctx: &AccessContext, input: NewBranch) -> AppResult<Branch> {
        let church_id = ctx.church_id()?;
        let scope = self.resolve_branch_scope(church_id, &ctx.user).await?;
        let global = has_global_church_access(&ctx.user, church_id);

        let requested = match input.level.as_deref().filter(|l| !l.trim().is_empty()) {
            Some(raw) => Some(
                BranchLevel::parse(raw)
                    .ok_or_else(|| AppError::bad_request(format!("Invalid branch level: {}", raw)))?,
            ),
            None => None,
        };
        let parent_id = input
            .parent_branch_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());

        let level = match parent_id {
            Some(parent_id) => {
                let parent = scope
                    .branches
                    .get(parent_id)
                    .ok_or_else(|| AppError::not_found("Parent branch"))?;
                let expected = parent.level.child().ok_or_else(|| {
                    AppError::bad_request(format!(
                        "{} branches cannot have further children",
                        parent.level_label
                    ))
                })?;
                if requested.is_some_and(|level| level != expected) {
                    return Err(AppError::bad_request(format!(
                        "Child branches of {} must be created at the {} level",
                        parent.level_label,
                        expected.label()
                    )));
                }
                if !global && !scope.allows(parent_id) {
                    return Err(AppError::forbidden(
                        "You do not have permission to manage this parent branch",
                    ));
                }
                expected
            }
            None => {
                let level = requested.unwrap_or(BranchLevel::ROOT);
                if level != BranchLevel::ROOT {
                    return Err(AppError::bad_request(format!(
                        "Top-level branches must be created at the {} level",
                        BranchLevel::ROOT.label()
                    )));
                }
                if !global {
                    return Err(AppError::forbidden(
                        "Only tenant admins can create regional branches",
                    ));
                }
                level
            }
        };

        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::bad_request("Branch name is required"));
        }
        let level_label = input
            .level_label
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| level.label().to_string());
        if level_label.chars().count() > 60 {
            return Err(AppError::bad_request(
                "Level label must be 60 characters or fewer",
            ));
        }

        let base = slugify(&name);
        let mut slug = base.clone();
        let mut counter = 1;
        while scope.branches.values().any(|b| b.slug == slug) {
            slug = format!("{}-{}", base, counter);
            counter += 1;
        }

        let now = Utc::now();
        let branch = Branch {
            id: new_id(),
            church_id: church_id.to_string(),
            name,
            slug,
            level,
            level_label,
            parent_branch_id: parent_id.map(str::to_string),
            address: input.address,
            city: input.city,
            state: input.state,
            country: input.country,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.branches.save(&branch).await?;
        tracing::info!(church_id = %church_id, branch_id = %branch.id, level = %level, "branch created");

        if let Some(admin_id) = input.admin_id.filter(|id| !id.is_empty()) {
            let assignment = BranchAdminInput {
                user_id: admin_id,
                ..Default::default()
            };
            // Unknown or foreign admins are ignored at creation time
            if let Err(err) = self.assign_admin(ctx, &branch.id, assignment).await {
                tracing::warn!(branch_id = %branch.id, error = %err, "initial branch admin not assigned");
            }
        }
        Ok(branch)
    }

    pub async fn assign_admin(
        &self,
        ctx: &AccessContext,
        branch_id: &str,
        input: BranchAdminInput,
    ) -> AppResult<BranchAdmin> {
        let church_id = ctx.church_id()?;
        let scope = self.resolve_branch_scope(church_id, &ctx.user).await?;
        if !scope.branches.contains_key(branch_id) {
            return Err(AppError::not_found("Branch"));
        }
        if !has_global_church_access(&ctx.user, church_id) && !scope.allows(branch_id) {
            return Err(AppError::forbidden(
                "You do not have permission to assign admins for this branch",
            ));
        }
        if input.user_id.trim().is_empty() {
            return Err(AppError::bad_request("User ID is required"));
        }
        let mut target = match self.users.find_by_id(&input.user_id).await? {
            Some(user) if user.belongs_to(church_id) => user,
            _ => {
                return Err(AppError::bad_request(
                    "User not found or does not belong to this church",
                ))
            }
        };

        let mut assignment = BranchAdmin::with_defaults(church_id, branch_id, &target.id, ctx.user_id());
        assignment.can_manage_members = input.can_manage_members.unwrap_or(assignment.can_manage_members);
        assignment.can_manage_events = input.can_manage_events.unwrap_or(assignment.can_manage_events);
        assignment.can_manage_groups = input.can_manage_groups.unwrap_or(assignment.can_manage_groups);
        assignment.can_manage_giving = input.can_manage_giving.unwrap_or(assignment.can_manage_giving);
        assignment.can_manage_sermons = input.can_manage_sermons.unwrap_or(assignment.can_manage_sermons);
        self.admins.save(&assignment).await?;

        if !matches!(target.role, UserRole::Admin | UserRole::SuperAdmin) {
            target.role = UserRole::BranchAdmin;
            target.updated_at = Utc::now();
            self.users.save(&target).await?;
        }
        tracing::info!(branch_id = %branch_id, user_id = %target.id, "branch admin assigned");
        Ok(assignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch(id: &str, parent: Option<&str>, level: BranchLevel) -> Branch {
        let now = Utc::now();
        Branch {
            id: id.to_string(),
            church_id: "c1".to_string(),
            name: id.to_string(),
            slug: id.to_string(),
            level,
            level_label: level.label().to_string(),
            parent_branch_id: parent.map(str::to_string),
            address: None,
            city: None,
            state: None,
            country: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_level_chain() {
        assert_eq!(BranchLevel::Region.child(), Some(BranchLevel::State));
        assert_eq!(BranchLevel::Zone.child(), Some(BranchLevel::Branch));
        assert_eq!(BranchLevel::Branch.child(), None);
        assert_eq!(BranchLevel::parse("zone"), Some(BranchLevel::Zone));
        assert_eq!(BranchLevel::parse("district"), None);
    }

    #[test]
    fn test_descendants_are_breadth_first_closure() {
        let branches = vec![
            branch("r", None, BranchLevel::Region),
            branch("s1", Some("r"), BranchLevel::State),
            branch("s2", Some("r"), BranchLevel::State),
            branch("z1", Some("s1"), BranchLevel::Zone),
            branch("b1", Some("z1"), BranchLevel::Branch),
            branch("other", None, BranchLevel::Region),
        ];
        let ids = descendant_branch_ids(&branches, &["s1".to_string()]);
        let mut ids: Vec<_> = ids.into_iter().collect();
        ids.sort();
        assert_eq!(ids, vec!["b1", "s1", "z1"]);
    }

    #[test]
    fn test_branch_access() {
        let branches: HashMap<String, Branch> = [
            branch("r", None, BranchLevel::Region),
            branch("s1", Some("r"), BranchLevel::State),
        ]
        .into_iter()
        .map(|b| (b.id.clone(), b))
        .collect();

        let open = BranchScope {
            branches: branches.clone(),
            scope: None,
        };
        assert!(has_branch_access(&open, "s1"));
        assert!(!has_branch_access(&open, "unknown"));

        let empty = BranchScope {
            branches: branches.clone(),
            scope: Some(HashSet::new()),
        };
        assert!(!has_branch_access(&empty, "s1"));

        let limited = BranchScope {
            branches,
            scope: Some(["s1".to_string()].into_iter().collect()),
        };
        assert!(has_branch_access(&limited, "s1"));
        assert!(!has_branch_access(&limited, "r"));
        assert!(limited.covers(Some("s1")));
        assert!(!limited.covers(None));
    }
}
