use crate::access::AccessContext;
use chrono::{DateTime, Utc};
use ecclesia_auth::Permission;
use ecclesia_core::{slugify, AppError, AppResult};
use ecclesia_store::{DocumentStore, Query, Repository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Church {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(Church, "churches");

impl Church {
    pub fn new(id: impl Into<String>, name: impl Into<String>, slug: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            slug: slug.into(),
            description: None,
            email: None,
            phone: None,
            address: None,
            city: None,
            state: None,
            country: None,
            website: None,
            logo_url: None,
            primary_color: None,
            owner_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Editable church settings; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChurchUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub website: Option<String>,
    pub logo_url: Option<String>,
    pub primary_color: Option<String>,
}

#[derive(Clone)]
pub struct ChurchService {
    churches: Repository<Church>,
}

impl ChurchService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            churches: Repository::new(store),
        }
    }

    pub async fn find(&self, id: &str) -> AppResult<Option<Church>> {
        Ok(self.churches.find_by_id(id).await?)
    }

    pub async fn get(&self, id: &str) -> AppResult<Church> {
        self.find(id)
            .await?
            .ok_or_else(|| AppError::not_found("Church"))
    }

    pub async fn find_by_slug(&self, slug: &str) -> AppResult<Option<Church>> {
        Ok(self
            .churches
            .find_one(Query::new().filter("slug", slug))
            .await?)
    }

    /// Slug for `name` that no other church uses, suffixed `-1`, `-2`, ...
    pub async fn unique_slug(&self, name: &str) -> AppResult<String> {
        let base = match slugify(name) {
            s if s.is_empty() => "church".to_string(),
            s => s,
        };
        let mut slug = base.clone();
        let mut counter = 1;
        while self.find_by_slug(&slug).await?.is_some() {
            slug = format!("{}-{}", base, counter);
            counter += 1;
        }
        Ok(slug)
    }

    pub async fn save(&self, church: &Church) -> AppResult<()> {
        Ok(self.churches.save(church).await?)
    }

    /// All churches, newest first
    pub async fn list(&self) -> AppResult<Vec<Church>> {
        Ok(self.churches.find_many(Query::new().newest_first()).await?)
    }

    /// Update settings of the caller's current church
    pub async fn update(&self, ctx: &AccessContext, update: ChurchUpdate) -> AppResult<Church> {
        ctx.require(Permission::ManageChurchSettings)?;
        let mut church = self.get(ctx.church_id()?).await?;

        if let Some(name) = update.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(AppError::bad_request("Church name is required"));
            }
            church.name = name;
        }
        let fields = [
            (&mut church.description, update.description),
            (&mut church.email, update.email),
            (&mut church.phone, update.phone),
            (&mut church.address, update.address),
            (&mut church.city, update.city),
            (&mut church.state, update.state),
            (&mut church.country, update.country),
            (&mut church.website, update.website),
            (&mut church.logo_url, update.logo_url),
            (&mut church.primary_color, update.primary_color),
        ];
        for (target, value) in fields {
            if let Some(value) = value {
                *target = Some(value).filter(|v| !v.trim().is_empty());
            }
        }
        church.updated_at = Utc::now();

        self.churches.save(&church).await?;
        tracing::info!(church_id = %church.id, "church settings updated");
        Ok(church)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecclesia_store::MemoryStore;

    #[tokio::test]
    async fn test_unique_slug_appends_counter() {
        let service = ChurchService::new(Arc::new(MemoryStore::new()));
        service
            .save(&Church::new("c1", "Grace Chapel", "grace-chapel"))
            .await
            .unwrap();
        service
            .save(&Church::new("c2", "Grace Chapel", "grace-chapel-1"))
            .await
            .unwrap();

        assert_eq!(service.unique_slug("Grace Chapel").await.unwrap(), "grace-chapel-2");
        assert_eq!(service.unique_slug("New Life").await.unwrap(), "new-life");
        assert_eq!(service.unique_slug("!!!").await.unwrap(), "church");
    }

    #[tokio::test]
    async fn test_get_missing_church() {
        let service = ChurchService::new(Arc::new(MemoryStore::new()));
        let err = service.get("nope").await.unwrap_err();
        assert_eq!(err.to_string(), "Church not found");
    }
}
