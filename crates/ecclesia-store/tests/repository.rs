//! Typed repository behaviour against the in-memory backend

use ecclesia_store::{Direction, Document, DocumentStore, MemoryStore, Query, Repository, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Member {
    id: String,
    church_id: String,
    name: String,
    visits: u32,
    branch_id: Option<String>,
}

impl Document for Member {
    const COLLECTION: &'static str = "members";

    fn id(&self) -> &str {
        &self.id
    }
}

fn member(id: &str, church: &str, visits: u32) -> Member {
    Member {
        id: id.to_string(),
        church_id: church.to_string(),
        name: format!("Member {}", id),
        visits,
        branch_id: None,
    }
}

fn repository() -> Repository<Member> {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    Repository::new(store)
}

#[tokio::test]
async fn test_save_and_find() {
    let repo = repository();
    let ada = member("m1", "c1", 3);
    repo.save(&ada).await.unwrap();

    assert_eq!(repo.find_by_id("m1").await.unwrap(), Some(ada.clone()));
    assert_eq!(repo.get("m1").await.unwrap(), ada);
    assert!(matches!(
        repo.get("missing").await,
        Err(StoreError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_tenant_scoped_queries() {
    let repo = repository();
    repo.save(&member("m1", "c1", 3)).await.unwrap();
    repo.save(&member("m2", "c1", 7)).await.unwrap();
    repo.save(&member("m3", "c2", 1)).await.unwrap();

    let in_c1 = repo
        .find_many(Query::church("c1").order_by("visits", Direction::Desc))
        .await
        .unwrap();
    assert_eq!(
        in_c1.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(),
        vec!["m2", "m1"]
    );
    assert_eq!(repo.count(Query::church("c2")).await.unwrap(), 1);

    // Unset optional fields serialize as null and match a null filter
    let without_branch = repo
        .count(Query::church("c1").filter("branchId", serde_json::Value::Null))
        .await
        .unwrap();
    assert_eq!(without_branch, 2);
}

#[tokio::test]
async fn test_create_is_idempotent() {
    let repo = repository();
    assert!(repo.create(&member("m1", "c1", 0)).await.unwrap());
    assert!(!repo.create(&member("m1", "c1", 9)).await.unwrap());
    assert_eq!(repo.get("m1").await.unwrap().visits, 0);
}

#[tokio::test]
async fn test_increment_round_trips_into_integer_field() {
    let repo = repository();
    repo.save(&member("m1", "c1", 1)).await.unwrap();

    repo.increment("m1", "visits", 2.0).await.unwrap();
    assert_eq!(repo.get("m1").await.unwrap().visits, 3);
}

#[tokio::test]
async fn test_find_one_and_delete() {
    let repo = repository();
    repo.save(&member("m1", "c1", 1)).await.unwrap();

    let found = repo.find_one(Query::church("c1")).await.unwrap();
    assert_eq!(found.map(|m| m.id), Some("m1".to_string()));

    assert!(repo.delete("m1").await.unwrap());
    assert!(repo.find_one(Query::church("c1")).await.unwrap().is_none());
}
