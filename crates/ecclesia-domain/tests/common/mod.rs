#![allow(dead_code)]

use ecclesia_auth::{GuardOptions, UserRole};
use ecclesia_core::AppConfig;
use ecclesia_domain::tenancy::{ChurchRegistration, MemberRegistration, User};
use ecclesia_domain::{AccessContext, Services};
use ecclesia_store::{DocumentStore, MemoryStore};
use std::sync::Arc;

pub const PASSWORD: &str = "Gr4ce&Truth!";

pub fn services() -> Services {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    Services::new(store, &AppConfig::for_testing())
}

/// A registered church with its ADMIN owner signed in
pub struct Tenant {
    pub services: Services,
    pub church_id: String,
    pub admin: AccessContext,
    pub admin_token: String,
}

pub fn church_registration(email: &str, church_name: &str) -> ChurchRegistration {
    ChurchRegistration {
        first_name: "Ada".to_string(),
        last_name: "Okafor".to_string(),
        email: email.to_string(),
        password: PASSWORD.to_string(),
        church_name: church_name.to_string(),
        city: Some("Lagos".to_string()),
        country: Some("Nigeria".to_string()),
        phone: None,
        estimated_members: Some(120),
        plan_id: None,
    }
}

pub fn member_registration(email: &str) -> MemberRegistration {
    MemberRegistration {
        first_name: "Tunde".to_string(),
        last_name: "Bello".to_string(),
        email: email.to_string(),
        password: PASSWORD.to_string(),
        phone: None,
        branch_id: None,
    }
}

pub async fn tenant() -> Tenant {
    let services = services();
    let registered = services
        .registration
        .register_church(church_registration("ada@grace.org", "Grace Chapel"))
        .await
        .unwrap();
    let admin = services
        .guard
        .authorize(Some(&registered.token), None, &GuardOptions::church())
        .await
        .unwrap();
    Tenant {
        church_id: registered.church.id.clone(),
        admin_token: registered.token,
        admin,
        services,
    }
}

impl Tenant {
    /// Create a user with `role` in this church and sign them in
    pub async fn join(&self, email: &str, role: UserRole) -> (User, AccessContext) {
        self.join_branch(email, role, None).await
    }

    pub async fn join_branch(&self, email: &str, role: UserRole, branch_id: Option<&str>) -> (User, AccessContext) {
        let user = self
            .services
            .registration
            .create_member(&self.church_id, branch_id, role, member_registration(email))
            .await
            .unwrap();
        (user, self.sign_in(email).await)
    }

    /// A fresh session, picking up role changes made since the last one
    pub async fn sign_in(&self, email: &str) -> AccessContext {
        let session = self.services.registration.login(email, PASSWORD).await.unwrap();
        self.services
            .guard
            .authorize(Some(&session.token), None, &GuardOptions::church())
            .await
            .unwrap()
    }
}

/// A second church on the same services
pub async fn other_church(services: &Services, email: &str) -> AccessContext {
    let registered = services
        .registration
        .register_church(church_registration(email, "Other Fellowship"))
        .await
        .unwrap();
    services
        .guard
        .authorize(Some(&registered.token), None, &GuardOptions::church())
        .await
        .unwrap()
}
