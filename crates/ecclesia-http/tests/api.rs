use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use ecclesia_core::AppConfig;
use ecclesia_domain::Services;
use ecclesia_http::{build_app, AppState};
use ecclesia_store::{DocumentStore, MemoryStore};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const PASSWORD: &str = "Gr4ce&Truth!";

struct TestApp {
    router: Router,
    services: Arc<Services>,
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

fn test_app() -> TestApp {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let state = AppState::new(Services::new(store, &AppConfig::for_testing()));
    TestApp {
        services: Arc::clone(&state.services),
        router: build_app(state),
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Reply {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        Reply { status, headers, body }
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    /// Register a church; returns (church id, slug, owner token)
    async fn register_church(&self, email: &str, name: &str) -> (String, String, String) {
        let reply = self
            .call(
                Method::POST,
                "/api/auth/register-church",
                None,
                Some(json!({
                    "firstName": "Ada",
                    "lastName": "Okafor",
                    "email": email,
                    "password": PASSWORD,
                    "churchName": name,
                    "city": "Lagos",
                    "estimatedMembers": 120
                })),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        (
            reply.body["church"]["id"].as_str().unwrap().to_string(),
            reply.body["church"]["slug"].as_str().unwrap().to_string(),
            reply.body["token"].as_str().unwrap().to_string(),
        )
    }

    async fn login(&self, email: &str) -> String {
        let reply = self
            .call(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
        reply.body["token"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let reply = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "healthy");
    assert_eq!(reply.body["environment"], "test");
}

#[tokio::test]
async fn test_register_then_read_current_church() {
    let app = test_app();
    let (church_id, _, token) = app.register_church("ada@grace.org", "Grace Chapel").await;

    let reply = app.call(Method::GET, "/api/churches/current", Some(&token), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["id"], church_id.as_str());
    assert_eq!(reply.body["name"], "Grace Chapel");

    let me = app.call(Method::GET, "/api/users/me", Some(&token), None).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["role"], "ADMIN");
    assert_eq!(me.body["churchName"], "Grace Chapel");
    assert!(me.body.get("passwordHash").is_none());
}

#[tokio::test]
async fn test_missing_token_is_401_with_error_body() {
    let app = test_app();
    let reply = app.call(Method::GET, "/api/users", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["error"]["code"], "UNAUTHORIZED_ACCESS");
    assert!(reply.body["error"]["hint"].is_string());

    let reply = app.call(Method::GET, "/api/users", Some("not-a-jwt"), None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let app = test_app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header("Content-Type", "application/json")
        .body(Body::from("{\"email\": "))
        .unwrap();
    let reply = app.send(request).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_wrong_password_is_401() {
    let app = test_app();
    app.register_church("ada@grace.org", "Grace Chapel").await;
    let reply = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ada@grace.org", "password": "wrong" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_subscription_status_carries_usage_headers() {
    let app = test_app();
    let (_, _, token) = app.register_church("ada@grace.org", "Grace Chapel").await;

    let reply = app
        .call(Method::GET, "/api/churches/current/subscription", Some(&token), None)
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["active"], true);
    assert_eq!(reply.body["status"], "TRIAL");
    for header in ["x-usage-users", "x-usage-groups", "x-usage-storage", "x-usage-api-calls"] {
        assert!(reply.headers.contains_key(header), "missing {}", header);
    }
    assert!(reply.headers["x-usage-users"].to_str().unwrap().starts_with('1'));
}

#[tokio::test]
async fn test_authenticated_calls_are_metered_per_church() {
    let app = test_app();
    let (church_id, _, token) = app.register_church("ada@grace.org", "Grace Chapel").await;

    for _ in 0..2 {
        let reply = app.call(Method::GET, "/api/churches/current", Some(&token), None).await;
        assert_eq!(reply.status, StatusCode::OK);
    }
    let reply = app.call(Method::GET, "/api/churches/current", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = app
        .call(Method::GET, "/api/churches/current/subscription", Some(&token), None)
        .await;
    assert_eq!(reply.headers["x-usage-api-calls"], "3");

    let usage = app.services.subscriptions.usage_stats(&church_id).await.unwrap();
    assert_eq!(usage.api_calls, 3);
}

#[tokio::test]
async fn test_foreign_church_header_is_forbidden() {
    let app = test_app();
    let (_, _, grace_token) = app.register_church("ada@grace.org", "Grace Chapel").await;
    let (other_id, _, _) = app.register_church("joy@hope.org", "Hope Assembly").await;

    let request = Request::builder()
        .uri("/api/churches/current")
        .header("Authorization", format!("Bearer {}", grace_token))
        .header("X-Church-Id", other_id)
        .body(Body::empty())
        .unwrap();
    let reply = app.send(request).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.body["error"]["code"], "ACCESS_FORBIDDEN");
}

#[tokio::test]
async fn test_superadmin_routes_reject_church_admins() {
    let app = test_app();
    let (_, _, token) = app.register_church("ada@grace.org", "Grace Chapel").await;
    let reply = app.call(Method::GET, "/api/superadmin/churches", Some(&token), None).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    app.services
        .registration
        .create_super_admin("root@ecclesia.app", PASSWORD, "Platform", "Owner")
        .await
        .unwrap();
    let root = app.login("root@ecclesia.app").await;
    let reply = app.call(Method::GET, "/api/superadmin/churches", Some(&root), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body.as_array().unwrap().len(), 1);
    assert_eq!(reply.body[0]["church"]["name"], "Grace Chapel");
}

#[tokio::test]
async fn test_user_limit_returns_usage_headers() {
    let app = test_app();
    let (_, slug, _) = app.register_church("ada@grace.org", "Grace Chapel").await;
    app.services
        .registration
        .create_super_admin("root@ecclesia.app", PASSWORD, "Platform", "Owner")
        .await
        .unwrap();
    let root = app.login("root@ecclesia.app").await;

    let reply = app
        .call(
            Method::PATCH,
            "/api/superadmin/plans/starter",
            Some(&root),
            Some(json!({ "limits": { "maxUsers": 1 } })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);

    let reply = app
        .call(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "churchSlug": slug,
                "firstName": "Tunde",
                "lastName": "Bello",
                "email": "tunde@grace.org",
                "password": PASSWORD
            })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.body["error"]["code"], "USAGE_LIMIT_REACHED");
    assert_eq!(reply.body["error"]["limit"], 1.0);
    assert!(reply.headers.contains_key("x-usage-users"));
}

#[tokio::test]
async fn test_church_invite_signup_flow() {
    let app = test_app();
    let (church_id, _, token) = app.register_church("ada@grace.org", "Grace Chapel").await;

    let created = app
        .call(Method::POST, "/api/church-invites", Some(&token), Some(json!({})))
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    let invite_token = created.body["token"].as_str().unwrap().to_string();

    let context = app
        .call(Method::GET, &format!("/api/invite/{}", invite_token), None, None)
        .await;
    assert_eq!(context.status, StatusCode::OK);
    assert_eq!(context.body["church"]["name"], "Grace Chapel");

    let signup = json!({
        "firstName": "Tunde",
        "lastName": "Bello",
        "email": "tunde@grace.org",
        "password": PASSWORD
    });
    let accepted = app
        .call(
            Method::POST,
            &format!("/api/invite/{}/accept", invite_token),
            None,
            Some(signup.clone()),
        )
        .await;
    assert_eq!(accepted.status, StatusCode::CREATED, "{}", accepted.body);
    assert_eq!(accepted.body["churchId"], church_id.as_str());
    assert_eq!(accepted.body["role"], "MEMBER");

    let reused = app
        .call(Method::POST, &format!("/api/invite/{}/accept", invite_token), None, Some(signup))
        .await;
    assert_eq!(reused.status, StatusCode::CONFLICT);

    let member = app.login("tunde@grace.org").await;
    let reply = app.call(Method::GET, "/api/church-invites", Some(&member), None).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_prayer_is_counted_once_per_user() {
    let app = test_app();
    let (_, _, token) = app.register_church("ada@grace.org", "Grace Chapel").await;

    let created = app
        .call(
            Method::POST,
            "/api/prayer/requests",
            Some(&token),
            Some(json!({ "title": "Healing", "content": "For my mother", "isAnonymous": true })),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let id = created.body["id"].as_str().unwrap().to_string();

    let uri = format!("/api/prayer/requests/{}/pray", id);
    let first = app.call(Method::POST, &uri, Some(&token), None).await;
    assert_eq!(first.body["prayerCount"], 1);
    assert_eq!(first.body["counted"], true);
    let second = app.call(Method::POST, &uri, Some(&token), None).await;
    assert_eq!(second.body["prayerCount"], 1);
    assert_eq!(second.body["counted"], false);

    let listed = app.call(Method::GET, "/api/prayer/requests", Some(&token), None).await;
    assert_eq!(listed.body[0]["hasPrayed"], true);
    assert!(listed.body[0].get("user").is_none());

    let filtered = app
        .call(Method::GET, "/api/prayer/requests?status=ANSWERED", Some(&token), None)
        .await;
    assert_eq!(filtered.body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_flutterwave_webhook_signature() {
    let app = test_app();
    let payload = json!({ "event": "transfer.completed", "data": {} });

    let reply = app
        .call(Method::POST, "/api/webhooks/flutterwave", None, Some(payload.clone()))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let signed = |hash: &str| {
        Request::builder()
            .method(Method::POST)
            .uri("/api/webhooks/flutterwave")
            .header("Content-Type", "application/json")
            .header("verif-hash", hash)
            .body(Body::from(payload.to_string()))
            .unwrap()
    };
    let reply = app.send(signed("forged")).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = app.send(signed("test-flutterwave-hash")).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["received"], true);
    assert_eq!(reply.body["status"], "ignored");
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = test_app();
    let reply = app.call(Method::GET, "/api/sermons", None, None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}
