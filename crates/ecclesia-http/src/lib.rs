//! # ecclesia-http
//!
//! The JSON API. Every route lives under `/api` except `/health`. Callers
//! authenticate with `Authorization: Bearer <token>` and pick the church
//! they act in with `X-Church-Id`; each handler states the
//! [`GuardOptions`](ecclesia_auth::GuardOptions) it needs and gets back an
//! [`AccessContext`](ecclesia_domain::AccessContext).
//!
//! Errors leave as `{"error": {"code", "message", "hint", ...}}` through
//! [`ApiError`].

pub mod error;
pub mod extract;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use extract::{ClientOrigin, Credentials, JsonBody};
pub use server::{build_app, serve};
pub use state::AppState;
