//! Route table

mod attendance;
mod auth;
mod giving;
mod health;
mod invites;
mod payroll;
mod prayer;
mod school;
mod subscriptions;
mod surveys;
mod tenancy;
mod units;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    let api = Router::new()
        .merge(auth::router())
        .merge(tenancy::router())
        .merge(subscriptions::router())
        .merge(units::router())
        .merge(invites::router())
        .merge(surveys::router())
        .merge(giving::router())
        .nest("/digital-school", school::router())
        .nest("/payroll", payroll::router())
        .nest("/prayer", prayer::router())
        .nest("/attendance", attendance::router());

    Router::new()
        .merge(health::router())
        .nest("/api", api)
}
