//! Shared handler state

use crate::error::{ApiError, ApiResult};
use crate::extract::Credentials;
use ecclesia_auth::GuardOptions;
use ecclesia_core::AppError;
use ecclesia_domain::{AccessContext, Services};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        Self {
            services: Arc::new(services),
        }
    }

    /// Run the access guard for a handler and count the call against the
    /// church's `apiCalls`
    pub async fn authorize(&self, credentials: &Credentials, options: GuardOptions) -> ApiResult<AccessContext> {
        let ctx = self
            .services
            .guard
            .authorize(credentials.token(), credentials.church_id(), &options)
            .await?;
        if let Ok(church_id) = ctx.church_id() {
            if let Err(err) = self.services.subscriptions.record_api_call(church_id).await {
                tracing::warn!(church_id = %church_id, error = %err, "could not meter api call");
            }
        }
        Ok(ctx)
    }

    /// Map a service error, adding the church's `X-Usage-*` headers when a
    /// plan limit was hit
    pub async fn usage_error(&self, church_id: Option<&str>, error: AppError) -> ApiError {
        let limited = matches!(error, AppError::UsageLimit { .. });
        let api_error = ApiError::from(error);
        let Some(church_id) = church_id.filter(|_| limited) else {
            return api_error;
        };
        match self.services.subscriptions.usage_headers(church_id).await {
            Ok(headers) => api_error.with_headers(headers),
            Err(err) => {
                tracing::warn!(church_id = %church_id, error = %err, "could not compute usage headers");
                api_error
            }
        }
    }
}
