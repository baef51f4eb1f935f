use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::request::Parts,
    response::IntoResponse,
};

use tracing::info;

use crate::api::ApiResponse;
use crate::config::FeedLimits;
use crate::db::Database;
use crate::error::AppError;
use crate::id::UserId;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub feed: FeedLimits,
}

pub const USER_ID_HEADER: &str = "x-user-id";

/// The caller, as identified by the `x-user-id` header.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserId);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized(format!("Missing {USER_ID_HEADER} header.")))?
            .to_str()
            .map_err(|_| AppError::Unauthorized(format!("Malformed {USER_ID_HEADER} header.")))?;

        let user_id = UserId::parse(raw).map_err(|e| AppError::Unauthorized(e.to_string()))?;
        Ok(CurrentUser(user_id))
    }
}

pub async fn healthcheck() -> impl IntoResponse {
    info!("got healthcheck request");
    Json(ApiResponse { data: "ok" })
}
