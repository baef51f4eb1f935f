use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::config::FeedLimits;
use crate::error::{AppError, ValidationError};
use crate::id::{CategoryId, UserId};
use crate::label::parse_label_ids;
use crate::social::{FeedQuery, FeedSource};

/// Success envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

pub fn success<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse { data })).into_response()
}

pub fn created<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse { data })).into_response()
}

/// JSON body extractor that rejects with the `{ "error": … }` envelope.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Query string extractor that rejects with the `{ "error": … }` envelope.
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(AppError))]
pub struct QueryParams<T>(pub T);

#[derive(Debug, Default, Deserialize)]
pub struct FeedParams {
    pub limit: Option<u32>,
    pub cursor: Option<String>,
    pub categories: Option<String>,
    pub source: Option<String>,
}

impl FeedParams {
    pub fn into_feed_query(
        self,
        user_id: UserId,
        viewer_id: UserId,
        limits: FeedLimits,
    ) -> Result<FeedQuery, ValidationError> {
        let limit = self
            .limit
            .filter(|l| *l > 0)
            .unwrap_or(limits.default_limit)
            .min(limits.max_limit);

        let cursor = match self.cursor.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(raw) => Some(normalize_cursor(raw)?),
            None => None,
        };

        let source = match self.source.as_deref() {
            None | Some("") | Some("all") => FeedSource::All,
            Some("author") => FeedSource::Author,
            Some(_) => return Err(ValidationError::InvalidFeedSource),
        };

        Ok(FeedQuery {
            user_id,
            viewer_id,
            limit,
            cursor,
            source,
            category_ids: parse_label_ids::<CategoryId>(self.categories.as_deref()),
        })
    }
}

/// Rewrites an RFC 3339 cursor into the UTC millisecond form stored in `feeds.created_at`.
pub fn normalize_cursor(raw: &str) -> Result<String, ValidationError> {
    let parsed = chrono::DateTime::parse_from_rfc3339(raw).map_err(|_| ValidationError::InvalidCursor)?;
    Ok(parsed
        .with_timezone(&chrono::Utc)
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> FeedLimits {
        FeedLimits {
            default_limit: 20,
            max_limit: 50,
        }
    }

    #[test]
    fn feed_limit_defaults_and_caps() {
        let user = UserId::generate();

        let query = FeedParams::default()
            .into_feed_query(user.clone(), user.clone(), limits())
            .unwrap();
        assert_eq!(query.limit, 20);
        assert_eq!(query.source, FeedSource::All);

        let params = FeedParams {
            limit: Some(500),
            ..Default::default()
        };
        assert_eq!(params.into_feed_query(user.clone(), user, limits()).unwrap().limit, 50);
    }

    #[test]
    fn cursors_are_normalized_to_utc_millis() {
        assert_eq!(
            normalize_cursor("2024-03-01T12:30:00+02:00").unwrap(),
            "2024-03-01T10:30:00.000Z"
        );
        assert_eq!(
            normalize_cursor("2024-03-01T10:30:00.123456Z").unwrap(),
            "2024-03-01T10:30:00.123Z"
        );
        assert_eq!(normalize_cursor("yesterday"), Err(ValidationError::InvalidCursor));
    }

    #[test]
    fn unknown_source_is_rejected() {
        let user = UserId::generate();
        let params = FeedParams {
            source: Some("friends".into()),
            ..Default::default()
        };

        assert_eq!(
            params.into_feed_query(user.clone(), user, limits()).unwrap_err(),
            ValidationError::InvalidFeedSource
        );
    }
}
