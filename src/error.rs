use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Rejections produced while turning raw request input into validated values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("ID passed is not a {0} ID.")]
    WrongIdPrefix(&'static str),
    #[error("Wrong ID size.")]
    WrongIdSize,
    #[error("ID may only contain A-Z, a-z and 0-9 after its prefix.")]
    InvalidIdCharacters,
    #[error("{0} name can't be empty.")]
    EmptyName(&'static str),
    #[error("{entity} name can't be longer than {max} characters.")]
    NameTooLong { entity: &'static str, max: usize },
    #[error("{0} name can't include comma \",\" character.")]
    NameWithComma(&'static str),
    #[error("Username must be between {min} and {max} characters long.")]
    UsernameLength { min: usize, max: usize },
    #[error("Username may only contain letters, digits and underscores.")]
    UsernameCharacters,
    #[error("Username not allowed.")]
    UsernameNotAllowed,
    #[error("Only https:// URLs allowed.")]
    UrlScheme,
    #[error("URL can't be longer than {0} characters.")]
    UrlTooLong(usize),
    #[error("URL is missing a host.")]
    UrlMissingHost,
    #[error("URL can't contain whitespace.")]
    UrlWhitespace,
    #[error("{0} must be an http(s) URL.")]
    InvalidLinkField(&'static str),
    #[error("date must be an RFC 3339 timestamp.")]
    InvalidDate,
    #[error("cursor must be an RFC 3339 timestamp.")]
    InvalidCursor,
    #[error("source must be \"all\" or \"author\".")]
    InvalidFeedSource,
}

/// Failures surfaced by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Invalid(String),
    #[error("stored row failed validation: {0}")]
    CorruptRow(#[from] ValidationError),
    #[error("database error: {0}")]
    Database(#[from] libsql::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": error_message }))).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(entity) => AppError::NotFound(format!("{entity} not found")),
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            StoreError::Invalid(msg) => AppError::InvalidInput(msg),
            other => AppError::Internal(crate::unpack_error(&other)),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_status_codes() {
        let cases = [
            (StoreError::NotFound("tag"), StatusCode::NOT_FOUND),
            (StoreError::Conflict("taken".into()), StatusCode::CONFLICT),
            (StoreError::Invalid("bad".into()), StatusCode::BAD_REQUEST),
            (StoreError::CorruptRow(ValidationError::WrongIdSize), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }

    #[test]
    fn validation_messages_match_the_extension_copy() {
        assert_eq!(ValidationError::WrongIdPrefix("tag").to_string(), "ID passed is not a tag ID.");
        assert_eq!(
            ValidationError::NameWithComma("Tag").to_string(),
            "Tag name can't include comma \",\" character."
        );
    }
}
