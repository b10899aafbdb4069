use crate::database::{StoreError, StoreKind, ValidationFailure, ValidationKind};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

/// Error surfaced to callers of the data service
#[derive(Debug, Clone, thiserror::Error)]
pub enum DataError {
    /// Both the selected store and the fallback failed
    #[error("all data stores are unavailable ({first} then {fallback}): {message}")]
    StoreUnavailable {
        first: StoreKind,
        fallback: StoreKind,
        message: String,
    },
    /// The store rejected the data; never retried
    #[error("validation failed: {0}")]
    Validation(ValidationFailure),
}

impl DataError {
    /// Terminal error after `first` and then `fallback` both failed
    pub fn exhausted(first: StoreKind, fallback: StoreKind, last: &StoreError) -> Self {
        DataError::StoreUnavailable {
            first,
            fallback,
            message: last.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, DataError::Validation(_))
    }

    pub fn validation(&self) -> Option<&ValidationFailure> {
        match self {
            DataError::Validation(failure) => Some(failure),
            DataError::StoreUnavailable { .. } => None,
        }
    }
}

impl ResponseError for DataError {
    fn status_code(&self) -> StatusCode {
        match self {
            DataError::StoreUnavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            DataError::Validation(failure) => match failure.kind {
                ValidationKind::Uniqueness => StatusCode::CONFLICT,
                ValidationKind::Schema => StatusCode::UNPROCESSABLE_ENTITY,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            DataError::Validation(failure) => json!({
                "success": false,
                "error": failure.message,
                "field": failure.field,
            }),
            DataError::StoreUnavailable { .. } => json!({
                "success": false,
                "error": self.to_string(),
            }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}
