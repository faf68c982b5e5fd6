// Error type returned by every handler; maps failures onto status codes and
// the `{error, details}` JSON body.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use std::collections::BTreeMap;

use crate::api::models::ErrorBody;
use crate::database_ops::StoreError;
use crate::orchestrator::RefreshError;
use crate::sources::SourceError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("external data source unavailable: {0}")]
    Upstream(#[from] SourceError),
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("validation failed")]
    Validation(BTreeMap<String, String>),
}

impl ApiError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(BTreeMap::from([(field.into(), message.into())]))
    }
}

impl From<RefreshError> for ApiError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Upstream(e) => Self::Upstream(e),
            RefreshError::Persistence(e) => Self::Persistence(e),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ApiError::Upstream(e) => {
                tracing::warn!(url = e.url(), error = %e, "upstream unavailable");
                ErrorBody::with_details(
                    "External data source unavailable",
                    format!("Could not fetch data from {}", e.url()),
                )
            }
            ApiError::Persistence(e) => {
                tracing::error!(error = %e, "persistence failure");
                ErrorBody::with_details("Internal server error", e.to_string())
            }
            ApiError::NotFound(what) => ErrorBody::new(*what),
            ApiError::Validation(fields) => ErrorBody::with_details("Validation failed", fields),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}
