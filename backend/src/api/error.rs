use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: &'static str,
        errors: Vec<String>,
    },
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(&'static str),
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

impl ApiError {
    pub fn invalid_json(message: &'static str, rejection: JsonRejection) -> Self {
        ApiError::Validation {
            message,
            errors: vec![rejection.body_text()],
        }
    }

    pub fn invalid_query(message: &'static str, rejection: QueryRejection) -> Self {
        ApiError::Validation {
            message,
            errors: vec![rejection.body_text()],
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        let errors = match self {
            ApiError::Validation { errors, .. } => errors,
            _ => Vec::new(),
        };
        (status, Json(ErrorBody { message, errors })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Maps storage failures onto API errors, keeping backend detail in the log.
pub trait StoreResultExt<T> {
    fn or_fail(self, failure: &'static str) -> ApiResult<T>;
}

impl<T> StoreResultExt<T> for Result<T, StoreError> {
    fn or_fail(self, failure: &'static str) -> ApiResult<T> {
        self.map_err(|err| match err {
            StoreError::AlreadyVoted | StoreError::VotingClosed => {
                ApiError::Conflict(err.to_string())
            }
            StoreError::NotFound { entity: "Property", .. } => {
                ApiError::NotFound("Property not found")
            }
            StoreError::NotFound { .. } => ApiError::NotFound("Proposal not found"),
            StoreError::Backend(detail) => {
                log::error!("{}: {}", failure, detail);
                ApiError::Internal(failure)
            }
        })
    }
}
