use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, Request,
    },
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::error;
use validator::{Validate, ValidationErrors};

use crate::calendar::{RangeError, UnknownLayer};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    InvalidRange(#[from] RangeError),
    #[error(transparent)]
    UnknownLayer(#[from] UnknownLayer),
    #[error("no plan event with id `{0}`")]
    UnknownPlanEvent(String),
    #[error("no plan for year `{0}`")]
    UnknownPlan(String),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("too many requests, retry in {retry_after}s")]
    RateLimited { retry_after: u64 },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("cache error: {0}")]
    Cache(#[from] redis::RedisError),
    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_)
            | ApiError::Validation(_)
            | ApiError::InvalidRange(_)
            | ApiError::UnknownLayer(_)
            | ApiError::UnknownPlanEvent(_)
            | ApiError::UnknownPlan(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            ApiError::Database(_) | ApiError::Cache(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) | ApiError::Validation(_) => "invalid_input",
            ApiError::InvalidRange(_) => "invalid_date_range",
            ApiError::UnknownLayer(_) => "unknown_layer",
            ApiError::UnknownPlanEvent(_) => "unknown_plan_event",
            ApiError::UnknownPlan(_) => "unknown_plan",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) | ApiError::Database(sqlx::Error::RowNotFound) => "not_found",
            ApiError::RateLimited { .. } => "rate_limited",
            ApiError::Database(_) | ApiError::Cache(_) | ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self);
            "internal server error".to_string()
        } else if matches!(self, ApiError::Database(sqlx::Error::RowNotFound)) {
            "record not found".to_string()
        } else {
            self.to_string()
        };

        let mut response = (status, Json(ErrorBody { error: self.code(), message })).into_response();
        if let ApiError::RateLimited { retry_after } = self {
            response.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }
        response
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}

/// JSON body that has passed its `validator` rules.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn statuses_and_codes() {
        let range = RangeError::Inverted {
            from: NaiveDate::from_ymd_opt(2025, 10, 2).unwrap(),
            to: NaiveDate::from_ymd_opt(2025, 10, 1).unwrap(),
        };
        let err = ApiError::from(range);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "invalid_date_range");

        let missing = ApiError::from(sqlx::Error::RowNotFound);
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.code(), "not_found");

        let layer = ApiError::from(UnknownLayer("ics".to_string()));
        assert_eq!(layer.code(), "unknown_layer");
    }

    #[test]
    fn rate_limited_sets_retry_after() {
        let response = ApiError::RateLimited { retry_after: 120 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "120");
    }

    #[test]
    fn internal_errors_hide_details() {
        let response = ApiError::Internal("connection refused".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
