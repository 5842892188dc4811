//! RFC 7807 problem-details responses.

use axum::extract::rejection::JsonRejection;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use crate::ratelimit::LimiterClass;
use crate::validation::FieldError;

const PROBLEM_JSON: &str = "application/problem+json";

/// Problem-details body.
#[derive(Debug, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: &'static str,
    pub title: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(rename = "traceId", skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, Vec<String>>>,
}

/// Errors surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Malformed request body: {0}")]
    BadRequest(String),

    #[error("One or more validation errors occurred.")]
    Validation(Vec<FieldError>),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Not found")]
    NotFound,

    #[error("Rate limited by the {limiter} limiter")]
    RateLimited {
        limiter: LimiterClass,
        retry_after: Duration,
    },

    #[error("{title}")]
    Internal {
        title: String,
        detail: String,
        trace_id: String,
    },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Build an internal error tagged with a fresh trace id.
    pub fn internal(title: impl Into<String>, detail: impl Into<String>) -> Self {
        ApiError::Internal {
            title: title.into(),
            detail: detail.into(),
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    fn problem_type(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => {
                "https://tools.ietf.org/html/rfc9110#section-15.5.1"
            }
            ApiError::Unauthorized => "https://tools.ietf.org/html/rfc9110#section-15.5.2",
            ApiError::NotFound => "https://tools.ietf.org/html/rfc9110#section-15.5.5",
            ApiError::RateLimited { .. } => "https://tools.ietf.org/html/rfc6585#section-4",
            ApiError::Internal { .. } => "https://tools.ietf.org/html/rfc9110#section-15.6.1",
        }
    }

    fn into_problem(self) -> ProblemDetails {
        let mut problem = ProblemDetails {
            problem_type: self.problem_type(),
            title: self.to_string(),
            status: self.status().as_u16(),
            detail: None,
            trace_id: None,
            errors: None,
        };

        match self {
            ApiError::BadRequest(detail) => {
                problem.title = "The request body could not be read.".to_string();
                problem.detail = Some(detail);
            }
            ApiError::Validation(field_errors) => {
                let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();
                for error in field_errors {
                    errors.entry(error.field).or_default().push(error.message);
                }
                problem.errors = Some(errors);
            }
            ApiError::RateLimited { retry_after, .. } => {
                problem.detail = Some(format!(
                    "Too many requests. Retry after {} seconds.",
                    retry_after_secs(retry_after)
                ));
            }
            ApiError::Internal {
                detail, trace_id, ..
            } => {
                problem.detail = Some(detail);
                problem.trace_id = Some(trace_id);
            }
            ApiError::Unauthorized | ApiError::NotFound => {}
        }

        problem
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after = match &self {
            ApiError::RateLimited { retry_after, .. } => Some(retry_after_secs(*retry_after)),
            _ => None,
        };
        let unauthorized = matches!(self, ApiError::Unauthorized);

        let mut response = (status, Json(self.into_problem())).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(PROBLEM_JSON));
        if let Some(secs) = retry_after {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        if unauthorized {
            headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Whole seconds until `retry_after` has elapsed, rounded up.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_secs(10)), 10);
        assert_eq!(retry_after_secs(Duration::from_millis(9001)), 10);
        assert_eq!(retry_after_secs(Duration::from_millis(1)), 1);
        assert_eq!(retry_after_secs(Duration::ZERO), 0);
    }

    #[test]
    fn test_rate_limited_response_headers() {
        let response = ApiError::RateLimited {
            limiter: LimiterClass::Identity,
            retry_after: Duration::from_millis(2500),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "3");
        assert_eq!(response.headers()[header::CONTENT_TYPE], PROBLEM_JSON);
    }

    #[test]
    fn test_unauthorized_challenges_bearer() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }

    #[test]
    fn test_validation_errors_grouped_by_field() {
        let problem = ApiError::Validation(vec![
            FieldError::new("event_type", "Event type cannot be empty."),
            FieldError::new("event_type", "Too short."),
            FieldError::new("data", "Required."),
        ])
        .into_problem();

        assert_eq!(problem.status, 400);
        assert_eq!(problem.title, "One or more validation errors occurred.");
        let errors = problem.errors.unwrap();
        assert_eq!(errors["event_type"].len(), 2);
        assert_eq!(errors["data"], vec!["Required."]);
    }

    #[test]
    fn test_internal_error_carries_trace_id() {
        let problem = ApiError::internal("An unexpected error occurred.", "boom").into_problem();
        assert_eq!(problem.status, 500);
        assert!(problem.trace_id.is_some());
        assert_eq!(problem.detail.as_deref(), Some("boom"));
    }
}
