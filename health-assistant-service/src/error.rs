//! HTTP-facing errors with `{error, details?}` JSON bodies.

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use crate::analysis::AnalysisError;
use crate::gateway::GatewayError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Input the caller can fix; the message is returned verbatim
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// An external service failed. `message` is shown, `details` carries the cause.
    #[error("{message}")]
    Upstream {
        status: StatusCode,
        message: String,
        details: Option<String>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// A 500 with a generic message and the underlying cause as details.
    pub fn upstream(message: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        ApiError::Upstream {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            details: Some(cause.to_string()),
        }
    }

    /// Analysis failures: validation becomes a 400, everything else a 500 with
    /// `message` in front of the cause.
    pub fn from_analysis(err: AnalysisError, message: &str) -> Self {
        match err {
            AnalysisError::Invalid(reason) => ApiError::BadRequest(reason),
            other => ApiError::upstream(message, other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: message,
                    details: None,
                },
            ),
            ApiError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    error: message,
                    details: None,
                },
            ),
            ApiError::Upstream {
                status,
                message,
                details,
            } => {
                error!(%status, error = %message, details = ?details, "Upstream request failed");
                (
                    status,
                    ErrorBody {
                        error: message,
                        details,
                    },
                )
            }
            ApiError::Internal(detail) => {
                error!(detail = %detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: "Internal server error".to_string(),
                        details: None,
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(err.body_text())
    }
}

impl From<GatewayError> for ApiError {
    /// Upstream statuses pass through with the upstream message; anything else is a 500.
    fn from(err: GatewayError) -> Self {
        let status = err
            .upstream_status()
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = match &err {
            GatewayError::Upstream { message, .. } => message.clone(),
            other => other.to_string(),
        };
        ApiError::Upstream {
            status,
            message,
            details: None,
        }
    }
}
