use std::fmt::Display;

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use moari_types::api::ErrorResponse;

/// Every failure a handler can return. Nothing is retried; the first error
/// is what the caller sees.
#[derive(Error, Debug)]
pub enum ApiError {
    /// A required field is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// No bearer token, or one that does not verify.
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    NotFound(String),

    /// The identity layer or the database refused or failed.
    #[error("{message}")]
    Upstream {
        status: StatusCode,
        message: String,
        detail: Option<String>,
    },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>, detail: impl Display) -> Self {
        Self::Upstream {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            detail: Some(detail.to_string()),
        }
    }

    /// A 400 carrying only a message.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Upstream {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            detail: None,
        }
    }

    pub fn internal(message: impl Into<String>, detail: impl Display) -> Self {
        Self::Upstream {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            detail: Some(detail.to_string()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized | Self::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream { status, .. } => *status,
        }
    }
}

/// Unparseable bodies, wrong field types and a missing JSON content type are
/// all malformed requests.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request("잘못된 요청 형식입니다.", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        let error = match self {
            Self::Upstream { detail, .. } => {
                if status.is_server_error() {
                    error!("{}: {}", message, detail.as_deref().unwrap_or("-"));
                } else {
                    warn!("{}: {}", message, detail.as_deref().unwrap_or("-"));
                }
                detail
            }
            _ => None,
        };

        (status, Json(ErrorResponse { message, error })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_status() {
        assert_eq!(ApiError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::PermissionDenied("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::rejected("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::internal("x", "db down").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
