use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::images::UploadError;
use crate::store::StoreError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Sign-in required")]
    SignInRequired { sign_in_url: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Self booking: {0}")]
    SelfBooking(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Duplicate booking: {0}")]
    Duplicate(String),

    #[error("Upload error: {0}")]
    UploadError(#[from] UploadError),

    #[error("Database error")]
    DatabaseError(#[from] StoreError),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(format!("Request body exceeds the upload limit: {}", err.body_text()))
        } else {
            AppError::ValidationError(format!("Invalid multipart body: {}", err.body_text()))
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) | AppError::SignInRequired { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::SelfBooking(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::Duplicate(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UploadError(_) => StatusCode::BAD_GATEWAY,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) | AppError::SignInRequired { .. } => "AUTH_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::SelfBooking(_) => "SELF_BOOKING",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::Duplicate(_) => "DUPLICATE_BOOKING",
            AppError::UploadError(_) => "UPLOAD_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Not-found is an expected outcome and caller mistakes are not
    /// failures of the service; only the last arm is logged as an error.
    fn log(&self) {
        match self {
            AppError::NotFound(msg) => debug!(message = %msg, "Resource not found"),
            AppError::ValidationError(msg)
            | AppError::Conflict(msg)
            | AppError::Duplicate(msg)
            | AppError::PayloadTooLarge(msg) => {
                info!(code = self.code(), message = %msg, "Request rejected")
            }
            AppError::AuthError(msg) | AppError::Forbidden(msg) | AppError::SelfBooking(msg) => {
                warn!(code = self.code(), message = %msg, "Request denied")
            }
            AppError::SignInRequired { .. } => debug!("Anonymous caller must sign in"),
            AppError::UploadError(e) => error!(error = %e, "Image upload failed"),
            AppError::DatabaseError(e) => error!(error = ?e, "Database error"),
            AppError::InternalServerError(msg) => {
                error!(error = ?self, message = %msg, "Application error")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        let (public_message, details) = match &self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::SelfBooking(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Duplicate(msg)
            | AppError::PayloadTooLarge(msg) => (msg.clone(), None),
            AppError::SignInRequired { sign_in_url } => (
                "You must be signed in to do this".to_string(),
                Some(json!({ "signInUrl": sign_in_url })),
            ),
            AppError::UploadError(_) => ("Failed to upload the image".to_string(), None),
            AppError::DatabaseError(_) => ("A database error occurred".to_string(), None),
            AppError::InternalServerError(_) => ("Something went wrong".to_string(), None),
        };

        error_response(code, public_message, details, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::ValidationError(String::new()), StatusCode::BAD_REQUEST),
            (AppError::AuthError(String::new()), StatusCode::UNAUTHORIZED),
            (AppError::Forbidden(String::new()), StatusCode::FORBIDDEN),
            (AppError::SelfBooking(String::new()), StatusCode::FORBIDDEN),
            (AppError::NotFound(String::new()), StatusCode::NOT_FOUND),
            (AppError::Conflict(String::new()), StatusCode::CONFLICT),
            (AppError::Duplicate(String::new()), StatusCode::CONFLICT),
            (AppError::PayloadTooLarge(String::new()), StatusCode::PAYLOAD_TOO_LARGE),
            (
                AppError::DatabaseError(StoreError::Unavailable(String::new())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{:?}", err);
        }
    }

    #[tokio::test]
    async fn test_database_details_are_hidden() {
        let response =
            AppError::DatabaseError(StoreError::Unavailable("10.0.0.3 refused".to_string()))
                .into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();

        assert!(text.contains("DATABASE_ERROR"));
        assert!(!text.contains("10.0.0.3"));
    }

    #[tokio::test]
    async fn test_sign_in_url_in_details() {
        let response = AppError::SignInRequired {
            sign_in_url: "/signin?callbackUrl=%2F".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"]["details"]["signInUrl"], "/signin?callbackUrl=%2F");
    }
}
