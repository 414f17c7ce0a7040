use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::auth::repo::StoreError;

/// One violated input rule.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("User already exists with this email or username")]
    DuplicateIdentity,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Please verify your email address before logging in. Check your inbox for the verification link.")]
    EmailNotVerified,

    #[error("Verification token has expired. Please request a new verification email.")]
    TokenExpired,

    #[error("Invalid or expired verification token")]
    TokenNotFound,

    #[error("Not authorized, invalid or missing token")]
    Unauthenticated,

    #[error("Not authorized as an admin")]
    Forbidden,

    #[error("User not found")]
    NotFound,

    #[error("Recipe not found")]
    RecipeNotFound,

    #[error("Email is already verified")]
    AlreadyVerified,

    #[error("You cannot delete your own account")]
    CannotDeleteSelf,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-checkable name of the failure.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "ValidationError",
            AppError::DuplicateIdentity => "DuplicateIdentity",
            AppError::InvalidCredentials => "InvalidCredentials",
            AppError::EmailNotVerified => "EmailNotVerified",
            AppError::TokenExpired => "TokenExpired",
            AppError::TokenNotFound => "TokenNotFound",
            AppError::Unauthenticated => "Unauthenticated",
            AppError::Forbidden => "Forbidden",
            AppError::NotFound | AppError::RecipeNotFound => "NotFound",
            AppError::AlreadyVerified => "AlreadyVerified",
            AppError::CannotDeleteSelf => "CannotDeleteSelf",
            AppError::Internal(_) => "ServerError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::TokenExpired
            | AppError::TokenNotFound
            | AppError::AlreadyVerified
            | AppError::CannotDeleteSelf => StatusCode::BAD_REQUEST,
            AppError::DuplicateIdentity => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::EmailNotVerified | AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound | AppError::RecipeNotFound => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate => AppError::DuplicateIdentity,
            StoreError::Missing => AppError::NotFound,
            StoreError::Backend(e) => AppError::Internal(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Validation(errors) => json!({
                "kind": self.kind(),
                "message": self.to_string(),
                "errors": errors,
            }),
            AppError::EmailNotVerified => json!({
                "kind": self.kind(),
                "message": self.to_string(),
                "isVerified": false,
            }),
            AppError::Internal(e) => {
                error!(error = %e, "internal error");
                json!({ "kind": self.kind(), "message": "Something went wrong!" })
            }
            _ => json!({ "kind": self.kind(), "message": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
