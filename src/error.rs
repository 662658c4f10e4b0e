use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tracing::warn;

use crate::validate::FieldError;
use crate::views;

/// Failures a wizard page turns into an error view.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Invalid form: {}", join_errors(.0))]
    Validation(Vec<FieldError>),

    #[error("Could not read form: {0}")]
    Binding(String),

    #[error("Form too large: {0}")]
    TooLarge(String),

    #[error("Plex query failed: {0:#}")]
    Plex(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        warn!("{}", self);
        let (status, errors) = match self {
            AppError::Validation(errors) => (StatusCode::UNPROCESSABLE_ENTITY, errors),
            AppError::Binding(message) => (
                StatusCode::BAD_REQUEST,
                vec![FieldError {
                    field: "form",
                    message,
                }],
            ),
            AppError::TooLarge(message) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                vec![FieldError {
                    field: "form",
                    message,
                }],
            ),
            AppError::Plex(e) => (
                StatusCode::BAD_GATEWAY,
                vec![FieldError {
                    field: "plex",
                    message: format!("{:#}", e),
                }],
            ),
        };
        (status, Html(views::error(&errors))).into_response()
    }
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type AppResult<T> = Result<T, AppError>;
