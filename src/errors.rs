use axum::{
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("login required")]
    LoginRequired { next: String },
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("validation error: {0}")]
    Validation(String),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("template error")]
    Template(#[from] tera::Error),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// URL of the login page carrying `next` as the return path.
///
/// Slashes stay readable in the query (`/accounts/login/?next=/catalog/mybooks/`).
#[must_use]
pub fn login_url(next: &str) -> String {
    format!(
        "/accounts/login/?next={}",
        urlencoding::encode(next).replace("%2F", "/")
    )
}

/// A `302 Found` pointing at `location`.
#[must_use]
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::LoginRequired { next } => return found(&login_url(next)),
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            e @ (AppError::Database(_) | AppError::Template(_) | AppError::Anyhow(_)) => {
                tracing::error!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "Unexpected error happened"
                );
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, self.to_string()).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
