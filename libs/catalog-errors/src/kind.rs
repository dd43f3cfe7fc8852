//! `CatalogError`: the one error enum every handler in the workspace returns.
//!
//! Mirrors §7 of the specification — each variant has a fixed HTTP mapping
//! and constructors that keep call sites terse (`CatalogError::not_found("plugin")`).

use http::StatusCode;
use serde::Serialize;

use crate::problem::Problem;

#[derive(Debug, thiserror::Error, Serialize)]
#[serde(tag = "kind")]
pub enum CatalogError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl CatalogError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::BadRequest(detail.into())
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::NotFound(detail.into())
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::Conflict(detail.into())
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::Forbidden(detail.into())
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal(detail.into())
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self::Unavailable(detail.into())
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "Bad Request",
            Self::NotFound(_) => "Not Found",
            Self::Conflict(_) => "Conflict",
            Self::Forbidden(_) => "Forbidden",
            Self::Internal(_) => "Internal Server Error",
            Self::Unavailable(_) => "Service Unavailable",
        }
    }

    fn detail(&self) -> &str {
        match self {
            Self::BadRequest(d)
            | Self::NotFound(d)
            | Self::Conflict(d)
            | Self::Forbidden(d)
            | Self::Internal(d)
            | Self::Unavailable(d) => d,
        }
    }

    #[must_use]
    pub fn into_problem(self) -> Problem {
        let status = self.status();
        let title = self.title();
        let detail = self.detail().to_owned();
        Problem::new(status, title, detail)
    }
}

impl axum::response::IntoResponse for CatalogError {
    fn into_response(self) -> axum::response::Response {
        if matches!(self, Self::Internal(ref msg) if !msg.is_empty()) {
            tracing::error!(error = %self, "internal error");
        }
        self.into_problem().into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_variants_to_status_codes() {
        assert_eq!(CatalogError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(CatalogError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(CatalogError::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(CatalogError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(
            CatalogError::internal("x").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            CatalogError::unavailable("x").status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
