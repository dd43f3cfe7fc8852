//! Error types shared by every crate in the catalog control plane.
//!
//! Pure data types plus an axum `IntoResponse` impl — no coupling to any
//! particular plugin or store.

pub mod kind;
pub mod problem;

pub use kind::CatalogError;
pub use problem::{Problem, APPLICATION_PROBLEM_JSON};

/// Convenience alias used throughout handler code.
pub type Result<T> = std::result::Result<T, CatalogError>;
