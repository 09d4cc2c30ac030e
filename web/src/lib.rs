//! HTTP boundary for orderstream.
//!
//! Read-only: every request is answered from the [`OrderCache`], never from
//! the database.
//!
//! | Route | Response |
//! |---|---|
//! | `GET /order?id=<order_uid>` | 200 order JSON, 400 without `id`, 404 if not cached |
//! | `GET /health` | 200 with the cached order count |
//!
//! # Example
//!
//! ```ignore
//! use orderstream_web::{AppState, build_router};
//!
//! let app = build_router(AppState::new(cache));
//! axum::serve(listener, app).await?;
//! ```
//!
//! [`OrderCache`]: orderstream_projections::OrderCache

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::AppError;
pub use routes::build_router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
