//! # api-adapters
//!
//! HTTP surface of rusty-comments. The axum implementation lives behind the
//! `web-axum` feature.

#[cfg(feature = "web-axum")]
pub mod cookies;
#[cfg(feature = "web-axum")]
pub mod error;
#[cfg(feature = "web-axum")]
pub mod handlers;
#[cfg(feature = "web-axum")]
pub mod request;
#[cfg(feature = "web-axum")]
pub mod router;

#[cfg(feature = "web-axum")]
pub use error::{ApiError, ApiResult};
#[cfg(feature = "web-axum")]
pub use handlers::AppState;
#[cfg(feature = "web-axum")]
pub use router::{apply_standard_layers, router};
