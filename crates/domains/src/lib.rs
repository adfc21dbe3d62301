//! rusty-comments/crates/domains/src/lib.rs
//!
//! The central domain model and port definitions for rusty-comments.

pub mod error;
pub mod models;
pub mod traits;
pub mod voters;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use traits::*;
pub use voters::Voters;
