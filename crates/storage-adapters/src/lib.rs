//! # storage-adapters
//!
//! Storage port implementations. SQLite (feature `db-sqlite`) is the only
//! backend.

#[cfg(feature = "db-sqlite")]
pub mod sqlite;

#[cfg(feature = "db-sqlite")]
pub use sqlite::SqliteCommentRepo;
