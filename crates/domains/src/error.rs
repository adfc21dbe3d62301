//! # DomainError
//!
//! Centralized error handling for rusty-comments.
//! Maps domain-specific failures to actionable error types.

use serde::Serialize;
use thiserror::Error;

/// The primary error type for all domain and service operations.
#[derive(Error, Debug)]
pub enum DomainError {
    /// Resource not found (e.g., Thread, Comment)
    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),

    /// Malformed or missing input, rejected before any side effect.
    #[error("validation error: {0}")]
    Validation(ValidationErrors),

    /// Token MAC, id or digest mismatch. Deliberately carries no detail.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource already exists
    #[error("conflict: {0}")]
    Conflict(String),

    /// Infrastructure failure (e.g., database unavailable)
    #[error("internal storage error: {0}")]
    Storage(String),
}

/// A specialized Result type for domain logic.
pub type Result<T> = std::result::Result<T, DomainError>;

/// Failures reported by storage ports.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// A unique constraint rejected the write (e.g., a second thread for one uri).
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<StorageError> for DomainError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UniqueViolation(what) => DomainError::Conflict(what),
            StorageError::Backend(msg) => DomainError::Storage(msg),
        }
    }
}

/// A single violated input constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: String,
}

/// Every constraint violated by one input, in the order they were checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldViolation>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldViolation {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.0
    }

    /// `Ok(value)` when nothing was violated.
    pub fn into_result<T>(self, value: T) -> Result<T> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(DomainError::Validation(self))
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|v| format!("{}: {}", v.field, v.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

impl From<ValidationErrors> for DomainError {
    fn from(errors: ValidationErrors) -> Self {
        DomainError::Validation(errors)
    }
}
