//! errors.rs - Custom error types for the mongoguard-core library.
//!
//! This module defines a structured error enum for the library, providing
//! specific, actionable error types that can be handled programmatically.
//!
//! License: MIT OR APACHE 2.0

use thiserror::Error;

/// This enum represents all possible error types in the `mongoguard-core` library.
///
/// `Configuration`, `PatternCompilation` and `PatternLengthExceeded` are raised while
/// building options and never during a sanitize call. `InputType` signals that one
/// of the shape-specific sanitizers was called directly with the wrong kind of value.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GuardError {
    #[error("Invalid configuration for '{field}': received {received}")]
    Configuration { field: String, received: String },

    #[error("Failed to compile pattern '{0}': {1}")]
    PatternCompilation(String, regex::Error),

    #[error("Pattern '{0}': length ({1}) exceeds maximum allowed ({2})")]
    PatternLengthExceeded(String, usize, usize),

    #[error("Expected {expected} but received {found}")]
    InputType { expected: &'static str, found: &'static str },

    #[error("Failed to parse configuration document: {0}")]
    Yaml(String),

    #[error("An unexpected I/O error occurred: {0}")]
    Io(#[from] std::io::Error),

    #[error("A fatal error occurred: {0}")]
    Fatal(String),
}

impl GuardError {
    /// Shorthand for a `Configuration` error naming the offending field.
    pub fn configuration(field: impl Into<String>, received: impl Into<String>) -> Self {
        GuardError::Configuration {
            field: field.into(),
            received: received.into(),
        }
    }

    /// Returns true for every error raised while building options.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            GuardError::Configuration { .. }
                | GuardError::PatternCompilation(..)
                | GuardError::PatternLengthExceeded(..)
                | GuardError::Yaml(_)
                | GuardError::Fatal(_)
        )
    }
}
