// mongoguard-core/src/engine.rs
//! Defines the core `ValueSanitizer` trait and the custom-override strategy.
//!
//! The `ValueSanitizer` trait is the seam between the mapping traversal and the
//! per-value computation. The built-in [`DefaultEngine`](crate::DefaultEngine)
//! implements it, and so does any closure with the right signature, which is how
//! applications plug in their own handling for values found inside mappings.
//!
//! License: MIT OR APACHE 2.0

use std::fmt;
use std::sync::Arc;

use crate::options::SanitizeOptions;
use crate::value::Value;

/// A pure transform from an untrusted value to its sanitized form.
///
/// Implementations must not mutate shared state; a single instance is invoked
/// concurrently from every in-flight request.
pub trait ValueSanitizer: Send + Sync {
    /// Produces the sanitized counterpart of `value` under `options`.
    fn sanitize(&self, value: &Value, options: &SanitizeOptions) -> Value;
}

impl<F> ValueSanitizer for F
where
    F: Fn(&Value, &SanitizeOptions) -> Value + Send + Sync,
{
    fn sanitize(&self, value: &Value, options: &SanitizeOptions) -> Value {
        self(value, options)
    }
}

/// How values encountered inside mappings are computed.
#[derive(Clone, Default)]
pub enum CustomSanitizer {
    /// Recurse with the built-in engine.
    #[default]
    Default,
    /// Hand every mapping value to the given sanitizer instead.
    Custom(Arc<dyn ValueSanitizer>),
}

impl CustomSanitizer {
    /// Wraps a closure or any other `ValueSanitizer`.
    pub fn new<S: ValueSanitizer + 'static>(sanitizer: S) -> Self {
        CustomSanitizer::Custom(Arc::new(sanitizer))
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, CustomSanitizer::Custom(_))
    }
}

impl fmt::Debug for CustomSanitizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomSanitizer::Default => f.write_str("CustomSanitizer::Default"),
            CustomSanitizer::Custom(_) => f.write_str("CustomSanitizer::Custom(..)"),
        }
    }
}
