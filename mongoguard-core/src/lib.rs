// mongoguard-core/src/lib.rs
//! # MongoGuard Core Library
//!
//! `mongoguard-core` provides the platform-independent logic for neutralising NoSQL
//! injection vectors in untrusted request payloads: operator keys that begin with the
//! `$` sigil, dotted field-path keys, and template or expression payloads. It defines
//! the payload value model, the configuration surface and its validation, and the
//! recursive engine that rebuilds a payload under that configuration.
//!
//! The library is pure and stateless. A sanitize call performs no I/O, never mutates
//! its input and shares nothing with other calls except the immutable options.
//!
//! ## Modules
//!
//! * `value`: The closed `Value` variant set and the ordered `Mapping`.
//! * `config`: The partial, user-facing `SanitizeConfig`, defaults, document validation and merging.
//! * `options`: The built, immutable `SanitizeOptions` the engine runs with.
//! * `sanitizers`: Pattern compilation, the string sanitizer and the key policy.
//! * `engine`: The `ValueSanitizer` trait and the `CustomSanitizer` strategy.
//! * `engines`: Concrete implementations of `ValueSanitizer`.
//! * `routes`: Route-parameter discovery and skip-route matching.
//! * `validators`: The email exemption check.
//! * `headless`: Convenience wrappers for one-shot use.
//!
//! ## Usage Example
//!
//! ```rust
//! use mongoguard_core::{headless, SanitizeConfig};
//! use serde_json::json;
//! use anyhow::Result;
//!
//! fn main() -> Result<()> {
//!     let payload = json!({ "user": { "username": "$admin", "$password": "$secre.t" } });
//!
//!     let sanitized = headless::sanitize_json(&SanitizeConfig::default(), &payload)?;
//!
//!     assert_eq!(sanitized, json!({ "user": { "username": "admin", "password": "secret" } }));
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Fallible library operations return `GuardError`. Configuration problems surface
//! while options are built, never during a sanitize call. The convenience wrappers
//! use `anyhow::Error` with context.
//!
//! ## Limits
//!
//! The engine imposes no depth or size limit on payloads. Deployments are expected to
//! bound request size and nesting before sanitization runs.
//!
//! ---
//! License: MIT OR Apache-2.0

pub mod config;
pub mod engine;
pub mod engines;
pub mod errors;
pub mod headless;
pub mod options;
pub mod routes;
pub mod sanitizers;
pub mod validators;
pub mod value;

/// Re-exports the configuration types and functions.
pub use config::{
    merge_config,
    ArrayOptionsConfig,
    Mode,
    RequestSection,
    SanitizeConfig,
    StringOptionsConfig,
    DEFAULT_PATTERNS,
    MAX_PATTERN_LENGTH,
};

/// Re-exports the custom error type for clear error reporting.
pub use errors::GuardError;

pub use engine::{CustomSanitizer, ValueSanitizer};
pub use engines::default_engine::DefaultEngine;
pub use options::{ArrayOptions, SanitizeOptions, StringOptions};

pub use routes::{
    decode_mount_path,
    discover_params,
    extract_param_names,
    ParamDiscovery,
    RouteLayer,
    RouteTree,
    SkipRoutes,
};

pub use sanitizers::compiler::{compile_patterns, get_or_compile_patterns, CompiledPattern, CompiledPatterns};
pub use sanitizers::key_policy::{DropReason, KeyDecision, KeyPolicy};
pub use sanitizers::string::sanitize_string;
pub use validators::is_email;
pub use value::{Mapping, Opaque, Value};
