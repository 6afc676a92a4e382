// File: mongoguard-core/src/options.rs

//! options.rs - The validated, immutable configuration the engine runs with.
//!
//! A [`SanitizeOptions`] is built once at setup from a partial [`SanitizeConfig`]
//! merged over the defaults. Building resolves every field, turns key and route
//! lists into sets, and compiles the pattern list. Nothing about it changes
//! afterwards, so one instance is shared by reference across every request.

use std::collections::HashSet;
use std::sync::Arc;

use log::debug;

use crate::config::{merge_config, Mode, RequestSection, SanitizeConfig};
use crate::engine::CustomSanitizer;
use crate::errors::GuardError;
use crate::routes::SkipRoutes;
use crate::sanitizers::compiler::{get_or_compile_patterns, CompiledPatterns};

/// Resolved string post-processing settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StringOptions {
    pub trim: bool,
    pub lowercase: bool,
    /// Applied to values only, never to keys.
    pub max_length: Option<usize>,
}

/// Resolved array post-processing settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArrayOptions {
    pub filter_null: bool,
    pub distinct: bool,
}

/// The effective configuration for one engine.
#[derive(Debug, Clone)]
pub struct SanitizeOptions {
    pub replace_with: String,
    pub remove_matches: bool,
    pub patterns: Arc<CompiledPatterns>,
    pub recursive: bool,
    pub remove_empty: bool,
    pub allowed_keys: HashSet<String>,
    pub denied_keys: HashSet<String>,
    pub string_options: StringOptions,
    pub array_options: ArrayOptions,
    pub custom_sanitizer: CustomSanitizer,
    pub sanitize_objects: Vec<RequestSection>,
    pub skip_routes: SkipRoutes,
    pub mode: Mode,
    resolved: SanitizeConfig,
}

impl SanitizeOptions {
    /// Merges `config` over the defaults and builds the options.
    ///
    /// Fails with a configuration-class [`GuardError`] if a pattern does not compile
    /// or a skip route is malformed. Nothing is partially built on failure.
    pub fn build(config: &SanitizeConfig) -> Result<Self, GuardError> {
        let resolved = merge_config(SanitizeConfig::defaults(), config);
        Self::from_resolved(resolved)
    }

    /// Builds a new option set with `overrides` merged over this one.
    ///
    /// `self` is left untouched; manual-mode callers use this for per-call tweaks.
    pub fn with_overrides(&self, overrides: &SanitizeConfig) -> Result<Self, GuardError> {
        let resolved = merge_config(self.resolved.clone(), overrides);
        Self::from_resolved(resolved)
    }

    fn from_resolved(resolved: SanitizeConfig) -> Result<Self, GuardError> {
        let patterns = resolved.patterns.clone().unwrap_or_default();
        let compiled = get_or_compile_patterns(&patterns)?;

        let skip_routes = SkipRoutes::new(resolved.skip_routes.as_deref().unwrap_or_default())?;

        let mut sanitize_objects = Vec::new();
        for section in resolved.sanitize_objects.iter().flatten() {
            if !sanitize_objects.contains(section) {
                sanitize_objects.push(*section);
            }
        }

        let options = Self {
            replace_with: resolved.replace_with.clone().unwrap_or_default(),
            remove_matches: resolved.remove_matches.unwrap_or(false),
            patterns: compiled,
            recursive: resolved.recursive.unwrap_or(true),
            remove_empty: resolved.remove_empty.unwrap_or(false),
            allowed_keys: resolved.allowed_keys.iter().flatten().cloned().collect(),
            denied_keys: resolved.denied_keys.iter().flatten().cloned().collect(),
            string_options: StringOptions {
                trim: resolved.string_options.trim.unwrap_or(false),
                lowercase: resolved.string_options.lowercase.unwrap_or(false),
                max_length: resolved.string_options.max_length.flatten(),
            },
            array_options: ArrayOptions {
                filter_null: resolved.array_options.filter_null.unwrap_or(false),
                distinct: resolved.array_options.distinct.unwrap_or(false),
            },
            custom_sanitizer: resolved.custom_sanitizer.clone().unwrap_or_default(),
            sanitize_objects,
            skip_routes,
            mode: resolved.mode.unwrap_or_default(),
            resolved,
        };

        debug!(
            "Built sanitize options: {} patterns, {} allowed keys, {} denied keys, mode {:?}.",
            options.patterns.len(),
            options.allowed_keys.len(),
            options.denied_keys.len(),
            options.mode
        );
        Ok(options)
    }

    /// The fully resolved configuration these options were built from.
    pub fn config(&self) -> &SanitizeConfig {
        &self.resolved
    }
}

impl Default for SanitizeOptions {
    /// The default options. The default pattern set is a compile-time constant,
    /// so building it cannot fail.
    fn default() -> Self {
        Self::build(&SanitizeConfig::default()).expect("default sanitize options must build")
    }
}
