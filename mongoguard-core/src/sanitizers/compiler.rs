//! compiler.rs - Manages the compilation and caching of sanitization patterns.
//!
//! This module provides a thread-safe, cached mechanism to convert an ordered list
//! of pattern strings into `CompiledPatterns`, which are optimized for repeated
//! application during sanitization. It uses a global, shared cache so that building
//! many option sets from the same pattern list compiles the regexes only once.
//!
//! License: MIT OR APACHE 2.0

use log::debug;
use regex::{Regex, RegexBuilder, RegexSet, RegexSetBuilder};
use lazy_static::lazy_static;
use std::sync::{Arc, RwLock};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::collections::hash_map::DefaultHasher;

use crate::config::MAX_PATTERN_LENGTH;
use crate::errors::GuardError;

const REGEX_SIZE_LIMIT: usize = 10 * (1 << 20);

/// A single compiled pattern.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    /// The compiled regular expression, applied to every occurrence.
    pub regex: Regex,
    /// The pattern string exactly as configured.
    pub source: String,
}

/// The ordered set of patterns an engine applies.
///
/// `set` mirrors `patterns` and answers "does any pattern match" in a single pass,
/// which is all removal mode needs.
#[derive(Debug)]
pub struct CompiledPatterns {
    pub patterns: Vec<CompiledPattern>,
    set: RegexSet,
}

impl CompiledPatterns {
    /// True if at least one pattern matches anywhere in `text`.
    pub fn is_match(&self, text: &str) -> bool {
        self.set.is_match(text)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// The configured pattern strings, in order.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.source.as_str())
    }
}

lazy_static! {
    /// A thread-safe, global cache for compiled pattern lists.
    /// The key is a hash of the ordered pattern strings.
    static ref COMPILED_PATTERNS_CACHE: RwLock<HashMap<u64, Arc<CompiledPatterns>>> = RwLock::new(HashMap::new());
}

/// Order matters: the same patterns in a different order produce different output.
fn hash_patterns(patterns: &[String]) -> u64 {
    let mut hasher = DefaultHasher::new();
    patterns.hash(&mut hasher);
    hasher.finish()
}

/// Compiles an ordered list of pattern strings into `CompiledPatterns`.
/// This is the low-level function that performs the actual regex compilation.
///
/// Every pattern is checked; all failures are reported together in one error.
pub fn compile_patterns(patterns: &[String]) -> Result<CompiledPatterns, GuardError> {
    debug!("Starting compilation of {} patterns.", patterns.len());

    let mut compiled = Vec::with_capacity(patterns.len());
    let mut compilation_errors = Vec::new();

    for pattern in patterns {
        if pattern.len() > MAX_PATTERN_LENGTH {
            compilation_errors.push(GuardError::PatternLengthExceeded(
                pattern.clone(),
                pattern.len(),
                MAX_PATTERN_LENGTH,
            ));
            continue;
        }

        let regex_result = RegexBuilder::new(pattern)
            .size_limit(REGEX_SIZE_LIMIT)
            .build();

        match regex_result {
            Ok(regex) => {
                log::debug!(
                    target: "mongoguard_core::sanitizer",
                    "Pattern '{}' compiled successfully.",
                    pattern
                );
                compiled.push(CompiledPattern { regex, source: pattern.clone() });
            }
            Err(e) => {
                compilation_errors.push(GuardError::PatternCompilation(pattern.clone(), e));
            }
        }
    }

    if !compilation_errors.is_empty() {
        let error_message = compilation_errors.iter()
            .map(|e| e.to_string())
            .collect::<Vec<String>>()
            .join("\n");
        return Err(GuardError::Fatal(format!(
            "Failed to compile {} pattern(s):\n{}",
            compilation_errors.len(),
            error_message
        )));
    }

    let set = RegexSetBuilder::new(patterns)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|e| GuardError::PatternCompilation(patterns.join(" | "), e))?;

    debug!("Finished compiling patterns. Total compiled: {}.", compiled.len());
    Ok(CompiledPatterns { patterns: compiled, set })
}

/// Gets a `CompiledPatterns` instance from the cache or compiles it if not found.
///
/// This is the public entry point for retrieving compiled patterns. It returns an `Arc`
/// so option sets built from the same list share one compilation.
pub fn get_or_compile_patterns(patterns: &[String]) -> Result<Arc<CompiledPatterns>, GuardError> {
    let cache_key = hash_patterns(patterns);

    {
        let cache = COMPILED_PATTERNS_CACHE
            .read()
            .map_err(|_| GuardError::Fatal("pattern cache lock poisoned".to_string()))?;
        if let Some(compiled) = cache.get(&cache_key) {
            debug!("Serving compiled patterns from cache for key: {}", cache_key);
            return Ok(Arc::clone(compiled));
        }
    }

    debug!("Compiled patterns not found in cache. Compiling now.");
    let compiled = Arc::new(compile_patterns(patterns)?);

    COMPILED_PATTERNS_CACHE
        .write()
        .map_err(|_| GuardError::Fatal("pattern cache lock poisoned".to_string()))?
        .insert(cache_key, Arc::clone(&compiled));

    debug!("Successfully compiled and cached patterns for key: {}", cache_key);
    Ok(compiled)
}
