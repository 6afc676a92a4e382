//! Pattern application for single strings.
//!
//! License: MIT OR APACHE 2.0

use std::borrow::Cow;

use regex::NoExpand;

use crate::options::SanitizeOptions;
use crate::validators::is_email;

/// Applies the configured patterns and string post-processing to one string.
///
/// Patterns run in order, each replacing every match with `replace_with` inserted
/// literally. Then `trim`, `lowercase` and, in value context only, `max_length`
/// truncation (counted in characters). Email addresses and empty strings are
/// returned unchanged.
///
/// # Arguments
///
/// * `value` - The key or value to sanitize.
/// * `options` - The effective options.
/// * `is_value_context` - `false` when sanitizing a mapping key, so truncation can
///   never make two distinct keys collide.
pub fn sanitize_string(value: &str, options: &SanitizeOptions, is_value_context: bool) -> String {
    if value.is_empty() || is_email(value) {
        return value.to_string();
    }

    let mut current: Cow<str> = Cow::Borrowed(value);
    for pattern in &options.patterns.patterns {
        let replaced = match pattern.regex.replace_all(&current, NoExpand(&options.replace_with)) {
            Cow::Owned(replaced) => Some(replaced),
            Cow::Borrowed(_) => None,
        };
        if let Some(replaced) = replaced {
            current = Cow::Owned(replaced);
        }
    }

    let string_options = &options.string_options;
    if string_options.trim {
        let trimmed = current.trim();
        if trimmed.len() != current.len() {
            current = Cow::Owned(trimmed.to_string());
        }
    }
    if string_options.lowercase {
        current = Cow::Owned(current.to_lowercase());
    }
    if is_value_context {
        if let Some(max) = string_options.max_length {
            if let Some((cut, _)) = current.char_indices().nth(max) {
                current = Cow::Owned(current[..cut].to_string());
            }
        }
    }

    current.into_owned()
}
