// File: mongoguard-core/src/validators.rs
//! Programmatic validation functions for values exempt from pattern sanitization.
//!
//! Email addresses legitimately contain dots and are the most common contact field in
//! request payloads. Running the default pattern set over them would strip the dots and
//! corrupt the address, so the engine recognises them up front and leaves them alone.
//! The grammar here is deliberately narrower than RFC 5322: a local part made of the
//! characters that appear in real mailboxes, and a dotted domain ending in an
//! alphabetic TLD. Anything outside it is treated as an ordinary string.
//!
//! License: MIT OR APACHE 2.0

use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum length of an address, per the SMTP path limit.
pub const MAX_EMAIL_LENGTH: usize = 254;

const MAX_LOCAL_PART_LENGTH: usize = 64;

static LOCAL_PART: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+$").unwrap());

static DOMAIN_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").unwrap());

/// Checks whether `value` is an email address under the conservative grammar.
///
/// # Arguments
///
/// * `value` - The candidate string. It is not trimmed; surrounding whitespace fails.
///
/// # Returns
///
/// `true` if the value has exactly one `@`, a valid local part and a dotted domain
/// whose last label is at least two ASCII letters, `false` otherwise.
pub fn is_email(value: &str) -> bool {
    if value.is_empty() || value.len() > MAX_EMAIL_LENGTH {
        return false;
    }

    let Some((local, domain)) = value.split_once('@') else { return false; };
    if domain.contains('@') {
        return false;
    }

    if local.is_empty() || local.len() > MAX_LOCAL_PART_LENGTH || !LOCAL_PART.is_match(local) {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || !labels.iter().all(|label| DOMAIN_LABEL.is_match(label)) {
        return false;
    }

    let Some(tld) = labels.last() else { return false; };
    tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
}
