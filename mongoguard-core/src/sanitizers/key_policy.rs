//! Per-key decisions for mapping entries.
//!
//! Whether a key survives, and under which name, depends on four independent
//! toggles: the allow list, the deny list, removal mode and empty-value pruning.
//! Keeping the decision in one place lets each toggle be tested on its own.
//!
//! License: MIT OR APACHE 2.0

use std::fmt;

use log::trace;

use crate::options::SanitizeOptions;
use crate::sanitizers::string::sanitize_string;

/// Why a key was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The allow list is active and does not contain the key.
    NotAllowed,
    /// The key is on the deny list. Checked after the allow list; deny always wins.
    Denied,
    /// Removal mode is on and a pattern matched the original key.
    PatternMatch,
    /// Empty pruning is on and the key sanitized to an empty string.
    EmptyKey,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let reason = match self {
            DropReason::NotAllowed => "not in allowed keys",
            DropReason::Denied => "denied key",
            DropReason::PatternMatch => "key matches a pattern",
            DropReason::EmptyKey => "key is empty after sanitization",
        };
        f.write_str(reason)
    }
}

/// The outcome for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyDecision {
    /// Keep the entry under the sanitized name.
    Keep(String),
    Drop(DropReason),
}

/// Key policy bound to one option set.
#[derive(Debug, Clone, Copy)]
pub struct KeyPolicy<'a> {
    options: &'a SanitizeOptions,
}

impl<'a> KeyPolicy<'a> {
    pub fn new(options: &'a SanitizeOptions) -> Self {
        Self { options }
    }

    /// Decides the fate of `key`. Membership tests use the original key name.
    pub fn decide(&self, key: &str) -> KeyDecision {
        let options = self.options;

        let decision = if !options.allowed_keys.is_empty() && !options.allowed_keys.contains(key) {
            KeyDecision::Drop(DropReason::NotAllowed)
        } else if options.denied_keys.contains(key) {
            KeyDecision::Drop(DropReason::Denied)
        } else if options.remove_matches && options.patterns.is_match(key) {
            KeyDecision::Drop(DropReason::PatternMatch)
        } else {
            let sanitized = sanitize_string(key, options, false);
            if options.remove_empty && sanitized.is_empty() {
                KeyDecision::Drop(DropReason::EmptyKey)
            } else {
                KeyDecision::Keep(sanitized)
            }
        };

        if let KeyDecision::Drop(reason) = &decision {
            trace!("Dropping key '{}': {}.", key, reason);
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SanitizeConfig;

    fn policy_options(config: SanitizeConfig) -> SanitizeOptions {
        SanitizeOptions::build(&config).unwrap()
    }

    #[test]
    fn test_default_policy_renames_operator_keys() {
        let options = SanitizeOptions::default();
        let policy = KeyPolicy::new(&options);
        assert_eq!(policy.decide("$password"), KeyDecision::Keep("password".into()));
        assert_eq!(policy.decide("a.b"), KeyDecision::Keep("ab".into()));
        assert_eq!(policy.decide("name"), KeyDecision::Keep("name".into()));
    }

    #[test]
    fn test_allow_list() {
        let options = policy_options(SanitizeConfig {
            allowed_keys: Some(vec!["name".into(), "$gt".into()]),
            ..Default::default()
        });
        let policy = KeyPolicy::new(&options);
        assert_eq!(policy.decide("name"), KeyDecision::Keep("name".into()));
        assert_eq!(policy.decide("$gt"), KeyDecision::Keep("gt".into()));
        assert_eq!(policy.decide("gt"), KeyDecision::Drop(DropReason::NotAllowed));
    }

    #[test]
    fn test_deny_wins_over_allow() {
        let options = policy_options(SanitizeConfig {
            allowed_keys: Some(vec!["role".into(), "name".into()]),
            denied_keys: Some(vec!["role".into()]),
            ..Default::default()
        });
        let policy = KeyPolicy::new(&options);
        assert_eq!(policy.decide("role"), KeyDecision::Drop(DropReason::Denied));
        assert_eq!(policy.decide("name"), KeyDecision::Keep("name".into()));
    }

    #[test]
    fn test_removal_mode_checks_original_key() {
        let options = policy_options(SanitizeConfig {
            remove_matches: Some(true),
            ..Default::default()
        });
        let policy = KeyPolicy::new(&options);
        assert_eq!(policy.decide("$where"), KeyDecision::Drop(DropReason::PatternMatch));
        assert_eq!(policy.decide("where"), KeyDecision::Keep("where".into()));
    }

    #[test]
    fn test_empty_key_pruning() {
        let pruning = policy_options(SanitizeConfig {
            remove_empty: Some(true),
            ..Default::default()
        });
        assert_eq!(KeyPolicy::new(&pruning).decide("$"), KeyDecision::Drop(DropReason::EmptyKey));

        let keeping = SanitizeOptions::default();
        assert_eq!(KeyPolicy::new(&keeping).decide("$"), KeyDecision::Keep(String::new()));
    }
}
