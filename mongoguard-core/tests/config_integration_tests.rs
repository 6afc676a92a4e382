// mongoguard-core/tests/config_integration_tests.rs
use anyhow::Result;
use tempfile::NamedTempFile;
use std::io::Write;
use test_log::test;

use mongoguard_core::config::{self, Mode, RequestSection, SanitizeConfig, DEFAULT_PATTERNS};
use mongoguard_core::{GuardError, SanitizeOptions};

#[test]
fn test_default_options() -> Result<()> {
    let options = SanitizeOptions::build(&SanitizeConfig::default())?;
    let sources: Vec<&str> = options.patterns.sources().collect();
    assert_eq!(sources, DEFAULT_PATTERNS.to_vec());
    assert_eq!(options.mode, Mode::Auto);
    assert!(options.skip_routes.is_empty());
    Ok(())
}

#[test]
fn test_load_from_file() -> Result<()> {
    let yaml_content = r#"
replaceWith: "_"
removeMatches: false
patterns:
  - '\$'
  - '\.'
allowedKeys: [name, email]
stringOptions:
  trim: true
  maxLength: 64
arrayOptions:
  filterNull: true
sanitizeObjects: [body, query]
skipRoutes: ["/health", "/public/*"]
mode: manual
"#;
    let mut file = NamedTempFile::new()?;
    file.write_all(yaml_content.as_bytes())?;

    let config = SanitizeConfig::load_from_file(file.path())?;
    assert_eq!(config.replace_with.as_deref(), Some("_"));
    assert_eq!(config.patterns.as_ref().map(Vec::len), Some(2));
    assert_eq!(config.sanitize_objects, Some(vec![RequestSection::Body, RequestSection::Query]));

    let options = SanitizeOptions::build(&config)?;
    assert!(options.allowed_keys.contains("email"));
    assert!(options.string_options.trim);
    assert!(!options.string_options.lowercase);
    assert_eq!(options.string_options.max_length, Some(64));
    assert!(options.array_options.filter_null);
    assert!(!options.array_options.distinct);
    assert_eq!(options.mode, Mode::Manual);
    assert!(options.skip_routes.matches("/public/logo.png"));
    Ok(())
}

#[test]
fn test_load_json_document() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    file.write_all(br#"{ "removeEmpty": true, "deniedKeys": ["__proto__"] }"#)?;

    let options = SanitizeOptions::build(&SanitizeConfig::load_from_file(file.path())?)?;
    assert!(options.remove_empty);
    assert!(options.denied_keys.contains("__proto__"));
    Ok(())
}

#[test]
fn test_load_from_file_reports_field_and_value() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    file.write_all(b"recursive: \"sometimes\"\n")?;

    let err = SanitizeConfig::load_from_file(file.path()).unwrap_err();
    match err {
        GuardError::Configuration { field, received } => {
            assert_eq!(field, "recursive");
            assert!(received.contains("sometimes"), "{}", received);
        }
        other => panic!("unexpected error: {}", other),
    }
    Ok(())
}

#[test]
fn test_load_missing_file_is_io_error() {
    let err = SanitizeConfig::load_from_file("/definitely/not/here.yaml").unwrap_err();
    assert!(matches!(err, GuardError::Io(_)));
}

#[test]
fn test_malformed_yaml_is_rejected() {
    let err = SanitizeConfig::from_yaml_str("patterns: [unclosed").unwrap_err();
    assert!(matches!(err, GuardError::Yaml(_)));
    assert!(err.is_configuration());
}

#[test]
fn test_invalid_pattern_in_file_fails_at_build() -> Result<()> {
    let config = SanitizeConfig::from_yaml_str("patterns: ['(']")?;
    let err = SanitizeOptions::build(&config).unwrap_err();
    assert!(err.to_string().contains("Failed to compile 1 pattern(s)"));
    Ok(())
}

#[test]
fn test_merge_config_override() {
    let base = SanitizeConfig {
        replace_with: Some("[X]".to_string()),
        denied_keys: Some(vec!["a".to_string()]),
        ..Default::default()
    };
    let overrides = SanitizeConfig {
        denied_keys: Some(vec!["b".to_string()]),
        mode: Some(Mode::Manual),
        ..Default::default()
    };

    let merged = config::merge_config(base, &overrides);
    assert_eq!(merged.replace_with.as_deref(), Some("[X]"));
    assert_eq!(merged.denied_keys, Some(vec!["b".to_string()]));
    assert_eq!(merged.mode, Some(Mode::Manual));
    assert_eq!(merged.recursive, None);
}

#[test]
fn test_config_round_trips_through_yaml() -> Result<()> {
    let config = SanitizeConfig {
        remove_matches: Some(true),
        skip_routes: Some(vec!["/users/:id".to_string()]),
        ..Default::default()
    };
    let text = serde_yml::to_string(&config)?;
    let parsed = SanitizeConfig::from_yaml_str(&text)?;
    assert_eq!(parsed.remove_matches, Some(true));
    assert_eq!(parsed.skip_routes, config.skip_routes);
    Ok(())
}
