//! The request middleware.
//!
//! [`MongoGuard`] owns one immutable [`SanitizeOptions`] built at setup. In auto mode
//! the host calls [`MongoGuard::handle`] once per request; in manual mode `handle`
//! does nothing and the host calls [`MongoGuard::sanitize`] where it wants it.
//!
//! ---
//! License: MIT OR Apache-2.0

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, trace, warn};
use mongoguard_core::{
    discover_params, sanitize_string, DefaultEngine, Mapping, Mode, RequestSection, SanitizeConfig,
    SanitizeOptions, Value,
};

use crate::request::Request;
use crate::router::Router;

/// Sanitizes request sections and route parameters.
#[derive(Debug, Clone)]
pub struct MongoGuard {
    options: Arc<SanitizeOptions>,
    engine: DefaultEngine,
    params: BTreeSet<String>,
}

impl MongoGuard {
    /// Builds a guard with no router attached. Path parameters are then only
    /// sanitized if `params` is one of the configured sections.
    pub fn new(config: &SanitizeConfig) -> Result<Self> {
        let options = SanitizeOptions::build(config).context("Failed to build sanitize options")?;
        warn!("No router supplied: path parameters will not be sanitized as they are parsed.");
        Ok(Self { options: Arc::new(options), engine: DefaultEngine::new(), params: BTreeSet::new() })
    }

    /// Builds a guard and registers a param hook on `router` for every parameter
    /// name found anywhere in its route tree.
    pub fn with_router(config: &SanitizeConfig, router: &mut Router) -> Result<Self> {
        let options = Arc::new(SanitizeOptions::build(config).context("Failed to build sanitize options")?);
        let params = discover_params(&*router);

        for name in &params {
            let hook_options = Arc::clone(&options);
            router.param(name, move |raw: &str| sanitize_string(raw, &hook_options, true));
        }
        debug!("Registered sanitizing hooks for {} route parameter(s): {:?}", params.len(), params);

        Ok(Self { options, engine: DefaultEngine::new(), params })
    }

    /// Loads a YAML or JSON configuration file, then builds the guard.
    pub fn from_config_file<P: AsRef<Path>>(path: P, router: Option<&mut Router>) -> Result<Self> {
        let path = path.as_ref();
        let config = SanitizeConfig::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
        match router {
            Some(router) => Self::with_router(&config, router),
            None => Self::new(&config),
        }
    }

    pub fn options(&self) -> &SanitizeOptions {
        &self.options
    }

    /// Parameter names that have a sanitizing hook.
    pub fn params(&self) -> &BTreeSet<String> {
        &self.params
    }

    /// What the registered hook does to one raw parameter value.
    pub fn sanitize_param(&self, raw: &str) -> String {
        sanitize_string(raw, &self.options, true)
    }

    /// The per-request entry point for auto mode.
    ///
    /// Requests whose path matches a skip route are left alone. Otherwise every
    /// configured section is sanitized and written back. Returns whether the
    /// request was sanitized.
    pub fn handle(&self, request: &mut Request) -> Result<bool> {
        if self.options.mode == Mode::Manual {
            return Ok(false);
        }
        if self.options.skip_routes.matches(&request.path) {
            trace!("Skipping sanitization for {}", request.path);
            return Ok(false);
        }
        self.apply(request, &self.options)?;
        Ok(true)
    }

    /// Sanitizes `request` on demand, optionally with per-call overrides merged
    /// over the guard's options.
    ///
    /// Skip routes are not consulted: an explicit call always sanitizes. The
    /// sanitized sections are written back to the request and also returned,
    /// keyed by section name.
    pub fn sanitize(&self, request: &mut Request, overrides: Option<&SanitizeConfig>) -> Result<Mapping> {
        let options = match overrides {
            Some(overrides) => Arc::new(
                self.options
                    .with_overrides(overrides)
                    .context("Failed to apply sanitize overrides")?,
            ),
            None => Arc::clone(&self.options),
        };
        self.apply(request, &options)
    }

    fn apply(&self, request: &mut Request, options: &SanitizeOptions) -> Result<Mapping> {
        let mut sanitized = Mapping::with_capacity(options.sanitize_objects.len());
        for &section in &options.sanitize_objects {
            let current = request.section(section);
            let cleaned = match section {
                RequestSection::Body => self.engine.sanitize_value(&current, options),
                RequestSection::Query | RequestSection::Params => self
                    .engine
                    .sanitize_mapping(&current, options)
                    .with_context(|| format!("Failed to sanitize request {}", section))?,
            };
            request.set_section(section, cleaned.clone());
            sanitized.insert(section.as_str(), cleaned);
        }
        Ok(sanitized)
    }
}

/// Convenience for hosts that only have a JSON body to clean.
pub fn sanitize_body(guard: &MongoGuard, body: &serde_json::Value) -> serde_json::Value {
    guard.engine.sanitize_value(&Value::from(body.clone()), &guard.options).to_json()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_param_sanitizer_matches_string_pipeline() -> Result<()> {
        let guard = MongoGuard::new(&SanitizeConfig::default())?;
        assert_eq!(guard.sanitize_param("$admin"), "admin");
        assert_eq!(guard.sanitize_param("a.b"), "ab");
        assert!(guard.params().is_empty());
        Ok(())
    }

    #[test]
    fn test_sanitize_body_helper() -> Result<()> {
        let guard = MongoGuard::new(&SanitizeConfig::default())?;
        assert_eq!(sanitize_body(&guard, &json!({ "$gt": "" })), json!({ "gt": "" }));
        Ok(())
    }
}
