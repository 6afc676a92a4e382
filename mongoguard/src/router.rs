//! An in-memory, express-style router.
//!
//! Routes and mount points are compiled to path matchers when they are registered.
//! Each matcher keeps two forms: the anchored, slash-escaped source string that
//! express-style routers expose for introspection, and a regex the `regex` crate can
//! execute (it has no look-ahead, so mount prefixes match with an explicit
//! alternation instead).
//!
//! The router implements [`RouteTree`], which is all the discovery walk in
//! `mongoguard-core` needs.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::trace;
use mongoguard_core::{Mapping, RouteLayer, RouteTree, Value};
use once_cell::sync::Lazy;
use regex::Regex;

/// Callback run on a raw path-parameter value before handlers see it.
pub type ParamHook = Arc<dyn Fn(&str) -> String + Send + Sync>;

static PARAM_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^:([A-Za-z0-9_]+)(\?)?$").unwrap());

/// A compiled path pattern.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    /// The express-style source, e.g. `^\/user\/(?:([^\/]+?))\/?$`.
    pub source: String,
    /// Parameter names in capture order.
    pub keys: Vec<String>,
    regex: Regex,
}

impl PathMatcher {
    /// Compiles `path`. With `end == false` the matcher accepts any path that starts
    /// with `path` at a segment boundary, which is how mount points behave.
    pub fn compile(path: &str, end: bool) -> Result<Self> {
        if !path.starts_with('/') {
            bail!("Route path '{}' must start with '/'", path);
        }
        let trimmed = path.trim_end_matches('/');
        let mut source = String::from("^");
        let mut pattern = String::from("^");
        let mut keys = Vec::new();

        for segment in trimmed.split('/').skip(1) {
            if let Some(caps) = PARAM_TOKEN.captures(segment) {
                keys.push(caps[1].to_string());
                if caps.get(2).is_some() {
                    source.push_str(r"(?:\/([^\/]+?))?");
                    pattern.push_str(r"(?:/([^/]+?))?");
                } else {
                    source.push_str(r"\/(?:([^\/]+?))");
                    pattern.push_str(r"/([^/]+?)");
                }
            } else {
                source.push_str(r"\/");
                source.push_str(&escape_source(segment));
                pattern.push('/');
                pattern.push_str(&regex::escape(segment));
            }
        }

        if end {
            source.push_str(r"\/?$");
            pattern.push_str("/?$");
        } else {
            source.push_str(r"\/?(?=\/|$)");
            pattern.push_str("(?:/|$)");
        }

        let regex = Regex::new(&pattern)
            .with_context(|| format!("Failed to compile route path '{}'", path))?;
        Ok(Self { source, keys, regex })
    }

    /// Matches `path`, returning the length of the consumed prefix and the captured
    /// parameters.
    fn matches(&self, path: &str) -> Option<(usize, Vec<(String, String)>)> {
        let caps = self.regex.captures(path)?;
        let whole = caps.get(0)?;
        let consumed = whole.as_str().trim_end_matches('/').len();
        let params = self
            .keys
            .iter()
            .enumerate()
            .filter_map(|(i, key)| caps.get(i + 1).map(|m| (key.clone(), m.as_str().to_string())))
            .collect();
        Some((consumed, params))
    }
}

fn escape_source(segment: &str) -> String {
    let mut escaped = String::with_capacity(segment.len());
    for c in segment.chars() {
        if "\\/.*+?^${}()|[]-".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

enum Layer {
    Route { method: String, path: String, matcher: PathMatcher },
    Mount { prefix: String, matcher: PathMatcher, router: Arc<Router> },
}

/// The result of resolving a request against a router.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch {
    /// The full declared pattern of the matched route, mount prefixes included.
    pub route: String,
    /// Path parameters after every registered hook has run.
    pub params: Mapping,
}

#[derive(Default)]
pub struct Router {
    layers: Vec<Layer>,
    param_hooks: HashMap<String, Vec<ParamHook>>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("layers", &self.layers.len())
            .field("param_hooks", &self.param_hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route for `method` (`"*"` matches any method).
    pub fn route(&mut self, method: &str, path: &str) -> Result<&mut Self> {
        let matcher = PathMatcher::compile(path, true)?;
        self.layers.push(Layer::Route {
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
            matcher,
        });
        Ok(self)
    }

    pub fn get(&mut self, path: &str) -> Result<&mut Self> {
        self.route("GET", path)
    }

    pub fn post(&mut self, path: &str) -> Result<&mut Self> {
        self.route("POST", path)
    }

    pub fn all(&mut self, path: &str) -> Result<&mut Self> {
        self.route("*", path)
    }

    /// Mounts `router` under `prefix`. The same `Arc` may be mounted more than once.
    pub fn mount(&mut self, prefix: &str, router: Arc<Router>) -> Result<&mut Self> {
        let matcher = PathMatcher::compile(prefix, false)?;
        self.layers.push(Layer::Mount {
            prefix: prefix.trim_end_matches('/').to_string(),
            matcher,
            router,
        });
        Ok(self)
    }

    /// Registers a hook for every parameter called `name`, here and in mounted routers.
    pub fn param<F>(&mut self, name: &str, hook: F) -> &mut Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.param_hooks.entry(name.to_string()).or_default().push(Arc::new(hook));
        self
    }

    /// Names with at least one registered hook.
    pub fn hooked_params(&self) -> impl Iterator<Item = &String> {
        self.param_hooks.keys()
    }

    /// Finds the first route matching `method` and `path` and runs param hooks on
    /// its parameters.
    pub fn resolve(&self, method: &str, path: &str) -> Option<RouteMatch> {
        let method = method.to_ascii_uppercase();
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = if path.is_empty() { "/" } else { path };
        let mut hooks: Vec<&HashMap<String, Vec<ParamHook>>> = Vec::new();
        self.resolve_inner(&method, path, String::new(), Vec::new(), &mut hooks)
    }

    fn resolve_inner<'a>(
        &'a self,
        method: &str,
        path: &str,
        base: String,
        inherited: Vec<(String, String)>,
        hooks: &mut Vec<&'a HashMap<String, Vec<ParamHook>>>,
    ) -> Option<RouteMatch> {
        hooks.push(&self.param_hooks);

        for layer in &self.layers {
            match layer {
                Layer::Route { method: route_method, path: route_path, matcher } => {
                    if route_method != "*" && *route_method != method {
                        continue;
                    }
                    let Some((_, captured)) = matcher.matches(path) else { continue };
                    let mut params = Mapping::new();
                    for (name, raw) in inherited.iter().chain(captured.iter()) {
                        params.insert(name.clone(), Value::String(run_hooks(hooks, name, raw)));
                    }
                    trace!("Resolved {} {} to route '{}{}'.", method, path, base, route_path);
                    return Some(RouteMatch { route: format!("{}{}", base, route_path), params });
                }
                Layer::Mount { prefix, matcher, router } => {
                    let Some((consumed, captured)) = matcher.matches(path) else { continue };
                    let rest = &path[consumed..];
                    let rest = if rest.is_empty() { "/" } else { rest };
                    let mut carried = inherited.clone();
                    carried.extend(captured);
                    if let Some(found) = router.resolve_inner(method, rest, format!("{}{}", base, prefix), carried, hooks) {
                        return Some(found);
                    }
                }
            }
        }

        hooks.pop();
        None
    }
}

fn run_hooks(hooks: &[&HashMap<String, Vec<ParamHook>>], name: &str, raw: &str) -> String {
    let mut value = raw.to_string();
    for table in hooks {
        for hook in table.get(name).into_iter().flatten() {
            value = hook(&value);
        }
    }
    value
}

impl RouteTree for Router {
    fn layers(&self) -> Vec<RouteLayer<'_>> {
        self.layers
            .iter()
            .map(|layer| match layer {
                Layer::Route { path, .. } => RouteLayer::Route { path },
                Layer::Mount { matcher, router, .. } => RouteLayer::Mount {
                    matcher: &matcher.source,
                    keys: &matcher.keys,
                    node: &**router,
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongoguard_core::decode_mount_path;

    #[test]
    fn test_compiled_sources_look_like_express() -> Result<()> {
        let route = PathMatcher::compile("/user/:id", true)?;
        assert_eq!(route.source, r"^\/user\/(?:([^\/]+?))\/?$");
        assert_eq!(route.keys, vec!["id"]);

        let mount = PathMatcher::compile("/api", false)?;
        assert_eq!(mount.source, r"^\/api\/?(?=\/|$)");
        assert_eq!(decode_mount_path(&mount.source).as_deref(), Some("/api"));

        let dashed = PathMatcher::compile("/api-v2.1", false)?;
        assert_eq!(decode_mount_path(&dashed.source).as_deref(), Some("/api-v2.1"));
        Ok(())
    }

    #[test]
    fn test_relative_paths_are_rejected() {
        let mut router = Router::new();
        let err = router.get("user/:id").unwrap_err();
        assert!(err.to_string().contains("must start with '/'"));
        assert!(router.mount("api", Arc::new(Router::new())).is_err());
        assert!(router.resolve("GET", "/user/1").is_none());
    }

    #[test]
    fn test_mount_matches_on_segment_boundary() -> Result<()> {
        let mount = PathMatcher::compile("/api", false)?;
        assert_eq!(mount.matches("/api/users").map(|(n, _)| n), Some(4));
        assert_eq!(mount.matches("/api").map(|(n, _)| n), Some(4));
        assert!(mount.matches("/apix").is_none());
        Ok(())
    }

    #[test]
    fn test_resolve_nested_route_with_hooks() -> Result<()> {
        let mut api = Router::new();
        api.get("/:name")?;

        let mut app = Router::new();
        app.get("/user/:id")?;
        app.mount("/api", Arc::new(api))?;
        app.param("name", |raw| raw.to_uppercase());

        let found = app.resolve("get", "/api/bob?x=1").unwrap();
        assert_eq!(found.route, "/api/:name");
        assert_eq!(found.params.get("name"), Some(&Value::from("BOB")));

        let found = app.resolve("GET", "/user/7/").unwrap();
        assert_eq!(found.route, "/user/:id");
        assert_eq!(found.params.get("id"), Some(&Value::from("7")));

        assert!(app.resolve("POST", "/user/7").is_none());
        assert!(app.resolve("GET", "/nowhere").is_none());
        Ok(())
    }

    #[test]
    fn test_optional_param() -> Result<()> {
        let mut app = Router::new();
        app.all("/files/:path?")?;
        assert!(app.resolve("DELETE", "/files").is_some());
        let found = app.resolve("GET", "/files/readme").unwrap();
        assert_eq!(found.params.get("path"), Some(&Value::from("readme")));
        Ok(())
    }
}
