// mongoguard-core/src/routes.rs
//! Route-level helpers: path-parameter discovery and skip-route matching.
//!
//! Discovery walks a host router once at setup time and collects the names of every
//! declared path parameter, so the integration layer can register one sanitization
//! hook per name. The walk is framework-agnostic: a host adapter only has to expose
//! its layers through [`RouteTree`]. Mount points are described the way most routers
//! store them, as a compiled matcher source, which is decoded back into a literal
//! prefix here.
//!
//! License: MIT OR APACHE 2.0

use std::collections::{BTreeSet, HashMap, HashSet};

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::GuardError;

static PARAM_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r":([A-Za-z0-9_]+)\??").unwrap());

/// One entry in a router's stack.
pub enum RouteLayer<'a> {
    /// A terminal route with its declared path, e.g. `/user/:id`.
    Route { path: &'a str },
    /// A sub-router mounted under a compiled matcher such as `^\/api\/?(?=\/|$)`.
    ///
    /// `keys` are parameter names captured by the mount path itself.
    Mount {
        matcher: &'a str,
        keys: &'a [String],
        node: &'a dyn RouteTree,
    },
}

/// The collaborator interface a host router implements for discovery.
pub trait RouteTree {
    /// The layers of this router, in registration order.
    fn layers(&self) -> Vec<RouteLayer<'_>>;

    /// Identity used to memoise visited routers. Defaults to the address of `self`.
    fn node_id(&self) -> usize {
        self as *const Self as *const () as usize
    }
}

/// Extracts `:name` parameter names from a route path, in order of appearance.
pub fn extract_param_names(path: &str) -> Vec<String> {
    PARAM_SEGMENT
        .captures_iter(path)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Decodes a compiled mount matcher back into the literal prefix it was built from.
///
/// Accepts the anchored, slash-escaped form routers emit for mount paths. Returns
/// `None` when the source contains anything other than escaped or plain literal
/// characters between the anchor and the trailing terminator.
pub fn decode_mount_path(matcher: &str) -> Option<String> {
    let body = matcher.strip_prefix('^')?;
    let body = [r"\/?(?=\/|$)", r"(?=\/|$)", r"\/?$", "$"]
        .iter()
        .find_map(|suffix| body.strip_suffix(suffix))
        .unwrap_or(body);

    let mut decoded = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => decoded.push(chars.next()?),
            '.' | '*' | '+' | '?' | '^' | '$' | '{' | '}' | '(' | ')' | '|' | '[' | ']' => return None,
            other => decoded.push(other),
        }
    }

    if decoded == "/" {
        decoded.clear();
    }
    Some(decoded)
}

enum Frame<'a> {
    Enter { node: &'a dyn RouteTree, base: String },
    Exit { id: usize },
}

/// Memoised parameter discovery over one or more route trees.
///
/// Results are cached per router, so a router mounted in several places is walked
/// once. A cycle back to an ancestor is cut at the repeat; routers on that cycle
/// are left uncached, since their own walk was incomplete.
#[derive(Debug, Default)]
pub struct ParamDiscovery {
    cache: HashMap<usize, BTreeSet<String>>,
}

impl ParamDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects every parameter name declared anywhere under `tree`.
    pub fn discover(&mut self, tree: &dyn RouteTree) -> BTreeSet<String> {
        if let Some(cached) = self.cache.get(&tree.node_id()) {
            return cached.clone();
        }

        let mut in_progress: HashSet<usize> = HashSet::new();
        // Each open frame carries whether a cycle cut its walk short; such partial
        // sets are merged upward but never cached.
        let mut open: Vec<(BTreeSet<String>, bool)> = vec![(BTreeSet::new(), false)];
        let mut stack = vec![Frame::Enter { node: tree, base: String::new() }];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter { node, base } => {
                    let id = node.node_id();
                    if let Some(cached) = self.cache.get(&id) {
                        if let Some((parent, _)) = open.last_mut() {
                            parent.extend(cached.iter().cloned());
                        }
                        continue;
                    }
                    if !in_progress.insert(id) {
                        debug!("Router {:#x} already on the discovery path; skipping.", id);
                        open.iter_mut().for_each(|(_, truncated)| *truncated = true);
                        continue;
                    }

                    let mut own = BTreeSet::new();
                    stack.push(Frame::Exit { id });
                    let mut children = Vec::new();

                    for layer in node.layers() {
                        match layer {
                            RouteLayer::Route { path } => {
                                own.extend(extract_param_names(&format!("{}{}", base, path)));
                            }
                            RouteLayer::Mount { matcher, keys, node: child } => {
                                own.extend(keys.iter().cloned());
                                let prefix = decode_mount_path(matcher).unwrap_or_else(|| {
                                    warn!(
                                        "Could not decode mount path from matcher '{}'; discovering beneath it with an empty base path.",
                                        matcher
                                    );
                                    String::new()
                                });
                                children.push(Frame::Enter { node: child, base: format!("{}{}", base, prefix) });
                            }
                        }
                    }

                    open.push((own, false));
                    // Reverse so children are visited in registration order.
                    stack.extend(children.into_iter().rev());
                }
                Frame::Exit { id } => {
                    let (finished, truncated) = open.pop().unwrap_or_default();
                    in_progress.remove(&id);
                    if let Some((parent, _)) = open.last_mut() {
                        parent.extend(finished.iter().cloned());
                    }
                    if !truncated {
                        self.cache.insert(id, finished);
                    }
                }
            }
        }

        let (params, _) = open.pop().unwrap_or_default();
        debug!("Discovered {} route parameter name(s).", params.len());
        params
    }
}

/// One-shot discovery over a single tree.
pub fn discover_params(tree: &dyn RouteTree) -> BTreeSet<String> {
    ParamDiscovery::new().discover(tree)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param,
}

/// Matcher for the `skipRoutes` option.
///
/// Supports exact paths, a trailing `*` wildcard (`/public/*`, or `*` alone for
/// every path), and `:param` segments that match any single non-empty segment.
#[derive(Debug, Clone, Default)]
pub struct SkipRoutes {
    exact: HashSet<String>,
    prefixes: Vec<String>,
    parameterized: Vec<SegmentPattern>,
}

#[derive(Debug, Clone)]
struct SegmentPattern {
    segments: Vec<Segment>,
    /// Set for `.../*` routes: the path must have at least one more segment.
    open_ended: bool,
}

impl SegmentPattern {
    fn parse(route: &str, open_ended: bool) -> Self {
        let segments = normalize(route)
            .split('/')
            .map(|s| if s.starts_with(':') { Segment::Param } else { Segment::Literal(s.to_string()) })
            .collect();
        Self { segments, open_ended }
    }

    fn matches(&self, path: &[&str]) -> bool {
        let length_ok = if self.open_ended {
            path.len() > self.segments.len()
        } else {
            path.len() == self.segments.len()
        };
        length_ok
            && self.segments.iter().zip(path).all(|(expected, actual)| match expected {
                Segment::Literal(lit) => lit == actual,
                Segment::Param => !actual.is_empty(),
            })
    }
}

impl SkipRoutes {
    pub fn new(routes: &[String]) -> Result<Self, GuardError> {
        let mut skip = SkipRoutes::default();
        for route in routes {
            if route == "*" {
                skip.prefixes.push(String::new());
                continue;
            }
            if !route.starts_with('/') {
                return Err(GuardError::configuration("skipRoutes", format!("\"{}\" (must start with '/')", route)));
            }

            if let Some(prefix) = route.strip_suffix('*') {
                if prefix.contains(':') {
                    skip.parameterized.push(SegmentPattern::parse(prefix, true));
                } else {
                    skip.prefixes.push(prefix.to_string());
                }
            } else if route.contains(':') {
                skip.parameterized.push(SegmentPattern::parse(route, false));
            } else {
                skip.exact.insert(normalize(route).to_string());
            }
        }
        Ok(skip)
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.prefixes.is_empty() && self.parameterized.is_empty()
    }

    /// True if `path` (query string allowed) should bypass sanitization.
    pub fn matches(&self, path: &str) -> bool {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = normalize(path);

        if self.exact.contains(path) {
            return true;
        }
        if self.prefixes.iter().any(|prefix| path.starts_with(prefix.as_str())) {
            return true;
        }

        let segments: Vec<&str> = path.split('/').collect();
        self.parameterized.iter().any(|pattern| pattern.matches(&segments))
    }
}

fn normalize(path: &str) -> &str {
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Node {
        routes: Vec<String>,
        mounts: Vec<(String, Vec<String>, Box<Node>)>,
    }

    impl RouteTree for Node {
        fn layers(&self) -> Vec<RouteLayer<'_>> {
            let mut layers: Vec<RouteLayer<'_>> = self.routes.iter().map(|p| RouteLayer::Route { path: p }).collect();
            for (matcher, keys, node) in &self.mounts {
                layers.push(RouteLayer::Mount { matcher, keys, node: node.as_ref() });
            }
            layers
        }
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_extract_param_names() {
        assert_eq!(extract_param_names("/user/:id"), vec!["id"]);
        assert_eq!(extract_param_names("/a/:first/b/:second?"), vec!["first", "second"]);
        assert!(extract_param_names("/static/path").is_empty());
    }

    #[test]
    fn test_decode_mount_path() {
        assert_eq!(decode_mount_path(r"^\/api\/?(?=\/|$)").as_deref(), Some("/api"));
        assert_eq!(decode_mount_path(r"^\/v1\/users\.json\/?$").as_deref(), Some("/v1/users.json"));
        assert_eq!(decode_mount_path(r"^\/?(?=\/|$)").as_deref(), Some(""));
        assert_eq!(decode_mount_path(r"^\/api-v2\/?(?=\/|$)").as_deref(), Some("/api-v2"));
        assert_eq!(decode_mount_path(r"^\/(?:([^\/]+?))\/?(?=\/|$)"), None);
        assert_eq!(decode_mount_path("no-anchor"), None);
    }

    #[test]
    fn test_discovery_over_nested_routers() {
        let tree = Node {
            routes: vec!["/user/:id".into()],
            mounts: vec![(
                r"^\/api\/?(?=\/|$)".into(),
                vec![],
                Box::new(Node { routes: vec!["/:name".into()], mounts: vec![] }),
            )],
        };
        assert_eq!(discover_params(&tree), set(&["id", "name"]));
    }

    #[test]
    fn test_mount_keys_and_undecodable_matcher() {
        let tree = Node {
            routes: vec![],
            mounts: vec![(
                r"^\/(?:([^\/]+?))\/?(?=\/|$)".into(),
                vec!["tenant".into()],
                Box::new(Node { routes: vec!["/items/:itemId".into()], mounts: vec![] }),
            )],
        };
        assert_eq!(discover_params(&tree), set(&["itemId", "tenant"]));
    }

    #[test]
    fn test_discovery_is_cached_and_idempotent() {
        let tree = Node {
            routes: vec!["/a/:x".into()],
            mounts: vec![],
        };
        let mut discovery = ParamDiscovery::new();
        let first = discovery.discover(&tree);
        let second = discovery.discover(&tree);
        assert_eq!(first, second);
        assert_eq!(first, set(&["x"]));
    }

    struct Looped {
        routes: Vec<String>,
        child: std::sync::OnceLock<&'static Looped>,
    }

    impl RouteTree for Looped {
        fn layers(&self) -> Vec<RouteLayer<'_>> {
            let mut layers: Vec<RouteLayer<'_>> = self.routes.iter().map(|p| RouteLayer::Route { path: p }).collect();
            if let Some(child) = self.child.get() {
                layers.push(RouteLayer::Mount { matcher: r"^\/next\/?(?=\/|$)", keys: &[], node: *child });
            }
            layers
        }
    }

    #[test]
    fn test_cycle_does_not_poison_cache() {
        let outer: &'static Looped =
            Box::leak(Box::new(Looped { routes: vec!["/a/:x".into()], child: Default::default() }));
        let inner: &'static Looped =
            Box::leak(Box::new(Looped { routes: vec!["/:y".into()], child: Default::default() }));
        outer.child.set(inner).ok();
        inner.child.set(outer).ok();

        let mut discovery = ParamDiscovery::new();
        assert_eq!(discovery.discover(outer), set(&["x", "y"]));
        assert_eq!(discovery.discover(inner), set(&["x", "y"]));
        assert_eq!(discovery.discover(outer), set(&["x", "y"]));
    }

    #[test]
    fn test_skip_routes_matching() {
        let skip = SkipRoutes::new(&[
            "/health".to_string(),
            "/public/*".to_string(),
            "/users/:id/avatar".to_string(),
        ])
        .unwrap();

        assert!(skip.matches("/health"));
        assert!(skip.matches("/health/"));
        assert!(skip.matches("/health?verbose=1"));
        assert!(skip.matches("/public/css/site.css"));
        assert!(skip.matches("/users/42/avatar"));
        assert!(!skip.matches("/users//avatar"));
        assert!(!skip.matches("/users/42/profile"));
        assert!(!skip.matches("/healthz"));
        assert!(!skip.matches("/api/users"));
    }

    #[test]
    fn test_skip_route_wildcard_after_param() {
        let skip = SkipRoutes::new(&["/users/:id/*".to_string()]).unwrap();
        assert!(skip.matches("/users/42/avatar"));
        assert!(skip.matches("/users/42/files/a.png?size=2"));
        assert!(!skip.matches("/users/42"));
        assert!(!skip.matches("/users//avatar"));
        assert!(!skip.matches("/teams/42/avatar"));
    }

    #[test]
    fn test_skip_everything_wildcard() {
        let skip = SkipRoutes::new(&["*".to_string()]).unwrap();
        assert!(skip.matches("/anything/at/all"));
        assert!(!SkipRoutes::default().matches("/"));
    }

    #[test]
    fn test_skip_route_must_be_absolute() {
        let err = SkipRoutes::new(&["health".to_string()]).unwrap_err();
        assert!(err.to_string().contains("skipRoutes"));
    }
}
