//! The request-like structure the middleware reads and rewrites.

use mongoguard_core::{Mapping, RequestSection, Value};

use crate::router::Router;

/// An inbound request, reduced to what sanitization touches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    pub method: String,
    /// The request path, query string included if the host left it there.
    pub path: String,
    /// The matched route pattern, once routing has run.
    pub route: Option<String>,
    pub body: Value,
    pub query: Mapping,
    pub params: Mapping,
}

impl Request {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
            ..Default::default()
        }
    }

    pub fn with_body(mut self, body: impl Into<Value>) -> Self {
        self.body = body.into();
        self
    }

    /// Uses a JSON object as the query section. Non-object values leave it empty.
    pub fn with_query(mut self, query: serde_json::Value) -> Self {
        if let Value::Mapping(map) = Value::from(query) {
            self.query = map;
        }
        self
    }

    /// A snapshot of one section as a `Value`.
    pub fn section(&self, section: RequestSection) -> Value {
        match section {
            RequestSection::Body => self.body.clone(),
            RequestSection::Query => Value::Mapping(self.query.clone()),
            RequestSection::Params => Value::Mapping(self.params.clone()),
        }
    }

    /// Stores a sanitized section.
    ///
    /// The body is replaced outright. Query and params are cleared and refilled in
    /// place, because hosts may hand out live references to those mappings. A
    /// non-mapping value for query or params leaves the section empty.
    pub fn set_section(&mut self, section: RequestSection, value: Value) {
        match section {
            RequestSection::Body => self.body = value,
            RequestSection::Query => refill(&mut self.query, value),
            RequestSection::Params => refill(&mut self.params, value),
        }
    }

    /// Routes the request: records the matched pattern and the hooked params.
    /// Returns `false` if no route matched.
    pub fn route_with(&mut self, router: &Router) -> bool {
        match router.resolve(&self.method, &self.path) {
            Some(found) => {
                self.route = Some(found.route);
                self.params.replace_with(found.params);
                true
            }
            None => false,
        }
    }
}

fn refill(target: &mut Mapping, value: Value) {
    match value {
        Value::Mapping(map) => target.replace_with(map),
        _ => target.clear(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_is_refilled_in_place() {
        let mut request = Request::new("get", "/search").with_query(json!({"a": 1, "b": 2}));
        let before = &request.query as *const Mapping;

        let mut replacement = Mapping::new();
        replacement.insert("c", 3);
        request.set_section(RequestSection::Query, Value::Mapping(replacement));

        assert_eq!(before, &request.query as *const Mapping);
        assert_eq!(request.query.len(), 1);
        assert_eq!(request.query.get("c"), Some(&Value::from(3)));
        assert_eq!(request.method, "GET");
    }

    #[test]
    fn test_body_section_round_trip() {
        let mut request = Request::new("POST", "/").with_body(json!({"x": [1]}));
        let body = request.section(RequestSection::Body);
        request.set_section(RequestSection::Body, Value::from("replaced"));
        assert_eq!(body.to_json(), json!({"x": [1]}));
        assert_eq!(request.body, Value::from("replaced"));
    }
}
