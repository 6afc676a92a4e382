// mongoguard/src/lib.rs
//! # MongoGuard Request Integration
//!
//! This crate wires the `mongoguard-core` engine into a request pipeline. It provides a
//! small express-style router, the request structure the middleware rewrites, and the
//! `MongoGuard` middleware itself.
//!
//! ```rust
//! use mongoguard::{MongoGuard, Request, Router};
//! use mongoguard_core::SanitizeConfig;
//! use serde_json::json;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut router = Router::new();
//!     router.get("/user/:id")?;
//!     let guard = MongoGuard::with_router(&SanitizeConfig::default(), &mut router)?;
//!
//!     let mut request = Request::new("GET", "/user/$admin").with_query(json!({ "$where": "1" }));
//!     request.route_with(&router);
//!     guard.handle(&mut request)?;
//!
//!     assert_eq!(request.params.get("id").and_then(|v| v.as_str()), Some("admin"));
//!     assert!(request.query.contains_key("where"));
//!     Ok(())
//! }
//! ```

pub mod logger;
pub mod middleware;
pub mod request;
pub mod router;

pub use logger::init_logger;
pub use middleware::{sanitize_body, MongoGuard};
pub use request::Request;
pub use router::{ParamHook, PathMatcher, RouteMatch, Router};
