//! # Router Module
//!
//! The router module maps (HTTP method, request path) pairs to registered
//! handler chains, extracting path parameters along the way.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Building one compressed radix tree per HTTP method at registration time
//! - Matching incoming request paths against the method's tree
//! - Extracting `:name` and `*name` parameters from matched routes
//! - Recommending trailing-slash redirects and case-corrected paths on a miss
//!
//! ## Architecture
//!
//! Routes live in a radix tree: shared path prefixes are stored once, so
//! matching is O(k) in the path length rather than O(n) in the route count.
//! Static segments take precedence over `:name` parameters, which take
//! precedence over `*name` catch-alls; the lookup keeps a stack of skipped
//! wildcard branches so a dead-ended static branch can backtrack.
//!
//! Registration is strictly separated from dispatch: `add_route` mutates the
//! tree and panics on conflicting patterns, while `route` only reads it and
//! never errors.
//!
//! ## Example
//!
//! ```rust,ignore
//! use http::Method;
//! use radixroute::{Lookup, Router};
//!
//! let mut router = Router::new();
//! router.add_route(Method::GET, "/pets/:id", vec![get_pet]);
//!
//! match router.route(&Method::GET, "/pets/123") {
//!     Lookup::Matched(m) => println!("id = {:?}", m.params.get("id")),
//!     Lookup::Miss { tsr } => println!("404 (redirect hint: {tsr})"),
//! }
//! ```

mod caseless;
mod core;
mod params;
mod tree;


pub use self::core::{Lookup, RouteInfo, RouteMatch, Router};
pub use self::params::{Param, Params, MAX_INLINE_PARAMS};
