//! Router core - method forest and the dispatch surface.

use std::fmt;

use http::Method;
use tracing::{debug, info};

use super::params::Params;
use super::tree::{count_params, count_sections, Node, SkippedNodes};

/// One method's route tree. The forest is a short ordered list rather than
/// a map: with at most nine distinct methods a linear scan wins.
struct MethodTree<T> {
    method: Method,
    root: Node<T>,
}

/// Result of successfully matching a request path to a route.
#[derive(Debug)]
pub struct RouteMatch<'a, T> {
    /// The handler chain registered for the matched route.
    pub handlers: &'a [T],
    /// Captured path parameters, in registration order.
    pub params: Params<'a>,
    /// The pattern the route was registered under (e.g. `/users/:id`).
    pub full_path: &'a str,
}

/// Outcome of a dispatch lookup.
///
/// A lookup never errors: a miss carries only the trailing-slash hint,
/// which callers typically translate into a redirect.
#[derive(Debug)]
pub enum Lookup<'a, T> {
    /// A route matched.
    Matched(RouteMatch<'a, T>),
    /// No route matched. `tsr` is true when the same path with a toggled
    /// trailing slash would have reached a terminal.
    Miss { tsr: bool },
}

impl<'a, T> Lookup<'a, T> {
    /// The match, if any.
    #[must_use]
    pub fn matched(self) -> Option<RouteMatch<'a, T>> {
        match self {
            Lookup::Matched(m) => Some(m),
            Lookup::Miss { .. } => None,
        }
    }

    /// Whether a trailing-slash redirect is recommended. Always false on a
    /// match.
    #[must_use]
    pub fn tsr(&self) -> bool {
        matches!(self, Lookup::Miss { tsr: true })
    }
}

/// A registered route, as reported by [`Router::routes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    pub method: Method,
    pub path: String,
}

/// Maps (method, path) pairs to handler chains via one radix tree per
/// method.
///
/// Registration and dispatch are strictly phased: `add_route` is not safe
/// against concurrent calls or concurrent lookups, while any number of
/// concurrent `route` calls may run once registration is done.
///
/// # Example
///
/// ```rust,ignore
/// use http::Method;
/// use radixroute::{Lookup, Router};
///
/// let mut router = Router::new();
/// router.add_route(Method::GET, "/users/:id", vec![get_user]);
///
/// if let Lookup::Matched(m) = router.route(&Method::GET, "/users/123") {
///     assert_eq!(m.params.get("id"), Some("123"));
/// }
/// ```
pub struct Router<T> {
    trees: Vec<MethodTree<T>>,
    /// Highest wildcard count over all registered patterns; pre-sizes the
    /// capture buffer so hot-path lookups do not reallocate.
    max_params: usize,
    /// Highest section count over all registered patterns; pre-sizes the
    /// backtracking stack.
    max_sections: usize,
    unescape_path_values: bool,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Router<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            trees: Vec::new(),
            max_params: 0,
            max_sections: 0,
            unescape_path_values: true,
        }
    }

    /// Controls percent-decoding of captured parameter values. On by
    /// default; static segments are always matched byte-exact regardless.
    pub fn set_unescape_path_values(&mut self, unescape: bool) {
        self.unescape_path_values = unescape;
    }

    /// Registers `handlers` for `method` and `path`, creating the method
    /// tree on first use.
    ///
    /// # Panics
    ///
    /// If `path` does not begin with `/`, `method` is empty, or `handlers`
    /// is empty; and on any pattern error: malformed wildcards, wildcard
    /// conflicts with existing routes, and duplicate registration.
    pub fn add_route(&mut self, method: Method, path: &str, handlers: Vec<T>) {
        assert!(
            path.starts_with('/'),
            "path must begin with '/' in path '{path}'"
        );
        assert!(!method.as_str().is_empty(), "HTTP method can not be empty");
        assert!(!handlers.is_empty(), "there must be at least one handler");

        debug!(method = %method, path = %path, handlers = handlers.len(), "registering route");

        let root = match self.trees.iter().position(|t| t.method == method) {
            Some(i) => &mut self.trees[i].root,
            None => {
                self.trees.push(MethodTree {
                    method,
                    root: Node::default(),
                });
                let last = self.trees.len() - 1;
                &mut self.trees[last].root
            }
        };
        root.add_route(path, handlers);

        self.max_params = self.max_params.max(count_params(path));
        self.max_sections = self.max_sections.max(count_sections(path));
    }

    /// Matches a request path against the routes registered for `method`.
    ///
    /// Returns the handler chain with captured parameters on a hit; on a
    /// miss, the trailing-slash hint tells the caller whether redirecting
    /// to the path with a toggled trailing slash would succeed.
    #[must_use]
    pub fn route<'a>(&'a self, method: &Method, path: &'a str) -> Lookup<'a, T> {
        let Some(root) = self.tree(method) else {
            debug!(method = %method, path = %path, "no routes registered for method");
            return Lookup::Miss { tsr: false };
        };

        let mut params = Params::with_capacity(self.max_params);
        let mut skipped: SkippedNodes<'a, T> = Vec::with_capacity(self.max_sections);
        let value = root.get_value(path, &mut params, &mut skipped, self.unescape_path_values);

        match value.handlers {
            Some(handlers) => {
                debug!(
                    method = %method,
                    path = %path,
                    route = %value.full_path,
                    "route matched"
                );
                Lookup::Matched(RouteMatch {
                    handlers,
                    params,
                    full_path: value.full_path,
                })
            }
            None => {
                debug!(method = %method, path = %path, tsr = value.tsr, "no route matched");
                Lookup::Miss { tsr: value.tsr }
            }
        }
    }

    /// Case-insensitive lookup of `path` for `method`, returning the
    /// case-corrected registered path if one exists. With
    /// `fix_trailing_slash`, a missing or extra trailing `/` is repaired
    /// as well.
    #[must_use]
    pub fn find_case_insensitive_path(
        &self,
        method: &Method,
        path: &str,
        fix_trailing_slash: bool,
    ) -> Option<String> {
        self.tree(method)?
            .find_case_insensitive_path(path, fix_trailing_slash)
    }

    /// All registered routes, per method, in tree order.
    #[must_use]
    pub fn routes(&self) -> Vec<RouteInfo> {
        let mut out = Vec::new();
        for tree in &self.trees {
            collect_routes(&tree.root, &tree.method, &mut out);
        }
        out
    }

    /// Logs the full routing table; useful to verify registrations at
    /// startup.
    pub fn dump_routes(&self) {
        let routes = self.routes();
        info!(routes_count = routes.len(), "routing table");
        for r in &routes {
            info!(method = %r.method, path = %r.path, "route");
        }
    }

    fn tree(&self, method: &Method) -> Option<&Node<T>> {
        self.trees
            .iter()
            .find(|t| &t.method == method)
            .map(|t| &t.root)
    }
}

fn collect_routes<T>(n: &Node<T>, method: &Method, out: &mut Vec<RouteInfo>) {
    if !n.handlers.is_empty() {
        out.push(RouteInfo {
            method: method.clone(),
            path: n.full_path.clone(),
        });
    }
    for child in &n.children {
        collect_routes(child, method, out);
    }
}

impl<T> fmt::Debug for Router<T> {
    /// Renders each method tree as an indented edge list, one `|__ path`
    /// line per node.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for tree in &self.trees {
            writeln!(f, "{}:", tree.method)?;
            fmt_tree(&tree.root, 1, f)?;
        }
        Ok(())
    }
}

fn fmt_tree<T>(n: &Node<T>, depth: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(
        f,
        "{:indent$}|__ {}",
        "",
        String::from_utf8_lossy(&n.path),
        indent = depth * 2
    )?;
    for child in &n.children {
        fmt_tree(child, depth + 1, f)?;
    }
    Ok(())
}
