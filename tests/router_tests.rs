//! Dispatch surface: method forest behavior across all supported verbs.

use http::Method;
use radixroute::{Lookup, RouteMatch, Router};

fn zoo_router() -> Router<&'static str> {
    let mut router = Router::new();
    let routes: &[(Method, &str, &'static str)] = &[
        (Method::GET, "/zoo/animals", "get_animals"),
        (Method::POST, "/zoo/animals", "create_animal"),
        (Method::GET, "/zoo/animals/:id", "get_animal"),
        (Method::PUT, "/zoo/animals/:id", "update_animal"),
        (Method::PATCH, "/zoo/animals/:id", "patch_animal"),
        (Method::DELETE, "/zoo/animals/:id", "delete_animal"),
        (Method::HEAD, "/zoo/health", "health_check"),
        (Method::OPTIONS, "/zoo/health", "supported_ops"),
        (Method::TRACE, "/zoo/health", "trace_route"),
    ];
    for (method, path, handler) in routes {
        router.add_route(method.clone(), path, vec![*handler]);
    }
    router
}

#[test]
fn test_all_http_verbs() {
    let router = zoo_router();

    let cases = vec![
        (Method::GET, "/zoo/animals", "get_animals"),
        (Method::POST, "/zoo/animals", "create_animal"),
        (Method::GET, "/zoo/animals/123", "get_animal"),
        (Method::PUT, "/zoo/animals/123", "update_animal"),
        (Method::PATCH, "/zoo/animals/123", "patch_animal"),
        (Method::DELETE, "/zoo/animals/123", "delete_animal"),
        (Method::HEAD, "/zoo/health", "health_check"),
        (Method::OPTIONS, "/zoo/health", "supported_ops"),
        (Method::TRACE, "/zoo/health", "trace_route"),
        (Method::GET, "/unknown", "<none>"),
    ];

    for (method, path, expected_handler) in cases {
        match router.route(&method, path) {
            Lookup::Matched(RouteMatch { handlers, .. }) => {
                assert_eq!(
                    handlers,
                    &[expected_handler],
                    "handler mismatch for {method} {path}"
                );
            }
            Lookup::Miss { .. } => {
                assert_eq!(expected_handler, "<none>", "unexpected miss for {method} {path}");
            }
        }
    }
}

#[test]
fn test_methods_do_not_leak_into_each_other() {
    let router = zoo_router();

    // Registered for GET/POST only.
    assert!(router
        .route(&Method::DELETE, "/zoo/animals")
        .matched()
        .is_none());
    // Registered for HEAD/OPTIONS/TRACE only.
    assert!(router.route(&Method::GET, "/zoo/health").matched().is_none());
}

#[test]
fn test_params_same_path_different_methods() {
    let router = zoo_router();

    for method in [Method::GET, Method::PUT, Method::PATCH, Method::DELETE] {
        let m = router.route(&method, "/zoo/animals/42").matched().unwrap();
        assert_eq!(m.params.get("id"), Some("42"), "{method}");
        assert_eq!(m.full_path, "/zoo/animals/:id");
    }
}

#[test]
fn test_capture_order_and_values() {
    let mut router = Router::new();
    router.add_route(
        Method::GET,
        "/users/:user_id/posts/:post_id/comments/:comment_id",
        vec!["get_comment"],
    );

    let m = router
        .route(&Method::GET, "/users/123/posts/456/comments/789")
        .matched()
        .unwrap();
    let pairs: Vec<(String, String)> = m
        .params
        .iter()
        .map(|p| (p.key.to_string(), p.value.to_string()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("user_id".to_string(), "123".to_string()),
            ("post_id".to_string(), "456".to_string()),
            ("comment_id".to_string(), "789".to_string()),
        ]
    );
}

#[test]
fn test_unescaped_values_cross_method() {
    let mut router = Router::new();
    router.add_route(Method::GET, "/tags/:tag", vec!["get_tag"]);

    let m = router
        .route(&Method::GET, "/tags/caf%C3%A9")
        .matched()
        .unwrap();
    assert_eq!(m.params.get("tag"), Some("café"));
}

#[test]
fn test_miss_with_tsr_is_per_method() {
    let mut router = Router::new();
    router.add_route(Method::GET, "/foo", vec!["get_foo"]);

    assert!(router.route(&Method::GET, "/foo/").tsr());
    // No POST tree at all, so no hint either.
    assert!(!router.route(&Method::POST, "/foo/").tsr());
}

#[test]
fn test_case_insensitive_is_per_method() {
    let mut router = Router::new();
    router.add_route(Method::GET, "/Zoo/Health", vec!["health"]);

    assert_eq!(
        router
            .find_case_insensitive_path(&Method::GET, "/zoo/health", false)
            .as_deref(),
        Some("/Zoo/Health")
    );
    assert!(router
        .find_case_insensitive_path(&Method::HEAD, "/zoo/health", false)
        .is_none());
}

#[test]
fn test_routes_reports_every_method_tree() {
    let router = zoo_router();

    let routes = router.routes();
    assert_eq!(routes.len(), 9);
    assert!(routes
        .iter()
        .any(|r| r.method == Method::TRACE && r.path == "/zoo/health"));
    assert!(routes
        .iter()
        .any(|r| r.method == Method::GET && r.path == "/zoo/animals/:id"));
}
