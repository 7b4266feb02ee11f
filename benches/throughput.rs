use criterion::{black_box, criterion_group, criterion_main, Criterion};
use http::Method;
use radixroute::Router;

fn example_router() -> Router<&'static str> {
    let routes: &[(Method, &str, &'static str)] = &[
        (Method::GET, "/", "root_handler"),
        (Method::GET, "/zoo/animals", "get_animals"),
        (Method::POST, "/zoo/animals", "create_animal"),
        (Method::GET, "/zoo/animals/:id", "get_animal"),
        (Method::PUT, "/zoo/animals/:id", "update_animal"),
        (Method::DELETE, "/zoo/animals/:id", "delete_animal"),
        (Method::GET, "/zoo/animals/:id/toys/:toy_id", "animal_toy"),
        (
            Method::GET,
            "/zoo/:category/animals/:id/habitats/:habitat_id/sections/:section_id",
            "habitat_section",
        ),
        (
            Method::POST,
            "/inventory/:warehouse_id/feeds/:feed_id/items/:item_id/batches/:batch_id",
            "post_item_batch",
        ),
        (
            Method::GET,
            "/complex/:a/:b/:c/:d/:e/:f/:g/:h/:i",
            "complex_many_params",
        ),
        (Method::GET, "/static/*filepath", "serve_static"),
        (Method::HEAD, "/zoo/health", "health_check"),
    ];

    let mut router = Router::new();
    for (method, path, handler) in routes {
        router.add_route(method.clone(), path, vec![*handler]);
    }
    router
}

fn bench_route_throughput(c: &mut Criterion) {
    let router = example_router();
    c.bench_function("route_match", |b| {
        let test_paths = [
            (Method::GET, "/zoo/animals/123"),
            (Method::GET, "/zoo/animals/123/toys/456"),
            (Method::GET, "/zoo/cats/animals/123/habitats/88/sections/5"),
            (Method::POST, "/inventory/1/feeds/2/items/3/batches/4"),
            (Method::GET, "/complex/1/2/3/4/5/6/7/8/9"),
            (Method::GET, "/static/js/app.js"),
        ];
        b.iter(|| {
            for (method, path) in &test_paths {
                let result = router.route(black_box(method), black_box(path));
                black_box(result.matched().is_some());
            }
        });
    });
}

fn bench_route_miss(c: &mut Criterion) {
    let router = example_router();
    c.bench_function("route_miss", |b| {
        b.iter(|| {
            let result = router.route(black_box(&Method::GET), black_box("/not/registered/here"));
            black_box(result.tsr());
        });
    });
}

fn bench_case_insensitive(c: &mut Criterion) {
    let router = example_router();
    c.bench_function("case_insensitive_fix", |b| {
        b.iter(|| {
            black_box(router.find_case_insensitive_path(
                black_box(&Method::GET),
                black_box("/ZOO/Animals/123"),
                true,
            ))
        });
    });
}

criterion_group!(
    benches,
    bench_route_throughput,
    bench_route_miss,
    bench_case_insensitive
);
criterion_main!(benches);
