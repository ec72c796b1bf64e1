//! Request metrics for API routes.

use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware::Next,
    response::Response,
};
use std::time::{Duration, Instant};
use tracing::warn;

use crate::metrics::{
    normalize_path, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION,
};

/// Searches and stage runs can legitimately take a while; anything slower is logged.
const SLOW_REQUEST: Duration = Duration::from_secs(30);

/// Label for a request: the route template when axum matched one, the
/// id-normalized URI path otherwise.
fn route_label(request: &Request<Body>) -> String {
    match request.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_string(),
        None => normalize_path(request.uri().path()),
    }
}

/// Records duration, count and in-flight gauge per method, route and status.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = route_label(&request);

    HTTP_REQUESTS_IN_FLIGHT.inc();
    let response = next.run(request).await;
    HTTP_REQUESTS_IN_FLIGHT.dec();

    let elapsed = start.elapsed();
    let status = response.status().as_u16().to_string();

    if elapsed > SLOW_REQUEST {
        warn!(
            method = %method,
            route = %route,
            status = %status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Slow request"
        );
    }

    let labels = [method.as_str(), route.as_str(), status.as_str()];
    HTTP_REQUEST_DURATION
        .with_label_values(&labels)
        .observe(elapsed.as_secs_f64());
    HTTP_REQUESTS_TOTAL.with_label_values(&labels).inc();

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    async fn ok() -> &'static str {
        "OK"
    }

    #[tokio::test]
    async fn test_counts_requests_by_route_template() {
        let app = Router::new()
            .route("/widgets/{id}", get(ok))
            .layer(middleware::from_fn(metrics_middleware));
        let before = HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/widgets/{id}", "200"])
            .get();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/widgets/abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let after = HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/widgets/{id}", "200"])
            .get();
        assert_eq!(after, before + 1);
    }

    #[test]
    fn test_unmatched_path_is_normalized() {
        let request = Request::builder()
            .uri("/api/v1/media/12345/attempts")
            .body(Body::empty())
            .unwrap();

        assert_eq!(route_label(&request), "/api/v1/media/{id}/attempts");
    }
}
