use std::time::Instant;

use axum::extract::Request;
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

/// Log every request on arrival and its response once the handler is done.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();
    tracing::info!(%method, %uri, "Request received");

    let response = next.run(request).await;

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("null")
        .to_owned();
    tracing::info!(
        %method,
        %uri,
        status = response.status().as_u16(),
        content_type,
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "Response sent"
    );
    response
}
