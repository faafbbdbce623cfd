use axum::{http::Request, middleware::Next, response::Response};
use common::util::time::format_duration;
use std::time::Instant;
use tracing::{debug, info};

/// Logs every request with its status and latency.
///
/// Successful requests are logged at `debug` since dashboards poll the metrics routes every
/// couple of seconds; anything else is logged at `info`.
pub async fn trace_requests<B>(request: Request<B>, next: Next<B>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let status = response.status();
    let took = format_duration(start.elapsed());
    if status.is_success() {
        debug!(%method, %path, status = status.as_u16(), %took, "Handled request");
    } else {
        info!(%method, %path, status = status.as_u16(), %took, "Handled request");
    }
    response
}
