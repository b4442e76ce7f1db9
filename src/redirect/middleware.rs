use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;

/// When the redirect request entered the router.
#[derive(Copy, Clone)]
pub struct RequestStart(pub Instant);

/// Stamp the request with its arrival time and log how long resolution took.
pub async fn record_request_start(mut request: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let path = request.uri().path().to_owned();
    request.extensions_mut().insert(RequestStart(started));

    let response = next.run(request).await;

    tracing::debug!(
        path = %path,
        status = response.status().as_u16(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "redirect request served"
    );
    response
}
