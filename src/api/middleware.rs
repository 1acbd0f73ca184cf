//! API middleware: request-id echo, attached to every response so a
//! caller's correlation id round-trips even when it generated none.

use axum::{body::Body, extract::Request, http::header, middleware::Next, response::Response};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "X-Request-Id";

/// Echoes an inbound `X-Request-Id` header, or generates one, and attaches
/// it to the response.
pub async fn request_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request
        .headers_mut()
        .insert(X_REQUEST_ID, request_id.parse().unwrap());

    let mut response = next.run(request).await;
    if let Ok(value) = header::HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}
