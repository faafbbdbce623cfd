//! Layers applied to every HTTP response.

use axum::http::{header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue};
use tower_http::set_header::SetResponseHeaderLayer;

pub mod trace;

/// Allows any origin to read the metrics, including from error and not-found responses.
pub fn cors_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"))
}
