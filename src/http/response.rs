//! HTTP response building module
//!
//! Every response the board sends is JSON: `{"results": [...]}`, with an
//! `error` string alongside on failure statuses.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::store::Message;

const JSON_CONTENT_TYPE: &str = "application/json";
const EMPTY_RESULTS: &str = r#"{"results":[]}"#;

#[derive(Serialize)]
struct ResultsBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    results: &'a [Message],
}

/// Build a `{"results": [...]}` response with the given status and headers
pub fn build_results_response(
    status: StatusCode,
    results: &[Message],
    headers: HeaderMap,
) -> Response<Full<Bytes>> {
    build_json_response(status, None, results, headers)
}

/// Build an error response that still carries the current results
pub fn build_error_response(
    status: StatusCode,
    error: &str,
    results: &[Message],
    headers: HeaderMap,
) -> Response<Full<Bytes>> {
    build_json_response(status, Some(error), results, headers)
}

fn build_json_response(
    status: StatusCode,
    error: Option<&str>,
    results: &[Message],
    headers: HeaderMap,
) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(&ResultsBody { error, results }).map_or_else(
        |e| {
            crate::logger::log_error(&format!("Failed to serialize results: {e}"));
            Bytes::from_static(EMPTY_RESULTS.as_bytes())
        },
        Bytes::from,
    );

    let mut builder = Response::builder().status(status);
    if let Some(map) = builder.headers_mut() {
        map.extend(headers);
        map.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    }

    builder.body(Full::new(body)).unwrap_or_else(|e| {
        log_build_error(status.as_str(), &e);
        Response::new(Full::new(Bytes::from_static(EMPTY_RESULTS.as_bytes())))
    })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
