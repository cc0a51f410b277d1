//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: path check against the single
//! message resource, method dispatch, store access and response assembly.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderMap, HeaderName, HeaderValue, ALLOW, REFERER, SERVER, USER_AGENT};
use hyper::http::request::Parts;
use hyper::{Method, Request, Response, StatusCode};

use super::body::{check_content_length, read_message};
use super::error::DispatchError;
use crate::config::AppState;
use crate::http;
use crate::logger::{self, AccessLogEntry};
use crate::store::{Message, OrderInstruction};

/// Header listing the allowed methods on OPTIONS responses
pub const OPTIONS_HEADER: HeaderName = HeaderName::from_static("options");

/// Methods the message resource actually serves, sent as `Allow` on 405
const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: Option<SocketAddr>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let (parts, body) = req.into_parts();

    logger::log_request(&parts.method, &parts.uri, parts.version);
    logger::log_headers_count(parts.headers.len(), state.config.logging.show_headers);

    let response = dispatch(&parts, body, &state).await;

    if state.access_log_enabled() {
        let entry = access_entry(&parts, peer_addr, &response, started);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

async fn dispatch<B>(parts: &Parts, body: B, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let mut headers = state.cors.fresh();
    match HeaderValue::from_str(&state.config.http.server_name) {
        Ok(server) => {
            headers.insert(SERVER, server);
        }
        Err(e) => logger::log_warning(&format!("Invalid server name header: {e}")),
    }

    match route(parts, body, state, &mut headers).await {
        Ok((status, results)) => http::build_results_response(status, &results, headers),
        Err(err) => {
            logger::log_warning(&format!("{} {}: {err}", parts.method, parts.uri.path()));
            if matches!(err, DispatchError::MethodNotAllowed(_)) {
                headers.insert(ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
            }
            let results = state.store.list_all().await;
            http::build_error_response(err.status(), &err.to_string(), &results, headers)
        }
    }
}

async fn route<B>(
    parts: &Parts,
    body: B,
    state: &AppState,
    headers: &mut HeaderMap,
) -> Result<(StatusCode, Vec<Message>), DispatchError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let path = parts.uri.path();
    if path != state.config.messages.resource_path {
        return Err(DispatchError::NotFound(path.to_string()));
    }

    match parts.method {
        Method::OPTIONS => {
            headers.insert(OPTIONS_HEADER, state.cors.allow_methods().clone());
            Ok((StatusCode::OK, state.store.list_all().await))
        }
        Method::GET => Ok((StatusCode::OK, list_messages(parts.uri.query(), state).await)),
        Method::POST => {
            let max_body_size = state.config.http.max_body_size;
            check_content_length(&parts.headers, max_body_size)?;
            let record = read_message(body, max_body_size).await?;
            Ok((StatusCode::CREATED, state.store.append(record).await))
        }
        _ => Err(DispatchError::MethodNotAllowed(parts.method.clone())),
    }
}

/// Any query string, even an empty one, asks for a sort
async fn list_messages(query: Option<&str>, state: &AppState) -> Vec<Message> {
    let Some(query) = query else {
        return state.store.list_all().await;
    };

    let order = OrderInstruction::from_query(query);
    if state.config.messages.persistent_sort {
        state.store.sort(&order).await
    } else {
        state.store.sorted_view(&order).await
    }
}

fn access_entry(
    parts: &Parts,
    peer_addr: Option<SocketAddr>,
    response: &Response<Full<Bytes>>,
    started: Instant,
) -> AccessLogEntry {
    let header = |name: HeaderName| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        peer_addr.map_or_else(|| "-".to_string(), |addr| addr.ip().to_string()),
        parts.method.to_string(),
        parts.uri.path().to_string(),
    );
    entry.query = parts.uri.query().map(ToString::to_string);
    entry.http_version = logger::format_version(parts.version);
    entry.status = response.status().as_u16();
    entry.body_bytes = response
        .body()
        .size_hint()
        .exact()
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or_default();
    entry.referer = header(REFERER);
    entry.user_agent = header(USER_AGENT);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::handler::body::tests::ChunkedBody;
    use http_body_util::BodyExt;
    use hyper::header::{
        ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
        ACCESS_CONTROL_MAX_AGE, CONTENT_TYPE,
    };
    use serde_json::{json, Value};

    const MESSAGES: &str = "/classes/messages";

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState::new(&Config::default()))
    }

    fn request(method: Method, uri: &str, body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    async fn send(
        state: &Arc<AppState>,
        method: Method,
        uri: &str,
        body: &str,
    ) -> (StatusCode, HeaderMap, Value) {
        let response = handle_request(request(method, uri, body), Arc::clone(state), None)
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap();
        (status, headers, json)
    }

    fn results(body: &Value) -> &Vec<Value> {
        body["results"].as_array().expect("results array")
    }

    fn stub(name: &str, text: &str, id: i64) -> String {
        json!({"username": name, "message": text, "objectId": id, "createdAt": id}).to_string()
    }

    #[tokio::test]
    async fn test_get_empty_store() {
        let state = test_state();
        let (status, headers, body) = send(&state, Method::GET, MESSAGES, "").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"results": []}));
        assert_eq!(headers[CONTENT_TYPE], "application/json");
    }

    #[tokio::test]
    async fn test_post_returns_created_with_record() {
        let state = test_state();
        let record = r#"{"username":"Jono","message":"Hi","objectId":1,"createdAt":1}"#;
        let (status, _, body) = send(&state, Method::POST, MESSAGES, record).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            body,
            json!({"results": [{"username": "Jono", "message": "Hi", "objectId": 1, "createdAt": 1}]})
        );
    }

    #[tokio::test]
    async fn test_posted_record_round_trips_verbatim() {
        let state = test_state();
        let record = json!({
            "username": "Jono",
            "message": "Do my bidding!",
            "objectId": "abc",
            "createdAt": 2.5,
            "extra": {"nested": [1, null, true]}
        });
        send(&state, Method::POST, MESSAGES, &record.to_string()).await;

        let (status, _, body) = send(&state, Method::GET, MESSAGES, "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(results(&body), &vec![record]);
    }

    #[tokio::test]
    async fn test_posts_keep_insertion_order() {
        let state = test_state();
        for id in [5, 1, 3] {
            send(&state, Method::POST, MESSAGES, &stub("u", "m", id)).await;
        }

        let (_, _, body) = send(&state, Method::GET, MESSAGES, "").await;
        let ids: Vec<_> = results(&body).iter().map(|r| r["objectId"].clone()).collect();
        assert_eq!(ids, vec![json!(5), json!(1), json!(3)]);
    }

    #[tokio::test]
    async fn test_order_descending_then_ascending() {
        let state = test_state();
        send(&state, Method::POST, MESSAGES, &stub("Jono", "Do my bidding!", 3)).await;
        send(&state, Method::POST, MESSAGES, &stub("TIMMI", "NEVER!", 4)).await;

        let (status, _, body) =
            send(&state, Method::GET, "/classes/messages?order=-createdAt", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(results(&body)[0]["username"], "TIMMI");
        assert_eq!(results(&body)[0]["createdAt"], 4);

        let (_, _, body) = send(&state, Method::GET, "/classes/messages?order=createdAt", "").await;
        assert_eq!(results(&body)[0]["username"], "Jono");
    }

    #[tokio::test]
    async fn test_order_by_other_field() {
        let state = test_state();
        for (object_id, created_at) in [(1, 1), (2, 3), (3, 2)] {
            let record = json!({"username": "u", "objectId": object_id, "createdAt": created_at});
            send(&state, Method::POST, MESSAGES, &record.to_string()).await;
        }

        let (status, _, body) =
            send(&state, Method::GET, "/classes/messages?order=-objectId", "").await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<_> = results(&body).iter().map(|r| r["objectId"].clone()).collect();
        assert_eq!(ids, vec![json!(3), json!(2), json!(1)]);
        let created: Vec<_> = results(&body).iter().map(|r| r["createdAt"].clone()).collect();
        assert_eq!(created, vec![json!(2), json!(3), json!(1)]);
    }

    #[tokio::test]
    async fn test_sort_persists_into_later_gets() {
        let state = test_state();
        send(&state, Method::POST, MESSAGES, &stub("a", "m", 1)).await;
        send(&state, Method::POST, MESSAGES, &stub("b", "m", 2)).await;

        send(&state, Method::GET, "/classes/messages?order=-createdAt", "").await;
        let (_, _, body) = send(&state, Method::GET, MESSAGES, "").await;
        assert_eq!(results(&body)[0]["username"], "b");
    }

    #[tokio::test]
    async fn test_sort_as_view_when_not_persistent() {
        let mut config = Config::default();
        config.messages.persistent_sort = false;
        let state = Arc::new(AppState::new(&config));
        send(&state, Method::POST, MESSAGES, &stub("a", "m", 1)).await;
        send(&state, Method::POST, MESSAGES, &stub("b", "m", 2)).await;

        let (_, _, sorted) =
            send(&state, Method::GET, "/classes/messages?order=-createdAt", "").await;
        assert_eq!(results(&sorted)[0]["username"], "b");

        let (_, _, plain) = send(&state, Method::GET, MESSAGES, "").await;
        assert_eq!(results(&plain)[0]["username"], "a");
    }

    #[tokio::test]
    async fn test_empty_query_sorts_ascending_by_created_at() {
        let state = test_state();
        send(&state, Method::POST, MESSAGES, &stub("late", "m", 9)).await;
        send(&state, Method::POST, MESSAGES, &stub("early", "m", 1)).await;

        let (status, _, body) = send(&state, Method::GET, "/classes/messages?", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(results(&body)[0]["username"], "early");
    }

    #[tokio::test]
    async fn test_sort_on_missing_field_keeps_every_record() {
        let state = test_state();
        send(&state, Method::POST, MESSAGES, r#"{"username":"no-key"}"#).await;
        send(&state, Method::POST, MESSAGES, &stub("keyed", "m", 1)).await;

        let (status, _, body) =
            send(&state, Method::GET, "/classes/messages?order=-missing", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(results(&body).len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_path_is_404_with_results() {
        let state = test_state();
        send(&state, Method::POST, MESSAGES, &stub("a", "m", 1)).await;

        for method in [Method::GET, Method::POST, Method::OPTIONS, Method::DELETE] {
            let (status, headers, body) = send(&state, method, "/arglebargle", "{}").await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
            assert_eq!(results(&body).len(), 1);
        }
        assert_eq!(state.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_options_does_not_mutate_store() {
        let state = test_state();
        send(&state, Method::POST, MESSAGES, &stub("a", "m", 1)).await;

        let (status, headers, body) = send(&state, Method::OPTIONS, MESSAGES, "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[OPTIONS_HEADER], "GET, POST, PUT, DELETE, OPTIONS");
        assert_eq!(results(&body).len(), 1);

        let (_, _, body) = send(&state, Method::GET, MESSAGES, "").await;
        assert_eq!(results(&body).len(), 1);
    }

    #[tokio::test]
    async fn test_options_header_does_not_leak() {
        let state = test_state();
        let (_, before, _) = send(&state, Method::GET, MESSAGES, "").await;
        send(&state, Method::OPTIONS, MESSAGES, "").await;
        let (_, after_get, _) = send(&state, Method::GET, MESSAGES, "").await;
        let (_, after_post, _) = send(&state, Method::POST, MESSAGES, &stub("a", "m", 1)).await;

        for headers in [&after_get, &after_post] {
            assert!(headers.get(OPTIONS_HEADER).is_none());
            for name in [
                ACCESS_CONTROL_ALLOW_ORIGIN,
                ACCESS_CONTROL_ALLOW_METHODS,
                ACCESS_CONTROL_ALLOW_HEADERS,
                ACCESS_CONTROL_MAX_AGE,
                CONTENT_TYPE,
            ] {
                assert_eq!(headers.get(&name), before.get(&name));
            }
        }
        assert_eq!(before, after_get);
    }

    #[tokio::test]
    async fn test_malformed_post_is_400_without_mutation() {
        let state = test_state();
        send(&state, Method::POST, MESSAGES, &stub("a", "m", 1)).await;

        let (status, _, body) = send(&state, Method::POST, MESSAGES, "{\"username\":").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("invalid JSON"));
        assert_eq!(results(&body).len(), 1);

        let (status, _, _) = send(&state, Method::POST, MESSAGES, "[1,2,3]").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(state.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_other_methods_are_405() {
        let state = test_state();
        for method in [Method::PUT, Method::DELETE, Method::PATCH, Method::HEAD] {
            let (status, headers, body) = send(&state, method, MESSAGES, "{}").await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(headers[ALLOW], "GET, POST, OPTIONS");
            assert_eq!(
                headers[ACCESS_CONTROL_ALLOW_METHODS],
                "GET, POST, PUT, DELETE, OPTIONS"
            );
            assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
            assert!(body["results"].is_array());
        }
        assert_eq!(state.store.len().await, 0);
    }

    #[tokio::test]
    async fn test_oversized_post_is_413() {
        let mut config = Config::default();
        config.http.max_body_size = 16;
        let state = Arc::new(AppState::new(&config));

        let (status, _, body) = send(&state, Method::POST, MESSAGES, &stub("a", "m", 1)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(results(&body).is_empty());
        assert_eq!(state.store.len().await, 0);
    }

    #[tokio::test]
    async fn test_chunked_post_appends_once() {
        let state = test_state();
        let req = Request::builder()
            .method(Method::POST)
            .uri(MESSAGES)
            .body(ChunkedBody::new(&[b"{\"username\":", b"\"Jono\",", b"\"createdAt\":1}"]))
            .unwrap();

        let response = handle_request(req, Arc::clone(&state), None).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(state.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_access_entry_fields() {
        let req = Request::builder()
            .method(Method::GET)
            .uri("/classes/messages?order=-createdAt")
            .header(USER_AGENT, "test-agent")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let (parts, _) = req.into_parts();
        let response = http::build_results_response(StatusCode::OK, &[], HeaderMap::new());

        let peer: SocketAddr = "10.0.0.7:5555".parse().unwrap();
        let entry = access_entry(&parts, Some(peer), &response, Instant::now());
        assert_eq!(entry.remote_addr, "10.0.0.7");
        assert_eq!(entry.query.as_deref(), Some("order=-createdAt"));
        assert_eq!(entry.status, 200);
        assert_eq!(entry.body_bytes, r#"{"results":[]}"#.len());
        assert_eq!(entry.user_agent.as_deref(), Some("test-agent"));
        assert!(entry.referer.is_none());
    }
}
