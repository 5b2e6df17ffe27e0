//! Request helpers shared by the router tests.

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::{
    app::build_app,
    config::AppConfig,
    state::AppState,
    users::{dto::UserPayload, services::create_user},
};

const BOUNDARY: &str = "user-service-test-boundary";

pub fn build_test_app(require_auth: bool) -> (Router, AppState) {
    let mut config = AppConfig::for_tests();
    config.require_auth = require_auth;
    let state = AppState::fake(config);
    (build_app(state.clone()), state)
}

pub fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn multipart_request(uri: &str, field: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"upload\"\r\n\
         Content-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::PUT)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn with_cookie(mut req: Request<Body>, cookie: &str) -> Request<Body> {
    req.headers_mut()
        .insert(header::COOKIE, cookie.parse().unwrap());
    req
}

pub async fn send_raw(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let headers = res.headers().clone();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, bytes)
}

pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let (status, headers, bytes) = send_raw(app, req).await;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, headers, body)
}

/// Creates a user straight through the service layer, logs in over HTTP and
/// returns the `name=value` pair of the session cookie.
pub async fn login_cookie(app: &Router, state: &AppState, email: &str, password: &str) -> String {
    create_user(
        state.users.as_ref(),
        UserPayload {
            name: Some("Test User".into()),
            role: Some("Normal".into()),
            email: Some(email.into()),
            age: Some(30),
            password: Some(password.into()),
            dob: None,
        },
    )
    .await
    .unwrap();

    let (status, headers, body) = send(
        app,
        request(
            Method::POST,
            "/login",
            Some(json!({"emailID": email, "password": password})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let set_cookie = headers
        .get(header::SET_COOKIE)
        .expect("login sets a session cookie")
        .to_str()
        .unwrap();
    set_cookie
        .split(';')
        .next()
        .unwrap()
        .trim()
        .to_string()
}
