use super::*;
use crate::api::routes::{INVALID_TIMEOUT_MESSAGE, MALFORMED_REQUESTS_MESSAGE, MISSING_REQUESTS_MESSAGE};
use axum::body::Body;
use axum::extract::Request;
use axum::http::{StatusCode, header};
use axum::response::Response;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_app(config: Config) -> Router {
    create_router(AppState::new(Arc::new(config)).unwrap())
}

async fn call(app: Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

async fn mount(server: &MockServer, route: &str, body: &str, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_api_server_spawns() {
    let mut config = Config::default();
    config.server.bind_address = "127.0.0.1:0".parse().unwrap();
    let config = Arc::new(config);

    let api_handle = tokio::spawn(async move { start_api_server(config).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!api_handle.is_finished());

    api_handle.abort();
}

#[tokio::test]
async fn test_serve_stops_on_shutdown() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    let handle = tokio::spawn(serve(listener, Arc::new(Config::default()), async move {
        let _ = stop_rx.await;
    }));

    stop_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_health() {
    let response = call(test_app(Config::default()), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_cors_enabled() {
    let mut config = Config::default();
    config.server.cors_enabled = true;

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = test_app(config).oneshot(request).await.unwrap();

    assert!(
        response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = test_app(Config::default()).oneshot(request).await.unwrap();

    assert!(
        !response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
    );
}

#[tokio::test]
async fn test_aggregate_json() {
    let server = MockServer::start().await;
    mount(&server, "/one", "first", Duration::from_millis(150)).await;
    mount(&server, "/two", "second", Duration::ZERO).await;

    let uri = format!(
        "/?requests=a:{base}/one,b:{base}/two",
        base = server.uri()
    );
    let response = call(test_app(Config::default()), &uri).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

    let rows: Vec<serde_json::Value> =
        serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"], "a");
    assert_eq!(rows[0]["status_code"], 200);
    assert_eq!(rows[0]["status"], "200 OK");
    assert_eq!(rows[0]["body"], "first");
    assert_eq!(rows[1]["id"], "b");
    assert_eq!(rows[1]["body"], "second");
    assert!(rows[0]["duration"].as_str().unwrap().ends_with("ms"));
}

#[tokio::test]
async fn test_aggregate_on_any_path() {
    let server = MockServer::start().await;
    mount(&server, "/one", "first", Duration::ZERO).await;

    let uri = format!("/some/where/else?requests=a:{}/one", server.uri());
    let response = call(test_app(Config::default()), &uri).await;

    assert_eq!(response.status(), StatusCode::OK);
    let rows: Vec<serde_json::Value> =
        serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(rows[0]["body"], "first");
}

#[tokio::test]
async fn test_aggregate_delimited() {
    let server = MockServer::start().await;
    mount(&server, "/one", "first", Duration::ZERO).await;
    mount(&server, "/two", "second", Duration::ZERO).await;

    let uri = format!(
        "/?requests=a:{base}/one,b:{base}/two&type=delimiter&delimiter=%23%23%23",
        base = server.uri()
    );
    let response = call(test_app(Config::default()), &uri).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );

    let text = body_text(response).await;
    let blocks: Vec<&str> = text.split("\n###\n").collect();
    assert_eq!(blocks.len(), 2);
    assert!(blocks[0].starts_with("Id: a, Status: 200 OK, Duration: "));
    assert!(blocks[0].ends_with("ms\nfirst"));
    assert!(blocks[1].starts_with("Id: b, Status: 200 OK, Duration: "));
    assert!(blocks[1].ends_with("ms\nsecond"));
}

#[tokio::test]
async fn test_aggregate_delimited_uses_configured_delimiter() {
    let server = MockServer::start().await;
    mount(&server, "/one", "first", Duration::ZERO).await;

    let mut config = Config::default();
    config.fetch.delimiter = "==cut==".to_string();

    let uri = format!(
        "/?requests=a:{base}/one,b:{base}/one&type=DELIMITER",
        base = server.uri()
    );
    let text = body_text(call(test_app(config), &uri).await).await;

    assert_eq!(text.matches("\n==cut==\n").count(), 1);
}

#[tokio::test]
async fn test_aggregate_timeout() {
    let server = MockServer::start().await;
    mount(&server, "/slow", "late", Duration::from_millis(1500)).await;
    mount(&server, "/fast", "quick", Duration::ZERO).await;

    let uri = format!(
        "/?requests=slow:{base}/slow,fast:{base}/fast&timeout=200",
        base = server.uri()
    );
    let started = std::time::Instant::now();
    let response = call(test_app(Config::default()), &uri).await;

    assert_eq!(response.status(), StatusCode::OK);
    let rows: Vec<serde_json::Value> =
        serde_json::from_str(&body_text(response).await).unwrap();

    assert!(started.elapsed() < Duration::from_millis(1200));
    assert_eq!(rows[0]["id"], "slow");
    assert_eq!(
        rows[0]["error"],
        "timeout exceeded after 200ms: connection terminated"
    );
    assert!(rows[0].get("body").is_none());
    assert_eq!(rows[1]["id"], "fast");
    assert_eq!(rows[1]["body"], "quick");
}

#[tokio::test]
async fn test_aggregate_unreachable_target_is_still_200() {
    let uri = format!(
        "/?requests=gone:{}",
        crate::test_helpers::refused_url().await
    );
    let response = call(test_app(Config::default()), &uri).await;

    assert_eq!(response.status(), StatusCode::OK);
    let rows: Vec<serde_json::Value> =
        serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(rows[0]["id"], "gone");
    assert!(rows[0]["error"].is_string());
    assert!(rows[0].get("status_code").is_none());
}

#[tokio::test]
async fn test_missing_requests() {
    for uri in ["/", "/?requests=", "/?type=json"] {
        let response = call(test_app(Config::default()), uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body_text(response).await, MISSING_REQUESTS_MESSAGE);
    }
}

#[tokio::test]
async fn test_malformed_requests_fetch_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let uri = format!("/?requests=ok:{}/one,id1", server.uri());
    let response = call(test_app(Config::default()), &uri).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, MALFORMED_REQUESTS_MESSAGE);
}

#[tokio::test]
async fn test_unknown_type_fetches_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let uri = format!("/?requests=ok:{}/one&type=xml", server.uri());
    let response = call(test_app(Config::default()), &uri).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("'xml'"));
}

#[tokio::test]
async fn test_invalid_timeout() {
    let uri = "/?requests=a:http://127.0.0.1:9/&timeout=soon";
    let response = call(test_app(Config::default()), uri).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, INVALID_TIMEOUT_MESSAGE);
}

#[tokio::test]
async fn test_post_is_aggregated_too() {
    let server = MockServer::start().await;
    mount(&server, "/one", "first", Duration::ZERO).await;

    let request = Request::builder()
        .method("POST")
        .uri(format!("/?requests=a:{}/one", server.uri()))
        .body(Body::empty())
        .unwrap();
    let response = test_app(Config::default()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].method.as_str(), "GET");
}
