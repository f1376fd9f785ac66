mod common;

use std::net::TcpListener;
use std::time::Duration;

use intruder_core::parse_request;
use intruder_engine::{
    DispatchSettings, Dispatcher, ErrorCategory, RawResponseFormatter, ReqwestDispatcher,
    ResponseFormatter,
};
use pretty_assertions::assert_eq;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn dispatcher(timeout: Duration) -> ReqwestDispatcher {
    ReqwestDispatcher::new(DispatchSettings {
        request_timeout: timeout,
        ..DispatchSettings::default()
    })
    .unwrap()
}

#[tokio::test]
async fn forwards_method_headers_and_body() {
    common::init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(header("x-trace", "abc"))
        .and(body_string("user=admin&pass=' OR 1=1"))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .expect(1)
        .mount(&server)
        .await;

    let raw = format!(
        "POST {}/login HTTP/1.1\nX-Trace: abc\nContent-Length: 999\n\nuser=admin&pass=' OR 1=1",
        server.uri()
    );
    let request = parse_request(&raw).unwrap();
    let exchange = dispatcher(Duration::from_secs(5))
        .dispatch(&request)
        .await
        .unwrap();

    assert_eq!(exchange.status, 201);
    assert_eq!(exchange.reason, "Created");
    assert_eq!(&exchange.body[..], b"created");
}

#[tokio::test]
async fn content_length_is_recomputed_by_the_client() {
    common::init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("content-length", "5"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let raw = format!(
        "POST {}/ HTTP/1.1\nContent-Length: 2\n\nhello",
        server.uri()
    );
    let exchange = dispatcher(Duration::from_secs(5))
        .dispatch(&parse_request(&raw).unwrap())
        .await
        .unwrap();
    assert_eq!(exchange.status, 200);
}

#[tokio::test]
async fn origin_form_targets_use_the_host_header() {
    common::init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "rust"))
        .respond_with(ResponseTemplate::new(200).set_body_string("found"))
        .mount(&server)
        .await;

    let raw = format!(
        "GET /search?q=rust HTTP/1.1\nHost: {}\n\n",
        server.address()
    );
    let exchange = dispatcher(Duration::from_secs(5))
        .dispatch(&parse_request(&raw).unwrap())
        .await
        .unwrap();
    assert_eq!(exchange.status, 200);
    assert_eq!(&exchange.body[..], b"found");
}

#[tokio::test]
async fn redirects_are_reported_not_followed() {
    common::init_logging();
    let server = MockServer::start().await;
    Mock::given(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/new"))
        .mount(&server)
        .await;
    Mock::given(path("/new"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let raw = format!("GET {}/old HTTP/1.1\n\n", server.uri());
    let exchange = dispatcher(Duration::from_secs(5))
        .dispatch(&parse_request(&raw).unwrap())
        .await
        .unwrap();
    assert_eq!(exchange.status, 302);

    let formatted = RawResponseFormatter.format(&exchange);
    assert!(formatted.starts_with("HTTP/1.1 302 Found\n"));
    assert!(formatted.contains("location: /new\n"));
}

#[tokio::test]
async fn slow_responses_are_timeouts() {
    common::init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let raw = format!("GET {}/slow HTTP/1.1\n\n", server.uri());
    let err = dispatcher(Duration::from_millis(50))
        .dispatch(&parse_request(&raw).unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::Timeout);
}

#[tokio::test]
async fn refused_connections_are_connection_errors() {
    common::init_logging();
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let raw = format!("GET http://127.0.0.1:{port}/ HTTP/1.1\n\n");
    let err = dispatcher(Duration::from_secs(5))
        .dispatch(&parse_request(&raw).unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::Connection);
}

#[tokio::test]
async fn unresolvable_targets_are_url_errors() {
    common::init_logging();
    let dispatcher = dispatcher(Duration::from_secs(5));

    let no_host = parse_request("GET /relative HTTP/1.1\nAccept: */*\n\n").unwrap();
    let err = dispatcher.dispatch(&no_host).await.unwrap_err();
    assert_eq!(err.category, ErrorCategory::Url);

    let garbage = parse_request("GET http://[::1 HTTP/1.1\n\n").unwrap();
    let err = dispatcher.dispatch(&garbage).await.unwrap_err();
    assert_eq!(err.category, ErrorCategory::Url);
}

#[tokio::test]
async fn responses_are_captured_for_display() {
    common::init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(|request: &Request| {
            ResponseTemplate::new(200)
                .insert_header("x-echo", "1")
                .set_body_string(request.url.query().unwrap_or_default().to_string())
        })
        .mount(&server)
        .await;

    let raw = format!("GET {}/echo?token=xyz HTTP/1.1\n\n", server.uri());
    let exchange = dispatcher(Duration::from_secs(5))
        .dispatch(&parse_request(&raw).unwrap())
        .await
        .unwrap();

    let formatted = RawResponseFormatter.format(&exchange);
    assert!(formatted.starts_with("HTTP/1.1 200 OK\n"));
    assert!(formatted.contains("x-echo: 1\n"));
    assert!(formatted.ends_with("\n\ntoken=xyz"));
}
