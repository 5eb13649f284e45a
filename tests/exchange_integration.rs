// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use std::sync::Arc;
use std::time::Duration;

use restwire::{CodecConverter, Converter, Error, RequestOptions, RestClient};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Default, Deserialize)]
struct Greeting {
    result: Vec<String>,
}

#[derive(Debug, Serialize)]
struct NewUser<'a> {
    name: &'a str,
    admin: bool,
}

#[derive(Debug, Default, Deserialize)]
struct Created {
    id: u64,
}

#[cfg_attr(miri, ignore)]
#[tokio::test]
async fn test_json_result_with_json_and_string_converters() {
    if !can_bind_localhost() {
        return;
    }
    init_tracing();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hello"))
        .and(header("accept", "application/json"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_string(r#"{"result":["hello","world"]}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let converters: Vec<Arc<dyn Converter>> = vec![
        Arc::new(CodecConverter::string()),
        Arc::new(CodecConverter::json()),
    ];
    let client = RestClient::builder()
        .set_converters(converters)
        .build()
        .unwrap();

    let mut greeting = Greeting::default();
    client
        .exchange(
            &format!("{}/hello", server.uri()),
            RequestOptions::new().result(&mut greeting),
        )
        .await
        .unwrap();

    assert_eq!(greeting.result, vec!["hello", "world"]);
}

#[cfg_attr(miri, ignore)]
#[tokio::test]
async fn test_post_json_body() {
    if !can_bind_localhost() {
        return;
    }
    init_tracing();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .and(header("content-type", "application/json"))
        .and(body_json(serde_json::json!({"name": "ada", "admin": false})))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("content-type", "application/json; charset=utf-8")
                .set_body_string(r#"{"id":42}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = RestClient::new().unwrap();
    let mut created = Created::default();
    client
        .post(
            &format!("{}/users", server.uri()),
            RequestOptions::new()
                .body(NewUser {
                    name: "ada",
                    admin: false,
                })
                .result(&mut created),
        )
        .await
        .unwrap();

    assert_eq!(created.id, 42);
}

#[cfg_attr(miri, ignore)]
#[tokio::test]
async fn test_bad_status_reports_status_and_body() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such thing"))
        .mount(&server)
        .await;

    let client = RestClient::new().unwrap();
    let err = client
        .get(&format!("{}/missing", server.uri()), RequestOptions::new())
        .await
        .unwrap_err();

    assert!(err.is_bad_status());
    assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(err.body().map(|b| b.as_ref()), Some(&b"no such thing"[..]));
}

#[cfg_attr(miri, ignore)]
#[tokio::test]
async fn test_streaming_units_reach_callback() {
    if !can_bind_localhost() {
        return;
    }

    #[derive(Debug, Deserialize)]
    struct Event {
        seq: u32,
    }

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_string("{\"seq\":1}\n{\"seq\":2}\n{\"seq\":3}\n"),
        )
        .mount(&server)
        .await;

    let client = RestClient::new().unwrap();
    let mut seen = Vec::new();
    client
        .get(
            &format!("{}/events", server.uri()),
            RequestOptions::new().for_each(|event: Event| seen.push(event.seq)),
        )
        .await
        .unwrap();

    assert_eq!(seen, vec![1, 2, 3]);
}

#[cfg_attr(miri, ignore)]
#[tokio::test]
async fn test_cancellation_aborts_call() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let client = RestClient::new().unwrap();
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let err = client
        .get(&server.uri(), RequestOptions::new().cancellation(token))
        .await
        .unwrap_err();

    assert!(matches!(err.origin(), Error::Cancelled));
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
}

#[cfg_attr(miri, ignore)]
#[tokio::test]
async fn test_client_timeout() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let client = RestClient::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();

    let err = client
        .get(&server.uri(), RequestOptions::new())
        .await
        .unwrap_err();

    assert!(err.origin().is_timeout());
}

#[cfg_attr(miri, ignore)]
#[tokio::test]
async fn test_truncated_bad_status_body_keeps_status() {
    if !can_bind_localhost() {
        return;
    }
    init_tracing();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 1024];
        let _ = socket.read(&mut request).await;
        socket
            .write_all(b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 100\r\n\r\nshort")
            .await
            .unwrap();
        socket.shutdown().await.unwrap();
    });

    let client = RestClient::new().unwrap();
    let err = client
        .get(&format!("http://{}/flaky", addr), RequestOptions::new())
        .await
        .unwrap_err();

    assert!(err.is_bad_status());
    assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(err.body().is_none());
}
