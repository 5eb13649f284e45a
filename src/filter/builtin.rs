// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! General-purpose filters

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, error, info};

use super::{Filter, Next};
use crate::error::{Error, Result};
use crate::http::{headers, Request, Response};

/// Logs every exchange with a random correlation id
#[derive(Debug, Clone)]
pub struct LoggingFilter {
    /// Tag attached to every log line
    pub tag: String,
    /// Log request bodies
    pub log_bodies: bool,
    /// Log response bodies (buffers the response)
    pub log_responses: bool,
}

impl Default for LoggingFilter {
    fn default() -> Self {
        Self {
            tag: "restwire".to_string(),
            log_bodies: false,
            log_responses: false,
        }
    }
}

impl LoggingFilter {
    pub fn new(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        Self {
            tag: if tag.is_empty() { "restwire".to_string() } else { tag },
            ..Default::default()
        }
    }

    /// Also log request and response bodies
    pub fn with_bodies(mut self) -> Self {
        self.log_bodies = true;
        self.log_responses = true;
        self
    }
}

fn request_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect()
}

#[async_trait]
impl Filter for LoggingFilter {
    async fn filter(&self, request: Request, next: Next<'_>) -> Result<Response> {
        let id = request_id();
        let started = Instant::now();

        info!(
            tag = %self.tag,
            id = %id,
            method = %request.method,
            url = %request.url,
            headers = ?request.headers,
            "Request"
        );
        if self.log_bodies {
            if let Some(ref body) = request.body {
                debug!(tag = %self.tag, id = %id, body = %String::from_utf8_lossy(body), "Request body");
            }
        }

        let result = next.run(request).await;
        let time_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(mut response) => {
                info!(
                    tag = %self.tag,
                    id = %id,
                    status = %response.status,
                    headers = ?response.headers,
                    time_ms,
                    "Response"
                );
                if self.log_responses {
                    let body = response.buffer().await?;
                    debug!(tag = %self.tag, id = %id, body = %String::from_utf8_lossy(&body), "Response body");
                }
                Ok(response)
            }
            Err(e) => {
                info!(tag = %self.tag, id = %id, time_ms, error = %e, "Request failed");
                Err(e)
            }
        }
    }
}

/// Turns a panic anywhere further down the chain into [`Error::Panic`]
#[derive(Debug, Clone, Default)]
pub struct RecoveryFilter;

impl RecoveryFilter {
    pub fn new() -> Self {
        Self
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[async_trait]
impl Filter for RecoveryFilter {
    async fn filter(&self, request: Request, next: Next<'_>) -> Result<Response> {
        let url = request.url.clone();
        match AssertUnwindSafe(next.run(request)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(url = %url, panic = %message, "Recovered panic in filter chain");
                Err(Error::Panic(message))
            }
        }
    }
}

/// Sets `Content-Length` from the encoded body when the caller did not
#[derive(Debug, Clone, Default)]
pub struct ContentLengthFilter;

#[async_trait]
impl Filter for ContentLengthFilter {
    async fn filter(&self, mut request: Request, next: Next<'_>) -> Result<Response> {
        if request.body.is_some() && request.header_value(headers::CONTENT_LENGTH).is_none() {
            let len = request.body_len().to_string();
            request.set_header(headers::CONTENT_LENGTH, len)?;
        }
        next.run(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::testing::{response, MockTransport};
    use crate::filter::FilterChain;
    use reqwest::header::HeaderMap;
    use reqwest::StatusCode;

    struct Explode;

    #[async_trait]
    impl Filter for Explode {
        async fn filter(&self, _request: Request, _next: Next<'_>) -> Result<Response> {
            panic!("boom")
        }
    }

    #[test]
    fn test_request_id() {
        let id = request_id();
        assert_eq!(id.len(), 10);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_empty_tag_uses_default() {
        assert_eq!(LoggingFilter::new("").tag, "restwire");
        assert_eq!(LoggingFilter::new("billing").tag, "billing");
    }

    #[tokio::test]
    async fn test_logging_keeps_body_readable() {
        let transport =
            MockTransport::new(|req, _| response(req, StatusCode::OK, HeaderMap::new(), "payload"));
        let mut chain = FilterChain::new();
        chain.add(LoggingFilter::new("test").with_bodies());

        let request = Request::get("http://localhost/items").unwrap().body("q");
        let mut resp = chain.run(&transport, request).await.unwrap();

        assert_eq!(resp.buffer().await.unwrap(), &b"payload"[..]);
    }

    #[tokio::test]
    async fn test_recovery_converts_panic() {
        let mut chain = FilterChain::new();
        chain.add(Explode).add(RecoveryFilter::new());

        let transport = MockTransport::ok();
        let err = chain
            .run(&transport, Request::get("http://localhost/").unwrap())
            .await
            .unwrap_err();

        match err {
            Error::Panic(message) => assert_eq!(message, "boom"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_recovery_passes_results_through() {
        let mut chain = FilterChain::new();
        chain.add(RecoveryFilter::new());

        let resp = chain
            .run(&MockTransport::ok(), Request::get("http://localhost/").unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_content_length_filled_when_missing() {
        let transport = MockTransport::ok();
        let mut chain = FilterChain::new();
        chain.add(ContentLengthFilter);

        let with_body = Request::new(reqwest::Method::POST, "http://localhost/")
            .unwrap()
            .body("hello");
        chain.run(&transport, with_body).await.unwrap();

        let explicit = Request::new(reqwest::Method::POST, "http://localhost/")
            .unwrap()
            .header("content-length", "5")
            .body("hello");
        chain.run(&transport, explicit).await.unwrap();

        chain
            .run(&transport, Request::get("http://localhost/").unwrap())
            .await
            .unwrap();

        let requests = transport.requests.lock();
        assert_eq!(requests[0].header_value("content-length"), Some("5"));
        assert_eq!(requests[1].header_value("content-length"), Some("5"));
        assert!(requests[2].header_value("content-length").is_none());
    }
}
