// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTTP response types

use std::mem;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use url::Url;

use crate::error::Result;

/// Response body, either still on the wire or already in memory
#[derive(Debug, Default)]
pub enum Body {
    /// Nothing (left) to read
    #[default]
    Empty,
    /// Fully buffered bytes
    Buffered(Bytes),
    /// Body still streaming from the transport
    Streaming(reqwest::Response),
}

/// HTTP response representation
#[derive(Debug)]
pub struct Response {
    /// Response status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Final URL (after redirects)
    pub url: Url,
    /// Response body
    pub body: Body,
}

impl Response {
    /// Create a response with a buffered body
    pub fn new(status: StatusCode, headers: HeaderMap, url: Url, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            url,
            body: Body::Buffered(body.into()),
        }
    }

    /// Wrap a reqwest response without reading its body
    pub fn from_reqwest(response: reqwest::Response) -> Self {
        Self {
            status: response.status(),
            headers: response.headers().clone(),
            url: response.url().clone(),
            body: Body::Streaming(response),
        }
    }

    /// Check if status is success (2xx)
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Whether the status is 400 or above
    pub fn is_bad_status(&self) -> bool {
        self.status.as_u16() >= 400
    }

    /// Get status code as u16
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Get a header value
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get all values for a header
    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// Get content type
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Get content length
    pub fn content_length(&self) -> Option<usize> {
        self.header("content-length").and_then(|v| v.parse().ok())
    }

    /// Get Set-Cookie headers
    pub fn set_cookies(&self) -> Vec<&str> {
        self.header_all("set-cookie")
    }

    /// Read the next body chunk; `None` once the body is exhausted
    pub async fn chunk(&mut self) -> Result<Option<Bytes>> {
        match &mut self.body {
            Body::Empty => Ok(None),
            Body::Buffered(_) => match mem::take(&mut self.body) {
                Body::Buffered(bytes) if !bytes.is_empty() => Ok(Some(bytes)),
                _ => Ok(None),
            },
            Body::Streaming(response) => {
                let chunk = response.chunk().await?;
                if chunk.is_none() {
                    self.body = Body::Empty;
                }
                Ok(chunk)
            }
        }
    }

    /// Read the rest of the body into memory and keep it there.
    ///
    /// Later calls return the same bytes; chunks already taken with
    /// [`Response::chunk`] are not included.
    pub async fn buffer(&mut self) -> Result<Bytes> {
        let bytes = match mem::take(&mut self.body) {
            Body::Empty => Bytes::new(),
            Body::Buffered(bytes) => bytes,
            Body::Streaming(response) => response.bytes().await?,
        };
        self.body = Body::Buffered(bytes.clone());
        Ok(bytes)
    }

    /// Drop whatever is left of the body
    pub fn discard_body(&mut self) {
        self.body = Body::Empty;
    }

    /// Get body as text, lossy conversion; only sees buffered bodies
    pub fn text_lossy(&self) -> String {
        match &self.body {
            Body::Buffered(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            _ => String::new(),
        }
    }

    /// Get the final URL as string
    pub fn url_str(&self) -> &str {
        self.url.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: StatusCode, body: &'static str) -> Response {
        Response::new(
            status,
            HeaderMap::new(),
            Url::parse("https://example.com").unwrap(),
            body,
        )
    }

    #[test]
    fn test_response_status() {
        let resp = response(StatusCode::OK, "");
        assert!(resp.is_success());
        assert!(!resp.is_bad_status());
        assert_eq!(resp.status_code(), 200);
        assert!(response(StatusCode::NOT_FOUND, "").is_bad_status());
    }

    #[tokio::test]
    async fn test_buffered_chunks() {
        let mut resp = response(StatusCode::OK, "Hello, World!");
        assert_eq!(resp.text_lossy(), "Hello, World!");
        assert_eq!(
            resp.chunk().await.unwrap(),
            Some(Bytes::from_static(b"Hello, World!"))
        );
        assert_eq!(resp.chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_buffer_is_repeatable() {
        let mut resp = response(StatusCode::OK, "body");
        assert_eq!(resp.buffer().await.unwrap(), Bytes::from_static(b"body"));
        assert_eq!(resp.buffer().await.unwrap(), Bytes::from_static(b"body"));

        resp.discard_body();
        assert!(resp.buffer().await.unwrap().is_empty());
    }
}
