// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Outgoing request type seen by filters and the transport

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{Error, Result};

/// HTTP request representation
///
/// The body is fully encoded before the filter chain runs, so a request can
/// be cloned and resent (Digest authentication relies on this).
#[derive(Debug, Clone)]
pub struct Request {
    /// Request method
    pub method: Method,
    /// Request URL
    pub url: Url,
    /// Request headers
    pub headers: HeaderMap,
    /// Encoded request body
    pub body: Option<Bytes>,
    /// Overall deadline for this request; `None` means no timeout
    pub timeout: Option<Duration>,
    /// Cancels the in-flight transport call when triggered
    pub cancellation: Option<CancellationToken>,
}

impl Request {
    /// Create a new request
    pub fn new(method: Method, url: impl AsRef<str>) -> Result<Self> {
        Ok(Self::from_url(method, Url::parse(url.as_ref())?))
    }

    /// Create a new GET request
    pub fn get(url: impl AsRef<str>) -> Result<Self> {
        Self::new(Method::GET, url)
    }

    /// Create a request for an already parsed URL
    pub fn from_url(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
            cancellation: None,
        }
    }

    /// Set a header, replacing existing values
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        // Invalid names or values are skipped.
        let _ = self.set_header(name, value);
        self
    }

    /// Set the request body
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attach a cancellation token
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set a header in place, replacing existing values
    pub fn set_header(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<()> {
        let (name, value) = header_pair(name.as_ref(), value.as_ref())?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Append a header value in place
    pub fn append_header(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<()> {
        let (name, value) = header_pair(name.as_ref(), value.as_ref())?;
        self.headers.append(name, value);
        Ok(())
    }

    /// Get a header value
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Whether the cancellation token has fired
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map(CancellationToken::is_cancelled)
            .unwrap_or(false)
    }

    /// Path plus query, as used in the Digest `uri` field
    pub fn request_uri(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }

    /// Body length in bytes
    pub fn body_len(&self) -> usize {
        self.body.as_ref().map(Bytes::len).unwrap_or(0)
    }
}

fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::try_from(name)
        .map_err(|e| Error::other(format!("Invalid header name {name:?}: {e}")))?;
    let value = HeaderValue::try_from(value)
        .map_err(|e| Error::other(format!("Invalid value for header {name}: {e}")))?;
    Ok((name, value))
}
