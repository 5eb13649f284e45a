// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Filter chain around the transport call
//!
//! A [`Filter`] sees the request on the way in and the response on the way
//! out, and decides whether the rest of the chain runs at all by calling (or
//! not calling) [`Next::run`]. Chains nest as a LIFO stack: the filter added
//! last is the outermost wrapper and runs first.
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use restwire::filter::{Filter, Next};
//! use restwire::http::{Request, Response};
//! use restwire::Result;
//!
//! struct TraceId;
//!
//! #[async_trait]
//! impl Filter for TraceId {
//!     async fn filter(&self, mut request: Request, next: Next<'_>) -> Result<Response> {
//!         request.set_header("x-trace-id", "42")?;
//!         next.run(request).await
//!     }
//! }
//! ```

pub mod auth;
pub mod builtin;
pub mod cookie;

pub use auth::{BasicAuth, BearerAuth, DigestAuth, DigestSession, WwwAuthenticate};
pub use builtin::{ContentLengthFilter, LoggingFilter, RecoveryFilter};
pub use cookie::{Cookie, CookieCache, CookieCacheConfig};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::Result;
use crate::http::{Request, Response, Transport};

/// Middleware wrapped around the transport call
#[async_trait]
pub trait Filter: Send + Sync {
    /// Handle `request`, usually by delegating to `next`
    async fn filter(&self, request: Request, next: Next<'_>) -> Result<Response>;
}

/// The remainder of a filter chain, ending at the transport
#[derive(Clone, Copy)]
pub struct Next<'a> {
    filters: &'a [Arc<dyn Filter>],
    transport: &'a dyn Transport,
}

impl<'a> Next<'a> {
    pub fn new(filters: &'a [Arc<dyn Filter>], transport: &'a dyn Transport) -> Self {
        Self { filters, transport }
    }

    /// Run the next filter, or the transport once no filters remain
    pub async fn run(self, request: Request) -> Result<Response> {
        match self.filters.split_last() {
            Some((outermost, inner)) => {
                let next = Next {
                    filters: inner,
                    transport: self.transport,
                };
                outermost.filter(request, next).await
            }
            None => self.transport.send(request).await,
        }
    }

    /// Filters still to run
    pub fn remaining(&self) -> usize {
        self.filters.len()
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.filters.len())
            .finish()
    }
}

/// Ordered list of filters
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn Filter>>,
}

impl FilterChain {
    /// Create a new empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter; it wraps everything added before it
    pub fn add<F: Filter + 'static>(&mut self, filter: F) -> &mut Self {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Append a shared filter
    pub fn add_arc(&mut self, filter: Arc<dyn Filter>) -> &mut Self {
        self.filters.push(filter);
        self
    }

    /// Combine a client-level chain with a per-call chain.
    ///
    /// Both keep their internal order; per-call filters end up outermost.
    pub fn merge(client: &FilterChain, call: &FilterChain) -> FilterChain {
        let mut filters = Vec::with_capacity(client.len() + call.len());
        filters.extend(client.filters.iter().cloned());
        filters.extend(call.filters.iter().cloned());
        FilterChain { filters }
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Run `request` through the chain and into `transport`
    pub async fn run(&self, transport: &dyn Transport, request: Request) -> Result<Response> {
        Next::new(&self.filters, transport).run(request).await
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("len", &self.filters.len())
            .finish()
    }
}

/// Filter backed by a closure; see [`filter_fn`]
pub struct FnFilter<F>(F);

/// Turn a closure into a filter.
///
/// ```rust,no_run
/// use restwire::filter::{filter_fn, FilterChain};
///
/// let mut chain = FilterChain::new();
/// chain.add(filter_fn(|mut request, next| {
///     Box::pin(async move {
///         request.set_header("x-api-version", "2")?;
///         next.run(request).await
///     })
/// }));
/// ```
pub fn filter_fn<F>(f: F) -> FnFilter<F>
where
    F: for<'a> Fn(Request, Next<'a>) -> BoxFuture<'a, Result<Response>> + Send + Sync,
{
    FnFilter(f)
}

#[async_trait]
impl<F> Filter for FnFilter<F>
where
    F: for<'a> Fn(Request, Next<'a>) -> BoxFuture<'a, Result<Response>> + Send + Sync,
{
    async fn filter(&self, request: Request, next: Next<'_>) -> Result<Response> {
        (self.0)(request, next).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport for filter and client tests

    use super::*;
    use parking_lot::Mutex;
    use reqwest::header::HeaderMap;
    use reqwest::StatusCode;

    type Responder = Box<dyn Fn(&Request, usize) -> Response + Send + Sync>;

    pub(crate) struct MockTransport {
        responder: Responder,
        pub(crate) requests: Mutex<Vec<Request>>,
    }

    impl MockTransport {
        /// `responder` gets each request and its zero-based call index
        pub(crate) fn new(
            responder: impl Fn(&Request, usize) -> Response + Send + Sync + 'static,
        ) -> Self {
            Self {
                responder: Box::new(responder),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn ok() -> Self {
            Self::new(|req, _| response(req, StatusCode::OK, HeaderMap::new(), ""))
        }

        pub(crate) fn calls(&self) -> usize {
            self.requests.lock().len()
        }
    }

    pub(crate) fn response(
        request: &Request,
        status: StatusCode,
        headers: HeaderMap,
        body: &'static str,
    ) -> Response {
        Response::new(status, headers, request.url.clone(), body)
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, request: Request) -> Result<Response> {
            let index = {
                let mut requests = self.requests.lock();
                requests.push(request.clone());
                requests.len() - 1
            };
            Ok((self.responder)(&request, index))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MockTransport;
    use super::*;
    use parking_lot::Mutex;
    use reqwest::header::HeaderMap;
    use reqwest::StatusCode;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Record {
        name: &'static str,
        log: Log,
    }

    #[async_trait]
    impl Filter for Record {
        async fn filter(&self, request: Request, next: Next<'_>) -> Result<Response> {
            self.log.lock().push(format!("pre:{}", self.name));
            let response = next.run(request).await;
            self.log.lock().push(format!("post:{}", self.name));
            response
        }
    }

    struct ShortCircuit;

    #[async_trait]
    impl Filter for ShortCircuit {
        async fn filter(&self, request: Request, _next: Next<'_>) -> Result<Response> {
            Ok(Response::new(
                StatusCode::NO_CONTENT,
                HeaderMap::new(),
                request.url,
                "",
            ))
        }
    }

    fn record(name: &'static str, log: &Log) -> Record {
        Record {
            name,
            log: log.clone(),
        }
    }

    #[tokio::test]
    async fn test_lifo_order() {
        let log: Log = Arc::default();
        let mut chain = FilterChain::new();
        chain
            .add(record("A", &log))
            .add(record("B", &log))
            .add(record("C", &log));

        let transport = MockTransport::ok();
        let response = chain
            .run(&transport, Request::get("http://localhost/").unwrap())
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(
            *log.lock(),
            vec!["pre:C", "pre:B", "pre:A", "post:A", "post:B", "post:C"]
        );
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_short_circuit_skips_inner_filters() {
        let log: Log = Arc::default();
        let mut chain = FilterChain::new();
        chain.add(record("inner", &log)).add(ShortCircuit).add(record("outer", &log));

        let transport = MockTransport::ok();
        let response = chain
            .run(&transport, Request::get("http://localhost/").unwrap())
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::NO_CONTENT);
        assert_eq!(*log.lock(), vec!["pre:outer", "post:outer"]);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_merge_puts_call_filters_outermost() {
        let log: Log = Arc::default();
        let mut client = FilterChain::new();
        client.add(record("c1", &log)).add(record("c2", &log));
        let mut call = FilterChain::new();
        call.add(record("p1", &log)).add(record("p2", &log));

        let merged = FilterChain::merge(&client, &call);
        assert_eq!(merged.len(), 4);

        merged
            .run(&MockTransport::ok(), Request::get("http://localhost/").unwrap())
            .await
            .unwrap();

        let log = log.lock();
        assert_eq!(&log[..4], ["pre:p2", "pre:p1", "pre:c2", "pre:c1"]);
    }

    #[tokio::test]
    async fn test_errors_propagate_unchanged() {
        let mut chain = FilterChain::new();
        chain.add(filter_fn(|_request, _next| {
            Box::pin(async { Err(crate::Error::other("denied")) })
        }));

        let transport = MockTransport::ok();
        let err = chain
            .run(&transport, Request::get("http://localhost/").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, crate::Error::Other(ref m) if m == "denied"));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_fn_filter_can_edit_request() {
        let mut chain = FilterChain::new();
        chain.add(filter_fn(|mut request, next| {
            Box::pin(async move {
                request.set_header("x-api-version", "2")?;
                next.run(request).await
            })
        }));

        let transport = MockTransport::ok();
        chain
            .run(&transport, Request::get("http://localhost/").unwrap())
            .await
            .unwrap();

        let requests = transport.requests.lock();
        assert_eq!(requests[0].header_value("x-api-version"), Some("2"));
    }
}
