// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! REST client orchestrator
//!
//! [`RestClient::exchange`] runs one call end to end: it encodes the body
//! through the converter registry, synthesizes `Accept` for the result type,
//! pushes the request through the filter chain and decodes the response into
//! the caller's result sink.

use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use url::Url;

use super::transport::{ReqwestTransport, Transport, TransportConfig};
use super::headers::{ACCEPT, CONTENT_TYPE};
use super::{Request, Response};
use crate::buffer::{BufferPool, PooledBuffer};
use crate::codec::{AcceptMode, Converter, ConverterRegistry, Decoded, Decoder, Encoder, Shape};
use crate::error::{Error, ExchangeError, Result};
use crate::filter::{Filter, FilterChain};
use crate::media_type::MediaType;

/// What to do with the body of a response whose status is >= 400
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseBodyPolicy {
    /// Decode it into the result sink like any other body
    #[default]
    All,
    /// Report the status without reading the body
    IgnoreBad,
}

/// Client configuration
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Overall per-request timeout; zero means no timeout
    pub timeout: Duration,
    /// How the `Accept` header is produced
    pub accept_mode: AcceptMode,
    /// Handling of bad-status bodies
    pub body_policy: ResponseBodyPolicy,
    /// Settings for the default reqwest transport
    pub transport: TransportConfig,
}

impl ClientConfig {
    /// Set the per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the Accept mode
    pub fn accept_mode(mut self, mode: AcceptMode) -> Self {
        self.accept_mode = mode;
        self
    }

    /// Set the bad-status body policy
    pub fn body_policy(mut self, policy: ResponseBodyPolicy) -> Self {
        self.body_policy = policy;
        self
    }

    /// Set the transport configuration
    pub fn transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }
}

/// Raw response details copied out for the caller
pub struct CapturedResponse {
    /// Response status
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Final URL
    pub url: Option<Url>,
    /// Raw body, when capture was asked to keep it
    pub body: Option<PooledBuffer>,
}

impl Default for CapturedResponse {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            url: None,
            body: None,
        }
    }
}

impl CapturedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captured body bytes
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref().map(|b| &b[..])
    }

    /// Hand the body buffer back to its pool
    pub fn release_body(&mut self) {
        if let Some(mut body) = self.body.take() {
            body.release();
        }
    }
}

impl fmt::Debug for CapturedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("url", &self.url)
            .field("body_len", &self.body.as_ref().map(|b| b.len()))
            .finish()
    }
}

/// A request body that has not been encoded yet
trait OutgoingBody: Send {
    fn shape(&self) -> Shape;
    fn encode(&self, encoder: &Encoder, out: &mut BytesMut) -> Result<usize>;
}

struct ValueBody<T>(T);

impl<T: Serialize + Send> OutgoingBody for ValueBody<T> {
    fn shape(&self) -> Shape {
        Shape::of_value(&self.0)
    }

    fn encode(&self, encoder: &Encoder, out: &mut BytesMut) -> Result<usize> {
        encoder.encode(&self.0, out)
    }
}

/// Bytes sent as-is
struct RawBody(Bytes);

impl OutgoingBody for RawBody {
    fn shape(&self) -> Shape {
        Shape::Bytes
    }

    fn encode(&self, _encoder: &Encoder, out: &mut BytesMut) -> Result<usize> {
        out.extend_from_slice(&self.0);
        Ok(self.0.len())
    }
}

enum Drain {
    /// The sink wants more input
    More,
    /// The sink is satisfied or the stream has ended
    Done,
}

/// Destination for decoded response units
trait ResultSink: Send {
    fn shape(&self) -> Shape;
    fn drain(&mut self, decoder: &mut Decoder) -> Result<Drain>;
}

/// Decodes the first unit into a caller-owned value
struct Slot<'a, T>(&'a mut T);

impl<T: DeserializeOwned + Send> ResultSink for Slot<'_, T> {
    fn shape(&self) -> Shape {
        Shape::of_type::<T>()
    }

    fn drain(&mut self, decoder: &mut Decoder) -> Result<Drain> {
        match decoder.decode::<T>()? {
            Decoded::Unit { value, .. } => {
                *self.0 = value;
                Ok(Drain::Done)
            }
            Decoded::NeedMore => Ok(Drain::More),
            Decoded::End => Ok(Drain::Done),
        }
    }
}

/// Hands every decoded unit to a callback
struct Each<T, F> {
    callback: F,
    _unit: PhantomData<fn(T)>,
}

impl<T, F> ResultSink for Each<T, F>
where
    T: DeserializeOwned,
    F: FnMut(T) + Send,
{
    fn shape(&self) -> Shape {
        Shape::of_type::<T>()
    }

    fn drain(&mut self, decoder: &mut Decoder) -> Result<Drain> {
        loop {
            match decoder.decode::<T>()? {
                Decoded::Unit { value, consumed } => {
                    trace!(consumed, "Decoded response unit");
                    (self.callback)(value);
                }
                Decoded::NeedMore => return Ok(Drain::More),
                Decoded::End => return Ok(Drain::Done),
            }
        }
    }
}

/// Per-call options for [`RestClient::exchange`]
pub struct RequestOptions<'a> {
    method: Method,
    headers: HeaderMap,
    body: Option<Box<dyn OutgoingBody + 'a>>,
    cancellation: Option<CancellationToken>,
    timeout: Option<Duration>,
    filters: FilterChain,
    result: Option<Box<dyn ResultSink + 'a>>,
    capture: Option<(&'a mut CapturedResponse, bool)>,
}

impl Default for RequestOptions<'_> {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
            cancellation: None,
            timeout: None,
            filters: FilterChain::new(),
            result: None,
            capture: None,
        }
    }
}

impl<'a> RequestOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the HTTP method (default GET)
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set a header, replacing existing values
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let Some((name, value)) = parse_header(name.as_ref(), value.as_ref()) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Set several headers
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in headers {
            self = self.header(name, value);
        }
        self
    }

    /// Append a header value
    pub fn add_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let Some((name, value)) = parse_header(name.as_ref(), value.as_ref()) {
            self.headers.append(name, value);
        }
        self
    }

    /// Body encoded by whichever converter matches its shape and `Content-Type`
    pub fn body<T: Serialize + Send + 'a>(mut self, value: T) -> Self {
        self.body = Some(Box::new(ValueBody(value)));
        self
    }

    /// Body sent as raw bytes
    pub fn raw_body(mut self, bytes: impl Into<Bytes>) -> Self {
        self.body = Some(Box::new(RawBody(bytes.into())));
        self
    }

    /// Body sent as text
    pub fn text_body(self, text: impl Into<String>) -> Self {
        self.body(text.into())
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Override the client timeout for this call; zero disables it
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add a per-call filter. Per-call filters run before the client's.
    pub fn filter<F: Filter + 'static>(mut self, filter: F) -> Self {
        self.filters.add(filter);
        self
    }

    /// Replace the per-call filter chain
    pub fn filters(mut self, filters: FilterChain) -> Self {
        self.filters = filters;
        self
    }

    /// Decode the first response unit into `target`
    pub fn result<T: DeserializeOwned + Send>(mut self, target: &'a mut T) -> Self {
        self.result = Some(Box::new(Slot(target)));
        self
    }

    /// Decode every response unit and pass each one to `callback`
    pub fn for_each<T, F>(mut self, callback: F) -> Self
    where
        T: DeserializeOwned + 'a,
        F: FnMut(T) + Send + 'a,
    {
        self.result = Some(Box::new(Each {
            callback,
            _unit: PhantomData,
        }));
        self
    }

    /// Copy status, headers and URL into `target`; with `with_body` the raw
    /// body is kept in a pooled buffer the caller should release
    pub fn capture_response(mut self, target: &'a mut CapturedResponse, with_body: bool) -> Self {
        self.capture = Some((target, with_body));
        self
    }
}

impl fmt::Debug for RequestOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("has_body", &self.body.is_some())
            .field("timeout", &self.timeout)
            .field("filters", &self.filters)
            .field("has_result", &self.result.is_some())
            .finish()
    }
}

fn parse_header(name: &str, value: &str) -> Option<(HeaderName, HeaderValue)> {
    match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
        (Ok(name), Ok(value)) => Some((name, value)),
        _ => {
            warn!(header = name, "Skipping invalid header");
            None
        }
    }
}

/// Content type announced for a body when the caller gave none
fn default_content_type(converter: &dyn Converter) -> Option<MediaType> {
    let types = converter.supported_media_types();
    types
        .iter()
        .find(|mt| !mt.is_wildcard_type() && !mt.is_wildcard_subtype() && !mt.is_prefix_wildcard())
        .or_else(|| types.first())
        .cloned()
}

/// REST client: converters, filters and a transport behind one call
#[derive(Clone)]
pub struct RestClient {
    converters: ConverterRegistry,
    filters: FilterChain,
    transport: Arc<dyn Transport>,
    pool: BufferPool,
    config: ClientConfig,
}

impl RestClient {
    /// Client with the default converters and a reqwest transport
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> RestClientBuilder {
        RestClientBuilder::default()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Run one request.
    ///
    /// Errors that happen before a response exists are reported with
    /// [`DEFAULT_ERROR_STATUS`](crate::error::DEFAULT_ERROR_STATUS); decode
    /// failures and bad statuses carry the response status.
    pub async fn exchange(
        &self,
        url: &str,
        options: RequestOptions<'_>,
    ) -> std::result::Result<(), ExchangeError> {
        let RequestOptions {
            method,
            mut headers,
            body,
            cancellation,
            timeout,
            filters,
            mut result,
            capture,
        } = options;

        let url = Url::parse(url).map_err(Error::from)?;
        let mut request = Request::from_url(method, url);

        if let Some(body) = body {
            request.body = Some(self.encode_body(body.as_ref(), &mut headers)?);
        }

        if let Some(sink) = result.as_ref() {
            let user_accept = headers
                .get(ACCEPT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            match self
                .converters
                .accept_header(sink.shape(), user_accept.as_deref(), self.config.accept_mode)
            {
                Some(accept) if !accept.is_empty() => {
                    debug!(accept = %accept, shape = %sink.shape(), "Synthesized Accept");
                    let value = HeaderValue::try_from(accept)
                        .map_err(|e| Error::other(format!("Invalid Accept value: {e}")))?;
                    headers.insert(HeaderName::from_static(ACCEPT), value);
                }
                _ => {}
            }
        }

        request.headers = headers;
        request.timeout = timeout.or_else(|| {
            (!self.config.timeout.is_zero()).then_some(self.config.timeout)
        });
        request.cancellation = cancellation.clone();

        let chain = if filters.is_empty() {
            Cow::Borrowed(&self.filters)
        } else {
            Cow::Owned(FilterChain::merge(&self.filters, &filters))
        };
        let mut response = chain.run(self.transport.as_ref(), request).await?;

        let status = response.status;
        let at_status = |error: Error| ExchangeError::new(status, error);
        let bad = response.is_bad_status();

        if let Some((target, with_body)) = capture {
            target.status = status;
            target.headers = response.headers.clone();
            target.url = Some(response.url.clone());
            if with_body && !(bad && self.config.body_policy == ResponseBodyPolicy::IgnoreBad) {
                let bytes = response.buffer().await.map_err(at_status)?;
                let mut buf = self.pool.get();
                buf.extend_from_slice(&bytes);
                target.body = Some(buf);
            }
        }

        if bad && self.config.body_policy == ResponseBodyPolicy::IgnoreBad {
            debug!(status = %status, "Bad status, body ignored");
            response.discard_body();
            return Err(ExchangeError::bad_status(status, None));
        }

        match result.as_mut() {
            Some(sink) => {
                self.decode_into(sink.as_mut(), &mut response, cancellation.as_ref())
                    .await
                    .map_err(at_status)?;
            }
            None if bad => {
                let body = match response.buffer().await {
                    Ok(body) => Some(body).filter(|b| !b.is_empty()),
                    Err(e) => {
                        warn!(status = %status, error = %e, "Failed to read bad-status body");
                        None
                    }
                };
                return Err(ExchangeError::bad_status(status, body));
            }
            None => response.discard_body(),
        }

        if bad {
            return Err(ExchangeError::bad_status(status, None));
        }
        Ok(())
    }

    /// GET `url`
    pub async fn get(
        &self,
        url: &str,
        options: RequestOptions<'_>,
    ) -> std::result::Result<(), ExchangeError> {
        self.exchange(url, options.method(Method::GET)).await
    }

    /// POST to `url`
    pub async fn post(
        &self,
        url: &str,
        options: RequestOptions<'_>,
    ) -> std::result::Result<(), ExchangeError> {
        self.exchange(url, options.method(Method::POST)).await
    }

    /// PUT to `url`
    pub async fn put(
        &self,
        url: &str,
        options: RequestOptions<'_>,
    ) -> std::result::Result<(), ExchangeError> {
        self.exchange(url, options.method(Method::PUT)).await
    }

    /// DELETE `url`
    pub async fn delete(
        &self,
        url: &str,
        options: RequestOptions<'_>,
    ) -> std::result::Result<(), ExchangeError> {
        self.exchange(url, options.method(Method::DELETE)).await
    }

    /// HEAD `url`
    pub async fn head(
        &self,
        url: &str,
        options: RequestOptions<'_>,
    ) -> std::result::Result<(), ExchangeError> {
        self.exchange(url, options.method(Method::HEAD)).await
    }

    /// PATCH `url`
    pub async fn patch(
        &self,
        url: &str,
        options: RequestOptions<'_>,
    ) -> std::result::Result<(), ExchangeError> {
        self.exchange(url, options.method(Method::PATCH)).await
    }

    /// OPTIONS `url`
    pub async fn options(
        &self,
        url: &str,
        options: RequestOptions<'_>,
    ) -> std::result::Result<(), ExchangeError> {
        self.exchange(url, options.method(Method::OPTIONS)).await
    }

    fn encode_body(&self, body: &dyn OutgoingBody, headers: &mut HeaderMap) -> Result<Bytes> {
        let declared = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let media_type = MediaType::parse(declared.as_deref().unwrap_or(""));
        let converter = self.converters.choose_encoder(body.shape(), &media_type)?;

        if declared.is_none() {
            if let Some(content_type) = default_content_type(converter.as_ref()) {
                let value = HeaderValue::try_from(content_type.to_string())
                    .map_err(|e| Error::encode(format!("Invalid content type: {e}")))?;
                headers.insert(HeaderName::from_static(CONTENT_TYPE), value);
            }
        }

        let mut buf = self.pool.get();
        let written = body.encode(&converter.create_encoder(), &mut buf)?;
        debug!(
            converter = converter.name(),
            bytes = written,
            "Encoded request body"
        );
        Ok(buf.to_bytes())
    }

    async fn decode_into(
        &self,
        sink: &mut dyn ResultSink,
        response: &mut Response,
        cancellation: Option<&CancellationToken>,
    ) -> Result<()> {
        let media_type = MediaType::parse(response.content_type().unwrap_or(""));
        let converter = self.converters.choose_decoder(sink.shape(), &media_type)?;
        let mut decoder = converter.create_decoder();
        trace!(converter = converter.name(), media_type = %media_type, "Decoding response");

        loop {
            if let Drain::Done = sink.drain(&mut decoder)? {
                break;
            }
            let chunk = match cancellation {
                Some(token) => tokio::select! {
                    _ = token.cancelled() => return Err(Error::Cancelled),
                    chunk = response.chunk() => chunk?,
                },
                None => response.chunk().await?,
            };
            match chunk {
                Some(chunk) => decoder.feed(&chunk),
                None => decoder.finish(),
            }
        }

        response.discard_body();
        Ok(())
    }
}

impl fmt::Debug for RestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestClient")
            .field("converters", &self.converters)
            .field("filters", &self.filters)
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for [`RestClient`]
#[derive(Default)]
pub struct RestClientBuilder {
    converters: Option<ConverterRegistry>,
    extra_converters: Vec<Arc<dyn Converter>>,
    filters: FilterChain,
    transport: Option<Arc<dyn Transport>>,
    pool: Option<BufferPool>,
    config: ClientConfig,
}

impl RestClientBuilder {
    /// Replace the default converters
    pub fn set_converters(mut self, converters: Vec<Arc<dyn Converter>>) -> Self {
        let mut registry = ConverterRegistry::new();
        registry.set(converters);
        self.converters = Some(registry);
        self
    }

    /// Append a converter; it takes priority over those before it
    pub fn add_converter<C: Converter + 'static>(mut self, converter: C) -> Self {
        self.extra_converters.push(Arc::new(converter));
        self
    }

    /// Append a client-level filter
    pub fn add_filter<F: Filter + 'static>(mut self, filter: F) -> Self {
        self.filters.add(filter);
        self
    }

    /// Append a shared client-level filter
    pub fn add_filter_arc(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.add_arc(filter);
        self
    }

    /// Use a custom transport instead of reqwest
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn buffer_pool(mut self, pool: BufferPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn accept_mode(mut self, mode: AcceptMode) -> Self {
        self.config.accept_mode = mode;
        self
    }

    pub fn body_policy(mut self, policy: ResponseBodyPolicy) -> Self {
        self.config.body_policy = policy;
        self
    }

    pub fn build(self) -> Result<RestClient> {
        let mut converters = self
            .converters
            .unwrap_or_else(ConverterRegistry::with_defaults);
        for converter in self.extra_converters {
            converters.push_arc(converter);
        }

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&self.config.transport)?),
        };

        debug!(
            converters = converters.len(),
            filters = self.filters.len(),
            "Rest client built"
        );

        Ok(RestClient {
            converters,
            filters: self.filters,
            transport,
            pool: self.pool.unwrap_or_default(),
            config: self.config,
        })
    }
}
