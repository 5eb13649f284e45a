// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! # restwire - Async REST Client Toolkit
//!
//! A small REST client built around four pieces that work together:
//!
//! - Content negotiation: a converter registry that picks a wire format
//!   (bytes, text, JSON, XML, YAML) per call from the media type and the
//!   shape of the value, and synthesizes the `Accept` header
//! - Filter chain: LIFO middleware around the transport call
//! - Authentication: Basic, Bearer and Digest (RFC 2617 / RFC 7616) filters
//! - Cookie cache: domain and path scoped cookies with expiry and an
//!   optional background purge
//!
//! ## Example
//!
//! ```rust,no_run
//! use restwire::{CookieCache, DigestAuth, RequestOptions, RestClient};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Default, Deserialize)]
//! struct Greeting {
//!     result: Vec<String>,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RestClient::builder()
//!         .add_filter(DigestAuth::new("user", "secret"))
//!         .add_filter(CookieCache::new())
//!         .build()?;
//!
//!     let mut greeting = Greeting::default();
//!     client
//!         .get("https://api.example.com/hello", RequestOptions::new().result(&mut greeting))
//!         .await?;
//!
//!     println!("{:?}", greeting.result);
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod codec;
pub mod error;
pub mod filter;
pub mod http;
pub mod media_type;

// Errors
pub use error::{Direction, Error, ExchangeError, Result, DEFAULT_ERROR_STATUS};

// Negotiation
pub use codec::{AcceptMode, Codec, CodecConverter, Converter, ConverterRegistry, Shape};
pub use media_type::MediaType;

// Buffers
pub use buffer::{BufferPool, PooledBuffer};

// Filters
pub use filter::{filter_fn, Filter, FilterChain, Next};
pub use filter::{BasicAuth, BearerAuth, DigestAuth, DigestSession, WwwAuthenticate};
pub use filter::{ContentLengthFilter, LoggingFilter, RecoveryFilter};
pub use filter::{Cookie, CookieCache, CookieCacheConfig};

// HTTP
pub use http::{
    CapturedResponse, ClientConfig, RequestOptions, ResponseBodyPolicy, RestClient,
    RestClientBuilder,
};
pub use http::{ReqwestTransport, Request, Response, Transport, TransportConfig};

/// restwire version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
