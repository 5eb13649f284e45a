// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTTP layer for restwire
//!
//! Request and response types, the pluggable [`Transport`] that performs the
//! actual network call, and the [`RestClient`] orchestrator that ties
//! negotiation, filters and decoding together.

mod client;
mod request;
mod response;
mod transport;

pub use client::{
    CapturedResponse, ClientConfig, RequestOptions, ResponseBodyPolicy, RestClient,
    RestClientBuilder,
};
pub use request::Request;
pub use response::{Body, Response};
pub use transport::{ReqwestTransport, Transport, TransportConfig};

/// Default user agent string
pub const DEFAULT_USER_AGENT: &str = concat!("restwire/", env!("CARGO_PKG_VERSION"));

/// Header names with special meaning to the client and its filters
pub mod headers {
    pub const ACCEPT: &str = "accept";
    pub const AUTHORIZATION: &str = "authorization";
    pub const CONTENT_LENGTH: &str = "content-length";
    pub const CONTENT_TYPE: &str = "content-type";
    pub const COOKIE: &str = "cookie";
    pub const SET_COOKIE: &str = "set-cookie";
    pub const USER_AGENT: &str = "user-agent";
    pub const WWW_AUTHENTICATE: &str = "www-authenticate";
}
