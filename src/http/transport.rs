// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Terminal transport
//!
//! The transport performs the network call at the innermost end of the
//! filter chain. Connection pooling, TLS and DNS all live in reqwest; this
//! module only maps [`Request`] onto it and honours cancellation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::Client;
use tracing::debug;

use super::{Request, Response, DEFAULT_USER_AGENT};
use crate::error::{Error, Result};

/// Sends a fully built request and returns the response head with a
/// streaming body
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response>;
}

/// Connection-level settings for [`ReqwestTransport`]
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// TCP keep-alive interval
    pub keep_alive: Duration,
    /// Idle connections kept per host
    pub max_idle_per_host: usize,
    /// How long an idle connection is kept
    pub idle_timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Proxy URL
    pub proxy: Option<String>,
    /// Accept invalid certificates (dangerous!)
    pub accept_invalid_certs: bool,
    /// Maximum redirects to follow
    pub max_redirects: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            keep_alive: Duration::from_secs(30),
            max_idle_per_host: 5,
            idle_timeout: Duration::from_secs(90),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            proxy: None,
            accept_invalid_certs: false,
            max_redirects: 10,
        }
    }
}

impl TransportConfig {
    /// Set the user agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Route all traffic through a proxy
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the redirect limit
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a transport from configuration
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.connect_timeout)
            .tcp_keepalive(config.keep_alive)
            .pool_max_idle_per_host(config.max_idle_per_host)
            .pool_idle_timeout(config.idle_timeout)
            .redirect(Policy::limited(config.max_redirects))
            .danger_accept_invalid_certs(config.accept_invalid_certs);

        if let Some(ref proxy_url) = config.proxy {
            builder = builder.proxy(
                reqwest::Proxy::all(proxy_url)
                    .map_err(|e| Error::Config(format!("Invalid proxy URL: {}", e)))?,
            );
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Use an existing reqwest client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        let Request {
            method,
            url,
            headers,
            body,
            timeout,
            cancellation,
        } = request;

        debug!(method = %method, url = %url, "Sending request");

        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        if let Some(timeout) = timeout.filter(|t| !t.is_zero()) {
            builder = builder.timeout(timeout);
        }

        let response = match cancellation {
            Some(token) => tokio::select! {
                _ = token.cancelled() => return Err(Error::Cancelled),
                response = builder.send() => response?,
            },
            None => builder.send().await?,
        };

        Ok(Response::from_reqwest(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TransportConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.max_idle_per_host, 5);
        assert_eq!(config.idle_timeout, Duration::from_secs(90));
        assert!(config.user_agent.starts_with("restwire/"));
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let transport = ReqwestTransport::new(&TransportConfig::default()).unwrap();
        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();

        let request = Request::get("http://192.0.2.1:9/unreachable")
            .unwrap()
            .cancellation(token);
        assert!(matches!(
            transport.send(request).await,
            Err(Error::Cancelled)
        ));
    }
}
