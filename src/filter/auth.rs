// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Authentication filters
//!
//! [`BasicAuth`] and [`BearerAuth`] stamp an `Authorization` header on every
//! request. [`DigestAuth`] implements the RFC 2617 / RFC 7616 challenge
//! flow: it lets the first request go out unauthenticated, answers a `401`
//! carrying a Digest challenge by computing the response hash, and resends
//! the request exactly once.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use lazy_static::lazy_static;
use md5::Md5;
use parking_lot::{Mutex, RwLock};
use rand::RngCore;
use regex::Regex;
use reqwest::StatusCode;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::{Filter, Next};
use crate::error::{Error, Result};
use crate::http::{headers, Request, Response};

/// HTTP Basic authentication
pub struct BasicAuth {
    credentials: RwLock<(String, String)>,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: RwLock::new((username.into(), password.into())),
        }
    }

    /// Swap credentials for subsequent requests
    pub fn reset_credentials(&self, username: impl Into<String>, password: impl Into<String>) {
        *self.credentials.write() = (username.into(), password.into());
    }

    /// Current `Authorization` header value
    pub fn header_value(&self) -> String {
        let credentials = self.credentials.read();
        let encoded = STANDARD.encode(format!("{}:{}", credentials.0, credentials.1));
        format!("Basic {}", encoded)
    }
}

#[async_trait]
impl Filter for BasicAuth {
    async fn filter(&self, mut request: Request, next: Next<'_>) -> Result<Response> {
        request.set_header(headers::AUTHORIZATION, self.header_value())?;
        next.run(request).await
    }
}

type TokenFormatter = Box<dyn Fn(&str) -> String + Send + Sync>;

/// Access-token authentication, `Bearer <token>` by default
pub struct BearerAuth {
    token: RwLock<String>,
    formatter: Option<TokenFormatter>,
}

impl BearerAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(token.into()),
            formatter: None,
        }
    }

    /// Build the header value with a custom scheme or format
    pub fn with_formatter(
        token: impl Into<String>,
        formatter: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            token: RwLock::new(token.into()),
            formatter: Some(Box::new(formatter)),
        }
    }

    /// Swap the token for subsequent requests
    pub fn reset_credentials(&self, token: impl Into<String>) {
        *self.token.write() = token.into();
    }

    /// Current `Authorization` header value
    pub fn header_value(&self) -> String {
        let token = self.token.read();
        match &self.formatter {
            Some(formatter) => formatter(&token),
            None => format!("Bearer {}", token),
        }
    }
}

#[async_trait]
impl Filter for BearerAuth {
    async fn filter(&self, mut request: Request, next: Next<'_>) -> Result<Response> {
        request.set_header(headers::AUTHORIZATION, self.header_value())?;
        next.run(request).await
    }
}

lazy_static! {
    static ref REALM_RE: Regex = Regex::new(r#"(?i)\brealm="([^"]*)""#).unwrap();
    static ref NONCE_RE: Regex = Regex::new(r#"(?i)\bnonce="([^"]*)""#).unwrap();
    static ref OPAQUE_RE: Regex = Regex::new(r#"(?i)\bopaque="([^"]*)""#).unwrap();
    static ref QOP_RE: Regex = Regex::new(r#"(?i)\bqop="?([^"]*?)"?(?:,\s*[a-z]+=|$)"#).unwrap();
    static ref ALGORITHM_RE: Regex = Regex::new(r#"(?i)\balgorithm="?([^",\s]+)"?"#).unwrap();
    static ref STALE_RE: Regex = Regex::new(r#"(?i)\bstale="?(true|false)"?"#).unwrap();
}

/// Parsed Digest `WWW-Authenticate` challenge
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WwwAuthenticate {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    /// As sent by the server; `None` means MD5
    pub algorithm: Option<String>,
    /// Offered qop values
    pub qop: Vec<String>,
    pub stale: bool,
}

impl WwwAuthenticate {
    /// Parse a `WWW-Authenticate` value. Returns `None` unless it is a Digest
    /// challenge with a nonce.
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let scheme = header.split_whitespace().next()?;
        if !scheme.eq_ignore_ascii_case("digest") {
            return None;
        }

        let capture = |re: &Regex| {
            re.captures(header)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        };

        let nonce = capture(&NONCE_RE)?;
        let qop = capture(&QOP_RE)
            .map(|list| {
                list.split(',')
                    .map(|q| q.trim().to_ascii_lowercase())
                    .filter(|q| !q.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            realm: capture(&REALM_RE).unwrap_or_default(),
            nonce,
            opaque: capture(&OPAQUE_RE),
            algorithm: capture(&ALGORITHM_RE),
            qop,
            stale: capture(&STALE_RE)
                .map(|s| s.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }

    /// Find the Digest challenge among a response's `WWW-Authenticate` values
    pub fn from_response(response: &Response) -> Option<Self> {
        response
            .header_all(headers::WWW_AUTHENTICATE)
            .into_iter()
            .find_map(Self::parse)
    }
}

/// Hash function named by the challenge's `algorithm`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Md5,
    Sha256,
}

impl DigestAlgorithm {
    /// Accepts `MD5`, `SHA-256` and their `-sess` forms, case-insensitively;
    /// an empty name means MD5
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "" | "MD5" | "MD5-SESS" => Ok(DigestAlgorithm::Md5),
            "SHA-256" | "SHA-256-SESS" => Ok(DigestAlgorithm::Sha256),
            _ => Err(Error::UnsupportedAlgorithm(name.to_string())),
        }
    }

    fn hash(&self, input: &[u8]) -> String {
        match self {
            DigestAlgorithm::Md5 => format!("{:x}", Md5::digest(input)),
            DigestAlgorithm::Sha256 => format!("{:x}", Sha256::digest(input)),
        }
    }
}

/// Quality of protection chosen from a challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qop {
    /// No qop offered (RFC 2069 compatibility)
    None,
    Auth,
    AuthInt,
}

impl Qop {
    /// Pick the first supported value from an offered list
    pub fn select(offered: &[String]) -> Result<Self> {
        if offered.is_empty() {
            return Ok(Qop::None);
        }
        offered
            .iter()
            .find_map(|q| match q.as_str() {
                "auth" => Some(Qop::Auth),
                "auth-int" => Some(Qop::AuthInt),
                _ => None,
            })
            .ok_or_else(|| Error::UnsupportedQop(offered.join(",")))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Qop::None => "",
            Qop::Auth => "auth",
            Qop::AuthInt => "auth-int",
        }
    }
}

/// Digest credentials plus the state of the last challenge.
///
/// Sessions are immutable: [`DigestSession::refresh`] returns a new session
/// for the next challenge, with the nonce count advanced by one and a new
/// client nonce.
#[derive(Clone, PartialEq, Eq)]
pub struct DigestSession {
    username: String,
    password: String,
    realm: String,
    nonce: String,
    algorithm_name: String,
    algorithm: DigestAlgorithm,
    qop: Qop,
    nonce_count: u32,
    cnonce: String,
    opaque: Option<String>,
}

impl DigestSession {
    /// Unchallenged session
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            realm: String::new(),
            nonce: String::new(),
            algorithm_name: "MD5".to_string(),
            algorithm: DigestAlgorithm::Md5,
            qop: Qop::None,
            nonce_count: 0,
            cnonce: String::new(),
            opaque: None,
        }
    }

    /// Session for a new challenge
    pub fn refresh(&self, challenge: &WwwAuthenticate, cnonce: impl Into<String>) -> Result<Self> {
        let algorithm_name = challenge
            .algorithm
            .clone()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| "MD5".to_string());
        let algorithm = DigestAlgorithm::parse(&algorithm_name)?;
        let qop = Qop::select(&challenge.qop)?;

        Ok(Self {
            username: self.username.clone(),
            password: self.password.clone(),
            realm: challenge.realm.clone(),
            nonce: challenge.nonce.clone(),
            algorithm_name,
            algorithm,
            qop,
            nonce_count: self.nonce_count.wrapping_add(1),
            cnonce: cnonce.into(),
            opaque: challenge.opaque.clone(),
        })
    }

    /// Same challenge state with new credentials
    pub fn with_credentials(&self, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ..self.clone()
        }
    }

    /// Whether a challenge has been answered yet
    pub fn is_challenged(&self) -> bool {
        !self.nonce.is_empty()
    }

    pub fn nonce_count(&self) -> u32 {
        self.nonce_count
    }

    pub fn cnonce(&self) -> &str {
        &self.cnonce
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn qop(&self) -> Qop {
        self.qop
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// The `response` hash for a request
    pub fn response(&self, method: &str, uri: &str, body: &[u8]) -> String {
        let h = |s: String| self.algorithm.hash(s.as_bytes());

        let a1 = h(format!("{}:{}:{}", self.username, self.realm, self.password));
        let a2 = match self.qop {
            Qop::AuthInt => h(format!("{}:{}:{}", method, uri, self.algorithm.hash(body))),
            Qop::None | Qop::Auth => h(format!("{}:{}", method, uri)),
        };

        match self.qop {
            Qop::None => h(format!("{}:{}:{}", a1, self.nonce, a2)),
            Qop::Auth | Qop::AuthInt => h(format!(
                "{}:{}:{:08x}:{}:{}:{}",
                a1,
                self.nonce,
                self.nonce_count,
                self.cnonce,
                self.qop.as_str(),
                a2
            )),
        }
    }

    /// Full `Authorization` header value for a request
    pub fn authorization(&self, method: &str, uri: &str, body: &[u8]) -> String {
        let mut header = format!(
            r#"Digest username="{}", realm="{}", nonce="{}", uri="{}""#,
            self.username, self.realm, self.nonce, uri
        );
        if self.qop != Qop::None {
            header.push_str(&format!(
                r#", qop={}, nc={:08x}, cnonce="{}""#,
                self.qop.as_str(),
                self.nonce_count,
                self.cnonce
            ));
        }
        header.push_str(&format!(
            r#", response="{}", algorithm={}"#,
            self.response(method, uri, body),
            self.algorithm_name
        ));
        if let Some(ref opaque) = self.opaque {
            header.push_str(&format!(r#", opaque="{}""#, opaque));
        }
        header
    }
}

impl fmt::Debug for DigestSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestSession")
            .field("username", &self.username)
            .field("realm", &self.realm)
            .field("nonce", &self.nonce)
            .field("algorithm", &self.algorithm_name)
            .field("qop", &self.qop)
            .field("nonce_count", &self.nonce_count)
            .finish_non_exhaustive()
    }
}

/// Random client nonce: 12 bytes from the OS RNG, base64url encoded
pub fn generate_cnonce() -> String {
    let mut bytes = [0u8; 12];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE.encode(bytes)
}

type CnonceSource = Arc<dyn Fn() -> String + Send + Sync>;

/// HTTP Digest authentication filter
pub struct DigestAuth {
    session: Mutex<Arc<DigestSession>>,
    cnonce: CnonceSource,
}

impl DigestAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            session: Mutex::new(Arc::new(DigestSession::new(username, password))),
            cnonce: Arc::new(generate_cnonce),
        }
    }

    /// Use a fixed client nonce source (tests, reproducible traces)
    pub fn with_cnonce_source(mut self, source: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.cnonce = Arc::new(source);
        self
    }

    /// Swap credentials; the next challenge is answered with them
    pub fn reset_credentials(&self, username: impl Into<String>, password: impl Into<String>) {
        let mut session = self.session.lock();
        *session = Arc::new(session.with_credentials(username, password));
    }

    /// Snapshot of the current session
    pub fn session(&self) -> Arc<DigestSession> {
        self.session.lock().clone()
    }

    /// Answer a challenge: advance the session and build the header for `request`
    fn answer(&self, challenge: &WwwAuthenticate, request: &Request) -> Result<String> {
        let mut session = self.session.lock();
        let next = session.refresh(challenge, (self.cnonce)())?;
        let uri = request.request_uri();
        let body = request.body.as_deref().unwrap_or_default();
        let header = next.authorization(request.method.as_str(), &uri, body);

        debug!(
            realm = %next.realm,
            algorithm = %next.algorithm_name,
            qop = next.qop.as_str(),
            nc = next.nonce_count,
            "Answering digest challenge"
        );

        *session = Arc::new(next);
        Ok(header)
    }
}

#[async_trait]
impl Filter for DigestAuth {
    async fn filter(&self, request: Request, next: Next<'_>) -> Result<Response> {
        let mut retry = request.clone();
        let mut response = next.run(request).await?;
        if response.status != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let challenge = match WwwAuthenticate::from_response(&response) {
            Some(challenge) => challenge,
            None => {
                warn!(url = %retry.url, "401 without a usable Digest challenge");
                return Ok(response);
            }
        };

        let authorization = self.answer(&challenge, &retry)?;
        if retry.is_cancelled() {
            return Err(Error::Cancelled);
        }

        response.discard_body();
        retry.set_header(headers::AUTHORIZATION, authorization)?;
        next.run(retry).await
    }
}
