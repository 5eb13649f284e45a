// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Error types for restwire
//!
//! Every failure carries enough context for the caller to branch on "client bug",
//! "negotiation mismatch" or "genuine HTTP failure". [`RestClient::exchange`]
//! always returns an [`ExchangeError`], which pairs the underlying [`Error`]
//! with an HTTP status; failures that never reached the network use
//! [`DEFAULT_ERROR_STATUS`].
//!
//! [`RestClient::exchange`]: crate::http::RestClient::exchange

use std::fmt;

use bytes::Bytes;
use reqwest::StatusCode;
use thiserror::Error;

use crate::codec::Shape;

/// Result type alias for restwire operations
pub type Result<T> = std::result::Result<T, Error>;

/// Status reported for failures that never produced an HTTP response
pub const DEFAULT_ERROR_STATUS: StatusCode = StatusCode::BAD_REQUEST;

/// Which side of content negotiation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Encoding the outgoing request body
    Encode,
    /// Decoding the response body
    Decode,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Encode => f.write_str("encode"),
            Direction::Decode => f.write_str("decode"),
        }
    }
}

/// Main error type for restwire
#[derive(Error, Debug)]
pub enum Error {
    /// Transport failure (DNS, connect, TLS, timeout) from reqwest
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// JSON codec error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML codec error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// XML codec error
    #[error("XML error: {0}")]
    Xml(String),

    /// No registered converter matched
    #[error("No converter can {direction} {shape:?} as {media_type}")]
    NoConverter {
        direction: Direction,
        shape: Shape,
        media_type: String,
    },

    /// A value could not be encoded by the chosen codec
    #[error("Encode failed: {0}")]
    Encode(String),

    /// A response body could not be decoded by the chosen codec
    #[error("Decode failed: {0}")]
    Decode(String),

    /// The server answered with a status >= 400
    #[error("Bad status: {status}")]
    Status {
        status: StatusCode,
        body: Option<Bytes>,
    },

    /// Digest challenge names an algorithm we cannot hash with
    #[error("Unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Digest challenge names a qop we cannot compute
    #[error("Unsupported digest qop: {0}")]
    UnsupportedQop(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request's cancellation token fired
    #[error("Request cancelled")]
    Cancelled,

    /// A filter panicked and a recovery filter converted it
    #[error("Panic inside filter chain: {0}")]
    Panic(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a negotiation error
    pub fn no_converter(direction: Direction, shape: Shape, media_type: impl fmt::Display) -> Self {
        Error::NoConverter {
            direction,
            shape,
            media_type: media_type.to_string(),
        }
    }

    /// Create an encode error
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Error::Encode(msg.into())
    }

    /// Create a decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Error::Decode(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a content negotiation failure
    pub fn is_negotiation(&self) -> bool {
        matches!(self, Error::NoConverter { .. })
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Http(e) if e.is_timeout())
    }

    /// Check if this is a network error
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Http(_))
    }

    /// Check if this is a codec failure on either side
    pub fn is_codec(&self) -> bool {
        matches!(
            self,
            Error::Encode(_) | Error::Decode(_) | Error::Json(_) | Error::Yaml(_) | Error::Xml(_)
        )
    }

    /// Get HTTP status code if the error carries one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } => Some(status.as_u16()),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<quick_xml::DeError> for Error {
    fn from(e: quick_xml::DeError) -> Self {
        Error::Xml(e.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

/// Status-bearing error returned by [`RestClient::exchange`]
///
/// [`RestClient::exchange`]: crate::http::RestClient::exchange
#[derive(Error, Debug)]
#[error("{error}")]
pub struct ExchangeError {
    status: StatusCode,
    #[source]
    error: Error,
}

impl ExchangeError {
    /// Pair an error with the status it should be reported under
    pub fn new(status: StatusCode, error: Error) -> Self {
        Self { status, error }
    }

    /// Error that never reached the network
    pub fn local(error: Error) -> Self {
        Self::new(DEFAULT_ERROR_STATUS, error)
    }

    /// Error produced by a response with a bad status
    pub fn bad_status(status: StatusCode, body: Option<Bytes>) -> Self {
        Self::new(status, Error::Status { status, body })
    }

    /// HTTP status of the failure
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// The underlying error
    pub fn origin(&self) -> &Error {
        &self.error
    }

    /// Consume and return the underlying error
    pub fn into_inner(self) -> Error {
        self.error
    }

    /// Whether the server itself answered with a status >= 400
    pub fn is_bad_status(&self) -> bool {
        matches!(self.error, Error::Status { .. })
    }

    /// Body of a bad-status response, when it was kept
    pub fn body(&self) -> Option<&Bytes> {
        match &self.error {
            Error::Status { body, .. } => body.as_ref(),
            _ => None,
        }
    }
}

impl From<Error> for ExchangeError {
    fn from(error: Error) -> Self {
        ExchangeError::local(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_error_uses_default_status() {
        let err = ExchangeError::local(Error::no_converter(
            Direction::Encode,
            Shape::Map,
            "application/xml",
        ));

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.origin().is_negotiation());
        assert!(!err.is_bad_status());
    }

    #[test]
    fn test_bad_status_error() {
        let err = ExchangeError::bad_status(StatusCode::NOT_FOUND, Some(Bytes::from("missing")));

        assert!(err.is_bad_status());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.origin().status_code(), Some(404));
        assert_eq!(err.body().map(|b| b.as_ref()), Some(&b"missing"[..]));
        assert_eq!(err.to_string(), "Bad status: 404 Not Found");
    }

    #[test]
    fn test_classifiers() {
        assert!(Error::decode("garbage").is_codec());
        assert!(!Error::Cancelled.is_timeout());
        assert!(!Error::Cancelled.is_network());
        assert_eq!(Error::other("nope").status_code(), None);
        assert_eq!(Error::from("plain").to_string(), "plain");
    }
}
