// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Media types and wildcard matching
//!
//! A [`MediaType`] is a case-folded `type/subtype` pair. Parameters such as
//! `; charset=utf-8` are dropped when parsing; negotiation only looks at the
//! type and subtype.

use std::fmt;
use std::str::FromStr;

/// Wildcard token for either half of a media type
pub const WILDCARD: &str = "*";

/// `type/subtype` pair used for content negotiation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType {
    type_: String,
    subtype: String,
}

impl MediaType {
    /// Create a media type from its parts. Both parts are lowercased; an
    /// empty part becomes `*`.
    pub fn new(type_: impl AsRef<str>, subtype: impl AsRef<str>) -> Self {
        let type_ = normalize_part(type_.as_ref());
        let subtype = normalize_part(subtype.as_ref());
        Self { type_, subtype }
    }

    /// `*/*`
    pub fn any() -> Self {
        Self::new(WILDCARD, WILDCARD)
    }

    /// Parse a media type string.
    ///
    /// Empty input yields `*/*`, a missing subtype yields `*`, and anything
    /// after the first `;` is ignored.
    pub fn parse(s: &str) -> Self {
        let essence = s.split(';').next().unwrap_or_default().trim();
        if essence.is_empty() {
            return Self::any();
        }

        match essence.split_once('/') {
            Some((type_, subtype)) => Self::new(type_, subtype),
            None => Self::new(essence, WILDCARD),
        }
    }

    /// Top-level type, e.g. `application`
    pub fn type_(&self) -> &str {
        &self.type_
    }

    /// Subtype, e.g. `json`
    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    /// `*` top-level type
    pub fn is_wildcard_type(&self) -> bool {
        self.type_ == WILDCARD
    }

    /// `*` subtype
    pub fn is_wildcard_subtype(&self) -> bool {
        self.subtype == WILDCARD
    }

    /// Subtype starting with `*`, such as `*json` or a bare `*`.
    ///
    /// These are too permissive to advertise in an `Accept` header.
    pub fn is_prefix_wildcard(&self) -> bool {
        self.subtype.starts_with('*')
    }

    /// Whether this media type includes `other`.
    ///
    /// `*/...` includes everything. With equal types the subtypes must be
    /// equal, this subtype must be `*`, or this subtype must be `*suffix`
    /// with `other`'s subtype ending in `suffix`.
    pub fn includes(&self, other: &MediaType) -> bool {
        if self.is_wildcard_type() {
            return true;
        }
        if self.type_ != other.type_ {
            return false;
        }
        if self.subtype == other.subtype || self.is_wildcard_subtype() {
            return true;
        }

        match self.subtype.strip_prefix('*') {
            Some(suffix) => other.subtype.ends_with(suffix),
            None => false,
        }
    }

    /// Whether either side includes the other
    pub fn is_compatible(&self, other: &MediaType) -> bool {
        self.includes(other) || other.includes(self)
    }
}

fn normalize_part(part: &str) -> String {
    let part = part.trim();
    if part.is_empty() {
        WILDCARD.to_string()
    } else {
        part.to_ascii_lowercase()
    }
}

impl Default for MediaType {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_, self.subtype)
    }
}

impl FromStr for MediaType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for MediaType {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

/// Well-known media type strings
pub mod types {
    pub const ANY: &str = "*/*";
    pub const OCTET_STREAM: &str = "application/octet-stream";
    pub const TEXT_PLAIN: &str = "text/plain";
    pub const APPLICATION_JSON: &str = "application/json";
    pub const APPLICATION_ANY_JSON: &str = "application/*json";
    pub const APPLICATION_XML: &str = "application/xml";
    pub const APPLICATION_ANY_XML: &str = "application/*xml";
    pub const APPLICATION_YAML: &str = "application/yaml";
    pub const APPLICATION_ANY_YAML: &str = "application/*yaml";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes() {
        assert_eq!(MediaType::parse(""), MediaType::any());
        assert_eq!(MediaType::parse("   "), MediaType::any());
        assert_eq!(MediaType::parse("Application/JSON").to_string(), "application/json");
        assert_eq!(MediaType::parse("text").to_string(), "text/*");
        assert_eq!(
            MediaType::parse("application/json; charset=utf-8").to_string(),
            "application/json"
        );
        assert_eq!(MediaType::new("", "").to_string(), "*/*");
    }

    #[test]
    fn test_any_includes_everything() {
        let any = MediaType::any();
        for s in ["application/json", "text/plain", "*/*", "image/*", "foo/bar"] {
            assert!(any.includes(&MediaType::parse(s)), "{s}");
        }
    }

    #[test]
    fn test_subtype_wildcards() {
        let app_any = MediaType::parse("application/*");
        let app_json = MediaType::parse("application/json");
        let app_any_json = MediaType::parse("application/*json");
        let app_xml = MediaType::parse("application/xml");

        assert!(app_any.includes(&app_json));
        assert!(app_any_json.includes(&app_json));
        assert!(app_any_json.includes(&MediaType::parse("application/problem+json")));
        assert!(!app_any_json.includes(&app_xml));
        assert!(!app_json.includes(&app_xml));
        assert!(!app_json.includes(&app_any));
        assert!(!MediaType::parse("text/*").includes(&app_json));
    }

    #[test]
    fn test_compatible_is_symmetric() {
        let app_json = MediaType::parse("application/json");
        let any = MediaType::any();

        assert!(app_json.is_compatible(&any));
        assert!(any.is_compatible(&app_json));
        assert!(!app_json.is_compatible(&MediaType::parse("text/plain")));
    }

    #[test]
    fn test_prefix_wildcard() {
        assert!(MediaType::any().is_prefix_wildcard());
        assert!(MediaType::parse("application/*json").is_prefix_wildcard());
        assert!(!MediaType::parse("application/json").is_prefix_wildcard());
    }
}
