// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Converters and the converter registry
//!
//! Selection walks the registry from the last registered converter to the
//! first, so converters appended later override the built-ins without
//! removing them.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use super::{Codec, Decoder, Encoder, Shape};
use crate::error::{Direction, Error, Result};
use crate::media_type::{types, MediaType};

/// How the `Accept` header is produced for a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcceptMode {
    /// Only send the caller's own `Accept` value
    UserOnly,
    /// Advertise the first media type the registry can decode into
    #[default]
    AutoFirst,
    /// Advertise every media type the registry can decode into
    AutoAll,
}

/// A codec plus the media types and value shapes it handles
pub trait Converter: Send + Sync {
    /// Name used by [`ConverterRegistry::remove`] and in logs
    fn name(&self) -> &str;

    /// Declared media types, primary first
    fn supported_media_types(&self) -> &[MediaType];

    /// Wire format behind this converter
    fn codec(&self) -> Codec;

    /// Whether a value of `shape` can be encoded as `media_type`
    fn can_encode(&self, shape: Shape, media_type: &MediaType) -> bool;

    /// Whether a body of `media_type` can be decoded into `shape`
    fn can_decode(&self, shape: Shape, media_type: &MediaType) -> bool;

    fn create_encoder(&self) -> Encoder {
        Encoder::new(self.codec())
    }

    fn create_decoder(&self) -> Decoder {
        Decoder::new(self.codec())
    }

    /// Whether any declared media type is compatible with `media_type`
    fn supports_media_type(&self, media_type: &MediaType) -> bool {
        self.supported_media_types()
            .iter()
            .any(|supported| supported.is_compatible(media_type))
    }
}

/// Table-driven converter used for all built-in formats
#[derive(Debug, Clone)]
pub struct CodecConverter {
    name: String,
    codec: Codec,
    media_types: Vec<MediaType>,
    shapes: Vec<Shape>,
}

impl CodecConverter {
    pub fn new(
        name: impl Into<String>,
        codec: Codec,
        media_types: impl IntoIterator<Item = MediaType>,
        shapes: impl IntoIterator<Item = Shape>,
    ) -> Self {
        Self {
            name: name.into(),
            codec,
            media_types: media_types.into_iter().collect(),
            shapes: shapes.into_iter().collect(),
        }
    }

    /// Raw bytes for any media type
    pub fn bytes() -> Self {
        Self::new(
            "bytes",
            Codec::Bytes,
            [MediaType::any(), MediaType::parse(types::OCTET_STREAM)],
            [Shape::Bytes],
        )
    }

    /// Text strings as `text/plain` or anything else
    pub fn string() -> Self {
        Self::new(
            "string",
            Codec::Text,
            [MediaType::parse(types::TEXT_PLAIN), MediaType::any()],
            [Shape::Text],
        )
    }

    pub fn json() -> Self {
        Self::new(
            "json",
            Codec::Json,
            [
                MediaType::parse(types::APPLICATION_JSON),
                MediaType::parse(types::APPLICATION_ANY_JSON),
            ],
            [Shape::Struct, Shape::Map, Shape::Dynamic, Shape::Slice],
        )
    }

    /// XML has no representation for bare maps or sequences
    pub fn xml() -> Self {
        Self::new(
            "xml",
            Codec::Xml,
            [
                MediaType::parse(types::APPLICATION_XML),
                MediaType::parse(types::APPLICATION_ANY_XML),
            ],
            [Shape::Struct, Shape::Dynamic],
        )
    }

    pub fn yaml() -> Self {
        Self::new(
            "yaml",
            Codec::Yaml,
            [
                MediaType::parse(types::APPLICATION_YAML),
                MediaType::parse(types::APPLICATION_ANY_YAML),
            ],
            [Shape::Struct, Shape::Map, Shape::Dynamic, Shape::Slice],
        )
    }

    fn handles(&self, shape: Shape, media_type: &MediaType) -> bool {
        self.shapes.contains(&shape) && self.supports_media_type(media_type)
    }
}

impl Converter for CodecConverter {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_media_types(&self) -> &[MediaType] {
        &self.media_types
    }

    fn codec(&self) -> Codec {
        self.codec
    }

    fn can_encode(&self, shape: Shape, media_type: &MediaType) -> bool {
        self.handles(shape, media_type)
    }

    fn can_decode(&self, shape: Shape, media_type: &MediaType) -> bool {
        self.handles(shape, media_type)
    }
}

/// Ordered set of converters
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    converters: Vec<Arc<dyn Converter>>,
}

impl ConverterRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte, string, YAML, XML and JSON, in that order, so JSON is
    /// preferred whenever the media type leaves the choice open
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .push(CodecConverter::bytes())
            .push(CodecConverter::string())
            .push(CodecConverter::yaml())
            .push(CodecConverter::xml())
            .push(CodecConverter::json());
        registry
    }

    /// Append a converter; it takes priority over everything already registered
    pub fn push(&mut self, converter: impl Converter + 'static) -> &mut Self {
        self.converters.push(Arc::new(converter));
        self
    }

    /// Append a shared converter
    pub fn push_arc(&mut self, converter: Arc<dyn Converter>) -> &mut Self {
        self.converters.push(converter);
        self
    }

    /// Remove every converter named `name`; returns whether any was removed
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.converters.len();
        self.converters.retain(|c| c.name() != name);
        before != self.converters.len()
    }

    /// Replace the whole list
    pub fn set(&mut self, converters: Vec<Arc<dyn Converter>>) {
        self.converters = converters;
    }

    /// Converters in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Converter>> {
        self.converters.iter()
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    /// Pick the converter that encodes a value of `shape` as `media_type`
    pub fn choose_encoder(&self, shape: Shape, media_type: &MediaType) -> Result<Arc<dyn Converter>> {
        let found = self
            .converters
            .iter()
            .rev()
            .find(|c| c.can_encode(shape, media_type))
            .cloned();

        match found {
            Some(converter) => {
                trace!(converter = converter.name(), %shape, %media_type, "Encoder selected");
                Ok(converter)
            }
            None => Err(Error::no_converter(Direction::Encode, shape, media_type)),
        }
    }

    /// Pick the converter that decodes a `media_type` body into `shape`
    pub fn choose_decoder(&self, shape: Shape, media_type: &MediaType) -> Result<Arc<dyn Converter>> {
        let found = self
            .converters
            .iter()
            .rev()
            .find(|c| c.can_decode(shape, media_type))
            .cloned();

        match found {
            Some(converter) => {
                trace!(converter = converter.name(), %shape, %media_type, "Decoder selected");
                Ok(converter)
            }
            None => Err(Error::no_converter(Direction::Decode, shape, media_type)),
        }
    }

    /// Build the `Accept` value for a result of `shape`.
    ///
    /// `user_accept` is the caller's own header value, if any. In the
    /// automatic modes it narrows which converters are considered; prefix
    /// wildcard types such as `*/*` or `application/*json` are never
    /// advertised. Returns `None` when there is nothing to send.
    pub fn accept_header(
        &self,
        shape: Shape,
        user_accept: Option<&str>,
        mode: AcceptMode,
    ) -> Option<String> {
        if mode == AcceptMode::UserOnly {
            return user_accept
                .filter(|accept| !accept.is_empty())
                .map(str::to_string);
        }

        let filter = MediaType::parse(user_accept.unwrap_or_default());
        let mut seen = HashSet::new();
        let mut accepted: Vec<String> = Vec::new();

        for converter in self.converters.iter().rev() {
            if !converter.can_decode(shape, &filter) {
                continue;
            }
            for media_type in converter.supported_media_types() {
                if media_type.is_prefix_wildcard() {
                    continue;
                }
                let value = media_type.to_string();
                if seen.insert(value.clone()) {
                    accepted.push(value);
                    if mode == AcceptMode::AutoFirst {
                        break;
                    }
                }
            }
            if mode == AcceptMode::AutoFirst && !accepted.is_empty() {
                break;
            }
        }

        if accepted.is_empty() {
            None
        } else {
            Some(accepted.join(","))
        }
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.converters.iter().map(|c| c.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mt(s: &str) -> MediaType {
        MediaType::parse(s)
    }

    #[test]
    fn test_default_selection() {
        let registry = ConverterRegistry::with_defaults();

        let json = registry.choose_decoder(Shape::Struct, &mt("application/json")).unwrap();
        assert_eq!(json.name(), "json");

        let xml = registry.choose_decoder(Shape::Struct, &mt("application/xml")).unwrap();
        assert_eq!(xml.name(), "xml");

        let text = registry.choose_decoder(Shape::Text, &mt("application/json")).unwrap();
        assert_eq!(text.name(), "string");

        let bytes = registry.choose_encoder(Shape::Bytes, &mt("")).unwrap();
        assert_eq!(bytes.name(), "bytes");

        // Without a content type the latest structured converter wins.
        let any = registry.choose_encoder(Shape::Struct, &MediaType::any()).unwrap();
        assert_eq!(any.name(), "json");
    }

    #[test]
    fn test_xml_rejects_maps() {
        let registry = ConverterRegistry::with_defaults();
        let err = registry
            .choose_encoder(Shape::Map, &mt("application/xml"))
            .err()
            .unwrap();
        assert!(err.is_negotiation());
        assert!(matches!(
            err,
            Error::NoConverter {
                direction: Direction::Encode,
                ..
            }
        ));
    }

    #[test]
    fn test_later_registration_wins() {
        let mut registry = ConverterRegistry::new();
        registry.push(CodecConverter::json());
        registry.push(CodecConverter::new(
            "vendor-json",
            Codec::Json,
            [mt("application/vnd.acme+json")],
            [Shape::Struct],
        ));

        let chosen = registry
            .choose_decoder(Shape::Struct, &mt("application/vnd.acme+json"))
            .unwrap();
        assert_eq!(chosen.name(), "vendor-json");

        assert!(registry.remove("vendor-json"));
        assert!(!registry.remove("vendor-json"));
        let chosen = registry
            .choose_decoder(Shape::Struct, &mt("application/vnd.acme+json"))
            .unwrap();
        assert_eq!(chosen.name(), "json");
    }

    #[test]
    fn test_accept_modes() {
        let registry = ConverterRegistry::with_defaults();

        assert_eq!(
            registry.accept_header(Shape::Struct, None, AcceptMode::AutoFirst),
            Some("application/json".to_string())
        );
        assert_eq!(
            registry.accept_header(Shape::Struct, None, AcceptMode::AutoAll),
            Some("application/json,application/xml,application/yaml".to_string())
        );
        assert_eq!(
            registry.accept_header(Shape::Struct, Some("application/json"), AcceptMode::AutoAll),
            Some("application/json".to_string())
        );
        assert_eq!(
            registry.accept_header(Shape::Text, None, AcceptMode::AutoAll),
            Some("text/plain".to_string())
        );
        assert_eq!(
            registry.accept_header(Shape::Bytes, None, AcceptMode::AutoAll),
            Some("application/octet-stream".to_string())
        );
        assert_eq!(
            registry.accept_header(Shape::Struct, Some("text/html"), AcceptMode::UserOnly),
            Some("text/html".to_string())
        );
        assert_eq!(registry.accept_header(Shape::Struct, None, AcceptMode::UserOnly), None);
        assert_eq!(registry.accept_header(Shape::Other, None, AcceptMode::AutoAll), None);
    }
}
