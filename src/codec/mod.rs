// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Wire codecs and content negotiation
//!
//! A [`Codec`] is one of the supported wire formats. Converters (see
//! [`converter`]) pair a codec with the media types and value shapes it
//! accepts, and the [`ConverterRegistry`] picks one per call.
//!
//! Decoding is incremental: a [`Decoder`] is fed body chunks as they arrive
//! and hands out one logical unit per [`Decoder::decode`] call. JSON bodies
//! may carry several concatenated values; the other formats decode the whole
//! body as a single unit once the stream has ended.

pub mod converter;
pub mod shape;

pub use converter::{AcceptMode, CodecConverter, Converter, ConverterRegistry};
pub use shape::Shape;

use bytes::{Buf, BufMut, BytesMut};
use serde::de::value::{SeqDeserializer, StringDeserializer};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use shape::{capture, Capture};

/// Supported wire formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// Raw bytes, written and read as-is
    Bytes,
    /// UTF-8 text
    Text,
    /// JSON via serde_json
    Json,
    /// XML via quick-xml
    Xml,
    /// YAML via serde_yaml
    Yaml,
}

impl Codec {
    /// Codec name as used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Codec::Bytes => "bytes",
            Codec::Text => "text",
            Codec::Json => "json",
            Codec::Xml => "xml",
            Codec::Yaml => "yaml",
        }
    }

    /// Encode `value` and append it to `out`
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T, out: &mut BytesMut) -> Result<()> {
        match self {
            Codec::Bytes => match capture(value) {
                Ok(Capture::Bytes(bytes)) => out.extend_from_slice(&bytes),
                Ok(other) => {
                    return Err(Error::encode(format!(
                        "bytes codec cannot encode {}",
                        other.shape()
                    )))
                }
                Err(e) => return Err(Error::encode(e.to_string())),
            },
            Codec::Text => match capture(value) {
                Ok(Capture::Text(text)) => out.extend_from_slice(text.as_bytes()),
                Ok(other) => {
                    return Err(Error::encode(format!(
                        "text codec cannot encode {}",
                        other.shape()
                    )))
                }
                Err(e) => return Err(Error::encode(e.to_string())),
            },
            Codec::Json => serde_json::to_writer(BufMut::writer(&mut *out), value)?,
            Codec::Xml => {
                let xml = quick_xml::se::to_string(value)?;
                out.extend_from_slice(xml.as_bytes());
            }
            Codec::Yaml => serde_yaml::to_writer(BufMut::writer(&mut *out), value)?,
        }
        Ok(())
    }
}

/// Per-call encoder handed out by a converter
#[derive(Debug, Clone, Copy)]
pub struct Encoder {
    codec: Codec,
}

impl Encoder {
    pub fn new(codec: Codec) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Encode `value` into `out`, returning the number of bytes written
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T, out: &mut BytesMut) -> Result<usize> {
        let before = out.len();
        self.codec.encode(value, out)?;
        Ok(out.len() - before)
    }
}

/// Outcome of a single [`Decoder::decode`] call
#[derive(Debug)]
pub enum Decoded<T> {
    /// One logical unit and the number of body bytes it consumed
    Unit { value: T, consumed: usize },
    /// The buffered bytes do not yet hold a complete unit
    NeedMore,
    /// The stream has ended and every unit has been handed out
    End,
}

/// Finds where the first top-level JSON value in a buffer ends.
///
/// State survives between calls, so each byte is looked at once no matter how
/// the body is chunked; serde_json only runs on a complete value.
#[derive(Debug, Default)]
struct JsonScanner {
    pos: usize,
    depth: usize,
    started: bool,
    scalar: bool,
    in_string: bool,
    escaped: bool,
}

impl JsonScanner {
    fn started(&self) -> bool {
        self.started
    }

    /// End offset (exclusive) of the first complete value in `buf`
    fn scan(&mut self, buf: &[u8]) -> Option<usize> {
        while self.pos < buf.len() {
            let i = self.pos;
            let b = buf[i];
            self.pos += 1;

            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                    if self.depth == 0 {
                        return Some(i + 1);
                    }
                }
                continue;
            }

            if !self.started {
                match b {
                    b' ' | b'\t' | b'\n' | b'\r' => {}
                    b'{' | b'[' => {
                        self.started = true;
                        self.depth = 1;
                    }
                    b'"' => {
                        self.started = true;
                        self.in_string = true;
                    }
                    // Stray closer: let serde_json report it.
                    b'}' | b']' => {
                        self.started = true;
                        return Some(i + 1);
                    }
                    _ => {
                        self.started = true;
                        self.scalar = true;
                    }
                }
                continue;
            }

            if self.scalar {
                if matches!(
                    b,
                    b' ' | b'\t' | b'\n' | b'\r' | b'{' | b'[' | b'}' | b']' | b'"' | b','
                ) {
                    return Some(i);
                }
                continue;
            }

            match b {
                b'"' => self.in_string = true,
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        return Some(i + 1);
                    }
                }
                _ => {}
            }
        }
        None
    }
}

/// Incremental decoder fed with body chunks
#[derive(Debug)]
pub struct Decoder {
    codec: Codec,
    buf: BytesMut,
    scanner: JsonScanner,
    finished: bool,
    yielded: bool,
}

impl Decoder {
    pub fn new(codec: Codec) -> Self {
        Self {
            codec,
            buf: BytesMut::new(),
            scanner: JsonScanner::default(),
            finished: false,
            yielded: false,
        }
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Append a body chunk
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Mark the end of the body
    pub fn finish(&mut self) {
        self.finished = true;
    }

    /// Bytes fed but not yet consumed
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Decode the next unit, if a complete one is buffered
    pub fn decode<T: DeserializeOwned>(&mut self) -> Result<Decoded<T>> {
        match self.codec {
            Codec::Json => self.decode_json(),
            _ => self.decode_whole(),
        }
    }

    fn decode_json<T: DeserializeOwned>(&mut self) -> Result<Decoded<T>> {
        let end = match self.scanner.scan(&self.buf) {
            Some(end) => end,
            None if !self.scanner.started() => {
                self.buf.clear();
                self.scanner = JsonScanner::default();
                return Ok(if self.finished {
                    Decoded::End
                } else {
                    Decoded::NeedMore
                });
            }
            None if self.finished => self.buf.len(),
            None => return Ok(Decoded::NeedMore),
        };

        let value = serde_json::from_slice(&self.buf[..end])?;
        self.buf.advance(end);
        self.scanner = JsonScanner::default();
        Ok(Decoded::Unit {
            value,
            consumed: end,
        })
    }

    fn decode_whole<T: DeserializeOwned>(&mut self) -> Result<Decoded<T>> {
        if !self.finished {
            return Ok(Decoded::NeedMore);
        }
        if self.yielded {
            return Ok(Decoded::End);
        }
        if self.buf.is_empty() && matches!(self.codec, Codec::Xml | Codec::Yaml) {
            self.yielded = true;
            return Ok(Decoded::End);
        }

        let body = self.buf.split();
        let consumed = body.len();
        let value = match self.codec {
            Codec::Bytes => {
                let de = SeqDeserializer::<_, serde::de::value::Error>::new(body.iter().copied());
                T::deserialize(de).map_err(|e| Error::decode(e.to_string()))?
            }
            Codec::Text => {
                let text = String::from_utf8(body.to_vec())
                    .map_err(|e| Error::decode(format!("body is not UTF-8: {e}")))?;
                T::deserialize(StringDeserializer::<serde::de::value::Error>::new(text))
                    .map_err(|e| Error::decode(e.to_string()))?
            }
            Codec::Xml => {
                let text = std::str::from_utf8(&body)
                    .map_err(|e| Error::decode(format!("body is not UTF-8: {e}")))?;
                quick_xml::de::from_str(text)?
            }
            Codec::Yaml => serde_yaml::from_slice(&body)?,
            Codec::Json => serde_json::from_slice(&body)?,
        };

        self.yielded = true;
        Ok(Decoded::Unit { value, consumed })
    }
}
