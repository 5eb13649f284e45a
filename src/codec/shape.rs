// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Shape classification for values and result types
//!
//! Converters do not inspect types at runtime. Instead, the shape of an
//! outgoing value is found by serializing it into [`ValueProbe`], a
//! serializer that records what kind of data it was handed and stops as soon
//! as it knows. The shape of a result type is found by asking the type to
//! deserialize itself from [`TypeProbe`], a deserializer that reports which
//! `deserialize_*` hint the type requested.
//!
//! Types that use `#[serde(flatten)]` ask for a map and classify as
//! [`Shape::Map`]; untagged enums and `serde_json::Value` ask for anything
//! and classify as [`Shape::Dynamic`].

use std::fmt;

use serde::de::{self, DeserializeOwned, DeserializeSeed, SeqAccess, Visitor};
use serde::ser::{self, Serialize};

/// Coarse shape of a value, used by converters to decide what they handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Raw byte sequence (`Vec<u8>`, `Bytes`, `&[u8]`)
    Bytes,
    /// Text string
    Text,
    /// Struct or enum with named fields
    Struct,
    /// Key/value map
    Map,
    /// Sequence of non-byte elements
    Slice,
    /// Self-describing target such as `serde_json::Value`
    Dynamic,
    /// Anything else (numbers, booleans, unit)
    Other,
}

impl Shape {
    /// Shape of a value about to be encoded
    pub fn of_value<T: Serialize + ?Sized>(value: &T) -> Shape {
        match capture(value) {
            Ok(captured) => captured.shape(),
            Err(_) => Shape::Other,
        }
    }

    /// Shape of a type a response body will be decoded into
    pub fn of_type<T: DeserializeOwned>() -> Shape {
        match T::deserialize(TypeProbe) {
            Err(ProbeError::Found(shape)) => shape,
            Err(ProbeError::Byte) | Err(ProbeError::Custom(_)) | Ok(_) => Shape::Other,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What the value probe saw. Bytes and text are kept so the byte and
/// string codecs can write them without a second pass.
#[derive(Debug)]
pub(crate) enum Capture {
    Bytes(Vec<u8>),
    Text(String),
    Byte(u8),
    Shaped(Shape),
}

impl Capture {
    pub(crate) fn shape(&self) -> Shape {
        match self {
            Capture::Bytes(_) => Shape::Bytes,
            Capture::Text(_) => Shape::Text,
            Capture::Byte(_) => Shape::Other,
            Capture::Shaped(shape) => *shape,
        }
    }
}

pub(crate) fn capture<T: Serialize + ?Sized>(value: &T) -> Result<Capture, ProbeError> {
    value.serialize(ValueProbe)
}

#[derive(Debug)]
pub(crate) enum ProbeError {
    Found(Shape),
    Byte,
    Custom(String),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Found(shape) => write!(f, "probed shape {shape}"),
            ProbeError::Byte => f.write_str("probed byte"),
            ProbeError::Custom(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for ProbeError {}

impl ser::Error for ProbeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        ProbeError::Custom(msg.to_string())
    }
}

impl de::Error for ProbeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        ProbeError::Custom(msg.to_string())
    }
}

pub(crate) struct ValueProbe;

fn shaped(shape: Shape) -> Result<Capture, ProbeError> {
    Ok(Capture::Shaped(shape))
}

impl ser::Serializer for ValueProbe {
    type Ok = Capture;
    type Error = ProbeError;
    type SerializeSeq = SeqProbe;
    type SerializeTuple = SeqProbe;
    type SerializeTupleStruct = Classified;
    type SerializeTupleVariant = Classified;
    type SerializeMap = Classified;
    type SerializeStruct = Classified;
    type SerializeStructVariant = Classified;

    fn serialize_bool(self, _v: bool) -> Result<Capture, ProbeError> {
        shaped(Shape::Other)
    }

    fn serialize_i8(self, _v: i8) -> Result<Capture, ProbeError> {
        shaped(Shape::Other)
    }

    fn serialize_i16(self, _v: i16) -> Result<Capture, ProbeError> {
        shaped(Shape::Other)
    }

    fn serialize_i32(self, _v: i32) -> Result<Capture, ProbeError> {
        shaped(Shape::Other)
    }

    fn serialize_i64(self, _v: i64) -> Result<Capture, ProbeError> {
        shaped(Shape::Other)
    }

    fn serialize_u8(self, v: u8) -> Result<Capture, ProbeError> {
        Ok(Capture::Byte(v))
    }

    fn serialize_u16(self, _v: u16) -> Result<Capture, ProbeError> {
        shaped(Shape::Other)
    }

    fn serialize_u32(self, _v: u32) -> Result<Capture, ProbeError> {
        shaped(Shape::Other)
    }

    fn serialize_u64(self, _v: u64) -> Result<Capture, ProbeError> {
        shaped(Shape::Other)
    }

    fn serialize_f32(self, _v: f32) -> Result<Capture, ProbeError> {
        shaped(Shape::Other)
    }

    fn serialize_f64(self, _v: f64) -> Result<Capture, ProbeError> {
        shaped(Shape::Other)
    }

    fn serialize_char(self, v: char) -> Result<Capture, ProbeError> {
        Ok(Capture::Text(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Capture, ProbeError> {
        Ok(Capture::Text(v.to_owned()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Capture, ProbeError> {
        Ok(Capture::Bytes(v.to_vec()))
    }

    fn serialize_none(self) -> Result<Capture, ProbeError> {
        shaped(Shape::Other)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Capture, ProbeError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Capture, ProbeError> {
        shaped(Shape::Other)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Capture, ProbeError> {
        shaped(Shape::Struct)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<Capture, ProbeError> {
        shaped(Shape::Struct)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Capture, ProbeError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<Capture, ProbeError> {
        shaped(Shape::Struct)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<SeqProbe, ProbeError> {
        Ok(SeqProbe::default())
    }

    fn serialize_tuple(self, _len: usize) -> Result<SeqProbe, ProbeError> {
        Ok(SeqProbe::default())
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Classified, ProbeError> {
        Ok(Classified(Shape::Slice))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Classified, ProbeError> {
        Ok(Classified(Shape::Struct))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Classified, ProbeError> {
        Ok(Classified(Shape::Map))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Classified, ProbeError> {
        Ok(Classified(Shape::Struct))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Classified, ProbeError> {
        Ok(Classified(Shape::Struct))
    }
}

/// Collects sequence elements while they are all bytes; an empty or mixed
/// sequence is a slice.
pub(crate) struct SeqProbe {
    bytes: Option<Vec<u8>>,
}

impl Default for SeqProbe {
    fn default() -> Self {
        Self {
            bytes: Some(Vec::new()),
        }
    }
}

impl SeqProbe {
    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ProbeError> {
        if self.bytes.is_none() {
            return Ok(());
        }
        match value.serialize(ValueProbe)? {
            Capture::Byte(b) => {
                if let Some(bytes) = self.bytes.as_mut() {
                    bytes.push(b);
                }
            }
            _ => self.bytes = None,
        }
        Ok(())
    }

    fn finish(self) -> Result<Capture, ProbeError> {
        match self.bytes {
            Some(bytes) if !bytes.is_empty() => Ok(Capture::Bytes(bytes)),
            _ => shaped(Shape::Slice),
        }
    }
}

impl ser::SerializeSeq for SeqProbe {
    type Ok = Capture;
    type Error = ProbeError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ProbeError> {
        self.push(value)
    }

    fn end(self) -> Result<Capture, ProbeError> {
        self.finish()
    }
}

impl ser::SerializeTuple for SeqProbe {
    type Ok = Capture;
    type Error = ProbeError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ProbeError> {
        self.push(value)
    }

    fn end(self) -> Result<Capture, ProbeError> {
        self.finish()
    }
}

/// Compound value whose shape is known from its header; fields are skipped.
pub(crate) struct Classified(Shape);

impl ser::SerializeTupleStruct for Classified {
    type Ok = Capture;
    type Error = ProbeError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, _value: &T) -> Result<(), ProbeError> {
        Ok(())
    }

    fn end(self) -> Result<Capture, ProbeError> {
        shaped(self.0)
    }
}

impl ser::SerializeTupleVariant for Classified {
    type Ok = Capture;
    type Error = ProbeError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, _value: &T) -> Result<(), ProbeError> {
        Ok(())
    }

    fn end(self) -> Result<Capture, ProbeError> {
        shaped(self.0)
    }
}

impl ser::SerializeMap for Classified {
    type Ok = Capture;
    type Error = ProbeError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, _key: &T) -> Result<(), ProbeError> {
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, _value: &T) -> Result<(), ProbeError> {
        Ok(())
    }

    fn end(self) -> Result<Capture, ProbeError> {
        shaped(self.0)
    }
}

impl ser::SerializeStruct for Classified {
    type Ok = Capture;
    type Error = ProbeError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _key: &'static str,
        _value: &T,
    ) -> Result<(), ProbeError> {
        Ok(())
    }

    fn end(self) -> Result<Capture, ProbeError> {
        shaped(self.0)
    }
}

impl ser::SerializeStructVariant for Classified {
    type Ok = Capture;
    type Error = ProbeError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _key: &'static str,
        _value: &T,
    ) -> Result<(), ProbeError> {
        Ok(())
    }

    fn end(self) -> Result<Capture, ProbeError> {
        shaped(self.0)
    }
}

/// Deserializer that never produces a value; every entry point reports the
/// shape the target type asked for.
struct TypeProbe;

macro_rules! report {
    ($($method:ident => $shape:expr,)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, ProbeError> {
                Err(ProbeError::Found($shape))
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for TypeProbe {
    type Error = ProbeError;

    report! {
        deserialize_any => Shape::Dynamic,
        deserialize_bool => Shape::Other,
        deserialize_i8 => Shape::Other,
        deserialize_i16 => Shape::Other,
        deserialize_i32 => Shape::Other,
        deserialize_i64 => Shape::Other,
        deserialize_u16 => Shape::Other,
        deserialize_u32 => Shape::Other,
        deserialize_u64 => Shape::Other,
        deserialize_f32 => Shape::Other,
        deserialize_f64 => Shape::Other,
        deserialize_char => Shape::Text,
        deserialize_str => Shape::Text,
        deserialize_string => Shape::Text,
        deserialize_bytes => Shape::Bytes,
        deserialize_byte_buf => Shape::Bytes,
        deserialize_unit => Shape::Other,
        deserialize_map => Shape::Map,
        deserialize_identifier => Shape::Other,
        deserialize_ignored_any => Shape::Other,
    }

    fn deserialize_u8<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, ProbeError> {
        Err(ProbeError::Byte)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ProbeError> {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, ProbeError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ProbeError> {
        Err(sequence_shape(visitor.visit_seq(ElementProbe { asked: false })))
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, ProbeError> {
        Err(sequence_shape(visitor.visit_seq(ElementProbe { asked: false })))
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, ProbeError> {
        Err(ProbeError::Found(Shape::Slice))
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _visitor: V,
    ) -> Result<V::Value, ProbeError> {
        Err(ProbeError::Found(Shape::Struct))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, ProbeError> {
        Err(ProbeError::Found(Shape::Struct))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, ProbeError> {
        Err(ProbeError::Found(Shape::Struct))
    }
}

fn sequence_shape<T>(probed: Result<T, ProbeError>) -> ProbeError {
    match probed {
        Err(ProbeError::Byte) => ProbeError::Found(Shape::Bytes),
        _ => ProbeError::Found(Shape::Slice),
    }
}

/// Hands the element type one probe, then reports the sequence as empty.
struct ElementProbe {
    asked: bool,
}

impl<'de> SeqAccess<'de> for ElementProbe {
    type Error = ProbeError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, ProbeError> {
        if self.asked {
            return Ok(None);
        }
        self.asked = true;
        seed.deserialize(TypeProbe).map(Some)
    }
}
