//! Canonical JSON encoder for link hashing and signing.

use std::fmt;

use serde::ser::{
    SerializeMap, SerializeSeq, SerializeStruct, SerializeStructVariant, SerializeTuple,
    SerializeTupleStruct, SerializeTupleVariant, Serializer,
};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors produced by canonical JSON encoding.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CanonError {
    /// Serialization or parsing failed.
    #[error("json encode failed: {0}")]
    Json(#[from] serde_json::Error),

    /// A NaN or infinite float has no canonical representation and may not
    /// appear in a signing or hashing preimage.
    #[error("non-finite float values are not allowed")]
    NonFiniteFloat,

    /// A field path to blank out did not resolve.
    #[error("no value at path '{path}'")]
    MissingPath {
        /// The dotted path that failed to resolve.
        path: String,
    },
}

/// Serializes a value to canonical JSON bytes.
///
/// Canonical rules:
/// - object keys sorted by UTF-8 byte order, recursively
/// - no insignificant whitespace
/// - NaN/Infinity floats rejected
///
/// # Errors
///
/// Returns [`CanonError::NonFiniteFloat`] when the value contains a
/// non-finite float and [`CanonError::Json`] when serialization fails.
pub fn to_canon_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CanonError> {
    // serde_json quietly turns NaN/Infinity into null, so finiteness has
    // to be checked on the input itself, before the Value conversion
    value
        .serialize(FiniteCheck)
        .map_err(|NonFinite| CanonError::NonFiniteFloat)?;
    let value = serde_json::to_value(value)?;
    let canon = canon_value(value);
    Ok(serde_json::to_vec(&canon)?)
}

/// Re-encodes raw JSON bytes canonically with the value at
/// `zero_field_path` replaced by JSON `null`.
///
/// This is the reverse-signature preimage transform: the signed copy of a
/// payload is the payload itself with the signature field blanked in place.
///
/// # Errors
///
/// Returns [`CanonError::Json`] when `bytes` is not valid JSON and
/// [`CanonError::MissingPath`] when the path does not resolve to a field.
pub fn reencode_with_null(bytes: &[u8], zero_field_path: &[&str]) -> Result<Vec<u8>, CanonError> {
    let mut value: Value = serde_json::from_slice(bytes)?;
    let missing = || CanonError::MissingPath {
        path: zero_field_path.join("."),
    };
    let mut cursor = &mut value;
    for part in zero_field_path {
        cursor = cursor.get_mut(part).ok_or_else(missing)?;
    }
    *cursor = Value::Null;
    to_canon_json_bytes(&value)
}

fn canon_value(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(canon_value).collect()),
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
            let mut sorted = Map::new();
            for (key, val) in entries {
                sorted.insert(key, canon_value(val));
            }
            Value::Object(sorted)
        }
        other => other,
    }
}

/// Error raised by [`FiniteCheck`] on the first non-finite float.
#[derive(Debug)]
struct NonFinite;

impl fmt::Display for NonFinite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("non-finite float")
    }
}

impl std::error::Error for NonFinite {}

impl serde::ser::Error for NonFinite {
    fn custom<T: fmt::Display>(_msg: T) -> Self {
        Self
    }
}

/// A serializer that produces nothing and only rejects non-finite floats.
struct FiniteCheck;

/// Compound state for [`FiniteCheck`]; every element is checked, nothing
/// is emitted.
struct FiniteCheckCompound;

impl Serializer for FiniteCheck {
    type Ok = ();
    type Error = NonFinite;
    type SerializeSeq = FiniteCheckCompound;
    type SerializeTuple = FiniteCheckCompound;
    type SerializeTupleStruct = FiniteCheckCompound;
    type SerializeTupleVariant = FiniteCheckCompound;
    type SerializeMap = FiniteCheckCompound;
    type SerializeStruct = FiniteCheckCompound;
    type SerializeStructVariant = FiniteCheckCompound;

    fn serialize_f32(self, v: f32) -> Result<Self::Ok, Self::Error> {
        if v.is_finite() {
            Ok(())
        } else {
            Err(NonFinite)
        }
    }

    fn serialize_f64(self, v: f64) -> Result<Self::Ok, Self::Error> {
        if v.is_finite() {
            Ok(())
        } else {
            Err(NonFinite)
        }
    }

    fn serialize_bool(self, _v: bool) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_i8(self, _v: i8) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_i16(self, _v: i16) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_i32(self, _v: i32) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_i64(self, _v: i64) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_u8(self, _v: u8) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_u16(self, _v: u16) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_u32(self, _v: u32) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_u64(self, _v: u64) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_char(self, _v: char) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_str(self, _v: &str) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Self::Ok, Self::Error> {
        value.serialize(FiniteCheck)
    }

    fn serialize_unit(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error> {
        value.serialize(FiniteCheck)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error> {
        value.serialize(FiniteCheck)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Ok(FiniteCheckCompound)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        Ok(FiniteCheckCompound)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        Ok(FiniteCheckCompound)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        Ok(FiniteCheckCompound)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Ok(FiniteCheckCompound)
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        Ok(FiniteCheckCompound)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        Ok(FiniteCheckCompound)
    }
}

impl SerializeSeq for FiniteCheckCompound {
    type Ok = ();
    type Error = NonFinite;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}

impl SerializeTuple for FiniteCheckCompound {
    type Ok = ();
    type Error = NonFinite;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}

impl SerializeTupleStruct for FiniteCheckCompound {
    type Ok = ();
    type Error = NonFinite;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}

impl SerializeTupleVariant for FiniteCheckCompound {
    type Ok = ();
    type Error = NonFinite;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}

impl SerializeMap for FiniteCheckCompound {
    type Ok = ();
    type Error = NonFinite;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), Self::Error> {
        key.serialize(FiniteCheck)
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}

impl SerializeStruct for FiniteCheckCompound {
    type Ok = ();
    type Error = NonFinite;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}

impl SerializeStructVariant for FiniteCheckCompound {
    type Ok = ();
    type Error = NonFinite;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}
