//! Rendering of unknown fields into the textual value tree.
//!
//! The binary wire codec itself is out of scope for this crate; only its
//! tag-parsing primitives (`prost::encoding::{decode_key, decode_varint,
//! decode_length_delimiter, WireType}`) are consumed here, to demultiplex a
//! raw unknown-field byte run by wire type the same way the reference
//! printer does.

use bytes::Buf;
use prost::encoding::{decode_key, decode_varint, WireType};

use crate::error::Error;
use crate::value::{Key, Message, Value, ValueKind};

/// A single decoded unknown field: its tag plus a wire-type-appropriate
/// payload. Length-delimited payloads are kept as raw bytes; groups are
/// recursively demultiplexed into their own unknown-field list.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownField {
    pub tag: u32,
    pub value: UnknownValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnknownValue {
    Varint(u64),
    Fixed64(u64),
    Fixed32(u32),
    LengthDelimited(Vec<u8>),
    Group(Vec<UnknownField>),
}

/// Decodes a raw unknown-field byte run (as surfaced by the reflection
/// facade's unknown-field accessor) into a flat list of fields, recursing
/// into legacy group payloads.
pub fn decode(mut bytes: &[u8]) -> Result<Vec<UnknownField>, Error> {
    decode_buf(&mut bytes)
}

fn decode_buf(buf: &mut &[u8]) -> Result<Vec<UnknownField>, Error> {
    let mut fields = Vec::new();
    while buf.has_remaining() {
        let (tag, wire_type) = decode_key(buf).map_err(|e| Error::binary(e.to_string()))?;
        if wire_type == WireType::EndGroup {
            return Err(Error::binary("unexpected end-group marker in unknown fields"));
        }
        let value = decode_value(buf, tag, wire_type)?;
        log::trace!("unknown field {tag} ({wire_type:?})");
        fields.push(UnknownField { tag, value });
    }
    Ok(fields)
}

fn decode_group_body(buf: &mut &[u8], open_tag: u32) -> Result<Vec<UnknownField>, Error> {
    let mut fields = Vec::new();
    loop {
        if !buf.has_remaining() {
            return Err(Error::binary("unterminated group in unknown fields"));
        }
        let (tag, wire_type) = decode_key(buf).map_err(|e| Error::binary(e.to_string()))?;
        if wire_type == WireType::EndGroup {
            if tag != open_tag {
                return Err(Error::binary("mismatched end-group tag in unknown fields"));
            }
            return Ok(fields);
        }
        fields.push(UnknownField {
            tag,
            value: decode_value(buf, tag, wire_type)?,
        });
    }
}

fn decode_value(buf: &mut &[u8], tag: u32, wire_type: WireType) -> Result<UnknownValue, Error> {
    match wire_type {
        WireType::Varint => Ok(UnknownValue::Varint(
            decode_varint(buf).map_err(|e| Error::binary(e.to_string()))?,
        )),
        WireType::SixtyFourBit => {
            if buf.remaining() < 8 {
                return Err(Error::binary("truncated 64-bit unknown field"));
            }
            Ok(UnknownValue::Fixed64(buf.get_u64_le()))
        }
        WireType::ThirtyTwoBit => {
            if buf.remaining() < 4 {
                return Err(Error::binary("truncated 32-bit unknown field"));
            }
            Ok(UnknownValue::Fixed32(buf.get_u32_le()))
        }
        WireType::LengthDelimited => {
            let len = decode_varint(buf).map_err(|e| Error::binary(e.to_string()))? as usize;
            if buf.remaining() < len {
                return Err(Error::binary("truncated length-delimited unknown field"));
            }
            let mut payload = vec![0u8; len];
            buf.copy_to_slice(&mut payload);
            Ok(UnknownValue::LengthDelimited(payload))
        }
        WireType::StartGroup => Ok(UnknownValue::Group(decode_group_body(buf, tag)?)),
        WireType::EndGroup => unreachable!("callers special-case EndGroup before reaching here"),
    }
}

/// Renders decoded unknown fields as `Uint`-keyed tree entries, matching the
/// grammar's round-trip convention for fields the schema doesn't know.
pub fn render(fields: &[UnknownField]) -> Message {
    let mut message = Message::new();
    for field in fields {
        let value = match &field.value {
            UnknownValue::Varint(v) => Value::synthetic(ValueKind::Uint(*v)),
            UnknownValue::Fixed64(v) => Value::synthetic(ValueKind::Uint(*v)),
            UnknownValue::Fixed32(v) => Value::synthetic(ValueKind::Uint(*v as u64)),
            UnknownValue::LengthDelimited(bytes) => {
                Value::synthetic(ValueKind::String(bytes.clone()))
            }
            UnknownValue::Group(nested) => Value::message(render(nested)),
        };
        message.push(Key::Uint(field.tag as u64), value);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::encoding::{encode_key, encode_varint};

    #[test]
    fn decodes_varint_and_length_delimited() {
        let mut buf = Vec::new();
        encode_key(1, WireType::Varint, &mut buf);
        encode_varint(150, &mut buf);
        encode_key(2, WireType::LengthDelimited, &mut buf);
        encode_varint(3, &mut buf);
        buf.extend_from_slice(b"abc");

        let fields = decode(&buf).unwrap();
        assert_eq!(
            fields,
            vec![
                UnknownField {
                    tag: 1,
                    value: UnknownValue::Varint(150)
                },
                UnknownField {
                    tag: 2,
                    value: UnknownValue::LengthDelimited(b"abc".to_vec())
                },
            ]
        );
    }

    #[test]
    fn renders_to_uint_keyed_tree() {
        let fields = vec![UnknownField {
            tag: 7,
            value: UnknownValue::Varint(42),
        }];
        let message = render(&fields);
        let (key, value) = &message.iter().next().unwrap();
        assert_eq!(key, &Key::Uint(7));
        assert_eq!(value.kind, ValueKind::Uint(42));
    }

    #[test]
    fn group_recurses_into_nested_unknowns() {
        let mut buf = Vec::new();
        encode_key(5, WireType::StartGroup, &mut buf);
        encode_key(1, WireType::Varint, &mut buf);
        encode_varint(9, &mut buf);
        encode_key(5, WireType::EndGroup, &mut buf);

        let fields = decode(&buf).unwrap();
        match &fields[0].value {
            UnknownValue::Group(nested) => {
                assert_eq!(nested[0].tag, 1);
                assert_eq!(nested[0].value, UnknownValue::Varint(9));
            }
            other => panic!("expected group, got {other:?}"),
        }
    }
}
