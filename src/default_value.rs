//! Default-Value Codec: serializes and parses a single scalar value to/from
//! a string, in the two sub-dialects the descriptor format and the
//! generated-code struct-tag format diverge on.
//!
//! The two forms agree on every kind except `bool` and `enum`; the shared
//! numeric/string/bytes paths are implemented once and the two call sites
//! below only branch on those two kinds.

use crate::error::{Error, ErrorKind};
use crate::escape::{escape_bytes, unescape};

/// Which of the two textual dialects a default value is encoded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `FieldDescriptorProto.default_value`: `true`/`false`, enum value
    /// names.
    Descriptor,
    /// Generated-code struct tags: `1`/`0`, numeric enum values.
    StructTag,
}

/// The scalar kinds a default value may take, enough to pick the right
/// parse/render rule without depending on the reflection facade's own kind
/// enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Bool,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Float32,
    Float64,
    String,
    Bytes,
    /// Carries the declared value names so an identifier can be checked
    /// against them; numeric-form enum values are accepted in both
    /// dialects.
    Enum,
}

/// A resolved enum value: a declared name paired with its number.
pub struct EnumValue<'a> {
    pub name: &'a str,
    pub number: i32,
}

/// Serializes `value` (already rendered as the dialect-agnostic display
/// form for most kinds) for `kind` in `dialect`.
pub fn render_bool(value: bool, dialect: Dialect) -> String {
    match dialect {
        Dialect::Descriptor => (if value { "true" } else { "false" }).to_string(),
        Dialect::StructTag => (if value { "1" } else { "0" }).to_string(),
    }
}

pub fn render_enum(number: i32, values: &[EnumValue<'_>], dialect: Dialect) -> String {
    match dialect {
        Dialect::Descriptor => values
            .iter()
            .find(|v| v.number == number)
            .map(|v| v.name.to_string())
            .unwrap_or_else(|| number.to_string()),
        Dialect::StructTag => number.to_string(),
    }
}

pub fn render_float(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value == f64::INFINITY {
        "inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        format!("{value}")
    }
}

pub fn render_bytes(bytes: &[u8]) -> String {
    escape_bytes(bytes)
}

/// Parses `text` as a default value of `kind` in `dialect`. `values` is
/// consulted only for `ScalarKind::Enum`.
pub fn parse(text: &str, kind: ScalarKind, dialect: Dialect, values: &[EnumValue<'_>]) -> Result<ParsedDefault, Error> {
    let reject = |k: &'static str| {
        Error::new(ErrorKind::OutOfRange {
            kind: k,
            text: text.to_string(),
        })
    };
    match kind {
        ScalarKind::Bool => match (dialect, text) {
            (Dialect::Descriptor, "true") => Ok(ParsedDefault::Bool(true)),
            (Dialect::Descriptor, "false") => Ok(ParsedDefault::Bool(false)),
            (Dialect::StructTag, "1") => Ok(ParsedDefault::Bool(true)),
            (Dialect::StructTag, "0") => Ok(ParsedDefault::Bool(false)),
            _ => Err(reject("bool default")),
        },
        ScalarKind::Int32 => text
            .parse::<i32>()
            .map(ParsedDefault::Int32)
            .map_err(|_| reject("int32 default")),
        ScalarKind::Int64 => text
            .parse::<i64>()
            .map(ParsedDefault::Int64)
            .map_err(|_| reject("int64 default")),
        ScalarKind::Uint32 => text
            .parse::<u32>()
            .map(ParsedDefault::Uint32)
            .map_err(|_| reject("uint32 default")),
        ScalarKind::Uint64 => text
            .parse::<u64>()
            .map(ParsedDefault::Uint64)
            .map_err(|_| reject("uint64 default")),
        ScalarKind::Float32 => parse_float(text)
            .map(|v| ParsedDefault::Float32(v as f32))
            .ok_or_else(|| reject("float default")),
        ScalarKind::Float64 => {
            parse_float(text).map(ParsedDefault::Float64).ok_or_else(|| reject("double default"))
        }
        ScalarKind::String => Ok(ParsedDefault::String(text.to_string())),
        ScalarKind::Bytes => unescape(text.as_bytes())
            .map(ParsedDefault::Bytes)
            .map_err(|_| reject("bytes default")),
        ScalarKind::Enum => {
            if let Some(v) = values.iter().find(|v| v.name == text) {
                return Ok(ParsedDefault::Enum(v.number));
            }
            if let Ok(number) = text.parse::<i32>() {
                // Both dialects accept a bare numeric value, declared or not.
                return Ok(ParsedDefault::Enum(number));
            }
            Err(reject("enum default"))
        }
    }
}

fn parse_float(text: &str) -> Option<f64> {
    match text {
        "nan" | "NaN" => Some(f64::NAN),
        "inf" | "Inf" | "infinity" | "Infinity" => Some(f64::INFINITY),
        "-inf" | "-Inf" | "-infinity" | "-Infinity" => Some(f64::NEG_INFINITY),
        _ => text.trim_end_matches(['f', 'F']).parse().ok(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedDefault {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Uint32(u32),
    Uint64(u64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Enum(i32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_dialects_diverge() {
        assert_eq!(render_bool(true, Dialect::Descriptor), "true");
        assert_eq!(render_bool(true, Dialect::StructTag), "1");
        assert_eq!(
            parse("true", ScalarKind::Bool, Dialect::Descriptor, &[]).unwrap(),
            ParsedDefault::Bool(true)
        );
        assert!(parse("true", ScalarKind::Bool, Dialect::StructTag, &[]).is_err());
    }

    #[test]
    fn enum_dialects_diverge_on_rendering_not_parsing() {
        let values = [EnumValue { name: "FOO", number: 1 }];
        assert_eq!(render_enum(1, &values, Dialect::Descriptor), "FOO");
        assert_eq!(render_enum(1, &values, Dialect::StructTag), "1");
        assert_eq!(
            parse("FOO", ScalarKind::Enum, Dialect::StructTag, &values).unwrap(),
            ParsedDefault::Enum(1)
        );
        assert_eq!(
            parse("2", ScalarKind::Enum, Dialect::Descriptor, &values).unwrap(),
            ParsedDefault::Enum(2)
        );
    }

    #[test]
    fn bytes_share_the_syntax_layer_escape_scheme() {
        assert_eq!(render_bytes(b"a\nb"), "a\\nb");
        assert_eq!(
            parse("a\\nb", ScalarKind::Bytes, Dialect::Descriptor, &[]).unwrap(),
            ParsedDefault::Bytes(b"a\nb".to_vec())
        );
    }

    #[test]
    fn float_specials_and_unknown_input() {
        assert_eq!(render_float(f64::NAN), "nan");
        assert_eq!(render_float(f64::NEG_INFINITY), "-inf");
        match parse("nan", ScalarKind::Float64, Dialect::Descriptor, &[]).unwrap() {
            ParsedDefault::Float64(v) => assert!(v.is_nan()),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(parse("not_a_number", ScalarKind::Float64, Dialect::Descriptor, &[]).is_err());
    }
}
