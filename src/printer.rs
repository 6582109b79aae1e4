//! Tree-to-bytes emitter: the `Marshal` half of the textual syntax layer.
//! Schema-free, mirroring [`crate::parser`] — it only knows how to render a
//! [`crate::value::Message`] tree, not what any field means.

use rand::Rng;

use crate::error::Error;
use crate::escape::{escape_bytes, escape_str};
use crate::value::{Key, Message, Value, ValueKind};

/// Rendering options for [`print`].
#[derive(Clone)]
pub struct PrintOptions {
    /// Empty for compact single-line output; otherwise a spaces/tabs-only
    /// per-level indent string for multi-line output.
    pub indent: String,
    /// The opening/closing delimiter pair used for nested messages; must be
    /// `(b'{', b'}')` or `(b'<', b'>')`.
    pub delimiters: (u8, u8),
    /// Escape every non-ASCII byte in string values when set.
    pub output_ascii: bool,
    /// Injects a single stray space after `key:` or between compact-mode
    /// fields, to deter callers from relying on exact formatting. Disabled
    /// for deterministic tests.
    pub inject_randomness: bool,
}

impl Default for PrintOptions {
    fn default() -> Self {
        PrintOptions {
            indent: String::new(),
            delimiters: (b'{', b'}'),
            output_ascii: false,
            inject_randomness: true,
        }
    }
}

/// Renders a top-level `Message` value to bytes. The outer message is
/// printed without surrounding delimiters, per the grammar.
pub fn print(message: &Message, options: &PrintOptions) -> Result<Vec<u8>, Error> {
    validate_options(options)?;
    let mut out = Vec::new();
    let mut rng = rand::thread_rng();
    print_fields(message, options, 0, &mut out, &mut rng);
    Ok(out)
}

fn validate_options(options: &PrintOptions) -> Result<(), Error> {
    if !options.indent.bytes().all(|b| b == b' ' || b == b'\t') {
        return Err(Error::syntax("indent must consist only of spaces and tabs"));
    }
    if options.delimiters != (b'{', b'}') && options.delimiters != (b'<', b'>') {
        return Err(Error::syntax("delimiters must be '{}' or '<>'"));
    }
    Ok(())
}

fn print_fields(
    message: &Message,
    options: &PrintOptions,
    depth: usize,
    out: &mut Vec<u8>,
    rng: &mut impl Rng,
) {
    let compact = options.indent.is_empty();
    for (i, (key, value)) in message.iter().enumerate() {
        if i > 0 && compact {
            out.push(b' ');
            maybe_inject_space(options, rng, out);
        }
        if !compact {
            for _ in 0..depth {
                out.extend_from_slice(options.indent.as_bytes());
            }
        }
        print_key(key, out);
        let is_message = matches!(value.kind, ValueKind::Message(_));
        if !is_message {
            out.push(b':');
            maybe_inject_space(options, rng, out);
            out.push(b' ');
        } else {
            out.push(b' ');
        }
        print_value(value, options, depth, out, rng);
        if !compact {
            out.push(b'\n');
        }
    }
}

fn maybe_inject_space(options: &PrintOptions, rng: &mut impl Rng, out: &mut Vec<u8>) {
    if options.inject_randomness && rng.gen_bool(0.5) {
        out.push(b' ');
    }
}

fn print_key(key: &Key, out: &mut Vec<u8>) {
    match key {
        Key::Name(name) => out.extend_from_slice(name.as_bytes()),
        Key::Uint(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Key::String(name) => {
            out.push(b'[');
            if is_url_safe(name) {
                out.extend_from_slice(name.as_bytes());
            } else {
                out.push(b'"');
                out.extend_from_slice(escape_str(name, false).as_bytes());
                out.push(b'"');
            }
            out.push(b']');
        }
    }
}

fn is_url_safe(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'/' | b'-'))
}

fn print_value(
    value: &Value,
    options: &PrintOptions,
    depth: usize,
    out: &mut Vec<u8>,
    rng: &mut impl Rng,
) {
    match &value.kind {
        ValueKind::Bool(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        ValueKind::Int(v) => out.extend_from_slice(v.to_string().as_bytes()),
        ValueKind::Uint(v) => out.extend_from_slice(v.to_string().as_bytes()),
        ValueKind::Float32(v) => out.extend_from_slice(format_float(*v as f64).as_bytes()),
        ValueKind::Float64(v) => out.extend_from_slice(format_float(*v).as_bytes()),
        ValueKind::Name(name) => out.extend_from_slice(name.as_bytes()),
        ValueKind::String(bytes) => {
            out.push(b'"');
            out.extend_from_slice(print_string_bytes(bytes, options.output_ascii).as_bytes());
            out.push(b'"');
        }
        ValueKind::List(items) => {
            let compact = options.indent.is_empty();
            if compact || items.is_empty() {
                out.push(b'[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(b',');
                        maybe_inject_space(options, rng, out);
                        out.push(b' ');
                    }
                    print_value(item, options, depth, out, rng);
                }
                out.push(b']');
            } else {
                out.push(b'[');
                out.push(b'\n');
                for item in items {
                    for _ in 0..depth + 1 {
                        out.extend_from_slice(options.indent.as_bytes());
                    }
                    print_value(item, options, depth + 1, out, rng);
                    out.push(b'\n');
                }
                for _ in 0..depth {
                    out.extend_from_slice(options.indent.as_bytes());
                }
                out.push(b']');
            }
        }
        ValueKind::Message(nested) => {
            let (open, close) = options.delimiters;
            out.push(open);
            let compact = options.indent.is_empty();
            if !compact {
                if nested.iter().next().is_none() {
                    out.push(close);
                    return;
                }
                out.push(b'\n');
                print_fields(nested, options, depth + 1, out, rng);
                for _ in 0..depth {
                    out.extend_from_slice(options.indent.as_bytes());
                }
            } else {
                print_fields(nested, options, depth, out, rng);
            }
            out.push(close);
        }
    }
}

/// Renders a string-kind field's bytes. Per the chosen resolution of the
/// spec's ASCII-vs-escape open question, invalid-UTF-8 content is always
/// escape-rendered byte-for-byte regardless of `output_ascii`.
fn print_string_bytes(bytes: &[u8], output_ascii: bool) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => escape_str(s, output_ascii),
        Err(_) => escape_bytes(bytes),
    }
}

/// Formats a float in the reference printer's style: `nan`/`inf`/`-inf`
/// identifiers for non-finite values, otherwise the shortest decimal
/// representation that round-trips.
fn format_float(v: f64) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else if v == f64::INFINITY {
        "inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        let mut s = format!("{v}");
        if !s.contains('.') && !s.contains('e') && !s.contains('E') {
            s.push_str(".0");
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Message;

    fn deterministic() -> PrintOptions {
        PrintOptions {
            inject_randomness: false,
            ..Default::default()
        }
    }

    #[test]
    fn compact_scalar_fields() {
        let mut message = Message::new();
        message.push(Key::Name("a".into()), Value::synthetic(ValueKind::Uint(1)));
        message.push(Key::Name("b".into()), Value::synthetic(ValueKind::Bool(true)));
        let out = print(&message, &deterministic()).unwrap();
        assert_eq!(out, b"a: 1 b: true");
    }

    #[test]
    fn indented_nested_message() {
        let mut inner = Message::new();
        inner.push(Key::Name("x".into()), Value::synthetic(ValueKind::Uint(1)));
        let mut message = Message::new();
        message.push(Key::Name("sub".into()), Value::message(inner));
        let options = PrintOptions {
            indent: "  ".into(),
            ..deterministic()
        };
        let out = print(&message, &options).unwrap();
        assert_eq!(out, b"sub {\n  x: 1\n}\n");
    }

    #[test]
    fn indented_list_starts_on_its_own_line_and_closes_at_outer_indent() {
        let mut message = Message::new();
        message.push(
            Key::Name("xs".into()),
            Value::synthetic(ValueKind::List(vec![
                Value::synthetic(ValueKind::Uint(1)),
                Value::synthetic(ValueKind::Uint(2)),
            ])),
        );
        let options = PrintOptions {
            indent: "  ".into(),
            ..deterministic()
        };
        let out = print(&message, &options).unwrap();
        assert_eq!(out, b"xs: [\n  1\n  2\n]\n");
    }

    #[test]
    fn indented_empty_list_stays_on_one_line() {
        let mut message = Message::new();
        message.push(
            Key::Name("xs".into()),
            Value::synthetic(ValueKind::List(Vec::new())),
        );
        let options = PrintOptions {
            indent: "  ".into(),
            ..deterministic()
        };
        let out = print(&message, &options).unwrap();
        assert_eq!(out, b"xs: []\n");
    }

    #[test]
    fn empty_message_compact_is_empty_output() {
        let message = Message::new();
        assert_eq!(print(&message, &deterministic()).unwrap(), b"");
    }

    #[test]
    fn bracketed_key_url_safe_vs_quoted() {
        let mut message = Message::new();
        message.push(
            Key::String("pkg.Ext".into()),
            Value::synthetic(ValueKind::Uint(1)),
        );
        message.push(
            Key::String("has space".into()),
            Value::synthetic(ValueKind::Uint(1)),
        );
        let out = print(&message, &deterministic()).unwrap();
        let s = String::from_utf8(out).unwrap();
        assert!(s.contains("[pkg.Ext]:"));
        assert!(s.contains("[\"has space\"]:"));
    }

    #[test]
    fn float_formatting() {
        assert_eq!(format_float(f64::NAN), "nan");
        assert_eq!(format_float(f64::INFINITY), "inf");
        assert_eq!(format_float(f64::NEG_INFINITY), "-inf");
        assert_eq!(format_float(1.5), "1.5");
        assert_eq!(format_float(2.0), "2.0");
    }

    #[test]
    fn invalid_indent_is_rejected() {
        let message = Message::new();
        let options = PrintOptions {
            indent: "x".into(),
            ..deterministic()
        };
        assert!(print(&message, &options).is_err());
    }

    #[test]
    fn invalid_delimiters_are_rejected() {
        let message = Message::new();
        let options = PrintOptions {
            delimiters: (b'[', b']'),
            ..deterministic()
        };
        assert!(print(&message, &options).is_err());
    }
}
