//! C-style byte escaping shared by the lexer, the printer, and the
//! default-value codec, so the escape grammar is defined in exactly one
//! place.

use crate::error::Error;

/// Unescapes the body of a single quoted string literal (the bytes between
/// the quotes, with the quote character itself not included).
///
/// Recognizes `\n \r \t \v \f \a \b \" \' \\ \?`, octal `\NNN` (1-3 digits),
/// hex `\xNN` (1-2 digits), `\uNNNN` and `\UNNNNNNNN` Unicode escapes.
/// `\u`/`\U` escapes that land in the UTF-16 surrogate range are recombined
/// with an immediately following paired `\u` escape, matching the
/// surrogate-pair reassembly the reference grammar performs.
///
/// Returns the raw decoded bytes; they are not validated as UTF-8 here, so
/// that this function can double as the unescaper for `bytes`-kind literals.
pub fn unescape(bytes: &[u8]) -> Result<Vec<u8>, Error> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b != b'\\' {
            out.push(b);
            i += 1;
            continue;
        }
        i += 1;
        let Some(&esc) = bytes.get(i) else {
            return Err(Error::syntax("string cannot end with a trailing backslash"));
        };
        match esc {
            b'n' => {
                out.push(b'\n');
                i += 1;
            }
            b'r' => {
                out.push(b'\r');
                i += 1;
            }
            b't' => {
                out.push(b'\t');
                i += 1;
            }
            b'v' => {
                out.push(0x0b);
                i += 1;
            }
            b'f' => {
                out.push(0x0c);
                i += 1;
            }
            b'a' => {
                out.push(0x07);
                i += 1;
            }
            b'b' => {
                out.push(0x08);
                i += 1;
            }
            b'\\' | b'"' | b'\'' | b'?' => {
                out.push(esc);
                i += 1;
            }
            b'0'..=b'7' => {
                let mut value: u32 = 0;
                let mut n = 0;
                while n < 3 && bytes.get(i).is_some_and(|c| (b'0'..=b'7').contains(c)) {
                    value = value * 8 + (bytes[i] - b'0') as u32;
                    i += 1;
                    n += 1;
                }
                out.push(value as u8);
            }
            b'x' => {
                i += 1;
                let mut value: u32 = 0;
                let mut n = 0;
                while n < 2 && bytes.get(i).is_some_and(|c| c.is_ascii_hexdigit()) {
                    value = value * 16 + (bytes[i] as char).to_digit(16).unwrap();
                    i += 1;
                    n += 1;
                }
                if n == 0 {
                    return Err(Error::syntax("\\x escape requires at least one hex digit"));
                }
                out.push(value as u8);
            }
            b'u' | b'U' => {
                let digits = if esc == b'u' { 4 } else { 8 };
                i += 1;
                let code = read_hex_digits(bytes, &mut i, digits)?;
                let code = if (0xd800..=0xdbff).contains(&code) {
                    // High surrogate: only valid if immediately followed by a
                    // paired \u low surrogate.
                    if bytes.get(i) == Some(&b'\\') && bytes.get(i + 1) == Some(&b'u') {
                        let save = i;
                        i += 2;
                        let low = read_hex_digits(bytes, &mut i, 4)?;
                        if (0xdc00..=0xdfff).contains(&low) {
                            0x10000 + ((code - 0xd800) << 10) + (low - 0xdc00)
                        } else {
                            i = save;
                            code
                        }
                    } else {
                        code
                    }
                } else {
                    code
                };
                let ch = char::from_u32(code)
                    .ok_or_else(|| Error::syntax(format!("invalid unicode escape U+{code:X}")))?;
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
            other => {
                return Err(Error::syntax(format!(
                    "invalid escape sequence '\\{}'",
                    other as char
                )));
            }
        }
    }
    Ok(out)
}

fn read_hex_digits(bytes: &[u8], i: &mut usize, count: usize) -> Result<u32, Error> {
    let mut value = 0u32;
    for _ in 0..count {
        let c = bytes
            .get(*i)
            .copied()
            .ok_or_else(|| Error::syntax("truncated unicode escape"))?;
        let digit = (c as char)
            .to_digit(16)
            .ok_or_else(|| Error::syntax("truncated unicode escape"))?;
        value = value * 16 + digit;
        *i += 1;
    }
    Ok(value)
}

/// Escapes raw `bytes` as the body of a double-quoted C-style string
/// literal. Printable ASCII passes through unescaped (except `"` and `\`);
/// everything else, including every byte >= 0x80, is rendered as an octal
/// escape, since the bytes are not assumed to be valid UTF-8.
///
/// Used for `bytes`-kind fields and the default-value codec, where the
/// payload is opaque octets rather than text.
pub fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = Vec::with_capacity(bytes.len() + 2);
    for &b in bytes {
        push_escaped_byte(&mut out, b);
    }
    // Every branch of `push_escaped_byte` emits ASCII only.
    String::from_utf8(out).expect("escaped output is always ASCII")
}

/// Escapes a valid UTF-8 `str` as the body of a double-quoted string
/// literal. When `ascii_only` is false (the common case), multi-byte UTF-8
/// sequences are copied through verbatim; when true, every byte >= 0x80 is
/// escaped octally so the result is pure ASCII.
pub fn escape_str(s: &str, ascii_only: bool) -> String {
    let mut out = Vec::with_capacity(s.len() + 2);
    for &b in s.as_bytes() {
        if !ascii_only && b >= 0x80 {
            // `s` is valid UTF-8; copy multi-byte sequences through as-is
            // rather than escaping each continuation byte individually.
            out.push(b);
        } else {
            push_escaped_byte(&mut out, b);
        }
    }
    String::from_utf8(out).expect("ascii escapes plus passthrough UTF-8 stay valid UTF-8")
}

fn push_escaped_byte(out: &mut Vec<u8>, b: u8) {
    match b {
        b'\n' => out.extend_from_slice(b"\\n"),
        b'\r' => out.extend_from_slice(b"\\r"),
        b'\t' => out.extend_from_slice(b"\\t"),
        b'"' => out.extend_from_slice(b"\\\""),
        b'\\' => out.extend_from_slice(b"\\\\"),
        0x20..=0x7e => out.push(b),
        _ => out.extend_from_slice(format!("\\{b:03o}").as_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_c_escapes() {
        let raw = b"tab\\\tquote\"newline\nbackslash\\\\null\0";
        let escaped = escape_bytes(raw);
        let back = unescape(escaped.as_bytes()).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn escape_str_passes_through_utf8_unless_ascii_only() {
        let s = "héllo";
        assert_eq!(escape_str(s, false), "héllo");
        assert_eq!(escape_str(s, true), "h\\303\\251llo");
        assert_eq!(
            unescape(escape_str(s, true).as_bytes()).unwrap(),
            s.as_bytes()
        );
    }

    #[test]
    fn octal_and_hex_escapes() {
        assert_eq!(unescape(br"\101\102").unwrap(), b"AB");
        assert_eq!(unescape(br"\x41\x42").unwrap(), b"AB");
        assert_eq!(unescape(br"\x4").unwrap(), b"\x04");
    }

    #[test]
    fn unicode_and_surrogate_pairs() {
        assert_eq!(unescape(br"\U0001F600").unwrap(), "\u{1F600}".as_bytes());
        // 😀 is the UTF-16 surrogate pair for U+1F600; the two
        // escapes must reassemble into a single scalar value.
        assert_eq!(
            unescape(b"\\uD83D\\uDE00").unwrap(),
            "\u{1F600}".as_bytes()
        );
        // An unpaired high surrogate is not a valid scalar value on its own.
        assert!(unescape(br"\uD83D").is_err());
    }

    #[test]
    fn trailing_backslash_is_fatal() {
        assert!(unescape(b"abc\\").is_err());
    }
}
