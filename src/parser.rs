//! Recursive-descent parser: token stream from [`crate::lexer`] to a
//! [`crate::value::Message`] tree. Schema-free, same as the lexer — it
//! knows the grammar's shape but nothing about field kinds or descriptors.

use crate::error::Error;
use crate::lexer::{Lexer, NumberLit, Spanned, Token};
use crate::value::{Key, Message, Value, ValueKind};

/// Parses a full text format document into a top-level `Message` value. The
/// top level has no surrounding delimiters and runs to end of input.
pub fn parse(input: &[u8]) -> Result<Message, Error> {
    let mut parser = Parser {
        lexer: Lexer::new(input),
        peeked: None,
    };
    let message = parser.parse_message_body(None)?;
    if parser.peek()?.is_some() {
        return Err(Error::syntax("trailing input after top-level message"));
    }
    Ok(message)
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    peeked: Option<Option<Spanned>>,
}

impl<'a> Parser<'a> {
    fn peek(&mut self) -> Result<Option<&Spanned>, Error> {
        if self.peeked.is_none() {
            self.peeked = Some(self.lexer.next()?);
        }
        Ok(self.peeked.as_ref().unwrap().as_ref())
    }

    fn bump(&mut self) -> Result<Option<Spanned>, Error> {
        if self.peeked.is_none() {
            self.peeked = Some(self.lexer.next()?);
        }
        Ok(self.peeked.take().unwrap())
    }

    /// Parses the fields of a message body. `closing` is `Some(delim)` when
    /// parsing a delimited nested message (stop at a matching close symbol);
    /// `None` at the top level (stop at end of input).
    fn parse_message_body(&mut self, closing: Option<u8>) -> Result<Message, Error> {
        let mut message = Message::new();
        loop {
            match self.peek()? {
                None => {
                    if closing.is_some() {
                        return Err(Error::syntax("unterminated message: missing closing delimiter"));
                    }
                    break;
                }
                Some(spanned) => {
                    if let Token::Symbol(b) = spanned.token {
                        if Some(b) == closing {
                            break;
                        }
                        if b == b',' || b == b';' {
                            self.bump()?;
                            continue;
                        }
                    }
                }
            }
            let (key, value) = self.parse_field()?;
            message.push(key, value);
            // Field terminator is optional: a following ',' or ';' is
            // consumed here, anything else (including the next field's key)
            // terminates implicitly.
            if let Some(spanned) = self.peek()? {
                if matches!(spanned.token, Token::Symbol(b',') | Token::Symbol(b';')) {
                    self.bump()?;
                }
            }
        }
        if let Some(delim) = closing {
            self.expect_symbol(matching_close(delim))?;
        }
        Ok(message)
    }

    fn parse_field(&mut self) -> Result<(Key, Value), Error> {
        let key = self.parse_key()?;
        let is_message_value = matches!(
            self.peek()?,
            Some(Spanned {
                token: Token::Symbol(b'{' | b'<'),
                ..
            })
        );
        if matches!(self.peek()?, Some(Spanned { token: Token::Symbol(b':'), .. })) {
            self.bump()?;
        } else if !is_message_value {
            return Err(Error::syntax("expected ':' before scalar value"));
        }
        let value = self.parse_value()?;
        Ok((key, value))
    }

    fn parse_key(&mut self) -> Result<Key, Error> {
        let spanned = self
            .bump()?
            .ok_or_else(|| Error::syntax("expected field key, found end of input"))?;
        match spanned.token {
            Token::Ident(name) => Ok(Key::Name(name)),
            Token::Number(NumberLit {
                text,
                is_float: false,
                ..
            }) => {
                let n: u64 = text
                    .parse()
                    .map_err(|_| Error::syntax(format!("invalid unknown-field number: {text}")))?;
                Ok(Key::Uint(n))
            }
            Token::Symbol(b'[') => {
                let name = self.parse_bracketed_key()?;
                Ok(Key::String(name))
            }
            other => Err(Error::syntax(format!("unexpected token in key position: {other:?}"))),
        }
    }

    /// Reads the raw text between `[` (already consumed) and `]`,
    /// reassembling extension names and Any type URLs from their
    /// constituent identifier/`.`/`/`/`-` tokens.
    fn parse_bracketed_key(&mut self) -> Result<String, Error> {
        let mut out = String::new();
        loop {
            let spanned = self
                .bump()?
                .ok_or_else(|| Error::syntax("unterminated bracketed key"))?;
            match spanned.token {
                Token::Symbol(b']') => break,
                Token::Str(bytes) => {
                    out.push_str(&String::from_utf8_lossy(&bytes));
                }
                Token::Symbol(b'.' | b'/' | b'-') | Token::Ident(_) => {
                    out.push_str(&spanned.raw);
                }
                Token::Number(n) => out.push_str(&n.text),
                other => {
                    return Err(Error::syntax(format!(
                        "unexpected token in bracketed key: {other:?}"
                    )))
                }
            }
        }
        Ok(out)
    }

    fn parse_value(&mut self) -> Result<Value, Error> {
        let spanned = self
            .bump()?
            .ok_or_else(|| Error::syntax("expected value, found end of input"))?;
        match spanned.token {
            Token::Symbol(b'[') => self.parse_list(),
            Token::Symbol(delim @ (b'{' | b'<')) => {
                let message = self.parse_message_body(Some(delim))?;
                Ok(Value::message(message))
            }
            Token::Symbol(b'-') => self.parse_signed_scalar(),
            Token::Str(bytes) => Ok(Value::parsed(spanned.raw, ValueKind::String(bytes))),
            Token::Ident(name) => Ok(Value::parsed(spanned.raw, ident_value_kind(&name))),
            Token::Number(n) => Ok(Value::parsed(spanned.raw, number_value_kind(&n, false)?)),
            other => Err(Error::syntax(format!("unexpected token in value position: {other:?}"))),
        }
    }

    /// Handles a value introduced by a leading `-`: either `-<number>` or
    /// `-inf`/`-infinity`.
    fn parse_signed_scalar(&mut self) -> Result<Value, Error> {
        let spanned = self
            .bump()?
            .ok_or_else(|| Error::syntax("expected value after '-'"))?;
        match spanned.token {
            Token::Number(n) => {
                let raw = format!("-{}", spanned.raw);
                Ok(Value::parsed(raw, number_value_kind(&n, true)?))
            }
            Token::Ident(name) if matches!(name.as_str(), "inf" | "infinity" | "Inf" | "Infinity") => {
                let raw = format!("-{name}");
                Ok(Value::parsed(raw.clone(), ValueKind::Name(raw)))
            }
            other => Err(Error::syntax(format!(
                "unexpected token after '-': {other:?}"
            ))),
        }
    }

    fn parse_list(&mut self) -> Result<Value, Error> {
        let mut items = Vec::new();
        loop {
            match self.peek()? {
                Some(Spanned {
                    token: Token::Symbol(b']'),
                    ..
                }) => {
                    self.bump()?;
                    break;
                }
                None => return Err(Error::syntax("unterminated list")),
                _ => {}
            }
            let value = self.parse_value()?;
            if matches!(value.kind, ValueKind::List(_)) {
                return Err(Error::syntax("lists may not be nested inside lists"));
            }
            items.push(value);
            match self.peek()? {
                Some(Spanned {
                    token: Token::Symbol(b','),
                    ..
                }) => {
                    self.bump()?;
                }
                Some(Spanned {
                    token: Token::Symbol(b']'),
                    ..
                }) => {}
                None => return Err(Error::syntax("unterminated list")),
                _ => {}
            }
        }
        Ok(Value::synthetic(ValueKind::List(items)))
    }

    fn expect_symbol(&mut self, want: u8) -> Result<(), Error> {
        match self.bump()? {
            Some(Spanned {
                token: Token::Symbol(b),
                ..
            }) if b == want => Ok(()),
            Some(spanned) => Err(Error::syntax(format!(
                "expected '{}', found {:?}",
                want as char, spanned.token
            ))),
            None => Err(Error::syntax(format!(
                "expected '{}', found end of input",
                want as char
            ))),
        }
    }
}

fn matching_close(open: u8) -> u8 {
    match open {
        b'{' => b'}',
        b'<' => b'>',
        _ => unreachable!("only '{{' and '<' are ever passed as a message opener"),
    }
}

fn ident_value_kind(name: &str) -> ValueKind {
    match name {
        "true" | "True" | "t" => ValueKind::Bool(true),
        "false" | "False" | "f" => ValueKind::Bool(false),
        _ => ValueKind::Name(name.to_string()),
    }
}

fn number_value_kind(n: &NumberLit, negative: bool) -> Result<ValueKind, Error> {
    if n.is_float {
        let value: f64 = n
            .text
            .parse()
            .map_err(|_| Error::syntax(format!("invalid float literal: {}", n.text)))?;
        let value = if negative { -value } else { value };
        return Ok(ValueKind::Float64(value));
    }
    let digits = if n.is_hex {
        u64::from_str_radix(n.text.trim_start_matches("0x").trim_start_matches("0X"), 16)
    } else if n.is_octal {
        u64::from_str_radix(&n.text, 8)
    } else {
        n.text.parse()
    }
    .map_err(|_| Error::syntax(format!("invalid integer literal: {}", n.text)))?;

    if negative {
        let signed = i64::try_from(digits)
            .map_err(|_| Error::syntax(format!("integer literal out of range: -{}", n.text)))?;
        Ok(ValueKind::Int(-signed))
    } else {
        Ok(ValueKind::Uint(digits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field<'m>(message: &'m Message, name: &str) -> &'m Value {
        message
            .iter()
            .find(|(k, _)| matches!(k, Key::Name(n) if n == name))
            .map(|(_, v)| v)
            .unwrap_or_else(|| panic!("no field named {name}"))
    }

    #[test]
    fn scalar_fields_with_and_without_commas() {
        let message = parse(b"a: 1, b: 2; c: 3\nd: 4").unwrap();
        assert_eq!(field(&message, "a").kind, ValueKind::Uint(1));
        assert_eq!(field(&message, "b").kind, ValueKind::Uint(2));
        assert_eq!(field(&message, "c").kind, ValueKind::Uint(3));
        assert_eq!(field(&message, "d").kind, ValueKind::Uint(4));
    }

    #[test]
    fn nested_message_colon_optional() {
        let message = parse(b"sub { x: 1 } sub2: { y: 2 }").unwrap();
        let sub = field(&message, "sub").as_message().unwrap();
        assert_eq!(field(sub, "x").kind, ValueKind::Uint(1));
        let sub2 = field(&message, "sub2").as_message().unwrap();
        assert_eq!(field(sub2, "y").kind, ValueKind::Uint(2));
    }

    #[test]
    fn angle_bracket_group_delimiter() {
        let message = parse(b"g < z: 9 >").unwrap();
        let g = field(&message, "g").as_message().unwrap();
        assert_eq!(field(g, "z").kind, ValueKind::Uint(9));
    }

    #[test]
    fn mismatched_delimiters_are_fatal() {
        assert!(parse(b"g { z: 9 >").is_err());
    }

    #[test]
    fn bracketed_extension_key() {
        let message = parse(b"[pkg.Ext] { v: 1 }").unwrap();
        let (key, value) = &message.iter().next().unwrap();
        assert_eq!(key, &Key::String("pkg.Ext".into()));
        assert_eq!(
            field(value.as_message().unwrap(), "v").kind,
            ValueKind::Uint(1)
        );
    }

    #[test]
    fn any_url_key_with_slash() {
        let message = parse(br#"[type.googleapis.com/pkg.Foo] { }"#).unwrap();
        let (key, _) = &message.iter().next().unwrap();
        assert_eq!(key, &Key::String("type.googleapis.com/pkg.Foo".into()));
    }

    #[test]
    fn repeated_list_and_scalar_forms_both_parse() {
        let message = parse(br#"rpt: "a" rpt: ["x", "y"] rpt: "b""#).unwrap();
        let values: Vec<&Value> = message
            .iter()
            .filter(|(k, _)| matches!(k, Key::Name(n) if n == "rpt"))
            .map(|(_, v)| v)
            .collect();
        assert_eq!(values.len(), 3);
        assert!(values[1].as_list().is_some());
    }

    #[test]
    fn negative_numbers_and_infinities() {
        let message = parse(b"a: -5 b: -1.5 c: -inf d: inf e: nan").unwrap();
        assert_eq!(field(&message, "a").kind, ValueKind::Int(-5));
        assert_eq!(field(&message, "b").kind, ValueKind::Float64(-1.5));
        assert_eq!(field(&message, "c").as_f64(), Some(f64::NEG_INFINITY));
        assert_eq!(field(&message, "d").as_f64(), Some(f64::INFINITY));
        assert!(field(&message, "e").as_f64().unwrap().is_nan());
    }

    #[test]
    fn unknown_field_number_key() {
        let message = parse(b"5: 1").unwrap();
        let (key, _) = &message.iter().next().unwrap();
        assert_eq!(key, &Key::Uint(5));
    }

    #[test]
    fn list_nested_in_list_is_fatal() {
        assert!(parse(b"a: [[1]]").is_err());
    }

    #[test]
    fn empty_list_is_allowed() {
        let message = parse(b"a: []").unwrap();
        assert_eq!(field(&message, "a").as_list(), Some(&[][..]));
    }
}
