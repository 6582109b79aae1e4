//! Byte-level tokenizer for the text format grammar. Knows nothing about
//! protobuf semantics: it turns a byte slice into a flat stream of
//! [`Token`]s, skipping whitespace and `#` line comments as it goes.

use crate::error::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Number(NumberLit),
    /// Already-unescaped bytes of a (possibly multi-piece, concatenated)
    /// quoted string literal.
    Str(Vec<u8>),
    Symbol(u8),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumberLit {
    /// The literal exactly as it appeared in the source, not including a
    /// leading sign (signs are lexed as separate `-` symbol tokens).
    pub text: String,
    pub is_float: bool,
    pub is_hex: bool,
    pub is_octal: bool,
}

/// A lexed token paired with the exact source span it was read from, used
/// to populate [`crate::value::Value::raw`].
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub raw: String,
}

pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Lexer { input, pos: 0 }
    }

    fn peek_byte(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek_byte() {
                Some(b) if b.is_ascii_whitespace() => self.pos += 1,
                Some(b'#') => {
                    while self.peek_byte().is_some_and(|b| b != b'\n') {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    /// Reads the next token, or `None` at end of input.
    pub fn next(&mut self) -> Result<Option<Spanned>, Error> {
        self.skip_trivia();
        let start = self.pos;
        let Some(b) = self.peek_byte() else {
            return Ok(None);
        };

        let token = if b == b'"' || b == b'\'' {
            self.lex_string(b)?
        } else if b.is_ascii_digit() || b == b'.' {
            self.lex_number()?
        } else if is_ident_start(b) {
            self.lex_ident()
        } else if is_symbol(b) {
            self.pos += 1;
            Token::Symbol(b)
        } else {
            return Err(Error::syntax(format!(
                "unexpected byte 0x{b:02x} in text format input"
            )));
        };

        let raw = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
        Ok(Some(Spanned { token, raw }))
    }

    fn lex_ident(&mut self) -> Token {
        let start = self.pos;
        self.pos += 1;
        while self.peek_byte().is_some_and(is_ident_continue) {
            self.pos += 1;
        }
        Token::Ident(String::from_utf8_lossy(&self.input[start..self.pos]).into_owned())
    }

    fn lex_number(&mut self) -> Result<Token, Error> {
        let start = self.pos;
        let mut is_hex = false;
        let mut is_octal = false;
        let mut is_float = false;

        if self.peek_byte() == Some(b'0')
            && matches!(self.input.get(self.pos + 1), Some(b'x') | Some(b'X'))
        {
            is_hex = true;
            self.pos += 2;
            let digits_start = self.pos;
            while self.peek_byte().is_some_and(|b| b.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            if self.pos == digits_start {
                return Err(Error::syntax("hex literal requires at least one digit"));
            }
        } else {
            while self.peek_byte().is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1;
            }
            if self.peek_byte() == Some(b'.') {
                // Disambiguate a lone `.` (which could end a field list or
                // similar) from a fractional part: only consume it if
                // followed by a digit, or if we already consumed integer
                // digits before it (e.g. `1.`).
                let had_int_part = self.pos > start;
                if self.input.get(self.pos + 1).is_some_and(|b| b.is_ascii_digit()) || had_int_part
                {
                    is_float = true;
                    self.pos += 1;
                    while self.peek_byte().is_some_and(|b| b.is_ascii_digit()) {
                        self.pos += 1;
                    }
                }
            }
            if matches!(self.peek_byte(), Some(b'e') | Some(b'E')) {
                let save = self.pos;
                self.pos += 1;
                if matches!(self.peek_byte(), Some(b'+') | Some(b'-')) {
                    self.pos += 1;
                }
                let exp_digits_start = self.pos;
                while self.peek_byte().is_some_and(|b| b.is_ascii_digit()) {
                    self.pos += 1;
                }
                if self.pos == exp_digits_start {
                    self.pos = save;
                } else {
                    is_float = true;
                }
            }
            if !is_float
                && self.pos - start > 1
                && self.input[start] == b'0'
                && self.input[start..self.pos].iter().all(|&b| (b'0'..=b'7').contains(&b))
            {
                is_octal = true;
            }
        }

        // Trailing `f`/`F` suffix, accepted on any numeric literal and
        // always marks it as a float.
        if matches!(self.peek_byte(), Some(b'f') | Some(b'F')) {
            is_float = true;
            is_octal = false;
            self.pos += 1;
        }

        let text_end = if matches!(self.input.get(self.pos.wrapping_sub(1)), Some(b'f') | Some(b'F'))
        {
            self.pos - 1
        } else {
            self.pos
        };
        let text = String::from_utf8_lossy(&self.input[start..text_end]).into_owned();

        Ok(Token::Number(NumberLit {
            text,
            is_float,
            is_hex,
            is_octal,
        }))
    }

    fn lex_string(&mut self, quote: u8) -> Result<Token, Error> {
        let mut out = Vec::new();
        let mut quote = quote;
        loop {
            self.pos += 1; // opening quote
            let raw_start = self.pos;
            loop {
                match self.peek_byte() {
                    None => return Err(Error::syntax("unterminated string literal")),
                    Some(b'\n') => return Err(Error::syntax("string literal may not span a raw newline")),
                    Some(b'\\') => {
                        self.pos += 1;
                        if self.peek_byte().is_none() {
                            return Err(Error::syntax("unterminated string literal"));
                        }
                        self.pos += 1;
                    }
                    Some(b) if b == quote => break,
                    Some(_) => self.pos += 1,
                }
            }
            out.extend(crate::escape::unescape(&self.input[raw_start..self.pos])?);
            self.pos += 1; // closing quote

            // Adjacent string literal concatenation: skip trivia and see if
            // another quote follows; if not, rewind past the trivia we just
            // consumed so it's available to the next token.
            let save = self.pos;
            self.skip_trivia();
            match self.peek_byte() {
                Some(next @ (b'"' | b'\'')) => quote = next,
                _ => {
                    self.pos = save;
                    break;
                }
            }
        }
        Ok(Token::Str(out))
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_symbol(b: u8) -> bool {
    matches!(
        b,
        b'{' | b'}' | b'<' | b'>' | b'[' | b']' | b':' | b',' | b';' | b'-' | b'+' | b'/'
    )
}
